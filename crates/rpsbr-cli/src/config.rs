use rpsbr_training::{
    ConfigError, genetic::GeneticParams, network::NetworkConfig, reinforcement::RlConfig,
};
use serde::{Deserialize, Serialize};

/// Contents of the `--config` file.
///
/// Every section, and every field within a section, is optional and falls back to
/// its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) genetic: GeneticParams,
    pub(crate) network: NetworkConfig,
    pub(crate) rl: RlConfig,
}

impl AppConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.genetic.validate()?;
        self.network.validate()?;
        self.rl.validate()?;
        Ok(())
    }
}
