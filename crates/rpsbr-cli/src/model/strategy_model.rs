use chrono::{DateTime, Utc};
use rpsbr_training::strategy::StrategyRecord;
use serde::{Deserialize, Serialize};

/// Summary of the best strategy found by a training run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyModel {
    pub name: String,
    pub trained_at: DateTime<Utc>,
    pub final_fitness: f64,
    pub strategy: StrategyRecord,
}
