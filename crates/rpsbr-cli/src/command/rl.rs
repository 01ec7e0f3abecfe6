use anyhow::Context as _;
use rand::Rng as _;
use rpsbr_stats::descriptive::DescriptiveStats;
use rpsbr_training::{
    reinforcement::{Algorithm, ReinforcementLearning},
    telemetry::LogTelemetry,
};

use super::TrainingContext;
use crate::simulation::{ACTION_COUNT, RpsArena, STATE_SIZE};

const AGENT_FILE: &str = "reinforcement_learning.json";
const DEFAULT_EPISODES: usize = 1000;
const REPORT_WINDOW: usize = 100;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct RlArg {
    /// Number of episodes for reinforcement learning [default: 1000]
    #[arg(long)]
    pub(crate) episodes: Option<usize>,
    /// Learning algorithm: q_learning or policy_gradient [default: q_learning]
    #[arg(long)]
    pub(crate) algorithm: Option<Algorithm>,
}

pub(crate) fn run(arg: &RlArg, ctx: &TrainingContext) -> anyhow::Result<()> {
    log::info!("starting reinforcement learning training");

    let algorithm = arg.algorithm.unwrap_or(Algorithm::QLearning);
    let mut rng = ctx.seed.rng();
    let mut rl = ReinforcementLearning::with_seed(
        algorithm,
        STATE_SIZE,
        ACTION_COUNT,
        ctx.config.rl.clone(),
        rng.random(),
        LogTelemetry,
    )
    .context("Invalid reinforcement learning configuration")?;
    let mut arena = RpsArena::new(rng);

    let history = rl
        .train(&mut arena, arg.episodes.unwrap_or(DEFAULT_EPISODES))
        .context("Reinforcement learning training failed")?;

    let path = ctx.output_path(AGENT_FILE);
    rl.save(&path)
        .with_context(|| format!("Failed to save {algorithm} agent"))?;

    log::info!("reinforcement learning training completed");
    let rewards = &history.episode_rewards;
    let recent = &rewards[rewards.len().saturating_sub(REPORT_WINDOW)..];
    if let Some(mean) = DescriptiveStats::mean_of(recent) {
        log::info!("  final average reward: {mean:.4}");
    }
    log::info!("  model: {}", path.display());
    Ok(())
}
