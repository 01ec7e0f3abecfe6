use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rand::Rng as _;
use rpsbr_training::seed::TrainingSeed;

use self::{genetic::GeneticArg, neural::NeuralArg, rl::RlArg};
use crate::{config::AppConfig, util};

mod genetic;
mod neural;
mod rl;

const DEFAULT_OUTPUT_DIR: &str = "ai_training/data/strategy-evaluations";

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Train strategy models for Rock Paper Scissors Battle Royale", long_about = None)]
pub struct CommandArgs {
    #[command(flatten)]
    common: CommonArg,
    /// Which model to train (all of them when omitted)
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, clap::Args)]
struct CommonArg {
    /// JSON file with `genetic`, `network` and `rl` configuration sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory the trained models are written to
    #[arg(long, global = true, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Seed for reproducible runs (32 hex digits or a decimal integer)
    #[arg(long, global = true)]
    seed: Option<TrainingSeed>,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve a strategy with the genetic algorithm
    Genetic(#[clap(flatten)] GeneticArg),
    /// Train the strategy network on synthetic data
    Neural(#[clap(flatten)] NeuralArg),
    /// Train a reinforcement learning agent in the rock-paper-scissors arena
    Rl(#[clap(flatten)] RlArg),
    /// Train every model in turn
    All(#[clap(flatten)] AllArg),
}

#[derive(Default, Debug, Clone, clap::Args)]
struct AllArg {
    #[clap(flatten)]
    genetic: GeneticArg,
    #[clap(flatten)]
    neural: NeuralArg,
    #[clap(flatten)]
    rl: RlArg,
}

/// Settings shared by every trainer.
#[derive(Debug, Clone)]
pub(crate) struct TrainingContext {
    pub(crate) config: AppConfig,
    pub(crate) output_dir: PathBuf,
    pub(crate) seed: TrainingSeed,
}

impl TrainingContext {
    fn from_arg(arg: &CommonArg) -> anyhow::Result<Self> {
        let config = match &arg.config {
            Some(path) => util::read_json_file("configuration", path)?,
            None => AppConfig::default(),
        };
        config.validate().context("Invalid configuration")?;

        fs::create_dir_all(&arg.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                arg.output_dir.display()
            )
        })?;

        let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
        log::info!("training seed: {seed}");

        Ok(Self {
            config,
            output_dir: arg.output_dir.clone(),
            seed,
        })
    }

    pub(crate) fn output_path<P>(&self, file_name: P) -> PathBuf
    where
        P: AsRef<Path>,
    {
        self.output_dir.join(file_name)
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    let ctx = TrainingContext::from_arg(&args.common)?;

    log::info!("Rock Paper Scissors Battle Royale - AI training");
    match args.mode.unwrap_or(Mode::All(AllArg::default())) {
        Mode::Genetic(arg) => genetic::run(&arg, &ctx)?,
        Mode::Neural(arg) => neural::run(&arg, &ctx)?,
        Mode::Rl(arg) => rl::run(&arg, &ctx)?,
        Mode::All(arg) => {
            genetic::run(&arg.genetic, &ctx)?;
            neural::run(&arg.neural, &ctx)?;
            rl::run(&arg.rl, &ctx)?;
        }
    }
    log::info!("all training completed");
    log::info!("results saved to {}", ctx.output_dir.display());
    Ok(())
}
