use anyhow::Context as _;
use rand::Rng as _;
use rpsbr_training::{matrix::Matrix, network::NeuralNetwork, telemetry::LogTelemetry};

use super::TrainingContext;

const NETWORK_FILE: &str = "neural_network.json";

const SAMPLE_COUNT: usize = 1000;
const DEFAULT_EPOCHS: usize = 100;
const BATCH_SIZE: usize = 32;
const VALIDATION_SPLIT: f64 = 0.2;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct NeuralArg {
    /// Number of epochs for the neural network [default: 100]
    #[arg(long)]
    pub(crate) epochs: Option<usize>,
}

pub(crate) fn run(arg: &NeuralArg, ctx: &TrainingContext) -> anyhow::Result<()> {
    log::info!("starting neural network training");

    let config = ctx.config.network.clone();
    let mut rng = ctx.seed.rng();
    // placeholder data until recorded battles are available
    let x = Matrix::from_fn(SAMPLE_COUNT, config.input_size, |_, _| rng.random());
    let y = Matrix::from_fn(SAMPLE_COUNT, config.output_size, |_, _| rng.random());

    let mut network = NeuralNetwork::with_seed(config, rng.random(), LogTelemetry)
        .context("Invalid network configuration")?;
    let history = network
        .train(
            &x,
            &y,
            arg.epochs.unwrap_or(DEFAULT_EPOCHS),
            BATCH_SIZE,
            VALIDATION_SPLIT,
        )
        .context("Neural network training failed")?;

    let path = ctx.output_path(NETWORK_FILE);
    network
        .save(&path)
        .context("Failed to save neural network")?;

    log::info!("neural network training completed");
    if let Some(loss) = history.train_loss.last() {
        log::info!("  final training loss: {loss:.4}");
    }
    log::info!("  model: {}", path.display());
    Ok(())
}
