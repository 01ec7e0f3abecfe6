use anyhow::Context as _;
use chrono::Utc;
use rand::Rng as _;
use rpsbr_training::{
    genetic::{GeneticAlgorithm, GeneticParams},
    strategy::Param,
    telemetry::LogTelemetry,
};

use super::TrainingContext;
use crate::{model::strategy_model::StrategyModel, simulation::BattleArena, util};

const POPULATION_FILE: &str = "ga_population.json";
const BEST_STRATEGY_FILE: &str = "ga_best_strategy.json";

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct GeneticArg {
    /// Population size for the genetic algorithm [default: 50]
    #[arg(long)]
    pub(crate) population_size: Option<usize>,
    /// Number of generations for the genetic algorithm [default: 100]
    #[arg(long)]
    pub(crate) generations: Option<usize>,
}

impl GeneticArg {
    fn params(&self, base: &GeneticParams) -> GeneticParams {
        GeneticParams {
            population_size: self.population_size.unwrap_or(base.population_size),
            max_generations: self.generations.unwrap_or(base.max_generations),
            ..base.clone()
        }
    }
}

pub(crate) fn run(arg: &GeneticArg, ctx: &TrainingContext) -> anyhow::Result<()> {
    log::info!("starting genetic algorithm training");

    let mut rng = ctx.seed.rng();
    let params = arg.params(&ctx.config.genetic);
    let mut ga = GeneticAlgorithm::with_seed(params, rng.random(), LogTelemetry)
        .context("Invalid genetic algorithm configuration")?;
    let mut arena = BattleArena::new(rng);

    let best = ga
        .evolve(&mut arena)
        .context("Genetic algorithm training failed")?;

    let population_path = ctx.output_path(POPULATION_FILE);
    ga.save_population(&population_path)
        .context("Failed to save genetic algorithm population")?;

    if let Some(stats) = ga.statistics() {
        log::info!(
            "final population: generation {}, fitness min {:.2} / mean {:.2} / max {:.2} (std {:.2})",
            stats.generation,
            stats.worst_fitness,
            stats.average_fitness,
            stats.best_fitness,
            stats.std_fitness,
        );
    }
    for param in Param::ALL {
        log::info!("  {:<10} = {:.3}", param.name(), best.param(param));
    }

    let model = StrategyModel {
        name: "genetic".to_owned(),
        trained_at: Utc::now(),
        final_fitness: best.fitness(),
        strategy: best.into(),
    };
    let model_path = ctx.output_path(BEST_STRATEGY_FILE);
    util::write_json_file("best strategy", &model_path, &model)?;

    log::info!("genetic algorithm training completed");
    log::info!("  population:    {}", population_path.display());
    log::info!("  best strategy: {}", model_path.display());
    log::info!("  final fitness: {:.3}", model.final_fitness);
    Ok(())
}
