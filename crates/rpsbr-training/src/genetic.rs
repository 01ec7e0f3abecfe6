//! Genetic algorithm for evolving strategies.
//!
//! This module evolves a population of [`Strategy`] values against a caller-supplied
//! [`BattleSimulator`]. Each generation is evaluated, ranked, and replaced by a new
//! population built from elites and offspring.
//!
//! # Algorithm Overview
//!
//! 1. **Evaluate Fitness** - every strategy whose fitness is still `0.0` is simulated
//!    once and scored with [`GeneticAlgorithm::evaluate_fitness`]
//! 2. **Elite Selection** - the top `elite_size` strategies are copied unchanged
//! 3. **Tournament Selection** - `population_size - elite_size` parents are picked by
//!    tournaments of size 3
//! 4. **Uniform Crossover** - successive parent pairs produce two children with
//!    probability `crossover_rate`, or pass through unchanged
//! 5. **Gaussian Mutation** - each child is perturbed with probability `mutation_rate`
//! 6. **Padding** - any shortfall is filled with fresh random strategies
//!
//! Evolution stops after `max_generations` or as soon as the best fitness improved by
//! less than [`CONVERGENCE_THRESHOLD`] over the last [`CONVERGENCE_WINDOW`]
//! generations.
//!
//! # Fitness
//!
//! ```text
//! fitness = 0.3 × survival_time
//!         + 10 × conversions
//!         + 5 × damage_dealt / max(damage_taken, 1)
//!         + 2.0 if aggression > 0.7 and conversions > 5
//!         + 1.5 if patience > 0.7 and survival_time > 100
//!         + 1.0 if grouping > 0.6 and damage_taken < 50
//! ```
//!
//! floored at `0.0`.
//!
//! # Example
//!
//! ```
//! use rpsbr_training::{
//!     genetic::{GeneticAlgorithm, GeneticParams},
//!     simulation::BattleMetrics,
//!     strategy::Strategy,
//!     telemetry::NullTelemetry,
//! };
//!
//! let params = GeneticParams {
//!     population_size: 20,
//!     max_generations: 5,
//!     ..GeneticParams::default()
//! };
//! let mut ga = GeneticAlgorithm::new(params, NullTelemetry).unwrap();
//! let best = ga
//!     .evolve(&mut |s: &Strategy| BattleMetrics {
//!         survival_time: Some(150.0 * s.patience()),
//!         conversions: Some(8.0 * s.aggression()),
//!         ..BattleMetrics::default()
//!     })
//!     .unwrap();
//! println!("best fitness: {}", best.fitness());
//! ```
//!
//! # Current Limitations
//!
//! - **Evaluate once**: a strategy keeps its first fitness score for as long as it
//!   survives; noisy simulations are never re-sampled
//! - **Zero means unevaluated**: a strategy that legitimately scores `0.0` is simulated
//!   again in the next generation
//! - **Fixed operators**: tournament size, mutation σ and the convergence window are
//!   constants

use std::path::Path;

use rand::{Rng, seq::IndexedRandom};
use rand_pcg::Pcg32;
use rpsbr_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, TrainingError, operators,
    seed::TrainingSeed,
    simulation::{BattleMetrics, BattleSimulator},
    snapshot::{self, SnapshotError},
    strategy::Strategy,
    telemetry::{SnapshotKind, Telemetry, TrainingEvent},
};

/// Number of strategies competing in each selection tournament.
pub const TOURNAMENT_SIZE: usize = 3;
/// Number of generations inspected by the convergence check.
pub const CONVERGENCE_WINDOW: usize = 10;
/// Minimum best-fitness improvement over the window to keep evolving.
pub const CONVERGENCE_THRESHOLD: f64 = 0.01;

/// Genetic algorithm configuration.
///
/// Absent fields take their [`Default`] values when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticParams {
    /// Number of strategies in every generation
    pub population_size: usize,
    /// Probability that a child is mutated
    pub mutation_rate: f64,
    /// Probability that a parent pair is recombined
    pub crossover_rate: f64,
    /// Number of top strategies copied unchanged into the next generation
    pub elite_size: usize,
    /// Upper bound on generations run by [`GeneticAlgorithm::evolve`]
    pub max_generations: usize,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            elite_size: 5,
            max_generations: 100,
        }
    }
}

impl GeneticParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("population_size", self.population_size)?;
        ConfigError::check_probability("mutation_rate", self.mutation_rate)?;
        ConfigError::check_probability("crossover_rate", self.crossover_rate)?;
        if self.elite_size > self.population_size {
            return Err(ConfigError::invalid(
                "elite_size",
                format!(
                    "{} exceeds population_size {}",
                    self.elite_size, self.population_size
                ),
            ));
        }
        Ok(())
    }
}

/// Best and mean fitness, one entry per completed generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessHistory {
    best: Vec<f64>,
    average: Vec<f64>,
}

impl FitnessHistory {
    #[must_use]
    pub fn best(&self) -> &[f64] {
        &self.best
    }

    #[must_use]
    pub fn average(&self) -> &[f64] {
        &self.average
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.best.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    fn push(&mut self, best: f64, average: f64) {
        self.best.push(best);
        self.average.push(average);
    }

    /// Returns whether the best fitness improved by less than
    /// [`CONVERGENCE_THRESHOLD`] across the last [`CONVERGENCE_WINDOW`] entries.
    #[must_use]
    pub fn has_converged(&self) -> bool {
        let len = self.best.len();
        if len < CONVERGENCE_WINDOW {
            return false;
        }
        self.best[len - 1] - self.best[len - CONVERGENCE_WINDOW] < CONVERGENCE_THRESHOLD
    }
}

/// Summary of the current population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationStats {
    pub generation: u32,
    pub population_size: usize,
    pub best_fitness: f64,
    pub worst_fitness: f64,
    pub average_fitness: f64,
    pub std_fitness: f64,
    pub best_strategy: Strategy,
}

/// Persisted state of a [`GeneticAlgorithm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub generation: u32,
    pub population: Vec<Strategy>,
    pub fitness_history: FitnessHistory,
}

/// Evolves strategies over generations.
///
/// The optimizer exclusively owns its population, fitness history and random number
/// generator.
pub struct GeneticAlgorithm {
    params: GeneticParams,
    population: Vec<Strategy>,
    generation: u32,
    history: FitnessHistory,
    rng: Pcg32,
    telemetry: Box<dyn Telemetry + Send>,
}

impl GeneticAlgorithm {
    /// Creates an optimizer with an empty population and a random seed.
    pub fn new<T>(params: GeneticParams, telemetry: T) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        Self::with_seed(params, rand::rng().random(), telemetry)
    }

    /// Like [`Self::new`], but with a specific seed for reproducible runs.
    pub fn with_seed<T>(
        params: GeneticParams,
        seed: TrainingSeed,
        telemetry: T,
    ) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        params.validate()?;
        Ok(Self {
            params,
            population: Vec::new(),
            generation: 0,
            history: FitnessHistory::default(),
            rng: seed.rng(),
            telemetry: Box::new(telemetry),
        })
    }

    #[must_use]
    pub fn params(&self) -> &GeneticParams {
        &self.params
    }

    #[must_use]
    pub fn population(&self) -> &[Strategy] {
        &self.population
    }

    /// Number of completed generations.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn history(&self) -> &FitnessHistory {
        &self.history
    }

    /// Creates a random strategy tagged with the current generation.
    pub fn create_random_strategy(&mut self) -> Strategy {
        operators::random(&mut self.rng, self.generation)
    }

    /// Replaces the population with `population_size` random strategies.
    pub fn initialize_population(&mut self) {
        self.population = (0..self.params.population_size)
            .map(|_| self.create_random_strategy())
            .collect();
        self.telemetry.record(&TrainingEvent::PopulationInitialized {
            size: self.population.len(),
        });
    }

    /// Scores a strategy from its battle metrics.
    ///
    /// Pure and deterministic; the caller decides what to do with the result.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpsbr_training::{
    ///     genetic::GeneticAlgorithm, simulation::BattleMetrics, strategy::Strategy,
    /// };
    ///
    /// let s = Strategy::new([0.5, 0.5, 0.5, 1.0, 100.0, 0.5], 0);
    /// let metrics = BattleMetrics::new(100.0, 5.0, 60.0, 20.0);
    /// assert_eq!(GeneticAlgorithm::evaluate_fitness(&s, &metrics), 95.0);
    /// ```
    #[must_use]
    pub fn evaluate_fitness(strategy: &Strategy, metrics: &BattleMetrics) -> f64 {
        let survival_time = metrics.survival_time();
        let conversions = metrics.conversions();
        let damage_taken = metrics.damage_taken();

        let mut fitness = survival_time * 0.3;
        fitness += conversions * 10.0;
        fitness += metrics.damage_dealt() / damage_taken.max(1.0) * 5.0;

        if strategy.aggression() > 0.7 && conversions > 5.0 {
            fitness += 2.0;
        }
        if strategy.patience() > 0.7 && survival_time > 100.0 {
            fitness += 1.5;
        }
        if strategy.grouping() > 0.6 && damage_taken < 50.0 {
            fitness += 1.0;
        }

        fitness.max(0.0)
    }

    /// Simulates and scores every strategy that has not been evaluated yet.
    pub fn evaluate_population<S>(&mut self, simulator: &mut S) -> Result<(), TrainingError>
    where
        S: BattleSimulator + ?Sized,
    {
        for strategy in &mut self.population {
            if strategy.is_unevaluated() {
                let metrics = simulator.simulate(strategy)?;
                *strategy = strategy.with_fitness(Self::evaluate_fitness(strategy, &metrics));
            }
        }
        Ok(())
    }

    /// Selects `population_size - elite_size` parents by tournament selection.
    ///
    /// Every slot runs its own tournament, so a strategy may be picked many times.
    pub fn select_parents(&mut self) -> Vec<Strategy> {
        let count = self.params.population_size - self.params.elite_size;
        (0..count)
            .filter_map(|_| tournament_select(&self.population, TOURNAMENT_SIZE, &mut self.rng))
            .copied()
            .collect()
    }

    /// Recombines two parents.
    ///
    /// With probability `crossover_rate` returns two independent uniform-crossover
    /// children tagged with the next generation; otherwise returns the parents as
    /// they are, fitness included.
    pub fn crossover(&mut self, p1: &Strategy, p2: &Strategy) -> (Strategy, Strategy) {
        if !self.rng.random_bool(self.params.crossover_rate) {
            return (*p1, *p2);
        }
        let generation = self.generation + 1;
        (
            operators::uniform_crossover(p1, p2, generation, &mut self.rng),
            operators::uniform_crossover(p1, p2, generation, &mut self.rng),
        )
    }

    /// With probability `mutation_rate` returns a Gaussian-mutated copy, otherwise
    /// the input unchanged.
    pub fn mutate(&mut self, strategy: &Strategy) -> Strategy {
        if self.rng.random_bool(self.params.mutation_rate) {
            operators::gaussian_mutation(strategy, &mut self.rng)
        } else {
            *strategy
        }
    }

    /// Replaces the population with the next generation.
    ///
    /// 1. Sorts the population by fitness, best first
    /// 2. Keeps the top `elite_size` strategies unchanged
    /// 3. Breeds successive parent pairs (crossover, then mutation)
    /// 4. Pads with random strategies and truncates to `population_size`
    /// 5. Advances the generation counter and appends best / mean fitness to the history
    ///
    /// An empty population is initialized first.
    pub fn evolve_generation(&mut self) {
        if self.population.is_empty() {
            self.initialize_population();
        }

        // stable sort, ties keep their current order
        self.population
            .sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));

        let size = self.params.population_size;
        let mut next = self
            .population
            .iter()
            .take(self.params.elite_size)
            .copied()
            .collect::<Vec<_>>();

        let parents = self.select_parents();
        for pair in parents.chunks_exact(2) {
            let (c1, c2) = self.crossover(&pair[0], &pair[1]);
            let c1 = self.mutate(&c1);
            let c2 = self.mutate(&c2);
            next.extend([c1, c2]);
        }
        while next.len() < size {
            let random = self.create_random_strategy();
            next.push(random);
        }
        next.truncate(size);

        self.population = next;
        self.generation += 1;

        let fitness = self
            .population
            .iter()
            .map(Strategy::fitness)
            .collect::<Vec<_>>();
        let best = fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = DescriptiveStats::mean_of(&fitness).unwrap_or(0.0);
        self.history.push(best, average);
        self.telemetry.record(&TrainingEvent::GenerationCompleted {
            generation: self.generation,
            best_fitness: best,
            average_fitness: average,
        });
    }

    /// Runs the evolution loop and returns the fittest strategy.
    ///
    /// Initializes the population if it is empty, then for up to `max_generations`
    /// generations evaluates unevaluated strategies and evolves. Stops early when the
    /// fitness history has converged. A simulation error aborts the run.
    pub fn evolve<S>(&mut self, simulator: &mut S) -> Result<Strategy, TrainingError>
    where
        S: BattleSimulator + ?Sized,
    {
        if self.population.is_empty() {
            self.initialize_population();
        }

        for _ in 0..self.params.max_generations {
            self.evaluate_population(simulator)?;
            self.evolve_generation();

            if self.history.has_converged() {
                self.telemetry.record(&TrainingEvent::Converged {
                    generation: self.generation,
                });
                break;
            }
        }

        let best = self.best_strategy().ok_or(TrainingError::EmptyPopulation)?;
        self.telemetry.record(&TrainingEvent::EvolutionCompleted {
            best_fitness: best.fitness(),
        });
        Ok(best)
    }

    /// The highest-fitness strategy (the first one on ties).
    #[must_use]
    pub fn best_strategy(&self) -> Option<Strategy> {
        self.population
            .iter()
            .copied()
            .reduce(|best, s| if s.fitness() > best.fitness() { s } else { best })
    }

    /// Fitness statistics of the current population, `None` when it is empty.
    #[must_use]
    pub fn statistics(&self) -> Option<PopulationStats> {
        let stats = DescriptiveStats::new(self.population.iter().map(Strategy::fitness))?;
        Some(PopulationStats {
            generation: self.generation,
            population_size: self.population.len(),
            best_fitness: stats.max,
            worst_fitness: stats.min,
            average_fitness: stats.mean,
            std_fitness: stats.std_dev,
            best_strategy: self.best_strategy()?,
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            generation: self.generation,
            population: self.population.clone(),
            fitness_history: self.history.clone(),
        }
    }

    /// Replaces generation counter, population and history with the snapshot's.
    pub fn restore(&mut self, snapshot: PopulationSnapshot) {
        let PopulationSnapshot {
            generation,
            population,
            fitness_history,
        } = snapshot;
        self.generation = generation;
        self.population = population;
        self.history = fitness_history;
    }

    pub fn save_population<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        snapshot::save_json(path, &self.snapshot())?;
        self.telemetry.record(&TrainingEvent::SnapshotSaved {
            kind: SnapshotKind::Population,
            path: path.to_owned(),
        });
        Ok(())
    }

    pub fn load_population<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let snapshot = snapshot::load_json(path)?;
        self.restore(snapshot);
        self.telemetry.record(&TrainingEvent::SnapshotLoaded {
            kind: SnapshotKind::Population,
            path: path.to_owned(),
        });
        Ok(())
    }
}

/// Selects a strategy using tournament selection.
///
/// Samples `tournament_size` distinct strategies (fewer if the population is smaller)
/// and returns the one with the highest fitness, or `None` if nothing was sampled.
fn tournament_select<'a, R>(
    population: &'a [Strategy],
    tournament_size: usize,
    rng: &mut R,
) -> Option<&'a Strategy>
where
    R: Rng + ?Sized,
{
    population
        .choose_multiple(rng, tournament_size)
        .reduce(|best, s| if s.fitness() > best.fitness() { s } else { best })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use rand::SeedableRng as _;

    use super::*;
    use crate::{
        operators::is_within_bounds, simulation::SimulationError, snapshot::tests::TempPath,
        telemetry::NullTelemetry,
    };

    fn seeded(params: GeneticParams, seed: u64) -> GeneticAlgorithm {
        GeneticAlgorithm::with_seed(params, TrainingSeed::from(seed), NullTelemetry).unwrap()
    }

    fn small_params() -> GeneticParams {
        GeneticParams {
            population_size: 10,
            elite_size: 2,
            max_generations: 3,
            ..GeneticParams::default()
        }
    }

    /// Fitness that differs per strategy, so ranking is meaningful.
    fn aggression_battle(s: &Strategy) -> BattleMetrics {
        BattleMetrics {
            conversions: Some(1.0 + s.aggression()),
            ..BattleMetrics::default()
        }
    }

    #[test]
    fn test_params_validation() {
        assert!(GeneticParams::default().validate().is_ok());
        let bad = [
            GeneticParams {
                population_size: 0,
                elite_size: 0,
                ..GeneticParams::default()
            },
            GeneticParams {
                mutation_rate: 1.5,
                ..GeneticParams::default()
            },
            GeneticParams {
                crossover_rate: -0.1,
                ..GeneticParams::default()
            },
            GeneticParams {
                elite_size: 51,
                ..GeneticParams::default()
            },
        ];
        for params in bad {
            assert!(GeneticAlgorithm::new(params, NullTelemetry).is_err());
        }
    }

    #[test]
    fn test_initialize_population() {
        let mut ga = seeded(small_params(), 1);
        ga.initialize_population();
        assert_eq!(ga.population().len(), 10);
        assert_eq!(ga.generation(), 0);
        for s in ga.population() {
            assert!(is_within_bounds(s));
            assert!(s.is_unevaluated());
            assert_eq!(s.generation(), 0);
        }
    }

    #[test]
    fn test_evaluate_fitness_formula() {
        let plain = Strategy::new([0.5, 0.5, 0.5, 1.0, 100.0, 0.5], 0);
        let metrics = BattleMetrics::new(100.0, 5.0, 60.0, 20.0);
        assert_eq!(GeneticAlgorithm::evaluate_fitness(&plain, &metrics), 95.0);

        // grouping bonus: grouping > 0.6 and damage_taken < 50
        let grouped = plain.with_param(crate::strategy::Param::Grouping, 0.9);
        assert_eq!(GeneticAlgorithm::evaluate_fitness(&grouped, &metrics), 96.0);

        // all bonuses
        let all = Strategy::new([0.9, 0.9, 0.9, 1.0, 100.0, 0.5], 0);
        let metrics = BattleMetrics::new(200.0, 6.0, 0.0, 10.0);
        assert_eq!(
            GeneticAlgorithm::evaluate_fitness(&all, &metrics),
            60.0 + 60.0 + 2.0 + 1.5 + 1.0
        );
    }

    #[test]
    fn test_evaluate_fitness_defaults_and_floor() {
        let s = Strategy::new([0.5; 6], 0);
        // absent fields: damage_taken defaults to 1, everything else to 0
        let metrics = BattleMetrics {
            damage_dealt: Some(2.0),
            ..BattleMetrics::default()
        };
        assert_eq!(GeneticAlgorithm::evaluate_fitness(&s, &metrics), 10.0);

        // damage ratio denominator is floored at 1
        let metrics = BattleMetrics::new(0.0, 0.0, 2.0, 0.0);
        assert_eq!(GeneticAlgorithm::evaluate_fitness(&s, &metrics), 10.0);

        let metrics = BattleMetrics::new(-500.0, 0.0, 0.0, 1.0);
        assert_eq!(GeneticAlgorithm::evaluate_fitness(&s, &metrics), 0.0);
    }

    #[test]
    fn test_evaluate_fitness_is_pure() {
        let s = Strategy::new([0.8, 0.8, 0.8, 1.0, 100.0, 0.5], 0);
        let metrics = BattleMetrics::new(120.0, 7.0, 30.0, 40.0);
        let a = GeneticAlgorithm::evaluate_fitness(&s, &metrics);
        let b = GeneticAlgorithm::evaluate_fitness(&s, &metrics);
        assert_eq!(a, b);
        assert!(s.is_unevaluated());
    }

    #[test]
    fn test_select_parents_count() {
        let mut ga = seeded(small_params(), 2);
        ga.initialize_population();
        assert_eq!(ga.select_parents().len(), 8);
    }

    #[test]
    fn test_tournament_picks_fittest_of_small_population() {
        let population = [
            Strategy::new([0.1; 6], 0).with_fitness(1.0),
            Strategy::new([0.2; 6], 0).with_fitness(3.0),
            Strategy::new([0.3; 6], 0).with_fitness(2.0),
        ];
        let mut rng = Pcg32::seed_from_u64(0);
        for _ in 0..10 {
            let winner = tournament_select(&population, TOURNAMENT_SIZE, &mut rng).unwrap();
            assert_eq!(winner.fitness(), 3.0);
        }
        assert!(tournament_select(&[], TOURNAMENT_SIZE, &mut rng).is_none());
    }

    #[test]
    fn test_crossover_rate_zero_returns_parents() {
        let params = GeneticParams {
            crossover_rate: 0.0,
            ..small_params()
        };
        let mut ga = seeded(params, 3);
        let p1 = Strategy::new([0.1; 6], 0).with_fitness(4.0);
        let p2 = Strategy::new([0.9; 6], 0).with_fitness(5.0);
        assert_eq!(ga.crossover(&p1, &p2), (p1, p2));
    }

    #[test]
    fn test_crossover_rate_one_creates_children() {
        let params = GeneticParams {
            crossover_rate: 1.0,
            ..small_params()
        };
        let mut ga = seeded(params, 4);
        let p1 = Strategy::new([0.1; 6], 0).with_fitness(4.0);
        let p2 = Strategy::new([0.9; 6], 0).with_fitness(5.0);
        let (c1, c2) = ga.crossover(&p1, &p2);
        for c in [c1, c2] {
            assert!(c.is_unevaluated());
            assert_eq!(c.generation(), 1);
            assert!(is_within_bounds(&c));
        }
    }

    #[test]
    fn test_mutate_rates() {
        let s = Strategy::new([0.5, 0.5, 0.5, 1.0, 100.0, 0.5], 7).with_fitness(3.0);

        let mut never = seeded(
            GeneticParams {
                mutation_rate: 0.0,
                ..small_params()
            },
            5,
        );
        assert_eq!(never.mutate(&s), s);

        let mut always = seeded(
            GeneticParams {
                mutation_rate: 1.0,
                ..small_params()
            },
            5,
        );
        let m = always.mutate(&s);
        assert_ne!(m, s);
        assert_eq!(m.generation(), 7);
        assert!(is_within_bounds(&m));
    }

    #[test]
    fn test_evolve_generation_keeps_size_and_elites() {
        for seed in 0..20 {
            let mut ga = seeded(small_params(), seed);
            ga.initialize_population();
            ga.evaluate_population(&mut aggression_battle).unwrap();

            let mut ranked = ga.population().to_vec();
            ranked.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));

            ga.evolve_generation();
            assert_eq!(ga.population().len(), 10);
            assert_eq!(&ga.population()[..2], &ranked[..2]);
            assert_eq!(ga.generation(), 1);
            assert_eq!(ga.history().len(), 1);
            assert!(ga.population().iter().all(is_within_bounds));
        }
    }

    #[test]
    fn test_evolve_generation_pads_odd_parent_count() {
        let params = GeneticParams {
            population_size: 7,
            elite_size: 2,
            ..small_params()
        };
        let mut ga = seeded(params, 9);
        ga.initialize_population();
        ga.evaluate_population(&mut aggression_battle).unwrap();
        ga.evolve_generation();
        assert_eq!(ga.population().len(), 7);
    }

    #[test]
    fn test_evolve_example_scenario() {
        let mut ga = seeded(
            GeneticParams {
                population_size: 10,
                max_generations: 1,
                ..GeneticParams::default()
            },
            11,
        );
        let mut calls = 0;
        let best = ga
            .evolve(&mut |_: &Strategy| {
                calls += 1;
                BattleMetrics::new(100.0, 5.0, 60.0, 20.0)
            })
            .unwrap();
        assert_eq!(calls, 10);
        // 100 * 0.3 + 5 * 10 + (60 / 20) * 5, plus the grouping bonus at most
        assert!(best.fitness() == 95.0 || best.fitness() == 96.0);
        assert_eq!(ga.history().best().len(), 1);
        assert_eq!(ga.history().average().len(), 1);
    }

    #[test]
    fn test_evolve_runs_max_generations() {
        let mut ga = seeded(small_params(), 12);
        ga.evolve(&mut |_: &Strategy| BattleMetrics::new(100.0, 5.0, 60.0, 20.0))
            .unwrap();
        assert_eq!(ga.history().len(), 3);
        assert_eq!(ga.generation(), 3);
    }

    #[test]
    fn test_evolve_skips_evaluated_strategies() {
        let mut ga = seeded(small_params(), 13);
        ga.initialize_population();
        ga.evaluate_population(&mut aggression_battle).unwrap();
        let mut calls = 0;
        ga.evaluate_population(&mut |s: &Strategy| {
            calls += 1;
            aggression_battle(s)
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_evolve_stops_on_convergence() {
        let params = GeneticParams {
            population_size: 10,
            max_generations: 50,
            ..GeneticParams::default()
        };
        let (tx, rx) = mpsc::channel();
        let mut ga = GeneticAlgorithm::with_seed(params, TrainingSeed::from(14), tx).unwrap();
        // identical metrics without bonus terms: best fitness stays flat at 85
        ga.evolve(&mut |_: &Strategy| BattleMetrics::new(100.0, 5.0, 60.0, 60.0))
            .unwrap();
        assert_eq!(ga.history().len(), CONVERGENCE_WINDOW);
        assert!(ga.history().best().iter().all(|&b| b == 85.0));
        assert!(
            rx.try_iter()
                .any(|e| e == TrainingEvent::Converged { generation: 10 })
        );
    }

    #[test]
    fn test_history_convergence_window() {
        let mut history = FitnessHistory::default();
        for i in 0..9 {
            history.push(f64::from(i), 0.0);
        }
        assert!(!history.has_converged());
        history.push(9.0, 0.0);
        assert!(!history.has_converged());

        let mut flat = FitnessHistory::default();
        for _ in 0..10 {
            flat.push(5.0, 1.0);
        }
        assert!(flat.has_converged());
    }

    #[test]
    fn test_evolve_propagates_simulation_error() {
        struct Offline;
        impl BattleSimulator for Offline {
            fn simulate(&mut self, _: &Strategy) -> Result<BattleMetrics, SimulationError> {
                Err(SimulationError::new("offline"))
            }
        }
        let mut ga = seeded(small_params(), 15);
        let err = ga.evolve(&mut Offline).unwrap_err();
        assert!(matches!(err, TrainingError::Simulation(_)));
        assert!(ga.history().is_empty());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut ga = seeded(small_params(), 16);
            ga.evolve(&mut aggression_battle).unwrap();
            ga.snapshot()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_statistics() {
        let mut ga = seeded(small_params(), 17);
        assert!(ga.statistics().is_none());
        ga.initialize_population();
        ga.evaluate_population(&mut aggression_battle).unwrap();
        let stats = ga.statistics().unwrap();
        assert_eq!(stats.population_size, 10);
        assert!(stats.worst_fitness <= stats.average_fitness);
        assert!(stats.average_fitness <= stats.best_fitness);
        assert_eq!(stats.best_fitness, stats.best_strategy.fitness());
    }

    #[test]
    fn test_snapshot_roundtrip_through_file() {
        let tmp = TempPath::new("population");
        let mut ga = seeded(small_params(), 18);
        ga.evolve(&mut aggression_battle).unwrap();
        ga.save_population(tmp.path()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path()).unwrap()).unwrap();
        assert_eq!(json["generation"], 3);
        assert_eq!(json["population"].as_array().unwrap().len(), 10);
        assert_eq!(json["fitness_history"]["best"].as_array().unwrap().len(), 3);

        let mut restored = seeded(small_params(), 99);
        restored.load_population(tmp.path()).unwrap();
        assert_eq!(restored.snapshot(), ga.snapshot());
    }

    #[test]
    fn test_load_rejects_missing_keys() {
        let tmp = TempPath::new("population-missing");
        std::fs::write(tmp.path(), r#"{"generation": 1, "population": []}"#).unwrap();
        let mut ga = seeded(small_params(), 19);
        assert!(matches!(
            ga.load_population(tmp.path()),
            Err(SnapshotError::Json { .. })
        ));
        assert_eq!(ga.generation(), 0);
    }
}
