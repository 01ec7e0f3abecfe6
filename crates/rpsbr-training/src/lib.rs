//! Offline strategy optimization for Rock Paper Scissors Battle Royale agents.
//!
//! This crate evolves and learns the numeric parameters that drive in-game agents.
//! It never runs a battle itself: every optimizer consumes outcomes from a
//! caller-supplied simulation (see [`simulation`]) and produces or refines a
//! [`Strategy`](strategy::Strategy).
//!
//! # Optimizers
//!
//! - [`genetic::GeneticAlgorithm`] - evolves a population of strategies with tournament
//!   selection, uniform crossover, Gaussian mutation and elitism
//! - [`network::NeuralNetwork`] - a small multi-layer perceptron trained with mini-batch
//!   gradient descent, mapping six features to a three-value strategy profile
//! - [`reinforcement::ReinforcementLearning`] - a facade over tabular Q-learning and a
//!   linear soft-max policy gradient agent
//!
//! # Architecture
//!
//! ```text
//! Driver (rpsbr-cli)
//!     ↓ selects
//! Optimizer  ──calls──▶  Simulation collaborator (BattleSimulator / Environment)
//!     ↓ reports                ↓ returns
//! Telemetry sink          BattleMetrics / StepOutcome
//!     ↓ yields
//! Best strategy / trained parameters
//!     ↓ persisted by
//! Snapshot (JSON)
//! ```
//!
//! # Example
//!
//! ```
//! use rpsbr_training::{
//!     genetic::{GeneticAlgorithm, GeneticParams},
//!     seed::TrainingSeed,
//!     simulation::BattleMetrics,
//!     strategy::Strategy,
//!     telemetry::NullTelemetry,
//! };
//!
//! let params = GeneticParams {
//!     population_size: 10,
//!     max_generations: 3,
//!     ..GeneticParams::default()
//! };
//! let mut ga =
//!     GeneticAlgorithm::with_seed(params, TrainingSeed::from(7), NullTelemetry).unwrap();
//! let best = ga
//!     .evolve(&mut |_: &Strategy| BattleMetrics::new(100.0, 5.0, 60.0, 20.0))
//!     .unwrap();
//! assert!(best.fitness() >= 80.0);
//! assert_eq!(ga.history().best().len(), 3);
//! ```
//!
//! # Design Principles
//!
//! - Every optimizer owns its state (population, weights, tables) and its random number
//!   generator; nothing is shared between instances, so hosts that want parallel
//!   training create one optimizer per thread.
//! - Progress is reported through an injected [`telemetry::Telemetry`] sink rather than
//!   a process-wide logger.
//! - Runs are synchronous and single-threaded. A failing simulation aborts the run and
//!   the error is returned to the caller unchanged.
//!
//! # Current Limitations
//!
//! - `dropout_rate` is part of the network configuration but is not applied
//! - The network backward pass evaluates the activation derivative at the stored
//!   post-activation value (kept for compatibility with existing trained models)
//! - Q-learning discretizes states by hashing, so distinct states may share a row

pub mod genetic;
pub mod matrix;
pub mod network;
pub mod operators;
pub mod reinforcement;
pub mod seed;
pub mod simulation;
pub mod snapshot;
pub mod strategy;
pub mod telemetry;

use self::simulation::SimulationError;

/// Invalid optimizer configuration, rejected at construction.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("unknown algorithm: {name} (expected q_learning or policy_gradient)")]
    UnknownAlgorithm { name: String },
    #[display("unknown activation function: {name}")]
    UnknownActivation { name: String },
    #[display("invalid seed: {value}")]
    InvalidSeed { value: String },
    #[display("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Rejects values outside `[0, 1]` (and NaN).
    pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<(), Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Self::invalid(name, format!("{value} is not within [0, 1]")))
        }
    }

    /// Rejects values that are not finite and strictly positive.
    pub(crate) fn check_step_size(name: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Self::invalid(name, format!("{value} is not a positive number")))
        }
    }

    pub(crate) fn check_positive(name: &'static str, value: usize) -> Result<(), Self> {
        if value > 0 {
            Ok(())
        } else {
            Err(Self::invalid(name, "must be greater than zero"))
        }
    }
}

/// Failure that aborts a training run.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TrainingError {
    #[display("{_0}")]
    Simulation(SimulationError),
    #[display("population is empty")]
    #[from(skip)]
    EmptyPopulation,
}
