//! Strategy model: six bounded behavior parameters plus evaluation bookkeeping.
//!
//! A [`Strategy`] is a value type. Every constructor clamps the parameters into
//! their legal ranges, and every update (`with_*`) returns a new value, so a
//! strategy can never hold an out-of-range parameter.
//!
//! # Parameters
//!
//! | parameter    | legal range     | sampling range  | mutation σ |
//! |--------------|-----------------|-----------------|------------|
//! | `aggression` | `[0.0, 1.0]`    | `[0.0, 1.0]`    | 0.1        |
//! | `patience`   | `[0.0, 1.0]`    | `[0.0, 1.0]`    | 0.1        |
//! | `grouping`   | `[0.0, 1.0]`    | `[0.0, 1.0]`    | 0.1        |
//! | `speed`      | `[0.1, 3.0]`    | `[0.5, 2.0]`    | 0.2        |
//! | `vision`     | `[10.0, 200.0]` | `[50.0, 150.0]` | 10.0       |
//! | `avoidance`  | `[0.0, 1.0]`    | `[0.0, 1.0]`    | 0.1        |
//!
//! The operators that create and combine strategies live in
//! [`operators`](crate::operators).

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// One of the six strategy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Aggression,
    Patience,
    Grouping,
    Speed,
    Vision,
    Avoidance,
}

impl Param {
    pub const LEN: usize = 6;

    /// All parameters, in storage order.
    pub const ALL: [Self; Self::LEN] = [
        Self::Aggression,
        Self::Patience,
        Self::Grouping,
        Self::Speed,
        Self::Vision,
        Self::Avoidance,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aggression => "aggression",
            Self::Patience => "patience",
            Self::Grouping => "grouping",
            Self::Speed => "speed",
            Self::Vision => "vision",
            Self::Avoidance => "avoidance",
        }
    }

    /// Range every stored value is clamped into.
    #[must_use]
    pub const fn legal_range(self) -> RangeInclusive<f64> {
        match self {
            Self::Speed => 0.1..=3.0,
            Self::Vision => 10.0..=200.0,
            _ => 0.0..=1.0,
        }
    }

    /// Range random strategies are drawn from.
    #[must_use]
    pub const fn sampling_range(self) -> RangeInclusive<f64> {
        match self {
            Self::Speed => 0.5..=2.0,
            Self::Vision => 50.0..=150.0,
            _ => 0.0..=1.0,
        }
    }

    /// Standard deviation of the Gaussian perturbation applied by mutation.
    #[must_use]
    pub const fn mutation_sigma(self) -> f64 {
        match self {
            Self::Speed => 0.2,
            Self::Vision => 10.0,
            _ => 0.1,
        }
    }

    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        let range = self.legal_range();
        value.clamp(*range.start(), *range.end())
    }
}

/// A candidate agent behavior.
///
/// `fitness` starts at `0.0` for every newly created strategy; a strategy whose
/// fitness is still exactly `0.0` is treated as not yet evaluated by
/// [`GeneticAlgorithm::evolve`](crate::genetic::GeneticAlgorithm::evolve).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "StrategyRecord", into = "StrategyRecord")]
pub struct Strategy {
    params: [f64; Param::LEN],
    fitness: f64,
    generation: u32,
}

impl Strategy {
    /// Creates an unevaluated strategy, clamping each parameter into its legal range.
    ///
    /// Parameters are given in [`Param::ALL`] order.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpsbr_training::strategy::Strategy;
    ///
    /// let s = Strategy::new([1.5, 0.5, 0.5, 10.0, 5.0, -1.0], 0);
    /// assert_eq!(s.aggression(), 1.0);
    /// assert_eq!(s.speed(), 3.0);
    /// assert_eq!(s.vision(), 10.0);
    /// assert_eq!(s.avoidance(), 0.0);
    /// assert_eq!(s.fitness(), 0.0);
    /// ```
    #[must_use]
    pub fn new(params: [f64; Param::LEN], generation: u32) -> Self {
        Self::from_fn(|p| params[p.index()], generation)
    }

    /// Creates an unevaluated strategy by computing each parameter from a function.
    pub fn from_fn<F>(mut f: F, generation: u32) -> Self
    where
        F: FnMut(Param) -> f64,
    {
        Self {
            params: Param::ALL.map(|p| p.clamp(f(p))),
            fitness: 0.0,
            generation,
        }
    }

    #[must_use]
    pub fn param(&self, param: Param) -> f64 {
        self.params[param.index()]
    }

    /// Returns all parameters in [`Param::ALL`] order.
    #[must_use]
    pub fn params(&self) -> &[f64; Param::LEN] {
        &self.params
    }

    #[must_use]
    pub fn aggression(&self) -> f64 {
        self.param(Param::Aggression)
    }

    #[must_use]
    pub fn patience(&self) -> f64 {
        self.param(Param::Patience)
    }

    #[must_use]
    pub fn grouping(&self) -> f64 {
        self.param(Param::Grouping)
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        self.param(Param::Speed)
    }

    #[must_use]
    pub fn vision(&self) -> f64 {
        self.param(Param::Vision)
    }

    #[must_use]
    pub fn avoidance(&self) -> f64 {
        self.param(Param::Avoidance)
    }

    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Generation index at which this strategy was created.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns whether this strategy still waits for its first evaluation.
    #[must_use]
    #[expect(clippy::float_cmp)]
    pub fn is_unevaluated(&self) -> bool {
        self.fitness == 0.0
    }

    #[must_use]
    pub fn with_fitness(self, fitness: f64) -> Self {
        Self { fitness, ..self }
    }

    /// Marks the strategy for re-evaluation.
    #[must_use]
    pub fn with_reset_fitness(self) -> Self {
        self.with_fitness(0.0)
    }

    /// Replaces one parameter (clamped), keeping fitness and generation.
    #[must_use]
    pub fn with_param(mut self, param: Param, value: f64) -> Self {
        self.params[param.index()] = param.clamp(value);
        self
    }

    #[must_use]
    pub fn with_generation(self, generation: u32) -> Self {
        Self { generation, ..self }
    }
}

/// Dictionary form of a [`Strategy`] used in population snapshots.
///
/// The six parameters are required; `fitness` and `generation` default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub aggression: f64,
    pub patience: f64,
    pub grouping: f64,
    pub speed: f64,
    pub vision: f64,
    pub avoidance: f64,
    #[serde(default)]
    pub fitness: f64,
    #[serde(default)]
    pub generation: u32,
}

impl From<StrategyRecord> for Strategy {
    fn from(record: StrategyRecord) -> Self {
        Strategy::new(
            [
                record.aggression,
                record.patience,
                record.grouping,
                record.speed,
                record.vision,
                record.avoidance,
            ],
            record.generation,
        )
        .with_fitness(record.fitness)
    }
}

impl From<Strategy> for StrategyRecord {
    fn from(strategy: Strategy) -> Self {
        let [aggression, patience, grouping, speed, vision, avoidance] = strategy.params;
        Self {
            aggression,
            patience,
            grouping,
            speed,
            vision,
            avoidance,
            fitness: strategy.fitness,
            generation: strategy.generation,
        }
    }
}

/// The reduced strategy produced by the learned models.
///
/// Values are raw model outputs and are not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub aggression: f64,
    pub patience: f64,
    pub grouping: f64,
}

impl StrategyProfile {
    /// Reads the first three values as `aggression`, `patience` and `grouping`.
    pub fn from_slice(values: &[f64]) -> Result<Self, ProfileError> {
        match values {
            [aggression, patience, grouping, ..] => Ok(Self {
                aggression: *aggression,
                patience: *patience,
                grouping: *grouping,
            }),
            _ => Err(ProfileError { len: values.len() }),
        }
    }
}

/// A model output too short to be read as a [`StrategyProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("output has {len} values, a strategy profile needs 3")]
pub struct ProfileError {
    pub len: usize,
}
