//! The contract between the optimizers and the battle simulation.
//!
//! The core never simulates battles. Callers supply either a [`BattleSimulator`]
//! (strategy in, [`BattleMetrics`] out) for the genetic algorithm or an
//! [`Environment`] (state and action in, [`StepOutcome`] out) for the reinforcement
//! learners. Plain closures implement both traits:
//!
//! ```
//! use rpsbr_training::{
//!     simulation::{BattleMetrics, BattleSimulator, Environment, StepOutcome},
//!     strategy::Strategy,
//! };
//!
//! let mut battle = |s: &Strategy| BattleMetrics {
//!     survival_time: Some(100.0 * s.patience()),
//!     ..BattleMetrics::default()
//! };
//! let metrics = battle.simulate(&Strategy::new([0.5; 6], 0)).unwrap();
//! assert_eq!(metrics.survival_time(), 50.0);
//! assert_eq!(metrics.damage_taken(), 1.0);
//!
//! let mut env = |_: &[f64], action: usize| StepOutcome {
//!     reward: Some(if action == 1 { 1.0 } else { 0.0 }),
//!     ..StepOutcome::default()
//! };
//! let outcome = env.step(&[0.0, 0.0], 1).unwrap();
//! assert_eq!(outcome.reward(), 1.0);
//! assert!(!outcome.done());
//! ```
//!
//! Every field of a result is optional and read through a permissive default; the
//! core does not validate simulation output any further.

use serde::{Deserialize, Serialize};

use crate::strategy::Strategy;

/// Outcome of one simulated battle fought with a strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleMetrics {
    pub survival_time: Option<f64>,
    pub conversions: Option<f64>,
    pub damage_dealt: Option<f64>,
    pub damage_taken: Option<f64>,
}

impl BattleMetrics {
    /// Creates metrics with every field present.
    #[must_use]
    pub const fn new(
        survival_time: f64,
        conversions: f64,
        damage_dealt: f64,
        damage_taken: f64,
    ) -> Self {
        Self {
            survival_time: Some(survival_time),
            conversions: Some(conversions),
            damage_dealt: Some(damage_dealt),
            damage_taken: Some(damage_taken),
        }
    }

    /// Survival time, `0` when absent.
    #[must_use]
    pub fn survival_time(&self) -> f64 {
        self.survival_time.unwrap_or(0.0)
    }

    /// Conversions, `0` when absent.
    #[must_use]
    pub fn conversions(&self) -> f64 {
        self.conversions.unwrap_or(0.0)
    }

    /// Damage dealt, `0` when absent.
    #[must_use]
    pub fn damage_dealt(&self) -> f64 {
        self.damage_dealt.unwrap_or(0.0)
    }

    /// Damage taken, `1` when absent.
    #[must_use]
    pub fn damage_taken(&self) -> f64 {
        self.damage_taken.unwrap_or(1.0)
    }
}

/// Result of one environment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepOutcome {
    pub reward: Option<f64>,
    pub next_state: Option<Vec<f64>>,
    pub done: Option<bool>,
}

impl StepOutcome {
    #[must_use]
    pub fn new(reward: f64, next_state: Vec<f64>, done: bool) -> Self {
        Self {
            reward: Some(reward),
            next_state: Some(next_state),
            done: Some(done),
        }
    }

    /// Reward, `0` when absent.
    #[must_use]
    pub fn reward(&self) -> f64 {
        self.reward.unwrap_or(0.0)
    }

    /// Whether the episode ended, `false` when absent.
    #[must_use]
    pub fn done(&self) -> bool {
        self.done.unwrap_or(false)
    }

    /// Consumes the outcome and returns the next state, or `state` when absent.
    #[must_use]
    pub fn into_next_state(self, state: &[f64]) -> Vec<f64> {
        self.next_state.unwrap_or_else(|| state.to_vec())
    }
}

/// Failure reported by a simulation collaborator.
///
/// Returning this error aborts the running optimization.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("simulation failed: {message}")]
pub struct SimulationError {
    message: String,
}

impl SimulationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Runs a battle with a strategy and reports its metrics.
pub trait BattleSimulator {
    fn simulate(&mut self, strategy: &Strategy) -> Result<BattleMetrics, SimulationError>;
}

impl<F> BattleSimulator for F
where
    F: FnMut(&Strategy) -> BattleMetrics,
{
    fn simulate(&mut self, strategy: &Strategy) -> Result<BattleMetrics, SimulationError> {
        Ok(self(strategy))
    }
}

/// Advances a simulated episode by one action.
pub trait Environment {
    fn step(&mut self, state: &[f64], action: usize) -> Result<StepOutcome, SimulationError>;
}

impl<F> Environment for F
where
    F: FnMut(&[f64], usize) -> StepOutcome,
{
    fn step(&mut self, state: &[f64], action: usize) -> Result<StepOutcome, SimulationError> {
        Ok(self(state, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battle_metrics_defaults() {
        let metrics = BattleMetrics::default();
        assert_eq!(metrics.survival_time(), 0.0);
        assert_eq!(metrics.conversions(), 0.0);
        assert_eq!(metrics.damage_dealt(), 0.0);
        assert_eq!(metrics.damage_taken(), 1.0);
    }

    #[test]
    fn test_battle_metrics_partial_json() {
        let metrics: BattleMetrics = serde_json::from_str(r#"{"conversions": 3}"#).unwrap();
        assert_eq!(metrics.conversions(), 3.0);
        assert_eq!(metrics.damage_taken(), 1.0);
    }

    #[test]
    fn test_step_outcome_defaults_to_input_state() {
        let outcome = StepOutcome::default();
        assert_eq!(outcome.reward(), 0.0);
        assert!(!outcome.done());
        assert_eq!(outcome.into_next_state(&[1.0, 2.0]), vec![1.0, 2.0]);
    }

    struct FailingArena;

    impl BattleSimulator for FailingArena {
        fn simulate(&mut self, _: &Strategy) -> Result<BattleMetrics, SimulationError> {
            Err(SimulationError::new("arena offline"))
        }
    }

    #[test]
    fn test_custom_simulator_error() {
        let err = FailingArena
            .simulate(&Strategy::new([0.5; 6], 0))
            .unwrap_err();
        assert_eq!(err.message(), "arena offline");
        assert_eq!(err.to_string(), "simulation failed: arena offline");
    }
}
