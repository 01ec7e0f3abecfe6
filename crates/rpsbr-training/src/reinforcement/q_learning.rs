use std::{
    hash::{DefaultHasher, Hash as _, Hasher as _},
    path::Path,
};

use rand::Rng as _;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::{Agent, Algorithm, RlConfig, Transition};
use crate::{
    ConfigError,
    matrix::{Matrix, argmax, max_value},
    seed::TrainingSeed,
    snapshot::{self, SnapshotError},
    strategy::{ProfileError, StrategyProfile},
};

/// Tabular Q-learning over hashed, discretized states.
///
/// Continuous states are rounded to two decimals, hashed, and reduced modulo
/// `state_size` (see [`QLearning::state_index`]). Distinct states may share a row.
pub struct QLearning {
    state_size: usize,
    action_size: usize,
    config: RlConfig,
    q_table: Matrix,
    rng: Pcg32,
}

/// Hyperparameters persisted with a Q-table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QTableConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
}

/// Persisted state of a [`QLearning`] agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableSnapshot {
    pub q_table: Matrix,
    pub config: QTableConfig,
}

impl QLearning {
    pub fn new(state_size: usize, action_size: usize, config: RlConfig) -> Result<Self, ConfigError> {
        Self::with_seed(state_size, action_size, config, rand::rng().random())
    }

    pub fn with_seed(
        state_size: usize,
        action_size: usize,
        config: RlConfig,
        seed: TrainingSeed,
    ) -> Result<Self, ConfigError> {
        ConfigError::check_positive("state_size", state_size)?;
        ConfigError::check_positive("action_size", action_size)?;
        config.validate()?;
        Ok(Self {
            state_size,
            action_size,
            config,
            q_table: Matrix::zeros(state_size, action_size),
            rng: seed.rng(),
        })
    }

    #[must_use]
    pub fn q_table(&self) -> &Matrix {
        &self.q_table
    }

    #[must_use]
    pub fn config(&self) -> &RlConfig {
        &self.config
    }

    /// Row of the Q-table used for `state`.
    ///
    /// Rounds every component to two decimals (ties to even), hashes the rounded
    /// values and reduces the hash modulo `state_size`.
    ///
    /// The hash comes from [`DefaultHasher`], whose algorithm may change between Rust
    /// releases. A Q-table saved by a binary built with one toolchain can map states
    /// to different rows when loaded by a binary built with another.
    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn state_index(&self, state: &[f64]) -> usize {
        let mut hasher = DefaultHasher::new();
        for &v in state {
            // -0.0 + 0.0 == +0.0, so both zeros hash alike
            let rounded = (v * 100.0).round_ties_even() / 100.0 + 0.0;
            rounded.to_bits().hash(&mut hasher);
        }
        (hasher.finish() % self.state_size as u64) as usize
    }

    /// Epsilon-greedy action selection.
    ///
    /// With probability `epsilon`, and only while `training`, returns a uniformly
    /// random action; otherwise the first action with the highest Q-value.
    pub fn choose_action(&mut self, state: &[f64], training: bool) -> usize {
        if training && self.rng.random::<f64>() < self.config.epsilon {
            return self.rng.random_range(0..self.action_size);
        }
        argmax(self.q_table.row(self.state_index(state)))
    }

    /// One-step Q-learning update, followed by an epsilon decay.
    ///
    /// ```text
    /// target = reward                                   if done
    ///        = reward + γ × max_a Q(next_state, a)      otherwise
    /// Q(state, action) += learning_rate × (target - Q(state, action))
    /// ```
    ///
    /// Epsilon is multiplied by `epsilon_decay` on every call while it is above
    /// `epsilon_min`, and never drops below it.
    pub fn update_q_table(
        &mut self,
        state: &[f64],
        action: usize,
        reward: f64,
        next_state: &[f64],
        done: bool,
    ) {
        let index = self.state_index(state);
        let target = if done {
            reward
        } else {
            let next = self.state_index(next_state);
            reward + self.config.discount_factor * max_value(self.q_table.row(next))
        };
        let q = &mut self.q_table[(index, action)];
        *q += self.config.learning_rate * (target - *q);

        if self.config.epsilon > self.config.epsilon_min {
            self.config.epsilon =
                (self.config.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> QTableSnapshot {
        QTableSnapshot {
            q_table: self.q_table.clone(),
            config: QTableConfig {
                learning_rate: self.config.learning_rate,
                discount_factor: self.config.discount_factor,
                epsilon: self.config.epsilon,
                epsilon_decay: self.config.epsilon_decay,
                epsilon_min: self.config.epsilon_min,
            },
        }
    }

    /// Replaces the Q-table and the persisted hyperparameters.
    ///
    /// The table must be `state_size × action_size`.
    pub fn restore(&mut self, snapshot: QTableSnapshot) -> Result<(), SnapshotError> {
        let expected = (self.state_size, self.action_size);
        if snapshot.q_table.shape() != expected {
            return Err(SnapshotError::shape(format!(
                "Q-table is {:?}, expected {expected:?}",
                snapshot.q_table.shape()
            )));
        }
        let QTableConfig {
            learning_rate,
            discount_factor,
            epsilon,
            epsilon_decay,
            epsilon_min,
        } = snapshot.config;
        self.q_table = snapshot.q_table;
        self.config = RlConfig {
            learning_rate,
            discount_factor,
            epsilon,
            epsilon_decay,
            epsilon_min,
            ..self.config.clone()
        };
        Ok(())
    }

    pub fn save<P>(&self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        snapshot::save_json(path, &self.snapshot())
    }

    pub fn load<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        self.restore(snapshot::load_json(path)?)
    }
}

impl Agent for QLearning {
    fn algorithm(&self) -> Algorithm {
        Algorithm::QLearning
    }

    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn choose_action(&mut self, state: &[f64], training: bool) -> usize {
        QLearning::choose_action(self, state, training)
    }

    fn observe(&mut self, t: &Transition<'_>) {
        self.update_q_table(t.state, t.action, t.reward, t.next_state, t.done);
    }

    fn epsilon(&self) -> Option<f64> {
        Some(self.config.epsilon)
    }

    #[expect(clippy::cast_precision_loss)]
    fn strategy(&mut self, state: &[f64]) -> Result<StrategyProfile, ProfileError> {
        let action = QLearning::choose_action(self, state, false);
        let share = action as f64 / self.action_size as f64;
        Ok(StrategyProfile {
            aggression: share,
            patience: 1.0 - share,
            grouping: 0.5,
        })
    }

    fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        QLearning::save(self, path)
    }

    fn load(&mut self, path: &Path) -> Result<(), SnapshotError> {
        QLearning::load(self, path)
    }
}
