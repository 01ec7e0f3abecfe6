//! Reinforcement learning agents and the episode driver.
//!
//! Two agents implement the [`Agent`] trait:
//!
//! - [`QLearning`] - a tabular Q-learning agent over hashed, discretized states with
//!   epsilon-greedy exploration
//! - [`PolicyGradient`] - a linear soft-max policy trained with REINFORCE on
//!   normalized discounted returns
//!
//! [`ReinforcementLearning`] picks one of them once, at construction, and drives it
//! through episodes against an [`Environment`].
//!
//! # Episodes
//!
//! Every episode starts from a standard-normal random state of length `state_size`
//! and runs at most [`MAX_EPISODE_STEPS`] steps, or until the environment reports
//! `done`. Q-learning updates after every step; the policy gradient agent updates
//! once, at the end of the episode.
//!
//! # Example
//!
//! ```
//! use rpsbr_training::{
//!     reinforcement::{Algorithm, ReinforcementLearning, RlConfig},
//!     simulation::StepOutcome,
//!     telemetry::NullTelemetry,
//! };
//!
//! let mut rl = ReinforcementLearning::new(
//!     Algorithm::QLearning,
//!     6,
//!     3,
//!     RlConfig::default(),
//!     NullTelemetry,
//! )
//! .unwrap();
//! let history = rl
//!     .train(
//!         &mut |state: &[f64], action: usize| {
//!             StepOutcome::new(if action == 2 { 1.0 } else { 0.0 }, state.to_vec(), false)
//!         },
//!         10,
//!     )
//!     .unwrap();
//! assert_eq!(history.episode_lengths, vec![100; 10]);
//! ```

use std::{fmt, path::Path, str::FromStr};

use rand::Rng;
use rand_distr::StandardNormal;
use rand_pcg::Pcg32;
use rpsbr_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

pub use self::{
    policy_gradient::{PolicyConfig, PolicyGradient, PolicySnapshot, discounted_returns},
    q_learning::{QLearning, QTableConfig, QTableSnapshot},
};
use crate::{
    ConfigError, TrainingError,
    seed::TrainingSeed,
    simulation::Environment,
    snapshot::SnapshotError,
    strategy::{ProfileError, StrategyProfile},
    telemetry::{SnapshotKind, Telemetry, TrainingEvent},
};

mod policy_gradient;
mod q_learning;

/// Maximum number of steps in one training episode.
pub const MAX_EPISODE_STEPS: usize = 100;
/// Number of recent episodes averaged in progress reports.
const REWARD_WINDOW: usize = 100;

/// Learning algorithm selected by [`ReinforcementLearning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    QLearning,
    PolicyGradient,
}

impl Algorithm {
    pub const ALL: [Self; 2] = [Self::QLearning, Self::PolicyGradient];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::QLearning => "q_learning",
            Self::PolicyGradient => "policy_gradient",
        }
    }

    #[must_use]
    pub const fn snapshot_kind(self) -> SnapshotKind {
        match self {
            Self::QLearning => SnapshotKind::QTable,
            Self::PolicyGradient => SnapshotKind::Policy,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.tag() == s)
            .ok_or_else(|| ConfigError::UnknownAlgorithm { name: s.to_owned() })
    }
}

/// Hyperparameters shared by both agents.
///
/// Q-learning reads the learning rate, discount factor and the epsilon schedule; the
/// policy gradient agent reads only the learning rate and the discount factor.
/// `memory_size`, `batch_size` and `target_update_freq` are accepted and persisted
/// in configuration files but not used by either agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Initial exploration probability.
    pub epsilon: f64,
    /// Factor applied to epsilon after every Q-table update.
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
    pub memory_size: usize,
    pub batch_size: usize,
    pub target_update_freq: usize,
}

impl Default for RlConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.1,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            memory_size: 10_000,
            batch_size: 32,
            target_update_freq: 100,
        }
    }
}

impl RlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_step_size("learning_rate", self.learning_rate)?;
        ConfigError::check_probability("discount_factor", self.discount_factor)?;
        ConfigError::check_probability("epsilon", self.epsilon)?;
        ConfigError::check_probability("epsilon_decay", self.epsilon_decay)?;
        ConfigError::check_probability("epsilon_min", self.epsilon_min)?;
        ConfigError::check_positive("memory_size", self.memory_size)?;
        ConfigError::check_positive("batch_size", self.batch_size)?;
        ConfigError::check_positive("target_update_freq", self.target_update_freq)?;
        Ok(())
    }
}

/// One environment step as seen by an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition<'a> {
    pub state: &'a [f64],
    pub action: usize,
    pub reward: f64,
    pub next_state: &'a [f64],
    pub done: bool,
}

/// Capabilities shared by the learning agents.
pub trait Agent: Send {
    fn algorithm(&self) -> Algorithm;

    fn state_size(&self) -> usize;

    fn action_size(&self) -> usize;

    /// Picks an action for `state`; `training` enables exploration where the agent
    /// has any.
    fn choose_action(&mut self, state: &[f64], training: bool) -> usize;

    /// Learns from (or records) one step.
    fn observe(&mut self, transition: &Transition<'_>);

    /// Called after the last step of an episode.
    fn finish_episode(&mut self) {}

    /// Drops anything recorded for an episode that was aborted.
    fn discard_episode(&mut self) {}

    /// Current exploration rate, for agents that have one.
    fn epsilon(&self) -> Option<f64> {
        None
    }

    /// Reduced strategy the agent currently prefers in `state`.
    fn strategy(&mut self, state: &[f64]) -> Result<StrategyProfile, ProfileError>;

    fn save(&self, path: &Path) -> Result<(), SnapshotError>;

    fn load(&mut self, path: &Path) -> Result<(), SnapshotError>;
}

/// Per-episode results returned by [`ReinforcementLearning::train`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RlHistory {
    pub episode_rewards: Vec<f64>,
    pub episode_lengths: Vec<usize>,
    /// Epsilon after each episode; empty for agents without exploration rate.
    pub epsilon: Vec<f64>,
}

/// Trains one agent, selected at construction, against an [`Environment`].
pub struct ReinforcementLearning {
    config: RlConfig,
    agent: Box<dyn Agent>,
    rng: Pcg32,
    telemetry: Box<dyn Telemetry + Send>,
}

impl ReinforcementLearning {
    /// Creates the agent for `algorithm` with a random seed.
    pub fn new<T>(
        algorithm: Algorithm,
        state_size: usize,
        action_size: usize,
        config: RlConfig,
        telemetry: T,
    ) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        let seed = rand::rng().random();
        Self::with_seed(algorithm, state_size, action_size, config, seed, telemetry)
    }

    /// Like [`Self::new`], but with the algorithm given by its tag
    /// (`q_learning` or `policy_gradient`).
    pub fn from_tag<T>(
        tag: &str,
        state_size: usize,
        action_size: usize,
        config: RlConfig,
        telemetry: T,
    ) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        Self::new(tag.parse()?, state_size, action_size, config, telemetry)
    }

    /// Like [`Self::new`], but with a specific seed for reproducible runs.
    pub fn with_seed<T>(
        algorithm: Algorithm,
        state_size: usize,
        action_size: usize,
        config: RlConfig,
        seed: TrainingSeed,
        telemetry: T,
    ) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        let mut rng = seed.rng();
        let agent_seed = rng.random();
        let agent: Box<dyn Agent> = match algorithm {
            Algorithm::QLearning => Box::new(QLearning::with_seed(
                state_size,
                action_size,
                config.clone(),
                agent_seed,
            )?),
            Algorithm::PolicyGradient => Box::new(PolicyGradient::with_seed(
                state_size,
                action_size,
                config.clone(),
                agent_seed,
            )?),
        };

        let mut telemetry: Box<dyn Telemetry + Send> = Box::new(telemetry);
        telemetry.record(&TrainingEvent::AgentInitialized {
            algorithm,
            state_size,
            action_size,
        });

        Ok(Self {
            config,
            agent,
            rng,
            telemetry,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.agent.algorithm()
    }

    /// Configuration the agent was created with.
    #[must_use]
    pub fn config(&self) -> &RlConfig {
        &self.config
    }

    #[must_use]
    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    /// Runs `episodes` episodes and returns per-episode rewards and lengths.
    ///
    /// A simulation error aborts training; the agent keeps what it learned from the
    /// completed episodes and discards the aborted one.
    pub fn train<E>(&mut self, env: &mut E, episodes: usize) -> Result<RlHistory, TrainingError>
    where
        E: Environment + ?Sized,
    {
        let mut history = RlHistory::default();
        for episode in 0..episodes {
            let (reward, length) = match self.run_episode(env) {
                Ok(result) => result,
                Err(e) => {
                    self.agent.discard_episode();
                    return Err(e);
                }
            };
            history.episode_rewards.push(reward);
            history.episode_lengths.push(length);
            let epsilon = self.agent.epsilon();
            if let Some(epsilon) = epsilon {
                history.epsilon.push(epsilon);
            }

            let recent = &history.episode_rewards
                [history.episode_rewards.len().saturating_sub(REWARD_WINDOW)..];
            self.telemetry.record(&TrainingEvent::EpisodeCompleted {
                episode,
                reward,
                length,
                mean_reward: DescriptiveStats::mean_of(recent).unwrap_or(0.0),
                epsilon,
            });
        }

        self.telemetry
            .record(&TrainingEvent::ReinforcementTrainingCompleted { episodes });
        Ok(history)
    }

    fn run_episode<E>(&mut self, env: &mut E) -> Result<(f64, usize), TrainingError>
    where
        E: Environment + ?Sized,
    {
        let mut state = (0..self.agent.state_size())
            .map(|_| self.rng.sample(StandardNormal))
            .collect::<Vec<f64>>();

        let mut total_reward = 0.0;
        let mut length = 0;
        for _ in 0..MAX_EPISODE_STEPS {
            let action = self.agent.choose_action(&state, true);
            let outcome = env.step(&state, action)?;
            let reward = outcome.reward();
            let done = outcome.done();
            let next_state = outcome.into_next_state(&state);

            self.agent.observe(&Transition {
                state: &state,
                action,
                reward,
                next_state: &next_state,
                done,
            });
            total_reward += reward;
            length += 1;

            if done {
                break;
            }
            state = next_state;
        }

        self.agent.finish_episode();
        Ok((total_reward, length))
    }

    /// Reduced strategy the agent currently prefers in `state`.
    ///
    /// Q-learning maps its greedy action `a` out of `A` actions to
    /// `{aggression: a/A, patience: 1 - a/A, grouping: 0.5}`; the policy gradient
    /// agent returns its first three action probabilities.
    pub fn get_strategy(&mut self, state: &[f64]) -> Result<StrategyProfile, ProfileError> {
        self.agent.strategy(state)
    }

    pub fn save<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        self.agent.save(path)?;
        self.telemetry.record(&TrainingEvent::SnapshotSaved {
            kind: self.algorithm().snapshot_kind(),
            path: path.to_owned(),
        });
        Ok(())
    }

    pub fn load<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        self.agent.load(path)?;
        self.telemetry.record(&TrainingEvent::SnapshotLoaded {
            kind: self.algorithm().snapshot_kind(),
            path: path.to_owned(),
        });
        Ok(())
    }
}
