use std::path::Path;

use rand::{
    Rng as _,
    distr::{Distribution as _, weighted::WeightedIndex},
};
use rand_distr::StandardNormal;
use rand_pcg::Pcg32;
use rpsbr_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

use super::{Agent, Algorithm, RlConfig, Transition};
use crate::{
    ConfigError,
    matrix::{Matrix, argmax, max_value},
    seed::TrainingSeed,
    snapshot::{self, SnapshotError},
    strategy::{ProfileError, StrategyProfile},
};

/// Scale of the Gaussian noise `theta` starts from.
const INITIAL_THETA_SCALE: f64 = 0.01;
/// Added to the standard deviation when normalizing returns.
const RETURN_STD_EPSILON: f64 = 1e-8;

/// Linear soft-max policy trained with REINFORCE.
///
/// Action probabilities are `softmax(state · theta)`, with `theta` of shape
/// `state_size × action_size`. Steps are buffered during an episode and
/// [`PolicyGradient::update_policy`] applies one gradient step at its end.
pub struct PolicyGradient {
    state_size: usize,
    action_size: usize,
    config: RlConfig,
    theta: Matrix,
    states: Vec<Vec<f64>>,
    actions: Vec<usize>,
    rewards: Vec<f64>,
    rng: Pcg32,
}

/// Hyperparameters persisted with a policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
}

/// Persisted state of a [`PolicyGradient`] agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub theta: Matrix,
    pub config: PolicyConfig,
}

impl PolicyGradient {
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
        let mut rng = seed.rng();
        let theta = Matrix::from_fn(state_size, action_size, |_, _| {
            rng.sample::<f64, _>(StandardNormal) * INITIAL_THETA_SCALE
        });
        Ok(Self {
            state_size,
            action_size,
            config,
            theta,
            states: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            rng,
        })
    }

    #[must_use]
    pub fn theta(&self) -> &Matrix {
        &self.theta
    }

    /// Number of steps buffered for the current episode.
    #[must_use]
    pub fn buffered_steps(&self) -> usize {
        self.states.len()
    }

    /// `softmax(state · theta)`, shifted by the largest logit.
    ///
    /// Components beyond `state_size` are ignored.
    #[must_use]
    pub fn action_probabilities(&self, state: &[f64]) -> Vec<f64> {
        let mut logits = vec![0.0; self.action_size];
        for (&s, row) in state.iter().zip(self.theta.iter_rows()) {
            for (logit, &w) in logits.iter_mut().zip(row) {
                *logit += s * w;
            }
        }
        let max = max_value(&logits);
        let exp = logits.iter().map(|l| (l - max).exp()).collect::<Vec<_>>();
        let sum = exp.iter().sum::<f64>();
        exp.into_iter().map(|e| e / sum).collect()
    }

    /// Samples an action from [`Self::action_probabilities`].
    ///
    /// Falls back to the most likely action if the probabilities cannot be sampled
    /// (for example when a non-finite state makes them `NaN`).
    pub fn choose_action(&mut self, state: &[f64]) -> usize {
        let probs = self.action_probabilities(state);
        match WeightedIndex::new(&probs) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => argmax(&probs),
        }
    }

    /// Buffers one step of the current episode.
    pub fn store_experience(&mut self, state: &[f64], action: usize, reward: f64) {
        self.states.push(state.to_vec());
        self.actions.push(action);
        self.rewards.push(reward);
    }

    /// Applies one REINFORCE step from the buffered episode and clears the buffers.
    ///
    /// Returns are discounted and, for episodes longer than one step, normalized to
    /// zero mean and unit variance. For every step `t` and action `a`:
    ///
    /// ```text
    /// grad[:, a] += G_t × state_t × (1[a = action_t] - prob_t[a])
    /// theta      += learning_rate × grad / T
    /// ```
    ///
    /// Does nothing if no step was buffered.
    #[expect(clippy::cast_precision_loss)]
    pub fn update_policy(&mut self) {
        if self.states.is_empty() {
            return;
        }

        let mut returns = discounted_returns(&self.rewards, self.config.discount_factor);
        // non-finite rewards are not rejected; they propagate into theta
        if returns.len() > 1
            && let Some(mean) = DescriptiveStats::mean_of(&returns)
            && let Some(std_dev) = DescriptiveStats::std_dev_of(&returns)
        {
            for g in &mut returns {
                *g = (*g - mean) / (std_dev + RETURN_STD_EPSILON);
            }
        }

        let mut gradient = Matrix::zeros(self.state_size, self.action_size);
        for ((state, &action), &g) in self.states.iter().zip(&self.actions).zip(&returns) {
            let probs = self.action_probabilities(state);
            for (i, &s) in state.iter().take(self.state_size).enumerate() {
                for (a, &p) in probs.iter().enumerate() {
                    let indicator = if a == action { 1.0 } else { 0.0 };
                    gradient[(i, a)] += g * s * (indicator - p);
                }
            }
        }

        let steps = self.states.len() as f64;
        self.theta
            .add_scaled(self.config.learning_rate / steps, &gradient);
        self.clear_episode();
    }

    fn clear_episode(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
    }

    #[must_use]
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            theta: self.theta.clone(),
            config: PolicyConfig {
                learning_rate: self.config.learning_rate,
                discount_factor: self.config.discount_factor,
            },
        }
    }

    /// Replaces `theta` and the persisted hyperparameters.
    ///
    /// `theta` must be `state_size × action_size`.
    pub fn restore(&mut self, snapshot: PolicySnapshot) -> Result<(), SnapshotError> {
        let expected = (self.state_size, self.action_size);
        if snapshot.theta.shape() != expected {
            return Err(SnapshotError::shape(format!(
                "policy parameters are {:?}, expected {expected:?}",
                snapshot.theta.shape()
            )));
        }
        self.theta = snapshot.theta;
        self.config.learning_rate = snapshot.config.learning_rate;
        self.config.discount_factor = snapshot.config.discount_factor;
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

/// `G_t = r_t + γ × G_{t+1}`, computed backwards from the last step.
#[must_use]
pub fn discounted_returns(rewards: &[f64], discount_factor: f64) -> Vec<f64> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for (g, &r) in returns.iter_mut().zip(rewards).rev() {
        running = r + discount_factor * running;
        *g = running;
    }
    returns
}

impl Agent for PolicyGradient {
    fn algorithm(&self) -> Algorithm {
        Algorithm::PolicyGradient
    }

    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    /// Always samples from the policy; there is no separate greedy mode.
    fn choose_action(&mut self, state: &[f64], _training: bool) -> usize {
        PolicyGradient::choose_action(self, state)
    }

    fn observe(&mut self, t: &Transition<'_>) {
        self.store_experience(t.state, t.action, t.reward);
    }

    fn finish_episode(&mut self) {
        self.update_policy();
    }

    fn discard_episode(&mut self) {
        self.clear_episode();
    }

    fn strategy(&mut self, state: &[f64]) -> Result<StrategyProfile, ProfileError> {
        StrategyProfile::from_slice(&self.action_probabilities(state))
    }

    fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        PolicyGradient::save(self, path)
    }

    fn load(&mut self, path: &Path) -> Result<(), SnapshotError> {
        PolicyGradient::load(self, path)
    }
}
