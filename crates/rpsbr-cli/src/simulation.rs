//! Stand-in simulations used until the trainers are wired to the game engine.
//!
//! [`BattleArena`] scores a strategy with noisy metrics scaled by its parameters.
//! [`RpsArena`] is a repeated rock-paper-scissors game against an opponent whose
//! habits are encoded in the state vector.

use rand::Rng;
use rpsbr_training::{
    matrix::argmax,
    simulation::{BattleMetrics, BattleSimulator, Environment, SimulationError, StepOutcome},
    strategy::Strategy,
};

/// Length of the [`RpsArena`] state vector.
pub(crate) const STATE_SIZE: usize = 6;
/// Number of moves: rock, paper and scissors.
pub(crate) const ACTION_COUNT: usize = 3;
/// Rounds played before an [`RpsArena`] episode ends.
const ROUNDS_PER_EPISODE: usize = 20;
/// Probability that the opponent plays its favourite move.
const HABIT_STRENGTH: f64 = 0.7;

/// Draws battle metrics from ranges scaled by the strategy.
///
/// - survival time: `U(50, 200) × patience`
/// - conversions: `U(0, 10) × aggression`
/// - damage dealt: `U(20, 100) × aggression`
/// - damage taken: `U(10, 80) × (1 - avoidance)`
#[derive(Debug)]
pub(crate) struct BattleArena<R> {
    rng: R,
}

impl<R> BattleArena<R>
where
    R: Rng,
{
    pub(crate) fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R> BattleSimulator for BattleArena<R>
where
    R: Rng,
{
    fn simulate(&mut self, strategy: &Strategy) -> Result<BattleMetrics, SimulationError> {
        let rng = &mut self.rng;
        Ok(BattleMetrics::new(
            rng.random_range(50.0..=200.0) * strategy.patience(),
            rng.random_range(0.0..=10.0) * strategy.aggression(),
            rng.random_range(20.0..=100.0) * strategy.aggression(),
            rng.random_range(10.0..=80.0) * (1.0 - strategy.avoidance()),
        ))
    }
}

/// Repeated rock-paper-scissors against a creature of habit.
///
/// The opponent's favourite move is the arg-max of the first three state components.
/// It plays that move with probability [`HABIT_STRENGTH`] and a uniformly random move
/// otherwise. A win earns `1`, a draw `0` and a loss `-1`. The state never changes
/// within an episode, which ends after [`ROUNDS_PER_EPISODE`] rounds.
#[derive(Debug)]
pub(crate) struct RpsArena<R> {
    rng: R,
    round: usize,
}

impl<R> RpsArena<R>
where
    R: Rng,
{
    pub(crate) fn new(rng: R) -> Self {
        Self { rng, round: 0 }
    }

    fn opponent_move(&mut self, state: &[f64]) -> usize {
        if self.rng.random_bool(HABIT_STRENGTH) {
            argmax(&state[..ACTION_COUNT.min(state.len())])
        } else {
            self.rng.random_range(0..ACTION_COUNT)
        }
    }
}

impl<R> Environment for RpsArena<R>
where
    R: Rng,
{
    fn step(&mut self, state: &[f64], action: usize) -> Result<StepOutcome, SimulationError> {
        if action >= ACTION_COUNT {
            return Err(SimulationError::new(format!(
                "move {action} is not rock, paper or scissors"
            )));
        }
        let opponent = self.opponent_move(state);
        self.round += 1;
        let done = self.round % ROUNDS_PER_EPISODE == 0;

        Ok(StepOutcome {
            reward: Some(payoff(action, opponent)),
            next_state: None,
            done: Some(done),
        })
    }
}

/// Payoff of `action` against `opponent`, where each move beats the one before it
/// (paper beats rock, scissors beat paper, rock beats scissors).
fn payoff(action: usize, opponent: usize) -> f64 {
    match (action + ACTION_COUNT - opponent) % ACTION_COUNT {
        0 => 0.0,
        1 => 1.0,
        _ => -1.0,
    }
}
