//! Progress reporting for the optimizers.
//!
//! Each optimizer receives a [`Telemetry`] sink at construction and reports
//! [`TrainingEvent`]s to it. Three sinks are provided:
//!
//! - [`LogTelemetry`] forwards events to the [`log`] facade
//! - [`NullTelemetry`] discards them
//! - [`mpsc::Sender<TrainingEvent>`] forwards them over a channel, which lets a host
//!   thread render progress or a test inspect exactly what happened
//!
//! ```
//! use std::sync::mpsc;
//!
//! use rpsbr_training::{
//!     genetic::{GeneticAlgorithm, GeneticParams},
//!     telemetry::TrainingEvent,
//! };
//!
//! let (tx, rx) = mpsc::channel();
//! let mut ga = GeneticAlgorithm::new(GeneticParams::default(), tx).unwrap();
//! ga.initialize_population();
//! assert_eq!(rx.try_recv(), Ok(TrainingEvent::PopulationInitialized { size: 50 }));
//! ```

use std::{fmt, path::PathBuf, sync::mpsc};

use crate::reinforcement::Algorithm;

/// Which kind of state a snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Population,
    Network,
    QTable,
    Policy,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Population => "population",
            Self::Network => "network",
            Self::QTable => "Q-table",
            Self::Policy => "policy",
        };
        f.write_str(name)
    }
}

/// Something an optimizer wants to report.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    PopulationInitialized {
        size: usize,
    },
    GenerationCompleted {
        generation: u32,
        best_fitness: f64,
        average_fitness: f64,
    },
    Converged {
        generation: u32,
    },
    EvolutionCompleted {
        best_fitness: f64,
    },
    NetworkInitialized {
        layer_sizes: Vec<usize>,
    },
    EpochCompleted {
        epoch: usize,
        train_loss: f64,
        val_loss: f64,
        train_accuracy: f64,
        val_accuracy: f64,
    },
    NetworkTrainingCompleted {
        epochs: usize,
    },
    AgentInitialized {
        algorithm: Algorithm,
        state_size: usize,
        action_size: usize,
    },
    EpisodeCompleted {
        episode: usize,
        reward: f64,
        length: usize,
        /// Mean reward over the most recent (up to 100) episodes.
        mean_reward: f64,
        epsilon: Option<f64>,
    },
    ReinforcementTrainingCompleted {
        episodes: usize,
    },
    SnapshotSaved {
        kind: SnapshotKind,
        path: PathBuf,
    },
    SnapshotLoaded {
        kind: SnapshotKind,
        path: PathBuf,
    },
}

/// Sink for [`TrainingEvent`]s.
pub trait Telemetry {
    fn record(&mut self, event: &TrainingEvent);
}

impl<T> Telemetry for Box<T>
where
    T: Telemetry + ?Sized,
{
    fn record(&mut self, event: &TrainingEvent) {
        (**self).record(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn record(&mut self, _event: &TrainingEvent) {}
}

/// Sends every event over a channel.
///
/// Events are dropped silently once the receiver has hung up.
impl Telemetry for mpsc::Sender<TrainingEvent> {
    fn record(&mut self, event: &TrainingEvent) {
        let _ = self.send(event.clone());
    }
}

/// Forwards events to the [`log`] facade.
///
/// Milestones are logged at `info`; per-epoch and per-episode progress is logged at
/// `info` every 10th epoch and every 100th episode and at `debug` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

const EPOCH_LOG_INTERVAL: usize = 10;
const EPISODE_LOG_INTERVAL: usize = 100;

impl Telemetry for LogTelemetry {
    fn record(&mut self, event: &TrainingEvent) {
        match event {
            TrainingEvent::PopulationInitialized { size } => {
                log::info!("initialized population with {size} strategies");
            }
            TrainingEvent::GenerationCompleted {
                generation,
                best_fitness,
                average_fitness,
            } => log::info!(
                "generation {generation}: best fitness = {best_fitness:.2}, average fitness = {average_fitness:.2}"
            ),
            TrainingEvent::Converged { generation } => {
                log::info!("convergence detected at generation {generation}, stopping evolution");
            }
            TrainingEvent::EvolutionCompleted { best_fitness } => {
                log::info!("evolution complete, best fitness: {best_fitness:.2}");
            }
            TrainingEvent::NetworkInitialized { layer_sizes } => {
                log::info!("neural network initialized with layers {layer_sizes:?}");
            }
            TrainingEvent::EpochCompleted {
                epoch,
                train_loss,
                val_loss,
                val_accuracy,
                ..
            } => {
                let level = if epoch % EPOCH_LOG_INTERVAL == 0 {
                    log::Level::Info
                } else {
                    log::Level::Debug
                };
                log::log!(
                    level,
                    "epoch {epoch}: train loss = {train_loss:.4}, val loss = {val_loss:.4}, val acc = {val_accuracy:.4}"
                );
            }
            TrainingEvent::NetworkTrainingCompleted { epochs } => {
                log::info!("network training completed after {epochs} epochs");
            }
            TrainingEvent::AgentInitialized {
                algorithm,
                state_size,
                action_size,
            } => log::info!(
                "{algorithm} agent initialized: state_size={state_size}, action_size={action_size}"
            ),
            TrainingEvent::EpisodeCompleted {
                episode,
                reward,
                length,
                mean_reward,
                epsilon,
            } => {
                let level = if episode % EPISODE_LOG_INTERVAL == 0 {
                    log::Level::Info
                } else {
                    log::Level::Debug
                };
                match epsilon {
                    Some(epsilon) => log::log!(
                        level,
                        "episode {episode}: reward = {reward:.2}, length = {length}, average reward = {mean_reward:.2}, epsilon = {epsilon:.4}"
                    ),
                    None => log::log!(
                        level,
                        "episode {episode}: reward = {reward:.2}, length = {length}, average reward = {mean_reward:.2}"
                    ),
                }
            }
            TrainingEvent::ReinforcementTrainingCompleted { episodes } => {
                log::info!("reinforcement learning completed after {episodes} episodes");
            }
            TrainingEvent::SnapshotSaved { kind, path } => {
                log::info!("{kind} saved to {}", path.display());
            }
            TrainingEvent::SnapshotLoaded { kind, path } => {
                log::info!("{kind} loaded from {}", path.display());
            }
        }
    }
}
