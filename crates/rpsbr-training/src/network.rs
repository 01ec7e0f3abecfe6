//! Feed-forward network mapping strategy features to a strategy profile.
//!
//! A small multi-layer perceptron trained with mini-batch gradient descent and a
//! hand-written backward pass. The default shape maps the six strategy parameters to
//! three outputs read as `aggression`, `patience` and `grouping`.
//!
//! # Architecture
//!
//! ```text
//! input (6) ─▶ dense + activation (64) ─▶ dense + activation (32) ─▶ dense (3)
//! ```
//!
//! Weights use Xavier-uniform initialization, biases start at zero, and the output
//! layer is linear. The loss is mean squared error, while the reported accuracy
//! compares the arg-max of prediction and target, so it is only meaningful for
//! classification-shaped targets.
//!
//! # Backward Pass
//!
//! For layer `i`, from the output back to the input:
//!
//! ```text
//! grad_w = a[i]ᵀ · error            (summed over the batch)
//! grad_b = mean(error, over batch)
//! error  = (error · W[i]ᵀ) ⊙ f'(a[i])    (for i > 0, using W[i] before its update)
//! W[i]  -= learning_rate × grad_w
//! b[i]  -= learning_rate × grad_b
//! ```
//!
//! where `a[i]` is the recorded input of layer `i`. The derivative `f'` is evaluated
//! at the recorded *post-activation* value `a[i]`, not at the pre-activation sum. For
//! `relu` the two agree; for `sigmoid` and `tanh` they do not. Trained weights depend
//! on this, so it is kept as is.
//!
//! # Current Limitations
//!
//! - `dropout_rate` is stored and persisted but never applied
//! - No momentum, weight decay or learning-rate schedule

use std::{fmt, path::Path, str::FromStr};

use rand::{Rng, seq::SliceRandom as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    matrix::{Matrix, argmax},
    seed::TrainingSeed,
    snapshot::{self, SnapshotError},
    strategy::StrategyProfile,
    telemetry::{SnapshotKind, Telemetry, TrainingEvent},
};

/// Element-wise activation applied after every hidden layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    pub const ALL: [Self; 4] = [Self::Relu, Self::Sigmoid, Self::Tanh, Self::Linear];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Linear => "linear",
        }
    }

    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x.clamp(-500.0, 500.0)).exp()),
            Self::Tanh => x.tanh(),
            Self::Linear => x,
        }
    }

    /// Derivative of [`Self::apply`] at `x`.
    #[must_use]
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Self::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Sigmoid => {
                let s = self.apply(x);
                s * (1.0 - s)
            }
            Self::Tanh => 1.0 - x.tanh().powi(2),
            Self::Linear => 1.0,
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| ConfigError::UnknownActivation { name: s.to_owned() })
    }
}

/// Network shape and training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
    pub learning_rate: f64,
    /// Stored and persisted, not applied during training.
    pub dropout_rate: f64,
    pub activation: Activation,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_size: 6,
            hidden_sizes: vec![64, 32],
            output_size: 3,
            learning_rate: 0.001,
            dropout_rate: 0.2,
            activation: Activation::Relu,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("input_size", self.input_size)?;
        ConfigError::check_positive("output_size", self.output_size)?;
        for &size in &self.hidden_sizes {
            ConfigError::check_positive("hidden_sizes", size)?;
        }
        ConfigError::check_step_size("learning_rate", self.learning_rate)?;
        ConfigError::check_probability("dropout_rate", self.dropout_rate)?;
        Ok(())
    }

    /// `[input_size, hidden_sizes..., output_size]`
    #[must_use]
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_sizes.len() + 2);
        sizes.push(self.input_size);
        sizes.extend_from_slice(&self.hidden_sizes);
        sizes.push(self.output_size);
        sizes
    }
}

/// Invalid input to a network operation.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum NetworkError {
    #[display("input has {actual} columns, expected {expected}")]
    #[from(skip)]
    InputWidth { expected: usize, actual: usize },
    #[display("target has {actual} columns, expected {expected}")]
    #[from(skip)]
    TargetWidth { expected: usize, actual: usize },
    #[display("{inputs} input rows but {targets} target rows")]
    #[from(skip)]
    RowCount { inputs: usize, targets: usize },
    #[display("training partition is empty")]
    #[from(skip)]
    EmptyTrainingSet,
    #[display("network output has {len} values, a strategy profile needs 3")]
    #[from(skip)]
    OutputTooSmall { len: usize },
    #[display("{_0}")]
    Config(ConfigError),
}

/// Per-epoch metrics returned by [`NeuralNetwork::train`].
///
/// Validation metrics are `NaN` when the validation partition is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub val_accuracy: Vec<f64>,
}

impl TrainingHistory {
    #[must_use]
    pub fn len(&self) -> usize {
        self.train_loss.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.train_loss.is_empty()
    }
}

/// Persisted state of a [`NeuralNetwork`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub config: NetworkConfig,
    pub weights: Vec<Matrix>,
    pub biases: Vec<Vec<f64>>,
}

impl NetworkSnapshot {
    /// Checks the stored matrices against the stored configuration.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        self.config
            .validate()
            .map_err(|e| SnapshotError::shape(e.to_string()))?;
        let sizes = self.config.layer_sizes();
        let layers = sizes.len() - 1;
        if self.weights.len() != layers || self.biases.len() != layers {
            return Err(SnapshotError::shape(format!(
                "expected {layers} layers, found {} weight matrices and {} bias vectors",
                self.weights.len(),
                self.biases.len()
            )));
        }
        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let expected = (sizes[i], sizes[i + 1]);
            if w.shape() != expected {
                return Err(SnapshotError::shape(format!(
                    "layer {i} weights are {:?}, expected {expected:?}",
                    w.shape()
                )));
            }
            if b.len() != sizes[i + 1] {
                return Err(SnapshotError::shape(format!(
                    "layer {i} bias has {} values, expected {}",
                    b.len(),
                    sizes[i + 1]
                )));
            }
        }
        Ok(())
    }
}

/// A multi-layer perceptron.
pub struct NeuralNetwork {
    config: NetworkConfig,
    weights: Vec<Matrix>,
    biases: Vec<Vec<f64>>,
    /// Layer inputs recorded by the latest forward pass, followed by its output.
    layers: Vec<Matrix>,
    rng: Pcg32,
    telemetry: Box<dyn Telemetry + Send>,
}

impl NeuralNetwork {
    /// Creates a network with freshly initialized weights and a random seed.
    pub fn new<T>(config: NetworkConfig, telemetry: T) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        Self::with_seed(config, rand::rng().random(), telemetry)
    }

    /// Like [`Self::new`], but with a specific seed for reproducible runs.
    pub fn with_seed<T>(
        config: NetworkConfig,
        seed: TrainingSeed,
        telemetry: T,
    ) -> Result<Self, ConfigError>
    where
        T: Telemetry + Send + 'static,
    {
        config.validate()?;
        let mut rng = seed.rng();
        let sizes = config.layer_sizes();
        let weights = sizes
            .windows(2)
            .map(|w| xavier_uniform(w[0], w[1], &mut rng))
            .collect();
        let biases = sizes[1..].iter().map(|&n| vec![0.0; n]).collect();

        let mut telemetry: Box<dyn Telemetry + Send> = Box::new(telemetry);
        telemetry.record(&TrainingEvent::NetworkInitialized { layer_sizes: sizes });

        Ok(Self {
            config,
            weights,
            biases,
            layers: Vec::new(),
            rng,
            telemetry,
        })
    }

    /// Rebuilds a network from a snapshot, after checking its shapes.
    pub fn from_snapshot<T>(snapshot: NetworkSnapshot, telemetry: T) -> Result<Self, SnapshotError>
    where
        T: Telemetry + Send + 'static,
    {
        snapshot.validate()?;
        let NetworkSnapshot {
            config,
            weights,
            biases,
        } = snapshot;
        Ok(Self {
            config,
            weights,
            biases,
            layers: Vec::new(),
            rng: rand::rng().random::<TrainingSeed>().rng(),
            telemetry: Box::new(telemetry),
        })
    }

    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    #[must_use]
    pub fn weights(&self) -> &[Matrix] {
        &self.weights
    }

    #[must_use]
    pub fn biases(&self) -> &[Vec<f64>] {
        &self.biases
    }

    /// Runs a batch (`batch × input_size`) through the network.
    ///
    /// Records every layer's input for the backward pass, replacing what the
    /// previous call recorded.
    pub fn forward(&mut self, x: &Matrix) -> Result<Matrix, NetworkError> {
        if x.cols() != self.config.input_size {
            return Err(NetworkError::InputWidth {
                expected: self.config.input_size,
                actual: x.cols(),
            });
        }
        let activation = self.config.activation;
        let last = self.weights.len() - 1;

        self.layers.clear();
        self.layers.push(x.clone());
        let mut current = x.clone();
        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = current.dot(w).add_row_vector(b);
            current = if i == last {
                z
            } else {
                z.map(|v| activation.apply(v))
            };
            self.layers.push(current.clone());
        }
        Ok(current)
    }

    /// Same as [`Self::forward`].
    pub fn predict(&mut self, x: &Matrix) -> Result<Matrix, NetworkError> {
        self.forward(x)
    }

    /// Trains on `x` (`n × input_size`) against `y` (`n × output_size`).
    ///
    /// The rows are split once, at random, into `floor(n × validation_split)`
    /// validation rows and the remaining training rows. Each epoch reshuffles the
    /// training rows, runs forward and backward on every mini-batch of at most
    /// `batch_size` rows, then evaluates the validation rows once.
    ///
    /// Training loss and accuracy are averaged over the mini-batches of the epoch.
    pub fn train(
        &mut self,
        x: &Matrix,
        y: &Matrix,
        epochs: usize,
        batch_size: usize,
        validation_split: f64,
    ) -> Result<TrainingHistory, NetworkError> {
        ConfigError::check_positive("batch_size", batch_size)?;
        if !(0.0..1.0).contains(&validation_split) {
            return Err(ConfigError::invalid(
                "validation_split",
                format!("{validation_split} is not within [0, 1)"),
            )
            .into());
        }
        if x.rows() != y.rows() {
            return Err(NetworkError::RowCount {
                inputs: x.rows(),
                targets: y.rows(),
            });
        }
        if x.cols() != self.config.input_size {
            return Err(NetworkError::InputWidth {
                expected: self.config.input_size,
                actual: x.cols(),
            });
        }
        if y.cols() != self.config.output_size {
            return Err(NetworkError::TargetWidth {
                expected: self.config.output_size,
                actual: y.cols(),
            });
        }

        let n_samples = x.rows();
        let n_val = validation_rows(n_samples, validation_split);
        let n_train = n_samples - n_val;
        if n_train == 0 {
            return Err(NetworkError::EmptyTrainingSet);
        }

        let mut indices = (0..n_samples).collect::<Vec<_>>();
        indices.shuffle(&mut self.rng);
        let (train_indices, val_indices) = indices.split_at(n_train);
        let (x_train, y_train) = (x.select_rows(train_indices), y.select_rows(train_indices));
        let (x_val, y_val) = (x.select_rows(val_indices), y.select_rows(val_indices));

        let mut history = TrainingHistory::default();
        let mut order = (0..n_train).collect::<Vec<_>>();
        for epoch in 0..epochs {
            order.shuffle(&mut self.rng);

            let mut loss_sum = 0.0;
            let mut accuracy_sum = 0.0;
            let mut batches = 0_u32;
            for batch in order.chunks(batch_size) {
                let x_batch = x_train.select_rows(batch);
                let y_batch = y_train.select_rows(batch);

                let prediction = self.forward(&x_batch)?;
                loss_sum += mse_loss(&prediction, &y_batch);
                accuracy_sum += classification_accuracy(&prediction, &y_batch);
                batches += 1;

                self.backward_pass(&y_batch);
            }
            let train_loss = loss_sum / f64::from(batches);
            let train_accuracy = accuracy_sum / f64::from(batches);

            let (val_loss, val_accuracy) = if n_val == 0 {
                (f64::NAN, f64::NAN)
            } else {
                let prediction = self.forward(&x_val)?;
                (
                    mse_loss(&prediction, &y_val),
                    classification_accuracy(&prediction, &y_val),
                )
            };

            history.train_loss.push(train_loss);
            history.val_loss.push(val_loss);
            history.train_accuracy.push(train_accuracy);
            history.val_accuracy.push(val_accuracy);
            self.telemetry.record(&TrainingEvent::EpochCompleted {
                epoch,
                train_loss,
                val_loss,
                train_accuracy,
                val_accuracy,
            });
        }

        self.telemetry
            .record(&TrainingEvent::NetworkTrainingCompleted { epochs });
        Ok(history)
    }

    /// Updates every layer from the activations recorded by the latest forward pass.
    fn backward_pass(&mut self, target: &Matrix) {
        let Some(output) = self.layers.last() else {
            return;
        };
        let activation = self.config.activation;
        let learning_rate = self.config.learning_rate;

        let mut error = output.zip_map(target, |p, t| p - t);
        for i in (0..self.weights.len()).rev() {
            let input = &self.layers[i];
            let grad_w = input.transpose().dot(&error);
            let grad_b = error.column_means();

            if i > 0 {
                error = error
                    .dot(&self.weights[i].transpose())
                    .zip_map(input, |e, a| e * activation.derivative(a));
            }

            self.weights[i].sub_scaled(learning_rate, &grad_w);
            for (b, g) in self.biases[i].iter_mut().zip(grad_b) {
                *b -= learning_rate * g;
            }
        }
    }

    /// Maps one feature vector to a strategy profile.
    ///
    /// The first three outputs are read as `aggression`, `patience` and `grouping`,
    /// unclamped.
    pub fn get_strategy(&mut self, features: &[f64]) -> Result<StrategyProfile, NetworkError> {
        let output = self.forward(&Matrix::row_vector(features))?;
        StrategyProfile::from_slice(output.row(0))
            .map_err(|e| NetworkError::OutputTooSmall { len: e.len })
    }

    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            config: self.config.clone(),
            weights: self.weights.clone(),
            biases: self.biases.clone(),
        }
    }

    pub fn save<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        snapshot::save_json(path, &self.snapshot())?;
        self.telemetry.record(&TrainingEvent::SnapshotSaved {
            kind: SnapshotKind::Network,
            path: path.to_owned(),
        });
        Ok(())
    }

    /// Replaces configuration, weights and biases with the file's.
    ///
    /// Nothing changes if the file cannot be read or its shapes are inconsistent.
    pub fn load<P>(&mut self, path: P) -> Result<(), SnapshotError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let snapshot: NetworkSnapshot = snapshot::load_json(path)?;
        snapshot.validate()?;
        self.config = snapshot.config;
        self.weights = snapshot.weights;
        self.biases = snapshot.biases;
        self.layers.clear();
        self.telemetry.record(&TrainingEvent::SnapshotLoaded {
            kind: SnapshotKind::Network,
            path: path.to_owned(),
        });
        Ok(())
    }
}

/// A `fan_in × fan_out` matrix drawn from `U(-limit, limit)`, with
/// `limit = sqrt(6 / (fan_in + fan_out))`.
#[expect(clippy::cast_precision_loss)]
fn xavier_uniform<R>(fan_in: usize, fan_out: usize, rng: &mut R) -> Matrix
where
    R: Rng + ?Sized,
{
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Matrix::from_fn(fan_in, fan_out, |_, _| rng.random_range(-limit..limit))
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn validation_rows(n_samples: usize, validation_split: f64) -> usize {
    (n_samples as f64 * validation_split).floor() as usize
}

/// Mean squared error over all elements.
#[must_use]
pub fn mse_loss(prediction: &Matrix, target: &Matrix) -> f64 {
    prediction.zip_map(target, |p, t| (p - t).powi(2)).mean()
}

/// Fraction of rows whose predicted arg-max matches the target's.
///
/// A single-column target against a wider prediction holds class indices and is
/// compared as if one-hot encoded.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn classification_accuracy(prediction: &Matrix, target: &Matrix) -> f64 {
    let class_indices = target.cols() == 1 && prediction.cols() > 1;
    let hits = prediction
        .iter_rows()
        .zip(target.iter_rows())
        .filter(|(p, t)| {
            let predicted = argmax(p);
            if class_indices {
                predicted as f64 == t[0].trunc()
            } else {
                predicted == argmax(t)
            }
        })
        .count();
    hits as f64 / prediction.rows() as f64
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;

    use super::*;
    use crate::{snapshot::tests::TempPath, telemetry::NullTelemetry};

    fn seeded(config: NetworkConfig, seed: u64) -> NeuralNetwork {
        NeuralNetwork::with_seed(config, TrainingSeed::from(seed), NullTelemetry).unwrap()
    }

    fn matrix(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    /// A 1-1-1 network with the given weights and zero biases.
    fn tiny(activation: Activation, w0: f64, w1: f64, learning_rate: f64) -> NeuralNetwork {
        let snapshot = NetworkSnapshot {
            config: NetworkConfig {
                input_size: 1,
                hidden_sizes: vec![1],
                output_size: 1,
                learning_rate,
                dropout_rate: 0.0,
                activation,
            },
            weights: vec![matrix(&[&[w0]]), matrix(&[&[w1]])],
            biases: vec![vec![0.0], vec![0.0]],
        };
        NeuralNetwork::from_snapshot(snapshot, NullTelemetry).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layer_sizes(), vec![6, 64, 32, 3]);
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        let bad = [
            NetworkConfig {
                input_size: 0,
                ..NetworkConfig::default()
            },
            NetworkConfig {
                hidden_sizes: vec![8, 0],
                ..NetworkConfig::default()
            },
            NetworkConfig {
                learning_rate: 0.0,
                ..NetworkConfig::default()
            },
            NetworkConfig {
                dropout_rate: 2.0,
                ..NetworkConfig::default()
            },
        ];
        for config in bad {
            assert!(NeuralNetwork::new(config, NullTelemetry).is_err());
        }
    }

    #[test]
    fn test_activation_names() {
        for a in Activation::ALL {
            assert_eq!(a.to_string().parse::<Activation>().unwrap(), a);
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                format!("\"{}\"", a.name())
            );
        }
        assert!(matches!(
            "softplus".parse::<Activation>(),
            Err(ConfigError::UnknownActivation { .. })
        ));
        assert!(serde_json::from_str::<NetworkConfig>(r#"{"activation": "softplus"}"#).is_err());
    }

    #[test]
    fn test_activation_values() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(2.0), 2.0);
        assert_eq!(Activation::Sigmoid.apply(0.0), 0.5);
        assert!(Activation::Sigmoid.apply(-1e6) > 0.0);
        assert_eq!(Activation::Sigmoid.apply(1e6), 1.0);
        assert_eq!(Activation::Linear.apply(-3.5), -3.5);
        assert_eq!(Activation::Relu.derivative(0.0), 0.0);
        assert_eq!(Activation::Linear.derivative(7.0), 1.0);
        assert_eq!(Activation::Tanh.derivative(0.0), 1.0);
        assert_eq!(Activation::Sigmoid.derivative(0.0), 0.25);
    }

    #[test]
    fn test_xavier_bounds_and_zero_biases() {
        let net = seeded(NetworkConfig::default(), 1);
        let sizes = net.config().layer_sizes();
        assert_eq!(net.weights().len(), 3);
        for (i, w) in net.weights().iter().enumerate() {
            assert_eq!(w.shape(), (sizes[i], sizes[i + 1]));
            let limit = (6.0 / (sizes[i] + sizes[i + 1]) as f64).sqrt();
            assert!(w.as_slice().iter().all(|v| v.abs() <= limit));
        }
        for (i, b) in net.biases().iter().enumerate() {
            assert_eq!(b.len(), sizes[i + 1]);
            assert!(b.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_forward_shape() {
        let mut net = seeded(NetworkConfig::default(), 2);
        let x = Matrix::from_fn(4, 6, |r, c| (r * 6 + c) as f64 / 24.0);
        let out = net.forward(&x).unwrap();
        assert_eq!(out.shape(), (4, 3));
        assert_eq!(net.predict(&x).unwrap(), out);
    }

    #[test]
    fn test_forward_rejects_wrong_width() {
        let mut net = seeded(NetworkConfig::default(), 3);
        let err = net.forward(&Matrix::zeros(2, 5)).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::InputWidth {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_forward_output_layer_is_linear() {
        let mut net = tiny(Activation::Relu, 1.0, -2.0, 0.1);
        let out = net.forward(&matrix(&[&[3.0], &[-1.0]])).unwrap();
        // hidden relu(3) = 3, relu(-1) = 0; output is not rectified
        assert_eq!(out, matrix(&[&[-6.0], &[0.0]]));
    }

    #[test]
    fn test_backward_pass_relu() {
        let mut net = tiny(Activation::Relu, 2.0, 3.0, 0.1);
        let history = net
            .train(&matrix(&[&[1.0]]), &matrix(&[&[5.0]]), 1, 1, 0.0)
            .unwrap();
        // output 6, error 1
        assert_eq!(history.train_loss, vec![1.0]);
        assert!((net.weights()[1][(0, 0)] - 2.8).abs() < 1e-12);
        assert!((net.biases()[1][0] + 0.1).abs() < 1e-12);
        // error propagated through the pre-update output weight 3
        assert!((net.weights()[0][(0, 0)] - 1.7).abs() < 1e-12);
        assert!((net.biases()[0][0] + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_backward_pass_tanh_uses_post_activation_derivative() {
        let lr = 0.5;
        let mut net = tiny(Activation::Tanh, 1.0, 1.0, lr);
        net.train(&matrix(&[&[0.5]]), &matrix(&[&[0.0]]), 1, 1, 0.0)
            .unwrap();

        let hidden = 0.5_f64.tanh();
        let error = hidden;
        let propagated = error * (1.0 - hidden.tanh().powi(2));
        let expected_w0 = 1.0 - lr * 0.5 * propagated;
        let expected_w1 = 1.0 - lr * hidden * error;
        assert!((net.weights()[0][(0, 0)] - expected_w0).abs() < 1e-12);
        assert!((net.weights()[1][(0, 0)] - expected_w1).abs() < 1e-12);

        // not the textbook derivative 1 - hidden²
        let textbook = 1.0 - lr * 0.5 * error * (1.0 - hidden.powi(2));
        assert!((net.weights()[0][(0, 0)] - textbook).abs() > 1e-6);
    }

    #[test]
    fn test_train_history_and_validation_metrics() {
        let mut rng = Pcg32::seed_from_u64(4);
        let x = Matrix::from_fn(50, 6, |_, _| rng.random());
        let y = Matrix::from_fn(50, 3, |_, _| rng.random());

        let mut net = seeded(NetworkConfig::default(), 5);
        let history = net.train(&x, &y, 3, 8, 0.2).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.val_loss.len(), 3);
        for epoch in 0..3 {
            assert!(history.train_loss[epoch].is_finite());
            assert!(history.val_loss[epoch].is_finite());
            assert!((0.0..=1.0).contains(&history.train_accuracy[epoch]));
            assert!((0.0..=1.0).contains(&history.val_accuracy[epoch]));
        }

        let history = net.train(&x, &y, 1, 8, 0.0).unwrap();
        assert!(history.val_loss[0].is_nan());
        assert!(history.val_accuracy[0].is_nan());
    }

    #[test]
    fn test_train_reduces_loss_on_linear_target() {
        let config = NetworkConfig {
            hidden_sizes: vec![],
            output_size: 1,
            learning_rate: 0.01,
            activation: Activation::Linear,
            ..NetworkConfig::default()
        };
        let mut rng = Pcg32::seed_from_u64(6);
        let x = Matrix::from_fn(200, 6, |_, _| rng.random());
        let y = Matrix::from_fn(200, 1, |r, _| x.row(r).iter().sum::<f64>() * 0.5);

        let mut net = seeded(config, 7);
        let history = net.train(&x, &y, 50, 10, 0.1).unwrap();
        assert!(history.train_loss[49] < history.train_loss[0]);
        assert!(history.val_loss[49] < history.val_loss[0]);
    }

    #[test]
    fn test_train_rejects_bad_arguments() {
        let mut net = seeded(NetworkConfig::default(), 8);
        let x = Matrix::zeros(10, 6);
        let y = Matrix::zeros(10, 3);
        assert!(matches!(
            net.train(&x, &y, 1, 0, 0.2),
            Err(NetworkError::Config(_))
        ));
        assert!(matches!(
            net.train(&x, &y, 1, 4, 1.0),
            Err(NetworkError::Config(_))
        ));
        assert!(matches!(
            net.train(&x, &Matrix::zeros(9, 3), 1, 4, 0.2),
            Err(NetworkError::RowCount { .. })
        ));
        assert!(matches!(
            net.train(&x, &Matrix::zeros(10, 2), 1, 4, 0.2),
            Err(NetworkError::TargetWidth { .. })
        ));
        assert!(matches!(
            net.train(&Matrix::zeros(0, 6), &Matrix::zeros(0, 3), 1, 4, 0.2),
            Err(NetworkError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_classification_accuracy() {
        let prediction = matrix(&[&[0.9, 0.1, 0.0], &[0.2, 0.7, 0.1], &[0.3, 0.3, 0.4]]);
        let one_hot = matrix(&[&[1.0, 0.0, 0.0], &[0.0, 0.0, 1.0], &[0.0, 0.0, 1.0]]);
        assert!((classification_accuracy(&prediction, &one_hot) - 2.0 / 3.0).abs() < 1e-12);

        let labels = matrix(&[&[0.0], &[1.0], &[0.0]]);
        assert!((classification_accuracy(&prediction, &labels) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mse_loss() {
        let a = matrix(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = matrix(&[&[1.0, 0.0], &[3.0, 6.0]]);
        assert_eq!(mse_loss(&a, &b), 2.0);
    }

    #[test]
    fn test_get_strategy() {
        let mut net = seeded(NetworkConfig::default(), 9);
        let features = [0.5, 0.5, 0.5, 1.0, 100.0, 0.5];
        let output = net.forward(&Matrix::row_vector(&features)).unwrap();
        let profile = net.get_strategy(&features).unwrap();
        assert_eq!(profile.aggression, output[(0, 0)]);
        assert_eq!(profile.patience, output[(0, 1)]);
        assert_eq!(profile.grouping, output[(0, 2)]);

        let mut narrow = seeded(
            NetworkConfig {
                output_size: 2,
                ..NetworkConfig::default()
            },
            10,
        );
        assert!(matches!(
            narrow.get_strategy(&features),
            Err(NetworkError::OutputTooSmall { len: 2 })
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempPath::new("network");
        let mut net = seeded(NetworkConfig::default(), 11);
        let x = Matrix::from_fn(3, 6, |r, c| (r + c) as f64 * 0.1);
        net.train(&x, &Matrix::zeros(3, 3), 2, 2, 0.0).unwrap();
        net.save(tmp.path()).unwrap();

        let mut loaded = seeded(
            NetworkConfig {
                hidden_sizes: vec![4],
                ..NetworkConfig::default()
            },
            12,
        );
        loaded.load(tmp.path()).unwrap();
        assert_eq!(loaded.snapshot(), net.snapshot());
        assert_eq!(loaded.forward(&x).unwrap(), net.forward(&x).unwrap());
    }

    #[test]
    fn test_load_rejects_inconsistent_shapes() {
        let tmp = TempPath::new("network-shape");
        let mut snapshot = seeded(NetworkConfig::default(), 13).snapshot();
        snapshot.biases[1].pop();
        snapshot::save_json(tmp.path(), &snapshot).unwrap();

        let mut net = seeded(NetworkConfig::default(), 14);
        let before = net.snapshot();
        assert!(matches!(
            net.load(tmp.path()),
            Err(SnapshotError::Shape { .. })
        ));
        assert_eq!(net.snapshot(), before);
    }

    #[test]
    fn test_load_rejects_missing_weights() {
        let tmp = TempPath::new("network-missing");
        std::fs::write(tmp.path(), r#"{"config": {}, "biases": []}"#).unwrap();
        let mut net = seeded(NetworkConfig::default(), 15);
        assert!(matches!(
            net.load(tmp.path()),
            Err(SnapshotError::Json { .. })
        ));
    }
}
