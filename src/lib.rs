//! # ffnn
//!
//! A fully-connected feed-forward neural network trained by error back-propagation.
//!
//! ## Overview
//!
//! A network is a chain of dense weight matrices. Inference multiplies the
//! signal through each matrix and applies the hidden (or, for the last layer,
//! output) activation. Training pushes the output error back through the
//! transposed matrices and applies the delta rule, optionally with momentum.
//!
//! ## Structure
//!
//! - [`core`]: Vectors, matrices, activation catalog, the network itself
//! - [`training`]: Epoch loop, convergence, drop-out and auto-save
//! - [`checkpoint`]: Line-oriented text format for trained networks
//! - [`utils`]: Scalar activation functions
//!
//! ## Example
//!
//! ```
//! use ffnn::{Network, NeuroStructure, TrainParams, TrainStatus, Vector};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let structure = NeuroStructure::new(3, vec![4], 1).name("and");
//! let mut net = Network::new(structure, &mut rng).unwrap();
//!
//! // The third input is a constant bias term.
//! let inputs: Vec<Vector> = [[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0]]
//!     .iter()
//!     .map(|x| Vector::from_slice(x).unwrap())
//!     .collect();
//! let targets: Vec<Vector> = [0.0, 0.0, 0.0, 1.0]
//!     .iter()
//!     .map(|&y| Vector::from_slice(&[y]).unwrap())
//!     .collect();
//!
//! let params = TrainParams::new().learning_rate(0.5).accuracy(0.1);
//! let report = net.train(&inputs, &targets, &params, &mut rng, None).unwrap();
//! assert_eq!(report.status, TrainStatus::Converged);
//! ```

pub mod checkpoint;
pub mod core;
pub mod training;
pub mod utils;

pub use crate::core::{
    Activation, Kernel, Matrix, NetError, NetResult, Network, NeuroStructure, Vector, WeightInit,
};
pub use training::{EpochMetrics, TrainReport, TrainStatus};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Training configuration.
///
/// Used by [`Network::train`] and [`Network::train_moment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    /// Step size of the delta rule
    pub learning_rate: f64,
    /// Training stops once the epoch error norm is at or below this value
    pub accuracy: f64,
    /// Probability of zeroing each hidden neuron's incoming weights before training
    pub dropout: f64,
    /// Upper bound on the number of epochs
    pub max_epochs: usize,
    /// Log the wall time of every epoch
    pub report_time: bool,
    /// Save a checkpoint every N epochs (0 = disabled)
    pub auto_save_period: usize,
    /// Fraction of the previous weight change re-applied by `train_moment`
    pub momentum: f64,
    /// Directory for auto-saved checkpoints
    pub checkpoint_dir: PathBuf,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            accuracy: 0.01,
            dropout: 0.0,
            max_epochs: 10_000,
            report_time: false,
            auto_save_period: 0,
            momentum: 0.9,
            checkpoint_dir: PathBuf::from("."),
        }
    }
}

impl TrainParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn report_time(mut self, report_time: bool) -> Self {
        self.report_time = report_time;
        self
    }

    pub fn auto_save_period(mut self, period: usize) -> Self {
        self.auto_save_period = period;
        self
    }

    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// # Errors
    /// - `Configuration` if any field is out of range
    pub fn validate(&self) -> NetResult<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NetError::Configuration(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.accuracy >= 0.0) {
            return Err(NetError::Configuration(format!(
                "accuracy must be non-negative, got {}",
                self.accuracy
            )));
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(NetError::Configuration(format!(
                "drop-out probability must be within [0, 1], got {}",
                self.dropout
            )));
        }
        if self.max_epochs == 0 {
            return Err(NetError::Configuration(
                "max epochs must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(NetError::Configuration(format!(
                "momentum must be within [0, 1), got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = TrainParams::default();
        assert_eq!(params.max_epochs, 10_000);
        assert_eq!(params.auto_save_period, 0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_builder() {
        let params = TrainParams::new()
            .learning_rate(0.1)
            .accuracy(0.05)
            .dropout(0.2)
            .max_epochs(50)
            .auto_save_period(10)
            .momentum(0.5)
            .checkpoint_dir("ckpt");

        assert!((params.learning_rate - 0.1).abs() < 1e-12);
        assert_eq!(params.max_epochs, 50);
        assert_eq!(params.checkpoint_dir, PathBuf::from("ckpt"));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        for params in [
            TrainParams::new().learning_rate(0.0),
            TrainParams::new().learning_rate(f64::NAN),
            TrainParams::new().accuracy(-1.0),
            TrainParams::new().dropout(1.5),
            TrainParams::new().max_epochs(0),
            TrainParams::new().momentum(1.0),
        ] {
            assert!(matches!(
                params.validate(),
                Err(NetError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_params_from_partial_json() {
        let params: TrainParams =
            serde_json::from_str(r#"{"learning_rate": 0.25, "max_epochs": 7}"#).unwrap();
        assert!((params.learning_rate - 0.25).abs() < 1e-12);
        assert_eq!(params.max_epochs, 7);
        assert!((params.accuracy - 0.01).abs() < 1e-12);
    }
}
