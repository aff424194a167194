//! Training loop: forward pass, error back-propagation, gradient computation
//! and weight update, repeated epoch by epoch until convergence.
//!
//! ## Epoch error
//!
//! ```text
//! error = sqrt( Σ_examples ||target - predicted||² )
//! ```
//!
//! The sum is neither divided by the number of examples nor by the output
//! width, so the same accuracy threshold is harder to reach on larger datasets.

use crate::checkpoint;
use crate::core::{Matrix, NetError, NetResult, Network, Vector};
use crate::TrainParams;
use rand::Rng;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// Why the epoch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainStatus {
    /// The epoch error fell to or below the requested accuracy.
    Converged,
    /// `max_epochs` ran out first. The weights are still usable.
    MaxEpochsReached,
}

/// Metrics recorded after every epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    /// Epoch error norm
    pub error: f64,
    /// Wall time spent in the epoch
    pub elapsed_secs: f64,
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    pub status: TrainStatus,
    /// Number of completed epochs
    pub epochs: usize,
    /// Error norm of the last epoch
    pub error: f64,
    /// Hidden neurons disabled by drop-out before the first epoch
    pub dropped_neurons: usize,
    pub history: Vec<EpochMetrics>,
}

/// Weight update rule applied after each example.
enum UpdateRule {
    Plain,
    Momentum { momentum: f64, deltas: Vec<Matrix> },
}

impl Network {
    /// Train with the plain delta rule.
    ///
    /// # Algorithm
    ///
    /// ```text
    /// drop_out(params.dropout)                  (once, before the first epoch)
    /// repeat:
    ///     error = 0
    ///     for (x, t) in dataset:
    ///         y = infer(x)
    ///         (e, sq) = propagate_errors(y, t); error += sq
    ///         g = gradients()
    ///         w[l][i,j] += rate * e[l][i] * g[l][i] * input[l][j]
    ///     error = sqrt(error)
    ///     progress(error, epoch)
    /// until error <= accuracy or epoch == max_epochs
    /// ```
    ///
    /// `progress` is invoked once per completed epoch with `(error, epoch)`.
    ///
    /// # Errors
    /// - `Configuration` if `params` is invalid or the dataset is empty
    /// - `ShapeMismatch` if the dataset does not fit the network
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        inputs: &[Vector],
        targets: &[Vector],
        params: &TrainParams,
        rng: &mut R,
        progress: Option<&mut dyn FnMut(f64, usize)>,
    ) -> NetResult<TrainReport> {
        self.run(inputs, targets, params, rng, progress, UpdateRule::Plain)
    }

    /// Train with the momentum rule: every weight change also re-applies
    /// `params.momentum` times the change made for the previous example.
    ///
    /// The previous-change matrices start at zero for each call.
    ///
    /// # Errors
    /// Same as [`Network::train`].
    pub fn train_moment<R: Rng + ?Sized>(
        &mut self,
        inputs: &[Vector],
        targets: &[Vector],
        params: &TrainParams,
        rng: &mut R,
        progress: Option<&mut dyn FnMut(f64, usize)>,
    ) -> NetResult<TrainReport> {
        let rule = UpdateRule::Momentum {
            momentum: params.momentum,
            deltas: self.momentum_buffers(),
        };
        self.run(inputs, targets, params, rng, progress, rule)
    }

    /// One plain training step on a single example.
    ///
    /// Returns the squared norm of the output error before the update.
    pub fn train_sample(
        &mut self,
        input: &Vector,
        target: &Vector,
        learning_rate: f64,
    ) -> NetResult<f64> {
        let predicted = self.infer(input)?;
        let (errors, squared) = self.propagate_errors(&predicted, target)?;
        let gradients = self.gradients();
        self.apply_deltas(&errors, &gradients, learning_rate)?;
        Ok(squared)
    }

    fn run<R: Rng + ?Sized>(
        &mut self,
        inputs: &[Vector],
        targets: &[Vector],
        params: &TrainParams,
        rng: &mut R,
        mut progress: Option<&mut dyn FnMut(f64, usize)>,
        mut rule: UpdateRule,
    ) -> NetResult<TrainReport> {
        params.validate()?;
        self.check_dataset(inputs, targets)?;

        let dropped_neurons = if params.dropout > 0.0 {
            self.drop_out(params.dropout, rng)?
        } else {
            0
        };

        log::info!(
            "Training {}: {} samples, rate {}, accuracy {}, max {} epochs{}",
            self.name().unwrap_or("network"),
            inputs.len(),
            params.learning_rate,
            params.accuracy,
            params.max_epochs,
            if dropped_neurons > 0 {
                format!(", {dropped_neurons} neurons dropped")
            } else {
                String::new()
            }
        );

        let mut history = Vec::new();
        let mut epoch = 0;
        loop {
            let start = Instant::now();
            let mut error = 0.0;

            for (input, target) in inputs.iter().zip(targets) {
                let predicted = self.infer(input)?;
                let (errors, squared) = self.propagate_errors(&predicted, target)?;
                let gradients = self.gradients();
                error += squared;

                match &mut rule {
                    UpdateRule::Plain => {
                        self.apply_deltas(&errors, &gradients, params.learning_rate)?
                    }
                    UpdateRule::Momentum { momentum, deltas } => self.apply_deltas_momentum(
                        &errors,
                        &gradients,
                        params.learning_rate,
                        *momentum,
                        deltas,
                    )?,
                }
            }

            let error = error.sqrt();
            epoch += 1;
            let elapsed_secs = start.elapsed().as_secs_f64();
            history.push(EpochMetrics {
                epoch,
                error,
                elapsed_secs,
            });

            if let Some(progress) = progress.as_deref_mut() {
                progress(error, epoch);
            }

            if params.report_time {
                log::info!("Epoch {epoch}: error {error:.6} ({elapsed_secs:.4}s)");
            } else {
                log::debug!("Epoch {epoch}: error {error:.6}");
            }

            if params.auto_save_period > 0 && epoch % params.auto_save_period == 0 {
                self.auto_save(&params.checkpoint_dir, epoch, error);
            }

            let status = if error <= params.accuracy {
                TrainStatus::Converged
            } else if epoch >= params.max_epochs {
                log::warn!("Max epochs reached ({epoch}) with error {error:.6}");
                TrainStatus::MaxEpochsReached
            } else {
                continue;
            };

            log::info!("Training finished after {epoch} epochs: {status:?}, error {error:.6}");
            return Ok(TrainReport {
                status,
                epochs: epoch,
                error,
                dropped_neurons,
                history,
            });
        }
    }

    /// Write a checkpoint; failures are logged and training carries on.
    fn auto_save(&self, dir: &Path, epoch: usize, error: f64) {
        let name = checkpoint::checkpoint_file_name(self.name().unwrap_or("network"), epoch, error);
        let path = dir.join(name);
        match checkpoint::save_network(self, &path) {
            Ok(()) => log::info!("Checkpoint saved: {}", path.display()),
            Err(e) => log::warn!("Checkpoint save failed for {}: {e}", path.display()),
        }
    }

    fn check_dataset(&self, inputs: &[Vector], targets: &[Vector]) -> NetResult<()> {
        if inputs.len() != targets.len() {
            return Err(NetError::ShapeMismatch {
                expected: inputs.len(),
                actual: targets.len(),
            });
        }
        if inputs.is_empty() {
            return Err(NetError::Configuration(
                "training dataset is empty".to_string(),
            ));
        }

        let structure = self.structure();
        for (input, target) in inputs.iter().zip(targets) {
            if input.len() != structure.inputs {
                return Err(NetError::ShapeMismatch {
                    expected: structure.inputs,
                    actual: input.len(),
                });
            }
            if target.len() != structure.outputs {
                return Err(NetError::ShapeMismatch {
                    expected: structure.outputs,
                    actual: target.len(),
                });
            }
        }
        Ok(())
    }
}
