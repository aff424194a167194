//! Layered network: topology, forward inference, error back-propagation and
//! in-place weight updates.

use super::linalg::PARALLEL_THRESHOLD;
use super::{Activation, Kernel, Matrix, NetError, NetResult, Vector, WeightInit};
use ndarray::{ArrayViewMut1, Zip};
use rand::Rng;

/// Declarative network topology.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuroStructure {
    /// Number of input neurons
    pub inputs: usize,
    /// Neurons in each hidden layer, in order
    pub hiddens: Vec<usize>,
    /// Number of output neurons
    pub outputs: usize,
    /// Activation applied after every hidden layer
    pub hidden_activation: Activation,
    /// Activation applied to the output layer
    pub output_activation: Activation,
    /// Used to name checkpoint files
    pub name: Option<String>,
}

impl NeuroStructure {
    /// Topology with sigmoid activations everywhere and no name.
    pub fn new(inputs: usize, hiddens: Vec<usize>, outputs: usize) -> Self {
        Self {
            inputs,
            hiddens,
            outputs,
            hidden_activation: Activation::Sigmoid,
            output_activation: Activation::Sigmoid,
            name: None,
        }
    }

    pub fn hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    pub fn output_activation(mut self, activation: Activation) -> Self {
        self.output_activation = activation;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Number of weight layers: one per hidden layer plus the output layer.
    pub fn layer_count(&self) -> usize {
        1 + self.hiddens.len()
    }

    /// `(rows, cols)` of every weight matrix, input side first.
    pub fn layer_shapes(&self) -> Vec<(usize, usize)> {
        let mut sizes = Vec::with_capacity(self.hiddens.len() + 2);
        sizes.push(self.inputs);
        sizes.extend_from_slice(&self.hiddens);
        sizes.push(self.outputs);
        sizes.windows(2).map(|w| (w[1], w[0])).collect()
    }

    /// # Errors
    /// - `Configuration` if any layer size is zero or there are no hidden layers
    pub fn validate(&self) -> NetResult<()> {
        if self.inputs < 1 {
            return Err(NetError::Configuration(
                "inputs must be greater than zero".to_string(),
            ));
        }
        if self.hiddens.is_empty() {
            return Err(NetError::Configuration(
                "at least one hidden layer is required".to_string(),
            ));
        }
        if let Some(i) = self.hiddens.iter().position(|&h| h < 1) {
            return Err(NetError::Configuration(format!(
                "hidden layer {i} must have at least one neuron"
            )));
        }
        if self.outputs < 1 {
            return Err(NetError::Configuration(
                "outputs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A fully-connected feed-forward network.
///
/// # Architecture
///
/// - **Layers:** `L = 1 + hiddens.len()` weight matrices; `layers[i]` maps the
///   signal entering layer `i` to its pre-activation output.
/// - **Shapes:** `layers[0]` is `(hiddens[0], inputs)`, `layers[i]` is
///   `(hiddens[i], hiddens[i-1])`, the last is `(outputs, hiddens[last])`.
/// - **Buffers:** `inputs[i]` and `outputs[i]` cache the signal entering layer
///   `i` and its pre-activation product from the latest [`Network::infer`].
///
/// There are no bias terms; append a constant input if one is needed.
///
/// # Concurrency
///
/// Inference and training both overwrite the cached buffers, so one instance
/// supports a single in-flight step. Callers wanting concurrent inference
/// should clone the network.
#[derive(Debug, Clone)]
pub struct Network {
    structure: NeuroStructure,
    layers: Vec<Matrix>,
    inputs: Vec<Vector>,
    outputs: Vec<Vector>,
    hidden: Kernel,
    output: Kernel,
}

impl Network {
    /// Create a network whose hidden-side weights are drawn uniformly from
    /// `[-0.5, 0.5)`. The output layer starts at zero.
    ///
    /// # Errors
    /// - `Configuration` if the topology is invalid
    pub fn new<R: Rng + ?Sized>(structure: NeuroStructure, rng: &mut R) -> NetResult<Self> {
        Self::with_init(structure, WeightInit::default(), rng)
    }

    /// Create a network and initialize every layer but the output layer with
    /// `init`. Output weights stay zero until training moves them.
    pub fn with_init<R: Rng + ?Sized>(
        structure: NeuroStructure,
        init: WeightInit,
        rng: &mut R,
    ) -> NetResult<Self> {
        structure.validate()?;
        let mut layers = structure
            .layer_shapes()
            .into_iter()
            .map(|(rows, cols)| Matrix::zeros(rows, cols))
            .collect::<NetResult<Vec<_>>>()?;
        let last = layers.len() - 1;
        for layer in &mut layers[..last] {
            layer.randomize(init, rng)?;
        }
        Self::from_layers(structure, layers)
    }

    /// Assemble a network from existing weight matrices.
    ///
    /// # Errors
    /// - `Configuration` if the topology is invalid
    /// - `ShapeMismatch` if the layer count or any matrix shape disagrees with the topology
    pub fn from_layers(structure: NeuroStructure, layers: Vec<Matrix>) -> NetResult<Self> {
        structure.validate()?;
        let shapes = structure.layer_shapes();
        if layers.len() != shapes.len() {
            return Err(NetError::ShapeMismatch {
                expected: shapes.len(),
                actual: layers.len(),
            });
        }
        for (layer, &(rows, cols)) in layers.iter().zip(&shapes) {
            if layer.rows() != rows {
                return Err(NetError::ShapeMismatch {
                    expected: rows,
                    actual: layer.rows(),
                });
            }
            if layer.cols() != cols {
                return Err(NetError::ShapeMismatch {
                    expected: cols,
                    actual: layer.cols(),
                });
            }
        }

        let inputs = shapes
            .iter()
            .map(|&(_, cols)| Vector::zeros(cols))
            .collect::<NetResult<Vec<_>>>()?;
        let outputs = shapes
            .iter()
            .map(|&(rows, _)| Vector::zeros(rows))
            .collect::<NetResult<Vec<_>>>()?;

        Ok(Self {
            hidden: structure.hidden_activation.kernel(),
            output: structure.output_activation.kernel(),
            structure,
            layers,
            inputs,
            outputs,
        })
    }

    pub fn structure(&self) -> &NeuroStructure {
        &self.structure
    }

    pub fn name(&self) -> Option<&str> {
        self.structure.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.structure.name = Some(name.into());
    }

    pub fn layers(&self) -> &[Matrix] {
        &self.layers
    }

    /// Mutable access to one weight matrix, for seeding known weights.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Matrix> {
        self.layers.get_mut(index)
    }

    /// Signals fed into each layer during the latest forward pass.
    pub fn layer_inputs(&self) -> &[Vector] {
        &self.inputs
    }

    /// Pre-activation products of each layer during the latest forward pass.
    pub fn layer_outputs(&self) -> &[Vector] {
        &self.outputs
    }

    /// Forward pass.
    ///
    /// Overwrites the cached `inputs`/`outputs` buffers that
    /// [`Network::gradients`] and the weight updates read afterwards.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `input.len() != structure.inputs`
    pub fn infer(&mut self, input: &Vector) -> NetResult<Vector> {
        if input.len() != self.structure.inputs {
            return Err(NetError::ShapeMismatch {
                expected: self.structure.inputs,
                actual: input.len(),
            });
        }

        let last = self.layers.len() - 1;
        self.inputs[0] = input.clone();
        for i in 0..last {
            self.outputs[i] = self.layers[i].mul_vec(&self.inputs[i])?;
            self.inputs[i + 1] = self.outputs[i].map(self.hidden.evaluate);
        }
        self.outputs[last] = self.layers[last].mul_vec(&self.inputs[last])?;

        Ok(self.outputs[last].map(self.output.evaluate))
    }

    /// Compute the output error `target - predicted` and push it back through
    /// the transposed downstream weights.
    ///
    /// Returns one error vector per layer together with the squared norm of the
    /// output error, which the caller adds to its epoch accumulator. Activation
    /// derivatives are not folded in here; see [`Network::gradients`].
    ///
    /// # Errors
    /// - `ShapeMismatch` if `predicted` or `target` is not `structure.outputs` long
    pub fn propagate_errors(
        &self,
        predicted: &Vector,
        target: &Vector,
    ) -> NetResult<(Vec<Vector>, f64)> {
        for v in [predicted, target] {
            if v.len() != self.structure.outputs {
                return Err(NetError::ShapeMismatch {
                    expected: self.structure.outputs,
                    actual: v.len(),
                });
            }
        }

        let output_error = Vector::from_array(target.as_array() - predicted.as_array())?;
        let squared = output_error.norm();

        let mut errors = Vec::with_capacity(self.layers.len());
        errors.push(output_error);
        for layer in self.layers[1..].iter().rev() {
            let upstream = layer.transpose_mul_vec(&errors[errors.len() - 1])?;
            errors.push(upstream);
        }
        errors.reverse();

        Ok((errors, squared))
    }

    /// Activation derivatives at the cached pre-activation outputs.
    ///
    /// Only meaningful right after [`Network::infer`] for the same example.
    pub fn gradients(&self) -> Vec<Vector> {
        let last = self.outputs.len() - 1;
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, out)| {
                if i == last {
                    out.map(self.output.derivative)
                } else {
                    out.map(self.hidden.derivative)
                }
            })
            .collect()
    }

    /// Plain delta rule, layer by layer:
    /// `w[i,j] += learning_rate * error[i] * gradient[i] * input[j]`.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `errors`/`gradients` do not match the layer shapes
    pub fn apply_deltas(
        &mut self,
        errors: &[Vector],
        gradients: &[Vector],
        learning_rate: f64,
    ) -> NetResult<()> {
        self.check_signals(errors, gradients)?;

        for (layer, ((error, gradient), input)) in self
            .layers
            .iter_mut()
            .zip(errors.iter().zip(gradients).zip(&self.inputs))
        {
            let w = layer.as_array_mut();
            let x = input.as_array();
            let parallel = w.len() >= PARALLEL_THRESHOLD;
            let zip = Zip::from(w.rows_mut())
                .and(error.as_array())
                .and(gradient.as_array());
            let step = |mut row: ArrayViewMut1<f64>, &e: &f64, &g: &f64| {
                row.scaled_add(learning_rate * e * g, x);
            };
            if parallel {
                zip.par_for_each(step);
            } else {
                zip.for_each(step);
            }
        }

        Ok(())
    }

    /// Momentum variant of [`Network::apply_deltas`].
    ///
    /// For every weight: `Δ = learning_rate * error[i] * gradient[i] * input[j]`,
    /// `w += Δ + momentum * Δ_prev`, then `Δ_prev = Δ`. `deltas` holds `Δ_prev`
    /// per layer; start from [`Network::momentum_buffers`].
    ///
    /// # Errors
    /// - `ShapeMismatch` if `errors`, `gradients` or `deltas` do not match the layer shapes
    pub fn apply_deltas_momentum(
        &mut self,
        errors: &[Vector],
        gradients: &[Vector],
        learning_rate: f64,
        momentum: f64,
        deltas: &mut [Matrix],
    ) -> NetResult<()> {
        self.check_signals(errors, gradients)?;
        if deltas.len() != self.layers.len() {
            return Err(NetError::ShapeMismatch {
                expected: self.layers.len(),
                actual: deltas.len(),
            });
        }
        for (delta, layer) in deltas.iter().zip(&self.layers) {
            if delta.as_array().dim() != layer.as_array().dim() {
                return Err(NetError::ShapeMismatch {
                    expected: layer.as_array().len(),
                    actual: delta.as_array().len(),
                });
            }
        }

        for ((layer, delta), ((error, gradient), input)) in self
            .layers
            .iter_mut()
            .zip(deltas.iter_mut())
            .zip(errors.iter().zip(gradients).zip(&self.inputs))
        {
            let w = layer.as_array_mut();
            let x = input.as_array();
            let parallel = w.len() >= PARALLEL_THRESHOLD;
            let zip = Zip::from(w.rows_mut())
                .and(delta.as_array_mut().rows_mut())
                .and(error.as_array())
                .and(gradient.as_array());
            let step = |mut row: ArrayViewMut1<f64>,
                        mut prev: ArrayViewMut1<f64>,
                        &e: &f64,
                        &g: &f64| {
                let coeff = learning_rate * e * g;
                Zip::from(&mut row)
                    .and(&mut prev)
                    .and(x)
                    .for_each(|w, d, &xj| {
                        let change = coeff * xj;
                        *w += change + momentum * *d;
                        *d = change;
                    });
            };
            if parallel {
                zip.par_for_each(step);
            } else {
                zip.for_each(step);
            }
        }

        Ok(())
    }

    /// Zeroed `Δ_prev` matrices, one per layer, for [`Network::apply_deltas_momentum`].
    pub fn momentum_buffers(&self) -> Vec<Matrix> {
        self.layers.iter().map(Matrix::zeros_like).collect()
    }

    /// Zero each hidden neuron's incoming weight row with probability `p`.
    ///
    /// The output layer is never touched. Returns the number of rows zeroed.
    ///
    /// # Errors
    /// - `Configuration` if `p` is outside `[0, 1]`
    pub fn drop_out<R: Rng + ?Sized>(&mut self, p: f64, rng: &mut R) -> NetResult<usize> {
        if !(0.0..=1.0).contains(&p) {
            return Err(NetError::Configuration(format!(
                "drop-out probability must be within [0, 1], got {p}"
            )));
        }

        let last = self.layers.len() - 1;
        let mut dropped = 0;
        for layer in &mut self.layers[..last] {
            for mut row in layer.as_array_mut().rows_mut() {
                if rng.gen::<f64>() < p {
                    row.fill(0.0);
                    dropped += 1;
                }
            }
        }
        Ok(dropped)
    }

    fn check_signals(&self, errors: &[Vector], gradients: &[Vector]) -> NetResult<()> {
        for signals in [errors, gradients] {
            if signals.len() != self.layers.len() {
                return Err(NetError::ShapeMismatch {
                    expected: self.layers.len(),
                    actual: signals.len(),
                });
            }
            for (signal, layer) in signals.iter().zip(&self.layers) {
                if signal.len() != layer.rows() {
                    return Err(NetError::ShapeMismatch {
                        expected: layer.rows(),
                        actual: signal.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
