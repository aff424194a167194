//! Core feed-forward network implementation.
//!
//! This module provides the fundamental structures and operations:
//! - Dense vectors and matrices with data-parallel products
//! - A closed catalog of activation functions
//! - The layered network with forward inference and error back-propagation
//!
//! ## Signal flow
//!
//! ```text
//! inputs[0] = x
//! outputs[i] = W[i] · inputs[i]
//! inputs[i+1] = f_hidden(outputs[i])          (i < L-1)
//! y = f_output(outputs[L-1])
//! ```
//!
//! Errors travel the other way through the transposed weights:
//! `e[i] = W[i+1]ᵗ · e[i+1]`.

mod linalg;
mod network;

pub use linalg::{Matrix, Vector, WeightInit};
pub use network::{Network, NeuroStructure};

use crate::utils;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by the numeric kernel, the network and the persistence codec.
#[derive(Debug, Error)]
pub enum NetError {
    /// A declared dimension is non-positive, or a literal array is empty.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Operand lengths or shapes do not line up.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Unrecognized activation tag, malformed topology or training parameters.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Corrupt or truncated persisted network.
    #[error("Format error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetResult<T> = Result<T, NetError>;

/// Evaluate/derivative pair for one activation, resolved once and cached by the network.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    pub evaluate: fn(f64) -> f64,
    pub derivative: fn(f64) -> f64,
}

/// Activation functions available to hidden and output layers.
///
/// The discriminants are the ordinals used by the persistence format and must
/// not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activation {
    /// 1 / (1 + e^-x), range (0, 1)
    #[default]
    Sigmoid = 0,
    /// tanh(x), range (-1, 1)
    Tanh = 1,
    /// max(0, x), range [0, +inf)
    Rectifier = 2,
    /// x, range (-inf, +inf)
    Identity = 3,
}

impl Activation {
    pub const ALL: [Activation; 4] = [
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::Rectifier,
        Activation::Identity,
    ];

    /// Ordinal written to persisted files.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Resolve an ordinal read from a persisted file.
    ///
    /// # Errors
    /// - `Configuration` if the ordinal names no activation
    pub fn from_ordinal(ordinal: i64) -> NetResult<Self> {
        match ordinal {
            0 => Ok(Activation::Sigmoid),
            1 => Ok(Activation::Tanh),
            2 => Ok(Activation::Rectifier),
            3 => Ok(Activation::Identity),
            _ => Err(NetError::Configuration(format!(
                "unknown activation ordinal {ordinal}"
            ))),
        }
    }

    pub fn kernel(self) -> Kernel {
        match self {
            Activation::Sigmoid => Kernel {
                evaluate: utils::sigmoid,
                derivative: utils::d_sigmoid,
            },
            Activation::Tanh => Kernel {
                evaluate: utils::tanh,
                derivative: utils::d_tanh,
            },
            Activation::Rectifier => Kernel {
                evaluate: utils::rectifier,
                derivative: utils::d_rectifier,
            },
            Activation::Identity => Kernel {
                evaluate: utils::identity,
                derivative: utils::d_identity,
            },
        }
    }

    /// Apply activation function: f(x)
    pub fn apply(self, x: f64) -> f64 {
        (self.kernel().evaluate)(x)
    }

    /// Derivative of activation at the pre-activation value: f'(x)
    pub fn derivative(self, x: f64) -> f64 {
        (self.kernel().derivative)(x)
    }

    /// Name for debugging and command-line parsing
    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Rectifier => "relu",
            Activation::Identity => "identity",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "relu" | "rectifier" => Ok(Activation::Rectifier),
            "identity" | "linear" => Ok(Activation::Identity),
            other => Err(NetError::Configuration(format!(
                "unknown activation function: {other}"
            ))),
        }
    }
}
