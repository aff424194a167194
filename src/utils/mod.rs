//! Scalar activation functions and their derivatives.
//!
//! Every derivative takes the *pre-activation* value `x`, not `f(x)`.

/// Activation function: logistic sigmoid. Range (0, 1).
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of sigmoid: f(x) * (1 - f(x)).
#[inline]
pub fn d_sigmoid(x: f64) -> f64 {
    let f = sigmoid(x);
    f * (1.0 - f)
}

/// Activation function: hyperbolic tangent. Range (-1, 1).
#[inline]
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Derivative of tanh: 1 / cosh²(x), computed as 1 - tanh²(x).
#[inline]
pub fn d_tanh(x: f64) -> f64 {
    let t = x.tanh();
    1.0 - t * t
}

/// Activation function: rectifier. Range [0, +inf).
#[inline]
pub fn rectifier(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else {
        x
    }
}

/// Derivative of rectifier. Shares the `x < 0` branch with [`rectifier`],
/// so the derivative at zero is 1.
#[inline]
pub fn d_rectifier(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else {
        1.0
    }
}

/// Activation function: identity (for linear layers).
#[inline]
pub fn identity(x: f64) -> f64 {
    x
}

/// Derivative of identity activation.
#[inline]
pub fn d_identity(_x: f64) -> f64 {
    1.0
}
