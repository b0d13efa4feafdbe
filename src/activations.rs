//! Activation functions used by the network layers.
use std::fmt;

/// Trait for activation functions.
///
/// `derivative_from_output` takes the already-activated value, which is what the
/// layers keep around between the forward and backward pass.
pub trait Activation: fmt::Debug + Send + Sync {
    fn apply(&self, x: f64) -> f64;
    fn derivative_from_output(&self, y: f64) -> f64;
}

/// Sigmoid: 1 / (1 + exp(-x))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn apply(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
    fn derivative_from_output(&self, y: f64) -> f64 {
        y * (1.0 - y)
    }
}
