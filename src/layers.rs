//! Fully-connected sigmoid layer with an in-matrix bias row and momentum updates.
use rand::Rng;

use crate::activations::{Activation, Sigmoid};
use crate::error::{NetError, NetResult};

/// Matrix type
pub type Matrix = Vec<Vec<f64>>;

/// Bias value appended to every layer input and output.
pub const BIAS: f64 = 1.0;

/// Update rule shared by every layer of a network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerParams {
    pub learning_rate: f64,
    /// `Some(coefficient)` when momentum is enabled.
    pub momentum: Option<f64>,
}

/// A fully-connected layer.
///
/// `weights[i][j]` connects input unit `i` to output unit `j`; the last row belongs to
/// the bias input. The layer remembers the input and output of its most recent
/// [`forward`](Layer::forward) call, which [`backward`](Layer::backward) needs.
#[derive(Debug, Clone)]
pub struct Layer {
    index: usize,
    weights: Matrix,
    delta_weights: Matrix,
    last_input: Vec<f64>,
    last_output: Vec<f64>,
    params: LayerParams,
}

impl Layer {
    /// Create a layer with weights drawn uniformly from `-init_range..init_range`.
    /// `init_range` must be finite and positive.
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        index: usize,
        input_rank: usize,
        output_rank: usize,
        init_range: f64,
        params: LayerParams,
    ) -> NetResult<Self> {
        if !(init_range.is_finite() && init_range > 0.0) {
            return Err(NetError::InvalidData(format!(
                "layer {index}: weight init range must be finite and positive, got {init_range}"
            )));
        }
        let weights: Matrix = (0..=input_rank)
            .map(|_| {
                (0..output_rank)
                    .map(|_| rng.gen_range(-init_range..init_range))
                    .collect()
            })
            .collect();
        Ok(Self::from_weights(index, weights, params))
    }

    /// Create a layer from an explicit `(input_rank + 1) x output_rank` weight matrix.
    pub fn from_weights(index: usize, weights: Matrix, params: LayerParams) -> Self {
        let delta_weights = weights.iter().map(|row| vec![0.0; row.len()]).collect();
        Self {
            index,
            weights,
            delta_weights,
            last_input: Vec::new(),
            last_output: Vec::new(),
            params,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of inputs, bias excluded.
    pub fn input_rank(&self) -> usize {
        self.weights.len().saturating_sub(1)
    }

    pub fn output_rank(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn delta_weights(&self) -> &Matrix {
        &self.delta_weights
    }

    pub fn last_input(&self) -> &[f64] {
        &self.last_input
    }

    pub fn last_output(&self) -> &[f64] {
        &self.last_output
    }

    /// Computes the activated output for `input` (bias included) and appends [`BIAS`].
    /// Leaves the layer untouched.
    pub fn activate(&self, input: &[f64]) -> NetResult<Vec<f64>> {
        self.check_len(input.len(), self.weights.len())?;
        let mut output: Vec<f64> = (0..self.output_rank())
            .map(|j| {
                let sum: f64 = input
                    .iter()
                    .zip(&self.weights)
                    .map(|(&x, row)| x * row[j])
                    .sum();
                Sigmoid.apply(sum)
            })
            .collect();
        output.push(BIAS);
        Ok(output)
    }

    /// Like [`activate`](Layer::activate), but records input and output for the next
    /// backward pass.
    pub fn forward(&mut self, input: &[f64]) -> NetResult<Vec<f64>> {
        let output = self.activate(input)?;
        self.last_input = input.to_vec();
        self.last_output = output.clone();
        Ok(output)
    }

    /// Applies `delta` (one value per output unit) to the weights and returns the delta
    /// for the previous layer's units, bias excluded.
    ///
    /// The returned delta is computed from the weights as they were before this update,
    /// with the sigmoid slope taken from the input recorded by the last forward call.
    pub fn backward(&mut self, delta: &[f64]) -> NetResult<Vec<f64>> {
        self.check_len(delta.len(), self.output_rank())?;
        self.check_len(self.last_input.len(), self.weights.len())?;

        let previous: Vec<f64> = (0..self.input_rank())
            .map(|i| {
                let sum: f64 = delta
                    .iter()
                    .zip(&self.weights[i])
                    .map(|(&d, &w)| d * w)
                    .sum();
                sum * Sigmoid.derivative_from_output(self.last_input[i])
            })
            .collect();

        let LayerParams {
            learning_rate,
            momentum,
        } = self.params;
        for (i, (row, delta_row)) in self
            .weights
            .iter_mut()
            .zip(self.delta_weights.iter_mut())
            .enumerate()
        {
            let x = self.last_input[i];
            for (j, (w, dw)) in row.iter_mut().zip(delta_row.iter_mut()).enumerate() {
                let mut change = learning_rate * x * delta[j];
                if let Some(m) = momentum {
                    change += m * *dw;
                }
                *w += change;
                *dw = change;
            }
        }
        Ok(previous)
    }

    fn check_len(&self, actual: usize, expected: usize) -> NetResult<()> {
        if actual != expected {
            return Err(NetError::DimensionMismatch {
                layer: self.index,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PARAMS: LayerParams = LayerParams {
        learning_rate: 0.1,
        momentum: Some(0.9),
    };

    #[test]
    fn test_preset_weights_forward() {
        let mut layer = Layer::from_weights(0, vec![vec![0.5], vec![0.5], vec![0.0]], PARAMS);
        let out = layer.forward(&[1.0, 0.0, 1.0]).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0], 0.622_459_331_201_854_6, epsilon = 1e-12);
        assert_eq!(out[1], BIAS);
        assert_eq!(layer.last_input(), &[1.0, 0.0, 1.0]);
        assert_eq!(layer.last_output(), out.as_slice());
    }

    #[test]
    fn test_new_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = Layer::new(&mut rng, 2, 3, 5, 0.1, PARAMS).unwrap();
        assert_eq!(layer.index(), 2);
        assert_eq!(layer.input_rank(), 3);
        assert_eq!(layer.output_rank(), 5);
        assert_eq!(layer.weights().len(), 4);
        assert!(layer
            .weights()
            .iter()
            .flatten()
            .all(|w| (-0.1..0.1).contains(w)));
        assert!(layer.delta_weights().iter().flatten().all(|&d| d == 0.0));
    }

    #[test]
    fn test_new_rejects_bad_init_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for range in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Layer::new(&mut rng, 0, 2, 2, range, PARAMS),
                Err(NetError::InvalidData(_))
            ));
        }
    }

    #[test]
    fn test_forward_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut layer = Layer::new(&mut rng, 0, 3, 2, 0.5, PARAMS).unwrap();
        let input = [0.2, -0.4, 0.9, BIAS];
        let a = layer.activate(&input).unwrap();
        let b = layer.forward(&input).unwrap();
        let c = layer.forward(&input).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_zero_delta_keeps_weights() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut layer = Layer::new(&mut rng, 0, 2, 3, 0.5, PARAMS).unwrap();
        let before = layer.weights().clone();
        layer.forward(&[0.3, 0.7, BIAS]).unwrap();
        let prev = layer.backward(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(layer.weights(), &before);
        assert_eq!(prev, vec![0.0, 0.0]);
    }

    #[test]
    fn test_backward_update_and_propagation() {
        let params = LayerParams {
            learning_rate: 0.5,
            momentum: None,
        };
        let mut layer = Layer::from_weights(0, vec![vec![0.2], vec![-0.4], vec![0.1]], params);
        layer.forward(&[0.5, 0.25, BIAS]).unwrap();
        let prev = layer.backward(&[0.1]).unwrap();

        // Propagated with the pre-update weights and x(1-x) of the stored input.
        assert_eq!(prev.len(), 2);
        assert_relative_eq!(prev[0], 0.1 * 0.2 * 0.25, epsilon = 1e-12);
        assert_relative_eq!(prev[1], 0.1 * -0.4 * 0.1875, epsilon = 1e-12);

        assert_relative_eq!(layer.weights()[0][0], 0.2 + 0.5 * 0.5 * 0.1, epsilon = 1e-12);
        assert_relative_eq!(layer.weights()[1][0], -0.4 + 0.5 * 0.25 * 0.1, epsilon = 1e-12);
        assert_relative_eq!(layer.weights()[2][0], 0.1 + 0.5 * 0.1, epsilon = 1e-12);
        assert_relative_eq!(layer.delta_weights()[2][0], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_accumulates() {
        let params = LayerParams {
            learning_rate: 1.0,
            momentum: Some(0.5),
        };
        let mut layer = Layer::from_weights(0, vec![vec![0.0], vec![0.0]], params);
        layer.forward(&[1.0, BIAS]).unwrap();
        layer.backward(&[0.2]).unwrap();
        assert_relative_eq!(layer.delta_weights()[0][0], 0.2, epsilon = 1e-12);

        layer.forward(&[1.0, BIAS]).unwrap();
        layer.backward(&[0.2]).unwrap();
        assert_relative_eq!(layer.delta_weights()[0][0], 0.2 + 0.5 * 0.2, epsilon = 1e-12);
        assert_relative_eq!(layer.weights()[0][0], 0.2 + 0.3, epsilon = 1e-12);

        // Momentum keeps moving the weights even when the new delta is zero.
        layer.forward(&[1.0, BIAS]).unwrap();
        layer.backward(&[0.0]).unwrap();
        assert_relative_eq!(layer.weights()[0][0], 0.5 + 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Layer::new(&mut rng, 4, 2, 3, 0.1, PARAMS).unwrap();
        match layer.forward(&[1.0, 2.0]) {
            Err(NetError::DimensionMismatch {
                layer,
                expected,
                actual,
            }) => {
                assert_eq!((layer, expected, actual), (4, 3, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        layer.forward(&[1.0, 2.0, BIAS]).unwrap();
        assert!(matches!(
            layer.backward(&[0.1, 0.2]),
            Err(NetError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_backward_before_forward_fails() {
        let mut layer = Layer::from_weights(0, vec![vec![0.1], vec![0.1]], PARAMS);
        assert!(matches!(
            layer.backward(&[0.1]),
            Err(NetError::DimensionMismatch { .. })
        ));
    }
}
