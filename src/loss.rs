//! Error terms for sigmoid output units.

/// Sum of squared differences between `target` and the first `target.len()` outputs.
pub fn sum_squared_error(target: &[f64], output: &[f64]) -> f64 {
    target
        .iter()
        .zip(output)
        .map(|(&t, &o)| (t - o).powi(2))
        .sum()
}

/// Output-layer delta `(t - o) * o * (1 - o)`. Extra trailing outputs (the bias) are ignored.
pub fn output_delta(target: &[f64], output: &[f64]) -> Vec<f64> {
    target
        .iter()
        .zip(output)
        .map(|(&t, &o)| (t - o) * o * (1.0 - o))
        .collect()
}
