//! The contract shared by supervised learners.
use crate::datasets::DataMatrix;
use crate::error::NetResult;
use crate::metrics;

/// Anything that maps a feature vector to a single label.
///
/// For nominal labels the returned value is the class index; for continuous labels it is
/// the predicted value itself.
pub trait Predictor {
    fn predict(&self, features: &[f64]) -> NetResult<f64>;
}

/// A learner trained from a feature matrix and a one-column label matrix.
pub trait SupervisedLearner: Predictor {
    /// Fit the learner. A failed call leaves the learner untrained.
    fn train(&mut self, features: &DataMatrix, labels: &DataMatrix) -> NetResult<()>;

    /// Held-out data used to decide when to stop. Must be set before `train`.
    /// Learners without a stopping policy ignore it.
    fn set_validation_set(&mut self, _features: DataMatrix, _labels: DataMatrix) {}

    /// Accuracy for nominal labels, mean squared error for continuous ones.
    fn measure_accuracy(&self, features: &DataMatrix, labels: &DataMatrix) -> NetResult<f64> {
        metrics::measure_accuracy(self, features, labels)
    }
}
