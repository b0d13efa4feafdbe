//! Error types for network construction, training and inference.

use thiserror::Error;

use crate::config::ConfigError;
use crate::datasets::DatasetError;

/// Errors raised by layers, networks and learners.
#[derive(Debug, Error)]
pub enum NetError {
    /// A vector handed to a layer has the wrong length.
    #[error("Dimension mismatch on layer {layer}: expected {expected} values, got {actual}")]
    DimensionMismatch {
        /// Index of the layer in its network.
        layer: usize,
        /// Length the layer requires.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// `predict` was called before a successful `train`.
    #[error("Network has not been trained")]
    NotTrained,

    /// The training data cannot be used to build a network.
    #[error("Invalid training data: {0}")]
    InvalidData(String),

    /// A class label falls outside the nominal range of the label column.
    #[error(
        "Label {label}{} is outside the class range 0..{classes}",
        .row.map(|r| format!(" on row {r}")).unwrap_or_default()
    )]
    LabelOutOfRange {
        /// Row holding the label, when it came from a dataset.
        row: Option<usize>,
        /// Offending label value.
        label: f64,
        /// Number of classes of the label column.
        classes: usize,
    },

    /// Invalid hyperparameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Dataset access failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Writing a diagnostic artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for network operations.
pub type NetResult<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetError::DimensionMismatch {
            layer: 1,
            expected: 5,
            actual: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("layer 1"));
        assert!(msg.contains("expected 5"));
        assert!(msg.contains("got 3"));

        let err = NetError::LabelOutOfRange {
            row: Some(2),
            label: 4.0,
            classes: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("0..3"));
        assert!(msg.contains("on row 2"));

        let err = NetError::LabelOutOfRange {
            row: None,
            label: -1.0,
            classes: 2,
        };
        assert_eq!(format!("{err}"), "Label -1 is outside the class range 0..2");
    }
}
