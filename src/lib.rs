//! Backpropagation neural network learner: sigmoid layers with momentum, an epoch loop
//! with a validation-driven stopping policy, and the dataset plumbing around it.
//!
//! - Fully-connected sigmoid layers with an in-matrix bias row
//! - Per-instance SGD with optional momentum
//! - Window-based plateau detection, wall-clock budget and optional epoch cap
//! - ARFF and CSV loaders, metrics, training reports and PPM decision surfaces

pub mod activations;
pub mod config;
pub mod datasets;
pub mod error;
pub mod export;
pub mod layers;
pub mod learner;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod report;
pub mod stopping;
pub mod utils;

pub use activations::{Activation, Sigmoid};
pub use config::{ConfigError, NetworkConfig};
pub use datasets::{load_arff, load_csv, parse_arff, Attribute, DataMatrix, DatasetError};
pub use error::{NetError, NetResult};
pub use export::{export_decision_surface, write_decision_surface, Grid};
pub use layers::{Layer, LayerParams};
pub use learner::{Predictor, SupervisedLearner};
pub use metrics::{confusion_matrix, measure_accuracy};
pub use network::{NeuralNet, Network, OutputEncoding};
pub use report::{EpochRecord, TrainingReport};
pub use stopping::{ScoreKind, StopReason, StoppingCriteria};
pub use utils::{print_model_summary, print_summary_table, two_clusters, xor_dataset};
