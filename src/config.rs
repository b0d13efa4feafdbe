//! Network hyperparameters, loadable from TOML.
//!
//! Every field has a default, so a config file only needs to name what it changes:
//!
//! ```toml
//! hidden_layers = [8, 4]
//! learning_rate = 0.1
//! min_epochs = 500
//! max_training_secs = 10.0
//! ```
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`NetworkConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Hyperparameters of a backpropagation network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Unit count of each hidden layer, input side first. Empty means no hidden layer.
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// Fraction of the previous weight delta added to each update.
    pub momentum: f64,
    pub use_momentum: bool,
    /// Epochs that always run before the plateau check may stop training.
    pub min_epochs: usize,
    /// Epochs between two improvement checks.
    pub epoch_window: usize,
    /// Smallest score change that counts as an improvement.
    pub min_improvement: f64,
    /// Wall-clock budget for a single `train` call.
    pub max_training_secs: f64,
    /// Hard cap on epochs, if any.
    pub max_epochs: Option<usize>,
    /// Initial weights are drawn uniformly from `-init_weight_range..init_weight_range`.
    pub init_weight_range: f64,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![4],
            learning_rate: 0.175,
            momentum: 0.9,
            use_momentum: true,
            min_epochs: 1000,
            epoch_window: 10,
            min_improvement: 0.0001,
            max_training_secs: 30.0,
            max_epochs: None,
            init_weight_range: 0.1,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Maximum wall-clock duration of a training run.
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs_f64(self.max_training_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", "must be a positive number"));
        }
        if !(self.momentum.is_finite() && self.momentum >= 0.0) {
            return Err(invalid("momentum", "must be zero or positive"));
        }
        if self.epoch_window == 0 {
            return Err(invalid("epoch_window", "must be at least 1"));
        }
        if !(self.min_improvement.is_finite() && self.min_improvement >= 0.0) {
            return Err(invalid("min_improvement", "must be zero or positive"));
        }
        if !(self.max_training_secs.is_finite() && self.max_training_secs > 0.0) {
            return Err(invalid("max_training_secs", "must be a positive number"));
        }
        if self.max_epochs == Some(0) {
            return Err(invalid("max_epochs", "must be at least 1 when set"));
        }
        if !(self.init_weight_range.is_finite() && self.init_weight_range > 0.0) {
            return Err(invalid("init_weight_range", "must be a positive number"));
        }
        if let Some(pos) = self.hidden_layers.iter().position(|&w| w == 0) {
            return Err(ConfigError::Invalid {
                field: "hidden_layers",
                reason: format!("layer {pos} has zero units"),
            });
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
