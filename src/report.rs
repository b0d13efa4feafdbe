//! Per-epoch training history.
//!
//! Every epoch of [`NeuralNet::train`](crate::NeuralNet) appends an [`EpochRecord`]; the
//! finished report also carries the reason training stopped. Reports serialize to JSON
//! for plotting learning curves outside the crate.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::error::NetResult;
use crate::stopping::{ScoreKind, StopReason};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochRecord {
    /// 1-based epoch number.
    pub epoch: usize,
    pub validation_score: f64,
    pub training_score: f64,
    /// Sum of squared output errors accumulated while training this epoch.
    pub sum_squared_error: f64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    score_kind: ScoreKind,
    epochs: Vec<EpochRecord>,
    stop_reason: Option<StopReason>,
    total_secs: f64,
}

impl TrainingReport {
    pub fn new(score_kind: ScoreKind) -> Self {
        Self {
            score_kind,
            epochs: Vec::new(),
            stop_reason: None,
            total_secs: 0.0,
        }
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn finish(&mut self, reason: StopReason, elapsed: Duration) {
        self.stop_reason = Some(reason);
        self.total_secs = elapsed.as_secs_f64();
    }

    pub fn score_kind(&self) -> ScoreKind {
        self.score_kind
    }

    pub fn epochs(&self) -> &[EpochRecord] {
        &self.epochs
    }

    pub fn epoch_count(&self) -> usize {
        self.epochs.len()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    /// Best validation score of the run, read according to the score kind.
    pub fn best_validation_score(&self) -> Option<f64> {
        let scores = self.epochs.iter().map(|r| r.validation_score);
        match self.score_kind {
            ScoreKind::Accuracy => scores.reduce(f64::max),
            ScoreKind::MeanSquaredError => scores.reduce(f64::min),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> NetResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self).map_err(std::io::Error::from)?;
        out.flush()?;
        Ok(())
    }
}
