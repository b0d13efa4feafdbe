//! Epoch-loop stopping policy.
//!
//! Training keeps going while fewer than `min_epochs` epochs have run or the validation
//! score is still improving, and stops as soon as the wall-clock budget (or the optional
//! epoch cap) is used up. Improvement is only judged at window boundaries, i.e. when the
//! epoch count is a multiple of `epoch_window`; in between, the score counts as improving.
use std::time::Duration;

use serde::Serialize;

use crate::config::NetworkConfig;

/// How a validation score is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreKind {
    /// Fraction of correct predictions; higher is better.
    Accuracy,
    /// Mean squared error; lower is better.
    MeanSquaredError,
}

impl ScoreKind {
    /// Score that every real score beats.
    pub fn worst(self) -> f64 {
        match self {
            ScoreKind::Accuracy => f64::NEG_INFINITY,
            ScoreKind::MeanSquaredError => f64::INFINITY,
        }
    }

    /// Whether `score` beats `best` by more than `margin`.
    pub fn improves(self, score: f64, best: f64, margin: f64) -> bool {
        match self {
            ScoreKind::Accuracy => score > best + margin,
            ScoreKind::MeanSquaredError => score < best - margin,
        }
    }
}

/// Why a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The validation score stopped improving after `min_epochs`.
    Plateau,
    /// The wall-clock budget ran out.
    TimeBudget,
    /// The configured epoch cap was reached.
    EpochLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoppingCriteria {
    pub kind: ScoreKind,
    pub min_epochs: usize,
    pub epoch_window: usize,
    pub min_improvement: f64,
    pub max_duration: Duration,
    pub max_epochs: Option<usize>,
}

impl StoppingCriteria {
    pub fn from_config(config: &NetworkConfig, kind: ScoreKind) -> Self {
        Self {
            kind,
            min_epochs: config.min_epochs,
            epoch_window: config.epoch_window.max(1),
            min_improvement: config.min_improvement,
            max_duration: config.max_duration(),
            max_epochs: config.max_epochs,
        }
    }

    pub fn is_window_boundary(&self, epoch_count: usize) -> bool {
        epoch_count % self.epoch_window == 0
    }

    /// At a window boundary, the better of `current` and `best`; otherwise `best`.
    pub fn promote_best(&self, epoch_count: usize, current: f64, best: f64) -> f64 {
        if self.is_window_boundary(epoch_count) && self.kind.improves(current, best, 0.0) {
            current
        } else {
            best
        }
    }

    pub fn improved_over_window(&self, epoch_count: usize, current: f64, best: f64) -> bool {
        !self.is_window_boundary(epoch_count)
            || self.kind.improves(current, best, self.min_improvement)
    }

    /// `None` while training should go on, otherwise the reason to stop.
    pub fn stop_reason(
        &self,
        epoch_count: usize,
        current: f64,
        best: f64,
        elapsed: Duration,
    ) -> Option<StopReason> {
        if elapsed >= self.max_duration {
            return Some(StopReason::TimeBudget);
        }
        if self.max_epochs.map_or(false, |cap| epoch_count >= cap) {
            return Some(StopReason::EpochLimit);
        }
        if epoch_count >= self.min_epochs && !self.improved_over_window(epoch_count, current, best)
        {
            return Some(StopReason::Plateau);
        }
        None
    }

    pub fn should_continue(
        &self,
        epoch_count: usize,
        current: f64,
        best: f64,
        elapsed: Duration,
    ) -> bool {
        self.stop_reason(epoch_count, current, best, elapsed).is_none()
    }
}
