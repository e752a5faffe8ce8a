//! Error types for the run engine.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Part of a step's iteration that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Run,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => f.write_str("setup"),
            Phase::Run => f.write_str("run"),
            Phase::Teardown => f.write_str("teardown"),
        }
    }
}

/// A step that cannot be run, reported before any timing happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{test}(step {index}): name property not set")]
    MissingName { test: String, index: usize },

    #[error("{step}: one of run or event must be set")]
    MissingAction { step: String },

    #[error("{step}: only one of run and event should be set")]
    ConflictingAction { step: String },
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{step} (run {iteration}): {phase} failed: {source}")]
    Step {
        step: String,
        iteration: usize,
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("{step} (run {iteration}): event did not complete within {timeout:?}")]
    EventTimeout {
        step: String,
        iteration: usize,
        timeout: Duration,
    },

    #[error("{step}: recorded {actual} samples, expected {expected} to match the first step")]
    SampleCountMismatch {
        step: String,
        expected: usize,
        actual: usize,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("malformed data table: {0}")]
    Table(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Returns the validation failure, if this error is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            BenchError::Validation(v) => Some(v),
            _ => None,
        }
    }
}
