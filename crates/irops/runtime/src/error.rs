//! Error types for irops-runtime

use irops_comms::CommsError;
use irops_types::StageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a stage executor may return.
///
/// The driver decides what happens next: retry, flag, or abort.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage failed: {0}")]
    Failed(String),

    /// A value the stage depends on is absent from the execution context
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("communications error: {0}")]
    Comms(#[from] CommsError),

    /// A context value did not have the expected shape
    #[error("context value error: {0}")]
    Context(#[from] serde_json::Error),
}

/// Errors raised by the workflow driver
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no executor registered for stage {0}")]
    StageNotRegistered(StageId),

    #[error("stage {stage} failed after {attempts} attempt(s): {reason}")]
    StageFailed {
        stage: StageId,
        attempts: u32,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Non-fatal conditions recorded on the execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowWarning {
    /// Confirmation polling gave up before every passenger answered
    MaxIterationsExceeded { budget: u32 },

    /// A stage kept failing and was skipped
    StageFlagged { stage: StageId, reason: String },
}

impl std::fmt::Display for WorkflowWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowWarning::MaxIterationsExceeded { budget } => write!(
                f,
                "confirmation polling stopped after {} iterations; forcing completion",
                budget
            ),
            WorkflowWarning::StageFlagged { stage, reason } => {
                write!(f, "stage {} flagged for review: {}", stage, reason)
            }
        }
    }
}
