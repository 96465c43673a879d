//! Error types for irops-comms.

use irops_types::ProposalId;
use thiserror::Error;

/// Errors raised by broker operations.
///
/// None of these are fatal to the process: `BrokerClosed` ends the caller's
/// current operation, `Timeout` can be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommsError {
    /// The broker has been shut down and accepts no new proposals.
    #[error("broker is closed")]
    BrokerClosed,

    /// The id was never issued by this broker.
    #[error("unknown proposal: {0}")]
    LookupMiss(ProposalId),

    /// No response arrived within the requested window.
    #[error("timed out after {timeout_ms}ms waiting for proposal {proposal_id}")]
    Timeout {
        proposal_id: ProposalId,
        timeout_ms: u64,
    },

    /// A caller-supplied id collides with one already issued.
    #[error("proposal already submitted: {0}")]
    DuplicateProposal(ProposalId),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for communications operations.
pub type CommsResult<T> = Result<T, CommsError>;
