//! IROPS Workflow Runtime
//!
//! Ties the stage router and the passenger communications broker together:
//!
//! - [`WorkflowDriver`] plans a run from a condition snapshot and executes
//!   each stage through a [`StageRegistry`], retrying or flagging failures
//!   according to its [`FailurePolicy`].
//! - [`StageExecutor`] is the seam every stage implements. The built-in
//!   [`ConfirmationStage`] talks to an injected [`CommsBroker`](irops_comms::CommsBroker);
//!   everything else is pluggable.
//! - [`ExecutionContext`] carries values, log messages and warnings from one
//!   stage to the next.
//!
//! The `irops-sim` binary runs canned scenarios with the executors in
//! [`simulation`].

#![deny(unsafe_code)]

pub mod config;
pub mod confirmation;
pub mod context;
pub mod driver;
pub mod error;
pub mod executor;
pub mod simulation;

pub use config::{LoggingConfig, RuntimeConfig, SimulationConfig};
pub use confirmation::ConfirmationStage;
pub use context::{keys, ContextMessage, ExecutionContext};
pub use driver::{
    DriverConfig, FailurePolicy, StageExecution, StageOutcome, WorkflowDriver, WorkflowReport,
};
pub use error::{RuntimeError, RuntimeResult, StageError, WorkflowWarning};
pub use executor::{StageExecutor, StageRegistry};
pub use irops_comms::PollBudget;
