//! Domain types for the IROPS coordination core
//!
//! These types are shared by the stage router, the passenger
//! communications broker and the workflow runtime:
//!
//! - [`Proposal`]: one outbound passenger communication and its eventual response
//! - [`BrokerResponse`]: a terminal proposal handed back to a caller exactly once
//! - [`StageId`] / [`ConditionSnapshot`]: inputs to stage routing
//! - [`WorkflowRun`]: the precomputed stage sequence and its cursor
//! - [`RebookingProposal`] / [`ConfirmationRecord`]: what flows into and out of
//!   the confirmation stage

#![deny(unsafe_code)]

pub mod confirmation;
pub mod ids;
pub mod proposal;
pub mod run;
pub mod stage;

pub use confirmation::{ConfirmationRecord, RebookingProposal, ACCEPT_REBOOKING, MANUAL_REBOOKING};
pub use ids::{ProposalId, RunId};
pub use proposal::{
    BrokerResponse, OutboundProposal, Proposal, ProposalPayload, ProposalStatus, ResponseOutcome,
};
pub use run::{NextStage, WorkflowRun};
pub use stage::{ConditionSnapshot, StageId, HAZARD_WEATHER_CODES};
