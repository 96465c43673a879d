//! Passenger proposals: one outbound communication plus its eventual response
//!
//! A proposal moves through `Pending → Processing → Completed`. The only
//! other terminal state is `Cancelled`, reachable from `Pending` when the
//! broker shuts down before the passenger was ever asked. `response` and
//! `responded_at` are populated exactly when the status is `Completed`.

use crate::ProposalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Payload ──────────────────────────────────────────────────────────

/// Message content delivered to the passenger
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPayload {
    pub passenger_name: String,
    pub original_flight: String,
    pub rebooked_flight: String,
    pub departure_location: String,
    pub arrival_location: String,
    /// Free-form text shown to the passenger
    #[serde(default)]
    pub message: String,
}

// ── Outbound Proposal ────────────────────────────────────────────────

/// A proposal as submitted to the broker, before it has been accepted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundProposal {
    /// Caller-chosen id; the broker generates one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProposalId>,
    pub passenger_id: String,
    pub payload: ProposalPayload,
}

impl OutboundProposal {
    pub fn new(passenger_id: impl Into<String>, payload: ProposalPayload) -> Self {
        Self {
            id: None,
            passenger_id: passenger_id.into(),
            payload,
        }
    }

    pub fn with_id(mut self, id: ProposalId) -> Self {
        self.id = Some(id);
        self
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Lifecycle status of a proposal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl ProposalStatus {
    /// Completed or Cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Completed | ProposalStatus::Cancelled)
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Processing => "processing",
            ProposalStatus::Completed => "completed",
            ProposalStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ── Proposal ─────────────────────────────────────────────────────────

/// A proposal held by the broker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub passenger_id: String,
    pub payload: ProposalPayload,
    pub created_at: DateTime<Utc>,
    pub status: ProposalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Proposal {
    /// Accept an outbound proposal as `Pending`, generating an id if needed
    pub fn accept(outbound: OutboundProposal) -> Self {
        Self {
            id: outbound.id.unwrap_or_else(ProposalId::generate),
            passenger_id: outbound.passenger_id,
            payload: outbound.payload,
            created_at: Utc::now(),
            status: ProposalStatus::Pending,
            response: None,
            responded_at: None,
        }
    }

    /// Pending → Processing. Returns false for any other starting state.
    pub fn mark_processing(&mut self) -> bool {
        if self.status != ProposalStatus::Pending {
            return false;
        }
        self.status = ProposalStatus::Processing;
        true
    }

    /// Processing → Completed, recording the passenger's answer
    pub fn complete(&mut self, response: impl Into<String>) -> bool {
        if self.status != ProposalStatus::Processing {
            return false;
        }
        self.status = ProposalStatus::Completed;
        self.response = Some(response.into());
        self.responded_at = Some(Utc::now());
        true
    }

    /// Pending → Cancelled
    pub fn cancel(&mut self) -> bool {
        if self.status != ProposalStatus::Pending {
            return false;
        }
        self.status = ProposalStatus::Cancelled;
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Convert a terminal proposal into the response handed to callers
    pub fn into_response(self) -> Option<BrokerResponse> {
        let outcome = match self.status {
            ProposalStatus::Completed => ResponseOutcome::Answered(self.response?),
            ProposalStatus::Cancelled => ResponseOutcome::Cancelled,
            ProposalStatus::Pending | ProposalStatus::Processing => return None,
        };
        Some(BrokerResponse {
            proposal_id: self.id,
            passenger_id: self.passenger_id,
            payload: self.payload,
            outcome,
            created_at: self.created_at,
            responded_at: self.responded_at,
        })
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// How a proposal ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "response", rename_all = "snake_case")]
pub enum ResponseOutcome {
    /// The passenger answered with a free-form label
    Answered(String),
    /// The broker shut down before the passenger was asked
    Cancelled,
}

/// A terminal proposal, returned to exactly one caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerResponse {
    pub proposal_id: ProposalId,
    pub passenger_id: String,
    pub payload: ProposalPayload,
    pub outcome: ResponseOutcome,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl BrokerResponse {
    /// The passenger's answer, if there was one
    pub fn response(&self) -> Option<&str> {
        match &self.outcome {
            ResponseOutcome::Answered(label) => Some(label),
            ResponseOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Cancelled)
    }

    /// Time between submission and answer, in seconds
    pub fn response_time_secs(&self) -> Option<f64> {
        self.responded_at
            .map(|at| (at - self.created_at).num_milliseconds() as f64 / 1000.0)
    }
}
