//! Records flowing into and out of the confirmation stage

use crate::{BrokerResponse, ProposalId, ProposalPayload, ResponseOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label a passenger gives when taking the offered flight
pub const ACCEPT_REBOOKING: &str = "accept rebooking";
/// Label a passenger gives when asking for a human agent instead
pub const MANUAL_REBOOKING: &str = "manually rebook with agent";

// ── Rebooking Proposal ───────────────────────────────────────────────

/// Output of the rebooking stage for one impacted passenger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebookingProposal {
    pub passenger_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passenger_name: Option<String>,
    pub original_flight: String,
    pub rebooked_flight: String,
    #[serde(default = "default_location")]
    pub departure_location: String,
    pub arrival_location: String,
    /// Whether a seat was actually found on `rebooked_flight`
    pub assignment_successful: bool,
}

fn default_location() -> String {
    "N/A".to_string()
}

impl RebookingProposal {
    pub fn display_name(&self) -> &str {
        self.passenger_name.as_deref().unwrap_or(&self.passenger_id)
    }

    /// Message text sent to the passenger
    pub fn compose_message(&self) -> String {
        format!(
            "Hello {}, your flight {} from {} to {} has been cancelled. \
             The next available flight is {}. \
             Would you like to confirm this rebooking or contact a representative \
             to review other options?",
            self.display_name(),
            self.original_flight,
            self.departure_location,
            self.arrival_location,
            self.rebooked_flight,
        )
    }

    pub fn to_payload(&self) -> ProposalPayload {
        ProposalPayload {
            passenger_name: self.display_name().to_string(),
            original_flight: self.original_flight.clone(),
            rebooked_flight: self.rebooked_flight.clone(),
            departure_location: self.departure_location.clone(),
            arrival_location: self.arrival_location.clone(),
            message: self.compose_message(),
        }
    }
}

// ── Confirmation Record ──────────────────────────────────────────────

/// A broker response correlated with the proposal that produced it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub proposal_id: ProposalId,
    pub passenger_id: String,
    pub passenger_name: String,
    pub original_flight: String,
    /// The confirmed flight, or an UNASSIGNED marker when the passenger
    /// did not accept
    pub rebooked_flight: String,
    pub outcome: ResponseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_secs: Option<f64>,
    pub processed_at: DateTime<Utc>,
}

impl ConfirmationRecord {
    pub fn from_response(response: &BrokerResponse) -> Self {
        let payload = &response.payload;
        let keeps_offer = matches!(response.response(), Some(r) if r != MANUAL_REBOOKING);
        let rebooked_flight = if keeps_offer {
            payload.rebooked_flight.clone()
        } else {
            unassigned_marker(&payload.original_flight)
        };

        Self {
            proposal_id: response.proposal_id.clone(),
            passenger_id: response.passenger_id.clone(),
            passenger_name: payload.passenger_name.clone(),
            original_flight: payload.original_flight.clone(),
            rebooked_flight,
            outcome: response.outcome.clone(),
            response_time_secs: response.response_time_secs(),
            processed_at: Utc::now(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(&self.outcome, ResponseOutcome::Answered(r) if r == ACCEPT_REBOOKING)
    }
}

fn unassigned_marker(original_flight: &str) -> String {
    format!("UNASSIGNED (cancelled flight {})", original_flight)
}
