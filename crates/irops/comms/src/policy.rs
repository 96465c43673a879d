//! Simulated passenger decision policies.
//!
//! The broker treats the answer as an opaque label; these policies only
//! decide which label a simulated passenger gives.

use irops_types::{Proposal, ACCEPT_REBOOKING, MANUAL_REBOOKING};
use rand::{Rng, RngCore};

/// Produces the passenger's answer to a proposal.
pub trait ResponsePolicy: Send + Sync {
    fn respond(&self, proposal: &Proposal, rng: &mut dyn RngCore) -> String;
}

/// Acceptance odds depend on what the message says.
///
/// Cancellations are accepted 80% of the time, delays 60%, anything else
/// 75%. Passengers who do not accept ask for a human agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentAwarePolicy;

impl ContentAwarePolicy {
    pub fn acceptance_probability(message: &str) -> f64 {
        let message = message.to_lowercase();
        if message.contains("cancelled") || message.contains("cancellation") {
            0.8
        } else if message.contains("delay") {
            0.6
        } else {
            0.75
        }
    }
}

impl ResponsePolicy for ContentAwarePolicy {
    fn respond(&self, proposal: &Proposal, rng: &mut dyn RngCore) -> String {
        let p = Self::acceptance_probability(&proposal.payload.message);
        if rng.gen_bool(p) {
            ACCEPT_REBOOKING.to_string()
        } else {
            MANUAL_REBOOKING.to_string()
        }
    }
}

/// Always answers with the same label.
#[derive(Debug, Clone)]
pub struct FixedResponsePolicy {
    response: String,
}

impl FixedResponsePolicy {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    pub fn accept() -> Self {
        Self::new(ACCEPT_REBOOKING)
    }
}

impl ResponsePolicy for FixedResponsePolicy {
    fn respond(&self, _proposal: &Proposal, _rng: &mut dyn RngCore) -> String {
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irops_types::{OutboundProposal, ProposalPayload};
    use rand::{rngs::StdRng, SeedableRng};

    fn proposal(message: &str) -> Proposal {
        Proposal::accept(OutboundProposal::new(
            "PAX001",
            ProposalPayload {
                message: message.to_string(),
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_acceptance_probability_by_content() {
        assert_eq!(
            ContentAwarePolicy::acceptance_probability("Your flight has been CANCELLED"),
            0.8
        );
        assert_eq!(
            ContentAwarePolicy::acceptance_probability("Your flight has been delayed by 2 hours"),
            0.6
        );
        assert_eq!(
            ContentAwarePolicy::acceptance_probability("We have a new option"),
            0.75
        );
    }

    #[test]
    fn test_content_aware_answers_are_known_labels() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = proposal("Your flight has been cancelled");
        let mut accepted = 0;
        for _ in 0..1_000 {
            let answer = ContentAwarePolicy.respond(&p, &mut rng);
            assert!(answer == ACCEPT_REBOOKING || answer == MANUAL_REBOOKING);
            if answer == ACCEPT_REBOOKING {
                accepted += 1;
            }
        }
        // 80% nominal
        assert!((700..900).contains(&accepted), "accepted = {}", accepted);
    }

    #[test]
    fn test_fixed_policy() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = FixedResponsePolicy::new("decline");
        assert_eq!(policy.respond(&proposal(""), &mut rng), "decline");
        assert_eq!(
            FixedResponsePolicy::accept().respond(&proposal(""), &mut rng),
            ACCEPT_REBOOKING
        );
    }
}
