//! Opaque identifiers

use serde::{Deserialize, Serialize};

// ── Proposal Identifier ──────────────────────────────────────────────

/// Unique identifier for a passenger proposal
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl ProposalId {
    /// Generate a new random (UUIDv4) identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short display form (first 8 chars)
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(8)
            .map_or(&self.0[..], |(end, _)| &self.0[..end])
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Run Identifier ───────────────────────────────────────────────────

/// Unique identifier for one workflow run
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ProposalId::generate();
        let b = ProposalId::generate();
        assert_ne!(a, b);
        assert_eq!(a.0.len(), 36);
    }

    #[test]
    fn test_short_form() {
        assert_eq!(ProposalId::new("abcdef0123456789").short(), "abcdef01");
        assert_eq!(ProposalId::new("abc").short(), "abc");
    }

    #[test]
    fn test_short_form_respects_char_boundaries() {
        assert_eq!(ProposalId::new("€€€").short(), "€€€");
        assert_eq!(ProposalId::new("ab€€€€€€€€").short(), "ab€€€€€€");
        assert_eq!(ProposalId::new("").short(), "");
    }
}
