//! Broker and collector configuration.
//!
//! Durations are kept as milliseconds so the structs load cleanly from
//! files and environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CommsError, CommsResult};

/// Configuration for the communications broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Shortest simulated passenger think-time.
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Longest simulated passenger think-time.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Worker back-off when the queue is empty.
    #[serde(default = "default_idle_interval")]
    pub idle_interval_ms: u64,

    /// Fixed RNG seed for reproducible pick order and responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            idle_interval_ms: default_idle_interval(),
            seed: None,
        }
    }
}

impl BrokerConfig {
    /// Responses without think-time (tests, local demos).
    pub fn instant() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            idle_interval_ms: 10,
            seed: None,
        }
    }

    /// Fixed think-time for every proposal.
    pub fn fixed_delay(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            min_delay_ms: ms,
            max_delay_ms: ms,
            ..Self::instant()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn validate(&self) -> CommsResult<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(CommsError::InvalidConfig(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if self.idle_interval_ms == 0 {
            return Err(CommsError::InvalidConfig(
                "idle_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for confirmation collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Records released per full batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Poll attempts before collection is forced to complete. The default
    /// covers a dozen passengers at the longest default think-time.
    #[serde(default = "default_max_poll_iterations")]
    pub max_poll_iterations: u32,

    /// Pause between polls. Zero polls in a tight loop.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_poll_iterations: default_max_poll_iterations(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> CommsResult<()> {
        if self.batch_size == 0 {
            return Err(CommsError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn budget(&self) -> PollBudget {
        PollBudget::new(
            self.max_poll_iterations,
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

/// Bound on how long a collection loop may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_iterations: u32,
    pub pacing: Duration,
}

impl PollBudget {
    pub fn new(max_iterations: u32, pacing: Duration) -> Self {
        Self {
            max_iterations,
            pacing,
        }
    }

    /// Tight loop with no pacing.
    pub fn iterations(max_iterations: u32) -> Self {
        Self::new(max_iterations, Duration::ZERO)
    }
}

// Default value helpers
fn default_min_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_idle_interval() -> u64 {
    500
}

fn default_batch_size() -> usize {
    5
}

fn default_max_poll_iterations() -> u32 {
    2_000
}

fn default_poll_interval() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.min_delay_ms, 1_000);
        assert_eq!(config.max_delay_ms, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_delay_rejected() {
        let config = BrokerConfig {
            min_delay_ms: 5,
            max_delay_ms: 1,
            ..BrokerConfig::instant()
        };
        assert!(matches!(config.validate(), Err(CommsError::InvalidConfig(_))));
    }

    #[test]
    fn test_fixed_delay() {
        let config = BrokerConfig::fixed_delay(Duration::from_millis(250)).with_seed(7);
        assert_eq!(config.min_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 250);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_collector_defaults_and_budget() {
        let config = CollectorConfig::default();
        assert_eq!(config.batch_size, 5);
        let budget = config.budget();
        assert_eq!(budget.max_iterations, 2_000);
        assert_eq!(budget.pacing, Duration::from_millis(100));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = CollectorConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
