//! Configuration for the IROPS runtime

use irops_comms::{BrokerConfig, CollectorConfig};
use serde::{Deserialize, Serialize};

use crate::driver::DriverConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Communications broker
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Confirmation collection
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Workflow driver
    #[serde(default)]
    pub driver: DriverConfig,

    /// Simulated stage behaviour (irops-sim)
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulated stage behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Chance that the rebooking stage finds a seat for a passenger
    #[serde(default = "default_seat_availability")]
    pub seat_availability: f64,

    /// Fixed seed for the simulated stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seat_availability: default_seat_availability(),
            seed: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_seat_availability() -> f64 {
    0.9
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RuntimeConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `IROPS_`-prefixed environment variables (`IROPS_BROKER__MAX_DELAY_MS`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RuntimeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("IROPS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Fast settings for demos: short think-times and tight polling.
    pub fn demo() -> Self {
        Self {
            broker: BrokerConfig {
                min_delay_ms: 50,
                max_delay_ms: 400,
                idle_interval_ms: 20,
                seed: None,
            },
            collector: CollectorConfig {
                poll_interval_ms: 25,
                ..CollectorConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        self.broker
            .validate()
            .and_then(|_| self.collector.validate())
            .map_err(|e| RuntimeError::Config(e.to_string()))?;

        if !(0.0..=1.0).contains(&self.simulation.seat_availability) {
            return Err(RuntimeError::Config(format!(
                "seat_availability must be within 0..=1, got {}",
                self.simulation.seat_availability
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FailurePolicy;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.broker.max_delay_ms, 10_000);
        assert_eq!(config.collector.batch_size, 5);
        assert_eq!(config.driver.failure_policy, FailurePolicy::FlagAndContinue);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = RuntimeConfig::load(None).unwrap();
        assert_eq!(config.collector.max_poll_iterations, 2_000);
        assert_eq!(config.driver.max_stage_attempts, 2);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let raw = r#"{
            "broker": {"max_delay_ms": 2000},
            "driver": {"failure_policy": "abort"}
        }"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.broker.min_delay_ms, 1_000);
        assert_eq!(config.broker.max_delay_ms, 2_000);
        assert_eq!(config.driver.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_invalid_seat_availability() {
        let mut config = RuntimeConfig::demo();
        config.simulation.seat_availability = 1.5;
        assert!(matches!(config.validate(), Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_invalid_broker_delay() {
        let mut config = RuntimeConfig::default();
        config.broker.min_delay_ms = 20_000;
        assert!(config.validate().is_err());
    }
}
