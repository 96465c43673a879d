//! Execution context shared by every stage of a run.
//!
//! Stages communicate only through this record: an open JSON key/value map,
//! a chronological message log, and the warnings collected along the way.

use chrono::{DateTime, Utc};
use irops_types::StageId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StageError, WorkflowWarning};

/// Context keys used by the built-in stages
pub mod keys {
    pub const WEATHER_CODES: &str = "weather_codes";
    pub const DISPATCH_STATUS: &str = "dispatch_status";
    pub const CREW_SUBSTITUTIONS: &str = "crew_substitutions";
    pub const CANCELLED_FLIGHT: &str = "cancelled_flight";
    pub const IMPACTED_PASSENGERS: &str = "impacted_passengers";
    pub const REBOOKING_PROPOSALS: &str = "rebooking_proposals";
    pub const CONFIRMATIONS: &str = "confirmations";
    pub const DATABASE_UPDATE: &str = "database_update";
    pub const FINAL_SUMMARY: &str = "final_summary";
}

/// One entry in the run's message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageId>,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Mutable record passed `&mut` through every stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    values: Map<String, Value>,
    messages: Vec<ContextMessage>,
    warnings: Vec<WorkflowWarning>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value before the run starts.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    // ── Values ───────────────────────────────────────────────────────

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Typed read. `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.values
            .get(key)
            .map(|v| T::deserialize(v))
            .transpose()
    }

    /// Typed read of a value the caller cannot proceed without.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, StageError> {
        self.get(key)?
            .ok_or_else(|| StageError::MissingInput(key.to_string()))
    }

    pub fn set<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    /// Append items to the array stored under `key`, creating it if needed.
    ///
    /// A non-array value under `key` is replaced.
    pub fn extend<T, I>(&mut self, key: &str, items: I) -> Result<usize, serde_json::Error>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut appended = Vec::new();
        for item in items {
            appended.push(serde_json::to_value(item)?);
        }

        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }

        match entry {
            Value::Array(list) => {
                list.extend(appended);
                Ok(list.len())
            }
            _ => Ok(0),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    // ── Log ──────────────────────────────────────────────────────────

    pub fn log(&mut self, stage: Option<StageId>, text: impl Into<String>) {
        self.messages.push(ContextMessage {
            stage,
            text: text.into(),
            at: Utc::now(),
        });
    }

    pub fn messages(&self) -> &[ContextMessage] {
        &self.messages
    }

    pub fn warn(&mut self, warning: WorkflowWarning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[WorkflowWarning] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_roundtrip() {
        let mut ctx = ExecutionContext::new();
        ctx.set(keys::DISPATCH_STATUS, &"ready").unwrap();
        let status: Option<String> = ctx.get(keys::DISPATCH_STATUS).unwrap();
        assert_eq!(status.as_deref(), Some("ready"));
        assert!(ctx.get::<String>("absent").unwrap().is_none());
    }

    #[test]
    fn test_require_missing() {
        let ctx = ExecutionContext::new();
        let err = ctx.require::<Vec<String>>(keys::REBOOKING_PROPOSALS).unwrap_err();
        assert!(matches!(err, StageError::MissingInput(k) if k == keys::REBOOKING_PROPOSALS));
    }

    #[test]
    fn test_require_wrong_shape() {
        let ctx = ExecutionContext::new().with_value(keys::REBOOKING_PROPOSALS, json!("oops"));
        let err = ctx.require::<Vec<String>>(keys::REBOOKING_PROPOSALS).unwrap_err();
        assert!(matches!(err, StageError::Context(_)));
    }

    #[test]
    fn test_extend_accumulates() {
        let mut ctx = ExecutionContext::new();
        assert_eq!(ctx.extend(keys::CONFIRMATIONS, [1, 2]).unwrap(), 2);
        assert_eq!(ctx.extend(keys::CONFIRMATIONS, [3]).unwrap(), 3);
        assert_eq!(ctx.raw(keys::CONFIRMATIONS), Some(&json!([1, 2, 3])));

        ctx.set("scalar", &5).unwrap();
        assert_eq!(ctx.extend("scalar", ["a"]).unwrap(), 1);
    }

    #[test]
    fn test_log_and_warnings() {
        let mut ctx = ExecutionContext::new();
        ctx.log(Some(StageId::Dispatch), "Dispatch ready");
        ctx.warn(WorkflowWarning::MaxIterationsExceeded { budget: 10 });
        assert_eq!(ctx.messages().len(), 1);
        assert_eq!(ctx.messages()[0].stage, Some(StageId::Dispatch));
        assert_eq!(ctx.warnings().len(), 1);
    }
}
