//! Stage identifiers and the condition snapshot used for routing

use serde::{Deserialize, Serialize};

/// Weather codes that raise a weather alert (thunderstorm, fog, snow)
pub const HAZARD_WEATHER_CODES: [&str; 3] = ["TS", "FG", "SN"];

// ── Stage Identifier ─────────────────────────────────────────────────

/// One named unit of work in a workflow run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Dispatch readiness (weather, fuel, crew legality roll-up)
    Dispatch,
    /// Crew compliance and substitution
    Crew,
    /// Passenger rebooking proposals
    Rebooking,
    /// Passenger confirmation through the communications broker
    Confirmation,
    /// Passenger record update
    DatabaseUpdate,
    /// Executive summary
    Summary,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::Dispatch,
        StageId::Crew,
        StageId::Rebooking,
        StageId::Confirmation,
        StageId::DatabaseUpdate,
        StageId::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Dispatch => "dispatch",
            StageId::Crew => "crew",
            StageId::Rebooking => "rebooking",
            StageId::Confirmation => "confirmation",
            StageId::DatabaseUpdate => "database_update",
            StageId::Summary => "summary",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

// ── Condition Snapshot ───────────────────────────────────────────────

/// Read-only view of the disruption signals at workflow start
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    pub has_weather_alert: bool,
    pub has_crew_schedule: bool,
    pub has_cancellation: bool,
}

impl ConditionSnapshot {
    pub fn new(has_weather_alert: bool, has_crew_schedule: bool, has_cancellation: bool) -> Self {
        Self {
            has_weather_alert,
            has_crew_schedule,
            has_cancellation,
        }
    }

    /// Build a snapshot from raw observations.
    ///
    /// A weather alert is raised when any departure weather code is in
    /// [`HAZARD_WEATHER_CODES`].
    pub fn from_observations<S: AsRef<str>>(
        weather_codes: &[S],
        has_crew_schedule: bool,
        has_cancellation: bool,
    ) -> Self {
        let has_weather_alert = weather_codes
            .iter()
            .any(|code| HAZARD_WEATHER_CODES.contains(&code.as_ref().trim()));
        Self::new(has_weather_alert, has_crew_schedule, has_cancellation)
    }

    /// Issues that need attention, highest priority first
    pub fn priority_issues(&self) -> Vec<&'static str> {
        let mut issues = Vec::new();
        if self.has_weather_alert {
            issues.push("Weather alert detected");
        }
        if self.has_crew_schedule {
            issues.push("Crew schedule provided for analysis");
        }
        if self.has_cancellation {
            issues.push("Flight cancellation detected");
        }
        issues
    }

    /// One-sentence assessment of what should happen first
    pub fn analysis_summary(&self) -> &'static str {
        if self.has_weather_alert {
            "Weather alert detected - dispatch should assess weather first, then crew issues"
        } else if self.has_crew_schedule {
            "Crew issues detected - crew ops should address FAA compliance"
        } else if self.has_cancellation {
            "Flight cancellation detected - passenger rebooking needed"
        } else {
            "No specific issues detected - default to a minimal dispatch assessment"
        }
    }

    /// Every combination of the three signals
    pub fn all_combinations() -> Vec<ConditionSnapshot> {
        let mut all = Vec::with_capacity(8);
        for weather in [false, true] {
            for crew in [false, true] {
                for cancellation in [false, true] {
                    all.push(ConditionSnapshot::new(weather, crew, cancellation));
                }
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_alert_from_hazard_codes() {
        let snap = ConditionSnapshot::from_observations(&["TS", "FG"], false, false);
        assert!(snap.has_weather_alert);

        let clear = ConditionSnapshot::from_observations(&["SKC"], true, false);
        assert!(!clear.has_weather_alert);
        assert!(clear.has_crew_schedule);

        let empty: [&str; 0] = [];
        assert!(!ConditionSnapshot::from_observations(&empty, false, false).has_weather_alert);
    }

    #[test]
    fn test_stage_round_trip_through_str() {
        for stage in StageId::ALL {
            assert_eq!(stage.as_str().parse::<StageId>().unwrap(), stage);
        }
        assert!("planner".parse::<StageId>().is_err());
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&StageId::DatabaseUpdate).unwrap();
        assert_eq!(json, "\"database_update\"");
    }

    #[test]
    fn test_priority_issues_and_summary() {
        let snap = ConditionSnapshot::new(true, true, true);
        assert_eq!(snap.priority_issues().len(), 3);
        assert!(snap.analysis_summary().starts_with("Weather alert"));

        let snap = ConditionSnapshot::new(false, false, true);
        assert_eq!(snap.priority_issues(), vec!["Flight cancellation detected"]);
        assert!(snap.analysis_summary().contains("rebooking"));
    }

    #[test]
    fn test_all_combinations_is_exhaustive() {
        let all = ConditionSnapshot::all_combinations();
        assert_eq!(all.len(), 8);
        let unique: std::collections::HashSet<_> = all.into_iter().collect();
        assert_eq!(unique.len(), 8);
    }
}
