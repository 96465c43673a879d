//! Simulated disruption scenarios and rule-based stage executors.
//!
//! These stand in for the real decision tools so the coordination core can be
//! run end to end: `irops-sim` uses them, and so do the integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use irops_comms::{CollectorConfig, CommsBroker};
use irops_types::{
    ConditionSnapshot, ConfirmationRecord, RebookingProposal, StageId, HAZARD_WEATHER_CODES,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::confirmation::{confirmations, ConfirmationStage};
use crate::config::SimulationConfig;
use crate::context::{keys, ExecutionContext};
use crate::error::{StageError, WorkflowWarning};
use crate::executor::{StageExecutor, StageRegistry};

// ── Scenarios ────────────────────────────────────────────────────────

/// Canned disruption scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Thunderstorms plus crew schedule problems
    WeatherCrew,
    Weather,
    Crew,
    /// A cancelled flight with passengers to rebook
    Cancellation,
    /// Nothing reported
    Clear,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::WeatherCrew,
        Scenario::Weather,
        Scenario::Crew,
        Scenario::Cancellation,
        Scenario::Clear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::WeatherCrew => "weather-crew",
            Scenario::Weather => "weather",
            Scenario::Crew => "crew",
            Scenario::Cancellation => "cancellation",
            Scenario::Clear => "clear",
        }
    }

    pub fn weather_codes(&self) -> Vec<String> {
        match self {
            Scenario::WeatherCrew | Scenario::Weather => vec!["TS".into(), "BR".into()],
            _ => vec!["CLR".into()],
        }
    }

    pub fn has_crew_schedule(&self) -> bool {
        matches!(self, Scenario::WeatherCrew | Scenario::Crew)
    }

    pub fn cancelled_flight(&self) -> Option<&'static str> {
        matches!(self, Scenario::Cancellation).then_some("UA100")
    }

    pub fn snapshot(&self) -> ConditionSnapshot {
        ConditionSnapshot::from_observations(
            &self.weather_codes(),
            self.has_crew_schedule(),
            self.cancelled_flight().is_some(),
        )
    }

    /// Initial context: observations plus `passengers` impacted passengers
    /// when a flight was cancelled.
    pub fn seed_context(&self, passengers: usize) -> Result<ExecutionContext, serde_json::Error> {
        let mut ctx = ExecutionContext::new();
        ctx.set(keys::WEATHER_CODES, &self.weather_codes())?;
        if let Some(flight) = self.cancelled_flight() {
            ctx.set(keys::CANCELLED_FLIGHT, &flight)?;
            ctx.set(keys::IMPACTED_PASSENGERS, &impacted_passengers(flight, passengers))?;
        }
        Ok(ctx)
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Scenario::ALL.iter().map(Scenario::as_str).collect();
                format!("unknown scenario '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// A passenger booked on a cancelled flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedPassenger {
    pub passenger_id: String,
    pub name: String,
    pub flight: String,
    pub departure_location: String,
    pub arrival_location: String,
}

const PASSENGER_NAMES: [&str; 8] = [
    "Alice Johnson",
    "Bob Smith",
    "Carol Davis",
    "David Wilson",
    "Eva Martinez",
    "Frank Brown",
    "Grace Lee",
    "Henry Taylor",
];

fn impacted_passengers(flight: &str, count: usize) -> Vec<ImpactedPassenger> {
    (0..count)
        .map(|n| ImpactedPassenger {
            passenger_id: format!("PAX{:03}", n + 1),
            name: PASSENGER_NAMES[n % PASSENGER_NAMES.len()].to_string(),
            flight: flight.to_string(),
            departure_location: "JFK".to_string(),
            arrival_location: "ORD".to_string(),
        })
        .collect()
}

// ── Executors ────────────────────────────────────────────────────────

/// Dispatch readiness from weather codes and crew substitutions
pub struct SimulatedDispatch;

#[async_trait]
impl StageExecutor for SimulatedDispatch {
    fn stage(&self) -> StageId {
        StageId::Dispatch
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError> {
        let codes: Vec<String> = ctx.get(keys::WEATHER_CODES)?.unwrap_or_default();
        let hazards: Vec<&str> = codes
            .iter()
            .map(String::as_str)
            .filter(|c| HAZARD_WEATHER_CODES.contains(c))
            .collect();
        let crew_resolved = ctx.contains(keys::CREW_SUBSTITUTIONS);
        let second_pass = ctx.contains(keys::DISPATCH_STATUS);

        let status = if hazards.is_empty() { "ready" } else { "hold" };
        ctx.set(
            keys::DISPATCH_STATUS,
            &json!({
                "status": status,
                "hazards": hazards,
                "crew_resolved": crew_resolved,
            }),
        )?;

        let text = if second_pass {
            format!("Dispatch re-evaluated readiness: {}", status)
        } else if hazards.is_empty() {
            "Dispatch: no hazardous weather, flight ready".to_string()
        } else {
            format!("Dispatch: hazardous weather ({}), holding", hazards.join(", "))
        };
        ctx.log(Some(StageId::Dispatch), text);
        Ok(())
    }
}

/// Crew legality check with a fixed substitution
pub struct SimulatedCrew;

#[async_trait]
impl StageExecutor for SimulatedCrew {
    fn stage(&self) -> StageId {
        StageId::Crew
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError> {
        let substitutions = json!([
            {
                "role": "first_officer",
                "out": "FO-117",
                "in": "FO-204",
                "reason": "duty time exceeded"
            }
        ]);
        ctx.set(keys::CREW_SUBSTITUTIONS, &substitutions)?;
        ctx.log(
            Some(StageId::Crew),
            "Crew ops: 1 substitution made to stay within FAA duty limits",
        );
        Ok(())
    }
}

/// Rebooks impacted passengers, finding a seat with a fixed probability
pub struct SimulatedRebooking {
    seat_availability: f64,
    seed: Option<u64>,
}

impl SimulatedRebooking {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            seat_availability: config.seat_availability.clamp(0.0, 1.0),
            seed: config.seed,
        }
    }
}

#[async_trait]
impl StageExecutor for SimulatedRebooking {
    fn stage(&self) -> StageId {
        StageId::Rebooking
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError> {
        let passengers: Vec<ImpactedPassenger> = ctx.require(keys::IMPACTED_PASSENGERS)?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let proposals: Vec<RebookingProposal> = passengers
            .into_iter()
            .enumerate()
            .map(|(n, p)| RebookingProposal {
                passenger_id: p.passenger_id,
                passenger_name: Some(p.name),
                rebooked_flight: format!("UA{}", 200 + (n % 3) * 2),
                original_flight: p.flight,
                departure_location: p.departure_location,
                arrival_location: p.arrival_location,
                assignment_successful: rng.gen_bool(self.seat_availability),
            })
            .collect();

        let seated = proposals.iter().filter(|p| p.assignment_successful).count();
        ctx.set(keys::REBOOKING_PROPOSALS, &proposals)?;
        ctx.log(
            Some(StageId::Rebooking),
            format!(
                "Rebooking: seats found for {} of {} passenger(s)",
                seated,
                proposals.len()
            ),
        );
        Ok(())
    }
}

/// Summarises the confirmations that would be written to the passenger store
pub struct SimulatedDatabaseUpdate;

#[async_trait]
impl StageExecutor for SimulatedDatabaseUpdate {
    fn stage(&self) -> StageId {
        StageId::DatabaseUpdate
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError> {
        let records: Vec<ConfirmationRecord> = confirmations(ctx)?;
        let accepted = records.iter().filter(|r| r.is_accepted()).count();

        ctx.set(
            keys::DATABASE_UPDATE,
            &json!({
                "updated": records.len(),
                "confirmed": accepted,
                "unassigned": records.len() - accepted,
            }),
        )?;
        ctx.log(
            Some(StageId::DatabaseUpdate),
            format!(
                "Passenger records updated: {} confirmed, {} unassigned",
                accepted,
                records.len() - accepted
            ),
        );
        Ok(())
    }
}

/// Closing summary of everything recorded in the context
pub struct SimulatedSummary;

#[async_trait]
impl StageExecutor for SimulatedSummary {
    fn stage(&self) -> StageId {
        StageId::Summary
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError> {
        let mut lines = Vec::new();

        if let Some(dispatch) = ctx.raw(keys::DISPATCH_STATUS) {
            lines.push(format!("Dispatch: {}", dispatch["status"].as_str().unwrap_or("unknown")));
        }
        if ctx.contains(keys::CREW_SUBSTITUTIONS) {
            lines.push("Crew: substitutions applied".to_string());
        }
        let records = confirmations(ctx)?;
        if !records.is_empty() {
            let accepted = records.iter().filter(|r| r.is_accepted()).count();
            lines.push(format!(
                "Passengers: {} confirmed, {} referred to an agent",
                accepted,
                records.len() - accepted
            ));
        }
        for warning in ctx.warnings() {
            let prefix = match warning {
                WorkflowWarning::StageFlagged { .. } => "Flag",
                WorkflowWarning::MaxIterationsExceeded { .. } => "Warning",
            };
            lines.push(format!("{}: {}", prefix, warning));
        }

        ctx.set(keys::FINAL_SUMMARY, &lines)?;
        ctx.log(Some(StageId::Summary), lines.join("; "));
        Ok(())
    }
}

/// Registry with a simulated executor for every stage
pub fn simulated_registry(
    broker: Arc<CommsBroker>,
    collector: CollectorConfig,
    simulation: &SimulationConfig,
) -> StageRegistry {
    StageRegistry::new()
        .with(Arc::new(SimulatedDispatch))
        .with(Arc::new(SimulatedCrew))
        .with(Arc::new(SimulatedRebooking::new(simulation)))
        .with(Arc::new(ConfirmationStage::new(broker, collector)))
        .with(Arc::new(SimulatedDatabaseUpdate))
        .with(Arc::new(SimulatedSummary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_snapshots() {
        assert_eq!(Scenario::WeatherCrew.snapshot(), ConditionSnapshot::new(true, true, false));
        assert_eq!(Scenario::Weather.snapshot(), ConditionSnapshot::new(true, false, false));
        assert_eq!(Scenario::Crew.snapshot(), ConditionSnapshot::new(false, true, false));
        assert_eq!(Scenario::Cancellation.snapshot(), ConditionSnapshot::new(false, false, true));
        assert_eq!(Scenario::Clear.snapshot(), ConditionSnapshot::default());
    }

    #[test]
    fn test_scenario_parse() {
        assert_eq!("weather-crew".parse::<Scenario>(), Ok(Scenario::WeatherCrew));
        assert!("hurricane".parse::<Scenario>().unwrap_err().contains("cancellation"));
    }

    #[test]
    fn test_seed_context_only_lists_passengers_on_cancellation() {
        let ctx = Scenario::Cancellation.seed_context(3).unwrap();
        let passengers: Vec<ImpactedPassenger> = ctx.require(keys::IMPACTED_PASSENGERS).unwrap();
        assert_eq!(passengers.len(), 3);
        assert_eq!(passengers[0].passenger_id, "PAX001");

        let ctx = Scenario::Weather.seed_context(3).unwrap();
        assert!(!ctx.contains(keys::IMPACTED_PASSENGERS));
    }

    #[tokio::test]
    async fn test_dispatch_holds_for_hazards_then_reevaluates() {
        let mut ctx = Scenario::WeatherCrew.seed_context(0).unwrap();
        SimulatedDispatch.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.raw(keys::DISPATCH_STATUS).unwrap()["status"], "hold");

        SimulatedCrew.execute(&mut ctx).await.unwrap();
        SimulatedDispatch.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.raw(keys::DISPATCH_STATUS).unwrap()["crew_resolved"], true);
        assert!(ctx.messages().last().unwrap().text.contains("re-evaluated"));
    }

    #[tokio::test]
    async fn test_rebooking_requires_passengers() {
        let stage = SimulatedRebooking::new(&SimulationConfig::default());
        let mut ctx = ExecutionContext::new();
        assert!(matches!(
            stage.execute(&mut ctx).await,
            Err(StageError::MissingInput(_))
        ));
    }

    #[tokio::test]
    async fn test_rebooking_with_no_seats() {
        let stage = SimulatedRebooking::new(&SimulationConfig {
            seat_availability: 0.0,
            seed: Some(1),
        });
        let mut ctx = Scenario::Cancellation.seed_context(4).unwrap();
        stage.execute(&mut ctx).await.unwrap();
        let proposals: Vec<RebookingProposal> = ctx.require(keys::REBOOKING_PROPOSALS).unwrap();
        assert_eq!(proposals.len(), 4);
        assert!(proposals.iter().all(|p| !p.assignment_successful));
    }

    #[tokio::test]
    async fn test_summary_lists_flags() {
        let mut ctx = ExecutionContext::new();
        ctx.warn(WorkflowWarning::StageFlagged {
            stage: StageId::Crew,
            reason: "roster service unavailable".into(),
        });
        SimulatedSummary.execute(&mut ctx).await.unwrap();
        let lines: Vec<String> = ctx.require(keys::FINAL_SUMMARY).unwrap();
        assert!(lines.iter().any(|l| l.starts_with("Flag: stage crew flagged")));
    }
}
