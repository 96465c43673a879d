//! Stage Router for IROPS workflows
//!
//! The router looks at the [`ConditionSnapshot`] taken when a disruption is
//! reported and computes, once, the ordered list of stages that must run.
//! After that it only answers "what runs next?".
//!
//! # Key Principle
//!
//! **The router plans, it never executes.** Stage implementations and the
//! retry/abort policy belong to the driver. The router cannot fail.
//!
//! # Sequences
//!
//! | weather | crew | base sequence |
//! |---|---|---|
//! | yes | yes | `dispatch → crew → dispatch` |
//! | yes | no | `dispatch` |
//! | no | yes | `crew → dispatch` |
//! | no | no | `dispatch` |
//!
//! A cancellation appends `rebooking → confirmation → database_update`, and
//! every sequence ends with `summary`. The repeated dispatch pass is baked into
//! the list: dispatch re-evaluates readiness after crew may have substituted
//! members.
//!
//! # Example
//!
//! ```rust
//! use irops_router::StageRouter;
//! use irops_types::{ConditionSnapshot, NextStage, StageId};
//!
//! let router = StageRouter::new();
//! let mut run = router.plan(&ConditionSnapshot::new(true, true, false));
//!
//! assert_eq!(router.next(&run), NextStage::Stage(StageId::Dispatch));
//! while let NextStage::Stage(_stage) = router.next(&run) {
//!     // execute the stage, then:
//!     router.advance(&mut run);
//! }
//! assert!(run.is_complete());
//! ```

#![deny(unsafe_code)]

use irops_types::{ConditionSnapshot, NextStage, StageId, WorkflowRun};

/// Plans stage sequences and tracks progress through them
#[derive(Clone, Copy, Debug, Default)]
pub struct StageRouter;

impl StageRouter {
    pub fn new() -> Self {
        Self
    }

    // ── Planning ─────────────────────────────────────────────────────

    /// Compute the ordered stage list for a snapshot
    pub fn compute_sequence(&self, snapshot: &ConditionSnapshot) -> Vec<StageId> {
        let mut sequence = match (snapshot.has_weather_alert, snapshot.has_crew_schedule) {
            (true, true) => vec![StageId::Dispatch, StageId::Crew, StageId::Dispatch],
            (true, false) => vec![StageId::Dispatch],
            (false, true) => vec![StageId::Crew, StageId::Dispatch],
            (false, false) => vec![StageId::Dispatch],
        };

        if snapshot.has_cancellation {
            sequence.extend([
                StageId::Rebooking,
                StageId::Confirmation,
                StageId::DatabaseUpdate,
            ]);
        }

        sequence.push(StageId::Summary);
        sequence
    }

    /// Human-readable explanation of the sequence chosen for a snapshot
    pub fn routing_logic(&self, snapshot: &ConditionSnapshot) -> String {
        let mut logic = match (snapshot.has_weather_alert, snapshot.has_crew_schedule) {
            (true, true) => concat!(
                "Weather alert → Dispatch assesses weather → ",
                "Crew ops addresses crew issues → Dispatch re-evaluates readiness"
            )
            .to_string(),
            (true, false) => "Weather alert → Dispatch assesses weather".to_string(),
            (false, true) => {
                "Crew issues → Crew ops addresses FAA compliance → Dispatch checks readiness"
                    .to_string()
            }
            (false, false) => "Default → Dispatch for a minimal assessment".to_string(),
        };

        if snapshot.has_cancellation {
            logic.push_str(" → Passenger rebooking for cancellations");
        }
        logic.push_str(" → Summary");
        logic
    }

    /// Create a run for a snapshot. The sequence is fixed from here on.
    pub fn plan(&self, snapshot: &ConditionSnapshot) -> WorkflowRun {
        let sequence = self.compute_sequence(snapshot);
        let run = WorkflowRun::new(sequence, self.routing_logic(snapshot));

        tracing::info!(
            run_id = %run.run_id,
            sequence = %format_sequence(run.sequence()),
            analysis = snapshot.analysis_summary(),
            "Workflow sequence planned"
        );

        run
    }

    // ── Stepping ─────────────────────────────────────────────────────

    /// The stage at the run's cursor, or `End`. Pure.
    pub fn next(&self, run: &WorkflowRun) -> NextStage {
        run.next_stage()
    }

    /// Record that the current stage finished successfully.
    ///
    /// Returns false (and changes nothing) when the run is already complete.
    pub fn advance(&self, run: &mut WorkflowRun) -> bool {
        let advanced = run.advance();
        if advanced {
            tracing::debug!(
                run_id = %run.run_id,
                step = run.current_step(),
                total = run.sequence().len(),
                "Workflow advanced"
            );
        }
        if advanced && run.is_complete() {
            tracing::info!(run_id = %run.run_id, "Workflow sequence complete");
        }
        advanced
    }
}

/// `a → b → c` rendering of a sequence
pub fn format_sequence(sequence: &[StageId]) -> String {
    sequence
        .iter()
        .map(StageId::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}
