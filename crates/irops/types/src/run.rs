//! Workflow runs: one execution of a precomputed stage sequence

use crate::{RunId, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the router says runs next
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStage {
    Stage(StageId),
    End,
}

/// One execution of the stage sequence.
///
/// `current_step` only moves forward and never passes `sequence.len()`;
/// `complete` is true exactly when it equals `sequence.len()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: RunId,
    sequence: Vec<StageId>,
    current_step: usize,
    complete: bool,
    /// Human-readable rationale for the chosen sequence
    pub routing_logic: String,
    pub created_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn new(sequence: Vec<StageId>, routing_logic: impl Into<String>) -> Self {
        let complete = sequence.is_empty();
        Self {
            run_id: RunId::generate(),
            sequence,
            current_step: 0,
            complete,
            routing_logic: routing_logic.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn sequence(&self) -> &[StageId] {
        &self.sequence
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Stages not yet executed
    pub fn remaining(&self) -> &[StageId] {
        &self.sequence[self.current_step..]
    }

    /// The stage at the cursor, or `End`. Does not mutate.
    pub fn next_stage(&self) -> NextStage {
        match self.sequence.get(self.current_step) {
            Some(stage) => NextStage::Stage(*stage),
            None => NextStage::End,
        }
    }

    /// Move the cursor past the current stage. No-op once complete.
    pub fn advance(&mut self) -> bool {
        if self.complete {
            return false;
        }
        self.current_step += 1;
        self.complete = self.current_step == self.sequence.len();
        true
    }

    /// Jump straight to the end (used when a run is aborted or forced)
    pub fn finish(&mut self) {
        self.current_step = self.sequence.len();
        self.complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_to_end() {
        let mut run = WorkflowRun::new(vec![StageId::Dispatch, StageId::Summary], "test");
        assert_eq!(run.next_stage(), NextStage::Stage(StageId::Dispatch));
        assert!(run.advance());
        assert_eq!(run.next_stage(), NextStage::Stage(StageId::Summary));
        assert!(!run.is_complete());
        assert!(run.advance());
        assert!(run.is_complete());
        assert_eq!(run.next_stage(), NextStage::End);
    }

    #[test]
    fn test_advance_past_end_is_noop() {
        let mut run = WorkflowRun::new(vec![StageId::Summary], "test");
        run.advance();
        assert!(!run.advance());
        assert_eq!(run.current_step(), 1);
        assert_eq!(run.next_stage(), NextStage::End);
    }

    #[test]
    fn test_next_does_not_mutate() {
        let run = WorkflowRun::new(vec![StageId::Crew, StageId::Dispatch], "test");
        let before = run.clone();
        let _ = run.next_stage();
        let _ = run.next_stage();
        assert_eq!(run, before);
    }

    #[test]
    fn test_empty_sequence_is_complete() {
        let run = WorkflowRun::new(Vec::new(), "empty");
        assert!(run.is_complete());
        assert_eq!(run.next_stage(), NextStage::End);
    }

    #[test]
    fn test_finish_and_remaining() {
        let mut run = WorkflowRun::new(
            vec![StageId::Dispatch, StageId::Crew, StageId::Dispatch, StageId::Summary],
            "test",
        );
        run.advance();
        assert_eq!(run.remaining(), &[StageId::Crew, StageId::Dispatch, StageId::Summary]);
        run.finish();
        assert!(run.is_complete());
        assert!(run.remaining().is_empty());
    }
}
