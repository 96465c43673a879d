//! Workflow driver.
//!
//! Plans a run with the [`StageRouter`], then executes each stage through the
//! registry in order. A stage that fails is retried in place; the cursor
//! only moves once the stage succeeds or the failure policy gives up on it.

use std::time::Instant;

use irops_router::{format_sequence, StageRouter};
use irops_types::{ConditionSnapshot, NextStage, StageId, WorkflowRun};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::context::ExecutionContext;
use crate::error::{RuntimeError, RuntimeResult, WorkflowWarning};
use crate::executor::StageRegistry;

/// What to do with a stage that keeps failing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and return the error
    Abort,
    /// Record a flag for the summary stage and move on
    #[default]
    FlagAndContinue,
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Attempts per stage, including the first
    #[serde(default = "default_max_stage_attempts")]
    pub max_stage_attempts: u32,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_stage_attempts: default_max_stage_attempts(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_max_stage_attempts() -> u32 {
    2
}

/// How one step of the sequence ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Flagged { reason: String },
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExecution {
    pub step: usize,
    pub stage: StageId,
    pub attempts: u32,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// Result of driving a run to the end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run: WorkflowRun,
    pub executions: Vec<StageExecution>,
    pub warnings: Vec<WorkflowWarning>,
}

impl WorkflowReport {
    pub fn executed_stages(&self) -> Vec<StageId> {
        self.executions.iter().map(|e| e.stage).collect()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &StageExecution> {
        self.executions
            .iter()
            .filter(|e| matches!(e.outcome, StageOutcome::Flagged { .. }))
    }
}

/// Executes planned runs against a stage registry
pub struct WorkflowDriver {
    router: StageRouter,
    registry: StageRegistry,
    config: DriverConfig,
}

impl WorkflowDriver {
    pub fn new(registry: StageRegistry, config: DriverConfig) -> Self {
        Self {
            router: StageRouter::new(),
            registry,
            config,
        }
    }

    pub fn router(&self) -> &StageRouter {
        &self.router
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Plan a run for `snapshot` and drive it to the end.
    #[instrument(skip(self, ctx), fields(
        weather = snapshot.has_weather_alert,
        crew = snapshot.has_crew_schedule,
        cancellation = snapshot.has_cancellation,
    ))]
    pub async fn run(
        &self,
        snapshot: ConditionSnapshot,
        ctx: &mut ExecutionContext,
    ) -> RuntimeResult<WorkflowReport> {
        let run = self.router.plan(&snapshot);
        ctx.log(
            None,
            format!("Initial analysis: {}", snapshot.analysis_summary()),
        );
        ctx.log(None, format!("Routing: {}", run.routing_logic));
        self.drive(run, ctx).await
    }

    /// Drive an already planned run from its current step to the end.
    pub async fn drive(
        &self,
        mut run: WorkflowRun,
        ctx: &mut ExecutionContext,
    ) -> RuntimeResult<WorkflowReport> {
        if let Some(stage) = self.registry.missing(run.remaining()).into_iter().next() {
            return Err(RuntimeError::StageNotRegistered(stage));
        }

        info!(
            run_id = %run.run_id,
            sequence = %format_sequence(run.sequence()),
            "Workflow run started"
        );

        let max_attempts = self.config.max_stage_attempts.max(1);
        let mut executions = Vec::new();

        while let NextStage::Stage(stage) = self.router.next(&run) {
            let executor = self
                .registry
                .get(stage)
                .ok_or(RuntimeError::StageNotRegistered(stage))?;
            let step = run.current_step();
            let started = Instant::now();

            let mut attempts = 0;
            let mut failure = None;
            while attempts < max_attempts {
                attempts += 1;
                debug!(stage = %stage, step, attempt = attempts, "Executing stage");
                match executor.execute(ctx).await {
                    Ok(()) => {
                        failure = None;
                        break;
                    }
                    Err(err) => {
                        warn!(stage = %stage, attempt = attempts, error = %err, "Stage failed");
                        failure = Some(err.to_string());
                    }
                }
            }

            let outcome = match failure {
                None => {
                    ctx.log(Some(stage), format!("Stage {} completed", stage));
                    StageOutcome::Succeeded
                }
                Some(reason) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        warn!(run_id = %run.run_id, stage = %stage, "Aborting workflow run");
                        return Err(RuntimeError::StageFailed {
                            stage,
                            attempts,
                            reason,
                        });
                    }
                    FailurePolicy::FlagAndContinue => {
                        warn!(stage = %stage, attempts, "Stage flagged, continuing");
                        ctx.warn(WorkflowWarning::StageFlagged {
                            stage,
                            reason: reason.clone(),
                        });
                        ctx.log(
                            Some(stage),
                            format!(
                                "Stage {} flagged after {} attempt(s): {}",
                                stage, attempts, reason
                            ),
                        );
                        StageOutcome::Flagged { reason }
                    }
                },
            };

            executions.push(StageExecution {
                step,
                stage,
                attempts,
                outcome,
                duration_ms: started.elapsed().as_millis() as u64,
            });
            self.router.advance(&mut run);
        }

        info!(
            run_id = %run.run_id,
            steps = executions.len(),
            warnings = ctx.warnings().len(),
            "Workflow run finished"
        );

        Ok(WorkflowReport {
            run,
            executions,
            warnings: ctx.warnings().to_vec(),
        })
    }
}
