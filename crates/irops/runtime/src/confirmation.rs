//! Passenger confirmation stage.
//!
//! Sends every successfully rebooked passenger a proposal through the shared
//! broker, then collects the answers in batches and appends the resulting
//! [`ConfirmationRecord`]s to the context.

use std::sync::Arc;

use async_trait::async_trait;
use irops_comms::{CollectorConfig, CommsBroker, ConfirmationCollector};
use irops_types::{ConfirmationRecord, OutboundProposal, RebookingProposal, StageId};
use tracing::{debug, info, warn};

use crate::context::{keys, ExecutionContext};
use crate::error::{StageError, WorkflowWarning};
use crate::executor::StageExecutor;

/// Executor for [`StageId::Confirmation`]
pub struct ConfirmationStage {
    broker: Arc<CommsBroker>,
    config: CollectorConfig,
}

impl ConfirmationStage {
    pub fn new(broker: Arc<CommsBroker>, config: CollectorConfig) -> Self {
        Self { broker, config }
    }
}

#[async_trait]
impl StageExecutor for ConfirmationStage {
    fn stage(&self) -> StageId {
        StageId::Confirmation
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError> {
        let proposals: Vec<RebookingProposal> =
            ctx.get(keys::REBOOKING_PROPOSALS)?.unwrap_or_default();

        if proposals.is_empty() {
            ctx.log(Some(StageId::Confirmation), "No rebooking proposals to confirm");
            return Ok(());
        }

        // answers left over from an earlier run must not be mistaken for ours
        let stale = self.broker.drain_completed().await;
        if !stale.is_empty() {
            debug!(count = stale.len(), "Discarded stale broker responses");
        }

        let mut sent = Vec::new();
        let mut skipped = 0usize;
        for proposal in &proposals {
            if !proposal.assignment_successful {
                skipped += 1;
                continue;
            }
            let outbound =
                OutboundProposal::new(proposal.passenger_id.clone(), proposal.to_payload());
            let id = self.broker.send(outbound).await?;
            debug!(
                proposal_id = %id.short(),
                passenger_id = %proposal.passenger_id,
                flight = %proposal.rebooked_flight,
                "Confirmation request sent"
            );
            sent.push(id);
        }

        info!(sent = sent.len(), skipped, "Confirmation requests sent");
        ctx.log(
            Some(StageId::Confirmation),
            format!(
                "Sent {} confirmation request(s); {} passenger(s) without a seat \
                 were not contacted",
                sent.len(),
                skipped
            ),
        );

        if sent.is_empty() {
            return Ok(());
        }

        let total = sent.len();
        let mut collector =
            ConfirmationCollector::new(self.broker.clone(), sent, self.config.batch_size);
        let report = collector.collect(self.config.budget()).await;

        for (n, batch) in report.batches.iter().enumerate() {
            ctx.extend(keys::CONFIRMATIONS, &batch.records)?;
            ctx.log(
                Some(StageId::Confirmation),
                format!(
                    "Batch {} ({}): {} confirmation(s)",
                    n + 1,
                    batch.kind,
                    batch.len()
                ),
            );
        }

        let accepted = report.records().filter(|r| r.is_accepted()).count();
        let collected = report.record_count();

        if report.forced {
            let budget = self.config.max_poll_iterations;
            warn!(
                budget,
                collected,
                total,
                "Confirmation polling budget exhausted, forcing completion"
            );
            ctx.warn(WorkflowWarning::MaxIterationsExceeded { budget });
            ctx.log(
                Some(StageId::Confirmation),
                format!(
                    "WARNING: maximum polling iterations reached; \
                     {} of {} response(s) collected, forcing completion",
                    collected, total
                ),
            );
        }

        ctx.log(
            Some(StageId::Confirmation),
            format!(
                "Confirmation complete: {} accepted, {} need an agent",
                accepted,
                collected - accepted
            ),
        );
        Ok(())
    }
}

/// Confirmation records accumulated so far in a context
pub fn confirmations(ctx: &ExecutionContext) -> Result<Vec<ConfirmationRecord>, StageError> {
    Ok(ctx.get(keys::CONFIRMATIONS)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use irops_comms::{BrokerConfig, FixedResponsePolicy};
    use irops_types::{ACCEPT_REBOOKING, MANUAL_REBOOKING};

    fn rebooking(n: usize, successful: bool) -> RebookingProposal {
        RebookingProposal {
            passenger_id: format!("PAX{:03}", n),
            passenger_name: Some(format!("Passenger {}", n)),
            original_flight: "UA100".into(),
            rebooked_flight: "UA204".into(),
            departure_location: "JFK".into(),
            arrival_location: "ORD".into(),
            assignment_successful: successful,
        }
    }

    fn context_with(proposals: &[RebookingProposal]) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set(keys::REBOOKING_PROPOSALS, &proposals).unwrap();
        ctx
    }

    fn collector_config() -> CollectorConfig {
        CollectorConfig {
            batch_size: 5,
            max_poll_iterations: 200,
            poll_interval_ms: 50,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_successful_assignments_are_sent() {
        let broker = Arc::new(CommsBroker::with_policy(
            BrokerConfig::instant(),
            Arc::new(FixedResponsePolicy::accept()),
        ));
        let stage = ConfirmationStage::new(broker.clone(), collector_config());

        let proposals: Vec<_> = (0..7).map(|n| rebooking(n, n % 3 != 0)).collect();
        let mut ctx = context_with(&proposals);
        stage.execute(&mut ctx).await.unwrap();

        let records = confirmations(&ctx).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.is_accepted()));
        assert!(records.iter().all(|r| r.rebooked_flight == "UA204"));
        assert_eq!(broker.stats().await.received, 4);
        assert!(ctx.warnings().is_empty());

        broker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_rebooking_marks_unassigned() {
        let broker = Arc::new(CommsBroker::with_policy(
            BrokerConfig::instant(),
            Arc::new(FixedResponsePolicy::new(MANUAL_REBOOKING)),
        ));
        let stage = ConfirmationStage::new(broker.clone(), collector_config());

        let mut ctx = context_with(&[rebooking(1, true)]);
        stage.execute(&mut ctx).await.unwrap();

        let records = confirmations(&ctx).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rebooked_flight, "UNASSIGNED (cancelled flight UA100)");

        broker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_warns_and_completes() {
        let broker = Arc::new(CommsBroker::new(BrokerConfig::fixed_delay(
            std::time::Duration::from_secs(3_600),
        )));
        let config = CollectorConfig {
            max_poll_iterations: 10,
            poll_interval_ms: 0,
            ..collector_config()
        };
        let stage = ConfirmationStage::new(broker.clone(), config);

        let mut ctx = context_with(&[rebooking(1, true), rebooking(2, true)]);
        stage.execute(&mut ctx).await.unwrap();

        assert_eq!(
            ctx.warnings(),
            &[WorkflowWarning::MaxIterationsExceeded { budget: 10 }]
        );
        assert!(ctx.messages().iter().any(|m| m.text.starts_with("WARNING")));
        assert!(confirmations(&ctx).unwrap().is_empty());

        broker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_responses_are_cleared_first() {
        let broker = Arc::new(CommsBroker::with_policy(
            BrokerConfig::instant(),
            Arc::new(FixedResponsePolicy::accept()),
        ));
        let stale = broker
            .send(OutboundProposal::new("OLD", rebooking(0, true).to_payload()))
            .await
            .unwrap();
        broker
            .await_one(&stale, std::time::Duration::from_secs(1))
            .await
            .ok();
        broker
            .send(OutboundProposal::new("OLD2", rebooking(0, true).to_payload()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        let stage = ConfirmationStage::new(broker.clone(), collector_config());
        let mut ctx = context_with(&[rebooking(1, true)]);
        stage.execute(&mut ctx).await.unwrap();

        let records = confirmations(&ctx).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].passenger_id, "PAX001");
        assert_eq!(
            records[0].outcome,
            irops_types::ResponseOutcome::Answered(ACCEPT_REBOOKING.into())
        );

        broker.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_proposals_is_a_no_op() {
        let broker = Arc::new(CommsBroker::new(BrokerConfig::instant()));
        let stage = ConfirmationStage::new(broker.clone(), collector_config());
        let mut ctx = ExecutionContext::new();
        stage.execute(&mut ctx).await.unwrap();
        assert!(!ctx.contains(keys::CONFIRMATIONS));
        broker.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_broker_fails_stage() {
        let broker = Arc::new(CommsBroker::new(BrokerConfig::instant()));
        broker.shutdown().await;
        let stage = ConfirmationStage::new(broker, collector_config());
        let mut ctx = context_with(&[rebooking(1, true)]);
        let err = stage.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, StageError::Comms(irops_comms::CommsError::BrokerClosed)));
    }
}
