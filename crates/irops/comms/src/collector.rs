//! Confirmation batch collection.
//!
//! The collector repeatedly drains the broker, correlates each response with
//! the set of proposals that were sent, and releases the correlated records in
//! batches:
//!
//! - **Full**: `batch_size` records are waiting.
//! - **Final**: every sent proposal has been accounted for and something is
//!   still waiting.
//! - **Partial**: responses are still outstanding, but whatever has arrived is
//!   released now rather than held back.
//!
//! A full batch never carries more than `batch_size` records; any overflow
//! waits for the next poll. Once everything has been released, the next poll
//! reports `all_processed`.

use std::collections::HashMap;
use std::sync::Arc;

use irops_types::{BrokerResponse, ConfirmationRecord, ProposalId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::broker::CommsBroker;
use crate::config::PollBudget;

// ── Batch Window ─────────────────────────────────────────────────────

/// Progress of a collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWindow {
    batch_size: usize,
    current_batch: Vec<ConfirmationRecord>,
    processed_count: usize,
    total_sent: usize,
    all_processed: bool,
}

impl BatchWindow {
    pub fn new(total_sent: usize, batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            current_batch: Vec::new(),
            processed_count: 0,
            total_sent,
            all_processed: false,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records correlated but not yet released
    pub fn pending(&self) -> &[ConfirmationRecord] {
        &self.current_batch
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count
    }

    pub fn total_sent(&self) -> usize {
        self.total_sent
    }

    pub fn all_processed(&self) -> bool {
        self.all_processed
    }

    fn push(&mut self, record: ConfirmationRecord) {
        self.current_batch.push(record);
        self.processed_count += 1;
    }

    /// Decide what, if anything, to release now.
    fn release(&mut self) -> Option<ConfirmationBatch> {
        if self.current_batch.len() >= self.batch_size {
            let records = self.current_batch.drain(..self.batch_size).collect();
            return Some(ConfirmationBatch::new(BatchKind::Full, records));
        }

        if self.processed_count >= self.total_sent {
            if self.current_batch.is_empty() {
                self.all_processed = true;
                return None;
            }
            let records = std::mem::take(&mut self.current_batch);
            return Some(ConfirmationBatch::new(BatchKind::Final, records));
        }

        if self.current_batch.is_empty() {
            return None;
        }
        let records = std::mem::take(&mut self.current_batch);
        Some(ConfirmationBatch::new(BatchKind::Partial, records))
    }
}

// ── Batches ──────────────────────────────────────────────────────────

/// Why a batch was released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Full,
    Final,
    Partial,
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchKind::Full => write!(f, "full"),
            BatchKind::Final => write!(f, "final"),
            BatchKind::Partial => write!(f, "partial"),
        }
    }
}

/// A group of confirmation records released together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationBatch {
    pub kind: BatchKind,
    pub records: Vec<ConfirmationRecord>,
}

impl ConfirmationBatch {
    fn new(kind: BatchKind, records: Vec<ConfirmationRecord>) -> Self {
        Self { kind, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub batch: Option<ConfirmationBatch>,
    pub all_processed: bool,
    /// Responses dropped because their id was never sent by this collector
    pub discarded: usize,
}

/// Result of a budgeted collection loop
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionReport {
    pub batches: Vec<ConfirmationBatch>,
    pub iterations: u32,
    /// The budget ran out before every proposal was accounted for
    pub forced: bool,
}

impl CollectionReport {
    pub fn records(&self) -> impl Iterator<Item = &ConfirmationRecord> {
        self.batches.iter().flat_map(|b| b.records.iter())
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(ConfirmationBatch::len).sum()
    }
}

// ── Tracker ──────────────────────────────────────────────────────────

/// Correlation and batching without a broker attached.
#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    /// Sent ids, and whether each has been counted yet
    sent: HashMap<ProposalId, bool>,
    window: BatchWindow,
}

impl ConfirmationTracker {
    pub fn new(sent: impl IntoIterator<Item = ProposalId>, batch_size: usize) -> Self {
        let sent: HashMap<ProposalId, bool> = sent.into_iter().map(|id| (id, false)).collect();
        let window = BatchWindow::new(sent.len(), batch_size);
        Self { sent, window }
    }

    pub fn window(&self) -> &BatchWindow {
        &self.window
    }

    /// Correlate a set of drained responses, then apply the release rule.
    pub fn ingest(&mut self, responses: Vec<BrokerResponse>) -> PollOutcome {
        let mut discarded = 0;

        for response in responses {
            match self.sent.get_mut(&response.proposal_id) {
                Some(counted) if !*counted => {
                    *counted = true;
                    self.window.push(ConfirmationRecord::from_response(&response));
                }
                Some(_) => {
                    debug!(
                        proposal_id = %response.proposal_id.short(),
                        "Ignoring repeated response"
                    );
                }
                None => {
                    warn!(
                        proposal_id = %response.proposal_id,
                        passenger_id = %response.passenger_id,
                        "Response for unknown proposal, discarding"
                    );
                    discarded += 1;
                }
            }
        }

        let batch = self.window.release();
        if let Some(batch) = &batch {
            info!(
                kind = %batch.kind,
                size = batch.len(),
                processed = self.window.processed_count,
                total = self.window.total_sent,
                "Confirmation batch released"
            );
        }

        PollOutcome {
            batch,
            all_processed: self.window.all_processed,
            discarded,
        }
    }
}

// ── Collector ────────────────────────────────────────────────────────

/// Drains a broker into confirmation batches for one set of sent proposals.
pub struct ConfirmationCollector {
    broker: Arc<CommsBroker>,
    tracker: ConfirmationTracker,
}

impl ConfirmationCollector {
    pub fn new(
        broker: Arc<CommsBroker>,
        sent: impl IntoIterator<Item = ProposalId>,
        batch_size: usize,
    ) -> Self {
        Self {
            broker,
            tracker: ConfirmationTracker::new(sent, batch_size),
        }
    }

    pub fn window(&self) -> &BatchWindow {
        self.tracker.window()
    }

    /// Drain the broker once and correlate what came back.
    pub async fn poll(&mut self) -> PollOutcome {
        let responses = self.broker.drain_completed().await;
        self.tracker.ingest(responses)
    }

    /// Correlate responses obtained elsewhere.
    pub fn ingest(&mut self, responses: Vec<BrokerResponse>) -> PollOutcome {
        self.tracker.ingest(responses)
    }

    /// Poll until everything is accounted for or the budget runs out.
    pub async fn collect(&mut self, budget: PollBudget) -> CollectionReport {
        let mut batches = Vec::new();
        let mut iterations = 0;
        let mut done = self.window().all_processed();

        while !done && iterations < budget.max_iterations {
            iterations += 1;
            let outcome = self.poll().await;
            batches.extend(outcome.batch);
            done = outcome.all_processed;

            if !done && !budget.pacing.is_zero() {
                tokio::time::sleep(budget.pacing).await;
            }
        }

        let forced = !done;
        if forced {
            warn!(
                iterations,
                processed = self.window().processed_count(),
                total = self.window().total_sent(),
                "Confirmation budget exhausted before all responses arrived"
            );
        }

        CollectionReport {
            batches,
            iterations,
            forced,
        }
    }
}
