//! Passenger communications broker.
//!
//! The broker accepts proposals, simulates passengers answering them after a
//! random think-time, and hands each finished proposal back to exactly one
//! caller. A single background worker picks one pending proposal uniformly at
//! random per tick, so proposals sent together do not finish in send order.
//!
//! All mutable state (queue, store, statistics) lives behind one mutex; the
//! worker and every caller go through it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use irops_types::{BrokerResponse, OutboundProposal, Proposal, ProposalId, ACCEPT_REBOOKING};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::{CommsError, CommsResult};
use crate::policy::{ContentAwarePolicy, ResponsePolicy};

/// Running counters kept by the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStats {
    pub received: u64,
    pub processed: u64,
    pub accepted: u64,
    pub declined: u64,
    pub cancelled: u64,
}

impl BrokerStats {
    /// Share of answered proposals that were accepted, in percent.
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.processed > 0).then(|| self.accepted as f64 / self.processed as f64 * 100.0)
    }
}

/// Point-in-time view of the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStatus {
    pub running: bool,
    /// Proposals waiting to be picked
    pub queue_len: usize,
    /// Proposals not yet returned to a caller
    pub active: usize,
    pub stats: BrokerStats,
}

/// Result of shutting the broker down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Proposals moved to `Cancelled` because nobody had answered them
    pub cancelled: usize,
    pub stats: BrokerStats,
}

#[derive(Debug, Default)]
struct BrokerState {
    closed: bool,
    queue: VecDeque<ProposalId>,
    store: HashMap<ProposalId, Proposal>,
    issued: HashSet<ProposalId>,
    stats: BrokerStats,
}

impl BrokerState {
    fn take_terminal(&mut self, id: &ProposalId) -> Option<BrokerResponse> {
        let terminal = self.store.get(id).is_some_and(Proposal::is_terminal);
        if !terminal {
            return None;
        }
        self.store.remove(id).and_then(Proposal::into_response)
    }
}

struct Shared {
    state: Mutex<BrokerState>,
    completed: Notify,
}

/// In-process passenger communications broker.
///
/// Construct it once and share it as `Arc<CommsBroker>`. The worker task is
/// spawned on construction, so this must be called inside a Tokio runtime.
pub struct CommsBroker {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: BrokerConfig,
}

impl CommsBroker {
    /// Start a broker with the content-aware passenger policy.
    pub fn new(config: BrokerConfig) -> Self {
        Self::with_policy(config, Arc::new(ContentAwarePolicy))
    }

    /// Start a broker with a custom passenger policy.
    pub fn with_policy(config: BrokerConfig, policy: Arc<dyn ResponsePolicy>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(BrokerState::default()),
            completed: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            shared: shared.clone(),
            config: config.clone(),
            policy,
            shutdown_rx,
        };
        let handle = tokio::spawn(worker.run());

        info!(
            min_delay_ms = config.min_delay_ms,
            max_delay_ms = config.max_delay_ms,
            "Passenger communications broker started"
        );

        Self {
            shared,
            shutdown_tx,
            worker: Mutex::new(Some(handle)),
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Queue a proposal for delivery and return its id immediately.
    pub async fn send(&self, outbound: OutboundProposal) -> CommsResult<ProposalId> {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            return Err(CommsError::BrokerClosed);
        }

        let proposal = Proposal::accept(outbound);
        let id = proposal.id.clone();
        if !state.issued.insert(id.clone()) {
            return Err(CommsError::DuplicateProposal(id));
        }

        debug!(
            proposal_id = %id.short(),
            passenger = %proposal.payload.passenger_name,
            queue_len = state.queue.len() + 1,
            "Proposal queued"
        );

        state.store.insert(id.clone(), proposal);
        state.queue.push_back(id.clone());
        state.stats.received += 1;
        Ok(id)
    }

    // ── Retrieval ────────────────────────────────────────────────────

    /// Remove and return every finished proposal (answered or cancelled).
    ///
    /// Each proposal is returned by at most one call to this method or
    /// [`await_one`](Self::await_one).
    pub async fn drain_completed(&self) -> Vec<BrokerResponse> {
        let mut state = self.shared.state.lock().await;
        let ready: Vec<ProposalId> = state
            .store
            .values()
            .filter(|p| p.is_terminal())
            .map(|p| p.id.clone())
            .collect();

        let mut responses: Vec<BrokerResponse> = ready
            .iter()
            .filter_map(|id| state.take_terminal(id))
            .collect();
        responses.sort_by_key(|r| (r.responded_at, r.created_at));

        if !responses.is_empty() {
            debug!(count = responses.len(), "Drained finished proposals");
        }
        responses
    }

    /// Wait for one proposal to finish, then remove and return it.
    ///
    /// Ids that were issued but already handed out count as "not yet
    /// available" and end in `Timeout`. Ids never issued fail with
    /// `LookupMiss` straight away. A timeout leaves the proposal untouched.
    /// A timeout too large to add to the current instant waits without a deadline.
    pub async fn await_one(
        &self,
        id: &ProposalId,
        timeout: Duration,
    ) -> CommsResult<BrokerResponse> {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let notified = self.shared.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock().await;
                if !state.issued.contains(id) {
                    return Err(CommsError::LookupMiss(id.clone()));
                }
                if let Some(response) = state.take_terminal(id) {
                    return Ok(response);
                }
            }

            let woken = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, notified).await.is_ok(),
                None => {
                    notified.await;
                    true
                }
            };
            if !woken {
                warn!(proposal_id = %id.short(), "Timed out waiting for passenger response");
                return Err(CommsError::Timeout {
                    proposal_id: id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    pub async fn status(&self) -> BrokerStatus {
        let state = self.shared.state.lock().await;
        BrokerStatus {
            running: !state.closed,
            queue_len: state.queue.len(),
            active: state.store.len(),
            stats: state.stats,
        }
    }

    pub async fn stats(&self) -> BrokerStats {
        self.shared.state.lock().await.stats
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop accepting proposals, let the in-flight tick finish, and cancel
    /// everything still pending. Cancelled proposals stay retrievable through
    /// [`drain_completed`](Self::drain_completed). Calling this twice is harmless.
    pub async fn shutdown(&self) -> ShutdownSummary {
        {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return ShutdownSummary {
                    cancelled: 0,
                    stats: state.stats,
                };
            }
            state.closed = true;
        }

        info!("Stopping passenger communications broker");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Broker worker did not exit cleanly");
            }
        }

        let summary = {
            let mut state = self.shared.state.lock().await;
            state.queue.clear();
            let mut cancelled = 0;
            for proposal in state.store.values_mut() {
                if proposal.cancel() {
                    cancelled += 1;
                }
            }
            state.stats.cancelled += cancelled as u64;
            ShutdownSummary {
                cancelled,
                stats: state.stats,
            }
        };
        self.shared.completed.notify_waiters();

        let stats = summary.stats;
        info!(
            received = stats.received,
            processed = stats.processed,
            accepted = stats.accepted,
            declined = stats.declined,
            cancelled = stats.cancelled,
            acceptance_rate = stats.acceptance_rate().unwrap_or(0.0),
            "Passenger communications broker stopped"
        );

        summary
    }
}

// ── Worker ───────────────────────────────────────────────────────────

struct Worker {
    shared: Arc<Shared>,
    config: BrokerConfig,
    policy: Arc<dyn ResponsePolicy>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!("Broker worker loop started");

        loop {
            if self.should_stop() {
                break;
            }

            match self.pick_next(&mut rng).await {
                Some(proposal) => self.answer(proposal, &mut rng).await,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.idle_interval()) => {}
                        changed = self.shutdown_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        debug!("Broker worker loop stopped");
    }

    /// Shutdown requested, or the broker itself was dropped.
    fn should_stop(&self) -> bool {
        *self.shutdown_rx.borrow() || self.shutdown_rx.has_changed().is_err()
    }

    /// Take every queued id, choose one at random, put the rest back in order.
    async fn pick_next(&self, rng: &mut StdRng) -> Option<Proposal> {
        let mut state = self.shared.state.lock().await;
        if state.closed || state.queue.is_empty() {
            return None;
        }

        let mut snapshot: Vec<ProposalId> = state.queue.drain(..).collect();
        let available = snapshot.len();
        let selected = snapshot.remove(rng.gen_range(0..available));
        state.queue.extend(snapshot);

        let proposal = state.store.get_mut(&selected)?;
        if !proposal.mark_processing() {
            return None;
        }

        debug!(
            proposal_id = %selected.short(),
            passenger = %proposal.payload.passenger_name,
            available,
            "Randomly selected proposal"
        );
        Some(proposal.clone())
    }

    async fn answer(&self, proposal: Proposal, rng: &mut StdRng) {
        let delay = self.think_time(rng);
        tokio::time::sleep(delay).await;

        let response = self.policy.respond(&proposal, rng);

        {
            let mut state = self.shared.state.lock().await;
            let Some(stored) = state.store.get_mut(&proposal.id) else {
                return;
            };
            if !stored.complete(response.clone()) {
                return;
            }
            state.stats.processed += 1;
            if response == ACCEPT_REBOOKING {
                state.stats.accepted += 1;
            } else {
                state.stats.declined += 1;
            }
        }
        self.shared.completed.notify_waiters();

        info!(
            proposal_id = %proposal.id.short(),
            passenger = %proposal.payload.passenger_name,
            response = %response,
            think_ms = delay.as_millis() as u64,
            "Passenger responded"
        );
    }

    fn think_time(&self, rng: &mut StdRng) -> Duration {
        let (min, max) = (self.config.min_delay_ms, self.config.max_delay_ms);
        let ms = if max <= min { min } else { rng.gen_range(min..=max) };
        Duration::from_millis(ms)
    }
}
