//! Passenger Communications for IROPS workflows
//!
//! Two pieces live here:
//!
//! - [`CommsBroker`]: an in-process broker that accepts rebooking proposals,
//!   simulates passengers answering them after a random think-time, and
//!   returns each answer to exactly one caller. Answers arrive out of order.
//! - [`ConfirmationCollector`]: drains the broker and releases correlated
//!   [`ConfirmationRecord`](irops_types::ConfirmationRecord)s in batches until
//!   every sent proposal is accounted for.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use irops_comms::{BrokerConfig, CommsBroker, ConfirmationCollector, PollBudget};
//! use irops_types::{OutboundProposal, ProposalPayload};
//!
//! # async fn example() -> Result<(), irops_comms::CommsError> {
//! let broker = Arc::new(CommsBroker::new(BrokerConfig::default()));
//! let id = broker
//!     .send(OutboundProposal::new("PAX001", ProposalPayload::default()))
//!     .await?;
//!
//! let mut collector = ConfirmationCollector::new(broker.clone(), [id], 5);
//! let report = collector.collect(PollBudget::iterations(600)).await;
//! println!("{} confirmations", report.record_count());
//!
//! broker.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

mod broker;
mod collector;
mod config;
mod error;
mod policy;

pub use broker::{BrokerStats, BrokerStatus, CommsBroker, ShutdownSummary};
pub use collector::{
    BatchKind, BatchWindow, CollectionReport, ConfirmationBatch, ConfirmationCollector,
    ConfirmationTracker, PollOutcome,
};
pub use config::{BrokerConfig, CollectorConfig, PollBudget};
pub use error::{CommsError, CommsResult};
pub use policy::{ContentAwarePolicy, FixedResponsePolicy, ResponsePolicy};
