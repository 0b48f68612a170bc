//! Batch orchestration.
//!
//! The orchestrator turns a list of identifiers into one concurrent job per
//! unique identifier and drives each job through the same steps:
//! - **Admission**: the [`PendingTracker`](crate::PendingTracker) rejects an
//!   identifier that is already in flight
//! - **Check**: identifiers already in the [`Ledger`](crate::Ledger) are skipped
//! - **Run**: the [`TaskRunner`](crate::TaskRunner) does the work
//! - **Record**: successful identifiers are appended to the ledger
//!
//! Every job reports exactly one [`JobResult`] over a completion channel. The
//! [`Aggregator`] counts them into a [`RunSummary`] once the channel closes.

mod aggregator;
mod runner;
mod summary;
mod types;

pub use aggregator::Aggregator;
pub use runner::Orchestrator;
pub use summary::{format_duration, RunSummary};
pub use types::{JobOutcome, JobResult, OutcomeClass, RunError, RunOptions};
