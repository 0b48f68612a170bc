//! Types for the orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::postprocess::PostProcessReport;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// No identifiers were given.
    #[error("no identifiers to process")]
    EmptyInput,

    /// The ledger could not be initialized.
    #[error("ledger initialization failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Terminal outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The identifier was already in flight.
    SkippedDuplicate,
    /// The ledger already recorded the identifier.
    SkippedAlreadyDone,
    /// The task succeeded and, if a ledger is in use, was recorded.
    Succeeded {
        #[serde(skip_serializing_if = "Option::is_none")]
        post_process: Option<PostProcessReport>,
    },
    /// The task succeeded but recording it failed. Needs manual reconciliation.
    SucceededWithLedgerError { reason: String },
    /// The task failed.
    Failed { reason: String },
    /// The run was cancelled before the task finished.
    Cancelled,
}

/// Counter a job outcome is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeClass {
    Succeeded,
    Skipped,
    Errored,
}

impl JobOutcome {
    /// Fixed classification of outcomes into summary counters.
    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::SkippedDuplicate | Self::SkippedAlreadyDone => OutcomeClass::Skipped,
            Self::Succeeded { .. } => OutcomeClass::Succeeded,
            Self::SucceededWithLedgerError { .. } | Self::Failed { .. } | Self::Cancelled => {
                OutcomeClass::Errored
            }
        }
    }

    /// Whether this outcome makes the run exit non-zero.
    pub fn is_error(&self) -> bool {
        self.class() == OutcomeClass::Errored
    }

    /// Stable label, used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::SkippedAlreadyDone => "skipped_already_done",
            Self::Succeeded { .. } => "succeeded",
            Self::SucceededWithLedgerError { .. } => "succeeded_with_ledger_error",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human readable status for the per-job line.
    pub fn describe(&self) -> String {
        match self {
            Self::SkippedDuplicate => "Skipped (duplicate in progress)".to_string(),
            Self::SkippedAlreadyDone => "Skipped (already in ledger)".to_string(),
            Self::Succeeded { post_process: None } => "Success".to_string(),
            Self::Succeeded {
                post_process: Some(report),
            } => format!("Success ({})", report.describe()),
            Self::SucceededWithLedgerError { reason } => {
                format!("Success, but ledger update failed: {}", reason)
            }
            Self::Failed { reason } => format!("Failed: {}", reason),
            Self::Cancelled => "Cancelled".to_string(),
        }
    }
}

/// Result reported by one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub identifier: String,
    /// 1-based position in the submitted list.
    pub sequence: usize,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub outcome: JobOutcome,
}

pub(crate) fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Collapse repeated identifiers before any job is created.
    ///
    /// Repeats are still reported, as [`JobOutcome::SkippedDuplicate`].
    /// When disabled, the pending tracker alone keeps repeats apart.
    pub dedup_input: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { dedup_input: true }
    }
}
