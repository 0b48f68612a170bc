//! Collects job results into a run summary.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::summary::{format_duration, RunSummary};
use super::types::{JobResult, OutcomeClass};
use crate::metrics;

/// Counts job results as they arrive.
///
/// Each result increments exactly one of the three counters.
#[derive(Debug)]
pub struct Aggregator {
    submitted: usize,
    succeeded: usize,
    skipped: usize,
    errored: usize,
    jobs: Vec<JobResult>,
}

impl Aggregator {
    pub fn new(submitted: usize) -> Self {
        Self {
            submitted,
            succeeded: 0,
            skipped: 0,
            errored: 0,
            jobs: Vec::with_capacity(submitted),
        }
    }

    /// Count one result and log its completion line.
    pub fn record(&mut self, result: JobResult) {
        let class = result.outcome.class();
        match class {
            OutcomeClass::Succeeded => self.succeeded += 1,
            OutcomeClass::Skipped => self.skipped += 1,
            OutcomeClass::Errored => self.errored += 1,
        }

        let line = format!(
            "[{}] {} ({}) - {}",
            result.sequence,
            result.identifier,
            format_duration(result.duration),
            result.outcome.describe()
        );
        if class == OutcomeClass::Errored {
            warn!("{}", line);
        } else {
            info!("{}", line);
        }

        let label = result.outcome.label();
        metrics::JOBS_TOTAL.with_label_values(&[label]).inc();
        metrics::JOB_DURATION
            .with_label_values(&[label])
            .observe(result.duration.as_secs_f64());

        self.jobs.push(result);
    }

    /// Record results until every sender has been dropped.
    pub async fn consume(&mut self, mut rx: mpsc::Receiver<JobResult>) {
        while let Some(result) = rx.recv().await {
            self.record(result);
        }
    }

    /// Number of results recorded so far.
    pub fn reported(&self) -> usize {
        self.jobs.len()
    }

    /// Build the final summary, with jobs in submission order.
    pub fn finish(mut self, elapsed: Duration, interrupted: bool) -> RunSummary {
        if self.reported() != self.submitted {
            warn!(
                "{} items submitted but {} reported",
                self.submitted,
                self.reported()
            );
        }
        self.jobs.sort_by_key(|job| job.sequence);

        info!(
            "Run finished in {}: {} succeeded, {} skipped, {} errored",
            format_duration(elapsed),
            self.succeeded,
            self.skipped,
            self.errored
        );

        RunSummary {
            submitted: self.submitted,
            succeeded: self.succeeded,
            skipped: self.skipped,
            errored: self.errored,
            elapsed,
            interrupted,
            jobs: self.jobs,
        }
    }
}
