//! Fan-out/fan-in driver for a batch of identifiers.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, Utc};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregator::Aggregator;
use super::summary::RunSummary;
use super::types::{JobOutcome, JobResult, RunError, RunOptions};
use crate::ledger::Ledger;
use crate::pending::PendingTracker;
use crate::postprocess::{PostProcessReport, PostProcessor};
use crate::task::{TaskError, TaskReport, TaskRunner};

/// Shared handles every job needs.
#[derive(Clone)]
struct JobDeps {
    ledger: Option<Arc<Ledger>>,
    pending: Arc<PendingTracker>,
    runner: Arc<dyn TaskRunner>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    cancel: CancellationToken,
}

/// One planned unit of work.
#[derive(Debug)]
struct Planned {
    identifier: String,
    sequence: usize,
    repeated: bool,
}

/// Runs one job per identifier concurrently and aggregates the results.
pub struct Orchestrator {
    deps: JobDeps,
    options: RunOptions,
}

impl Orchestrator {
    /// Create an orchestrator without a ledger or post-processing.
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            deps: JobDeps {
                ledger: None,
                pending: Arc::new(PendingTracker::new()),
                runner,
                post_processor: None,
                cancel: CancellationToken::new(),
            },
            options: RunOptions::default(),
        }
    }

    /// Record successes in `ledger` and skip identifiers it already holds.
    pub fn with_ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.deps.ledger = Some(ledger);
        self
    }

    /// Hand the artifacts of each successful task to `processor`.
    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.deps.post_processor = Some(processor);
        self
    }

    /// Observe `token` for cancellation instead of a private one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.deps.cancel = token;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Token that cancels this orchestrator's runs.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.deps.cancel
    }

    /// Identifiers currently in flight.
    pub fn pending(&self) -> &Arc<PendingTracker> {
        &self.deps.pending
    }

    /// Process `identifiers` and wait for every job to report.
    ///
    /// Returns once the completion channel has closed, i.e. every job has
    /// sent its result. Per-job failures never abort the run.
    pub async fn run(&self, identifiers: Vec<String>) -> Result<RunSummary, RunError> {
        if identifiers.is_empty() {
            return Err(RunError::EmptyInput);
        }

        let started = Instant::now();
        let submitted = identifiers.len();
        let plan = plan(identifiers, self.options.dedup_input);
        let unique = plan.iter().filter(|p| !p.repeated).count();

        info!(
            "Starting processing for {} items ({} unique) at {}",
            submitted,
            unique,
            Local::now().format("%H:%M:%S")
        );

        // One slot per result, so no sender ever waits on the aggregator.
        let (tx, rx) = mpsc::channel(submitted);

        for planned in plan {
            if planned.repeated {
                debug!(
                    "[{}] {} repeats an earlier input, not scheduling",
                    planned.sequence, planned.identifier
                );
                let result = JobResult {
                    identifier: planned.identifier,
                    sequence: planned.sequence,
                    started_at: Utc::now(),
                    duration: Default::default(),
                    outcome: JobOutcome::SkippedDuplicate,
                };
                if tx.send(result).await.is_err() {
                    warn!("Aggregator gone, dropping result");
                }
                continue;
            }

            let deps = self.deps.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let started_at = Utc::now();
                let clock = Instant::now();
                let outcome = AssertUnwindSafe(execute(&deps, &planned, submitted))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| JobOutcome::Failed {
                        reason: format!("job panicked: {}", panic_message(panic.as_ref())),
                    });

                let result = JobResult {
                    identifier: planned.identifier,
                    sequence: planned.sequence,
                    started_at,
                    duration: clock.elapsed(),
                    outcome,
                };
                if tx.send(result).await.is_err() {
                    warn!("Aggregator gone, dropping result");
                }
            });
        }
        drop(tx);

        let mut aggregator = Aggregator::new(submitted);
        aggregator.consume(rx).await;

        Ok(aggregator.finish(started.elapsed(), self.deps.cancel.is_cancelled()))
    }
}

/// Number the input and mark repeats.
///
/// With `dedup` disabled nothing is marked and every entry gets a job.
fn plan(identifiers: Vec<String>, dedup: bool) -> Vec<Planned> {
    let mut seen = HashSet::new();
    identifiers
        .into_iter()
        .enumerate()
        .map(|(i, identifier)| {
            let repeated = dedup && !seen.insert(identifier.clone());
            Planned {
                identifier,
                sequence: i + 1,
                repeated,
            }
        })
        .collect()
}

/// Drive one identifier from admission to its terminal outcome.
async fn execute(deps: &JobDeps, job: &Planned, total: usize) -> JobOutcome {
    let id = job.identifier.as_str();
    info!(
        "[{}/{}] {} started at {}",
        job.sequence,
        total,
        id,
        Local::now().format("%H:%M:%S")
    );

    // Held until this function returns, on every path.
    let Some(_guard) = deps.pending.admit(id) else {
        warn!("[{}] {} is already being processed", job.sequence, id);
        return JobOutcome::SkippedDuplicate;
    };

    if let Some(ledger) = &deps.ledger {
        if ledger.contains(id) {
            info!("[{}] {} already in ledger, skipping", job.sequence, id);
            return JobOutcome::SkippedAlreadyDone;
        }
    }

    if deps.cancel.is_cancelled() {
        return JobOutcome::Cancelled;
    }

    let report = match deps.runner.run(id, &deps.cancel).await {
        Ok(report) => report,
        Err(TaskError::Cancelled) => return JobOutcome::Cancelled,
        Err(e) => {
            return JobOutcome::Failed {
                reason: error_chain(&e),
            }
        }
    };

    // Record before anything else, even if cancellation fired meanwhile.
    let recorded = match &deps.ledger {
        Some(ledger) => record(ledger, id).await,
        None => Ok(()),
    };

    let post_process = post_process(deps, id, &report).await;

    match recorded {
        Ok(()) => JobOutcome::Succeeded { post_process },
        Err(reason) => {
            warn!(
                "[{}] {} succeeded but could not be recorded: {}",
                job.sequence, id, reason
            );
            JobOutcome::SucceededWithLedgerError { reason }
        }
    }
}

/// Run the post-processor, if any, over the task's artifacts.
///
/// Never fails the job; problems land in the report.
async fn post_process(
    deps: &JobDeps,
    id: &str,
    report: &TaskReport,
) -> Option<PostProcessReport> {
    let processor = deps.post_processor.as_ref()?;
    if report.artifact_dirs.is_empty() {
        debug!("{}: no artifact directories reported, nothing to post-process", id);
        return None;
    }
    if deps.cancel.is_cancelled() {
        info!("{}: shutting down, skipping {}", id, processor.name());
        return None;
    }

    let failed = PostProcessReport {
        attempted: true,
        files_processed: 0,
        errors: 1,
    };
    let run = processor.process(id, &report.artifact_dirs, &deps.cancel);
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            warn!("{}: {} failed: {}", id, processor.name(), e);
            Some(failed)
        }
        Err(panic) => {
            warn!(
                "{}: {} panicked: {}",
                id,
                processor.name(),
                panic_message(panic.as_ref())
            );
            Some(failed)
        }
    }
}

/// Append `id` to the ledger off the async executor.
async fn record(ledger: &Arc<Ledger>, id: &str) -> Result<(), String> {
    let ledger = Arc::clone(ledger);
    let id = id.to_string();
    match tokio::task::spawn_blocking(move || ledger.append(&id)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(error_chain(&e)),
        Err(e) => Err(format!("ledger append did not complete: {}", e)),
    }
}

/// Render an error and its sources as one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
