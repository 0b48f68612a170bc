//! Final report of a run.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::types::{serialize_secs, JobOutcome, JobResult};

const WIDTH: usize = 56;

/// Counts and per-job results of one run.
///
/// `submitted == succeeded + skipped + errored` holds for every completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub errored: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Cancellation was requested during the run.
    pub interrupted: bool,
    /// One entry per submitted identifier, in submission order.
    pub jobs: Vec<JobResult>,
}

impl RunSummary {
    pub fn has_errors(&self) -> bool {
        self.errored > 0
    }

    /// Process exit code for this run: 0 when nothing errored, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            1
        } else {
            0
        }
    }

    /// First result for `identifier`.
    pub fn job(&self, identifier: &str) -> Option<&JobResult> {
        self.jobs.iter().find(|job| job.identifier == identifier)
    }

    /// Every result for `identifier`, in submission order.
    pub fn jobs_for<'a>(&'a self, identifier: &'a str) -> impl Iterator<Item = &'a JobResult> {
        self.jobs
            .iter()
            .filter(move |job| job.identifier == identifier)
    }

    /// Identifiers whose task succeeded but which are missing from the ledger.
    pub fn needs_reconciliation(&self) -> Vec<&str> {
        self.jobs
            .iter()
            .filter(|job| matches!(job.outcome, JobOutcome::SucceededWithLedgerError { .. }))
            .map(|job| job.identifier.as_str())
            .collect()
    }

    /// Number of results per outcome label.
    pub fn outcome_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for job in &self.jobs {
            *counts.entry(job.outcome.label()).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(WIDTH);
        let thin = "-".repeat(WIDTH);
        let status = if self.interrupted {
            "INTERRUPTED"
        } else {
            "COMPLETE"
        };

        writeln!(f, "{}", rule)?;
        writeln!(f, "{:^width$}", format!("BATCH {}", status), width = WIDTH)?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "  Submitted:  {}", self.submitted)?;
        writeln!(f, "  Succeeded:  {}", self.succeeded)?;
        writeln!(f, "  Skipped:    {}", self.skipped)?;
        writeln!(f, "  Errored:    {}", self.errored)?;
        writeln!(f, "  Duration:   {}", format_duration(self.elapsed))?;

        let counts = self.outcome_counts();
        if !counts.is_empty() {
            writeln!(f, "{}", thin)?;
            for (label, count) in counts {
                writeln!(f, "  {:<30}{}", label, count)?;
            }
        }

        let missing = self.needs_reconciliation();
        if !missing.is_empty() {
            writeln!(f, "{}", thin)?;
            writeln!(f, "  Done but NOT recorded in the ledger:")?;
            for id in missing {
                writeln!(f, "    {}", id)?;
            }
        }
        write!(f, "{}", rule)
    }
}

/// Render `d` rounded to whole seconds, e.g. `1h2m3s`, `45s` or `0s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs_f64().round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}
