//! Prometheus metrics for batch runs.
//!
//! A batch run is short-lived, so metrics are not scraped. Instead the
//! registry can be dumped to a textfile after the run, in the format the
//! node_exporter textfile collector picks up.

use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every ytbatch metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

/// Jobs reported, by outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ytbatch_jobs_total", "Total jobs reported"),
        &["outcome"],
    )
    .unwrap()
});

/// Job duration in seconds, by outcome.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("ytbatch_job_duration_seconds", "Duration of jobs").buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

/// Ledger appends, by result ("ok", "error").
pub static LEDGER_APPENDS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ytbatch_ledger_appends_total", "Total ledger append attempts"),
        &["result"],
    )
    .unwrap()
});

/// External processes started.
pub static PROCESSES_SPAWNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ytbatch_external_processes_spawned_total",
        "Total external task processes spawned",
    )
    .unwrap()
});

fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(LEDGER_APPENDS.clone()),
        Box::new(PROCESSES_SPAWNED.clone()),
    ]
}

/// Encode the registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the registry to `path`, replacing it atomically.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let body = encode_metrics().map_err(std::io::Error::other)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}
