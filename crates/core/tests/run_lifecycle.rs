//! Batch run integration tests.
//!
//! These drive the orchestrator end to end with a scripted runner and a real
//! ledger file in a temporary directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use ytbatch_core::{
    testing::{RecordingPostProcessor, ScriptedRunner},
    JobOutcome, Ledger, Orchestrator, PostProcessError, PostProcessReport, PostProcessor,
    RunOptions, RunSummary,
};

/// Test helper owning a ledger file and a scripted runner.
struct TestHarness {
    runner: Arc<ScriptedRunner>,
    ledger_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_runner(ScriptedRunner::new())
    }

    fn with_runner(runner: ScriptedRunner) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let ledger_path = temp_dir.path().join("archive.txt");
        Self {
            runner: Arc::new(runner),
            ledger_path,
            _temp_dir: temp_dir,
        }
    }

    fn ledger(&self) -> Arc<Ledger> {
        Arc::new(Ledger::load(&self.ledger_path).expect("Failed to load ledger"))
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.runner.clone()).with_ledger(self.ledger())
    }

    fn ledger_lines(&self) -> Vec<String> {
        read_lines(&self.ledger_path)
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn assert_counts_add_up(summary: &RunSummary) {
    assert_eq!(
        summary.submitted,
        summary.succeeded + summary.skipped + summary.errored,
        "counters do not add up: {:?}",
        summary
    );
    assert_eq!(summary.jobs.len(), summary.submitted);
}

#[tokio::test]
async fn test_fresh_run_records_every_success() {
    let harness = TestHarness::new();

    let summary = harness.orchestrator().run(ids(&["a", "b", "c"])).await.unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.exit_code(), 0);
    assert!(!summary.interrupted);

    let mut lines = harness.ledger_lines();
    lines.sort();
    assert_eq!(lines, ids(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_rerun_spawns_nothing() {
    let harness = TestHarness::new();
    harness.orchestrator().run(ids(&["a", "b"])).await.unwrap();
    assert_eq!(harness.runner.spawn_count(), 2);

    let summary = harness.orchestrator().run(ids(&["a", "b"])).await.unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.skipped, 2);
    assert!(summary
        .jobs
        .iter()
        .all(|job| job.outcome == JobOutcome::SkippedAlreadyDone));
    assert_eq!(harness.runner.spawn_count(), 2);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_repeated_input_runs_once() {
    let harness = TestHarness::new();

    let summary = harness.orchestrator().run(ids(&["a", "a", "b"])).await.unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.submitted, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.runner.calls_for("a"), 1);
    assert_eq!(harness.runner.calls_for("b"), 1);

    let outcomes: Vec<&JobOutcome> = summary.jobs.iter().map(|j| &j.outcome).collect();
    assert!(matches!(outcomes[0], JobOutcome::Succeeded { .. }));
    assert_eq!(outcomes[1], &JobOutcome::SkippedDuplicate);
    assert!(matches!(outcomes[2], JobOutcome::Succeeded { .. }));

    let mut lines = harness.ledger_lines();
    lines.sort();
    assert_eq!(lines, ids(&["a", "b"]));
}

#[tokio::test]
async fn test_concurrent_duplicates_without_input_dedup() {
    let harness =
        TestHarness::with_runner(ScriptedRunner::new().with_delay(Duration::from_millis(200)));
    let orchestrator = harness
        .orchestrator()
        .with_options(RunOptions { dedup_input: false });

    let summary = orchestrator.run(ids(&["x"; 5])).await.unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(harness.runner.spawn_count(), 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 4);
    assert_eq!(harness.ledger_lines(), ids(&["x"]));
    assert!(orchestrator.pending().is_empty());
}

#[tokio::test]
async fn test_jobs_run_concurrently() {
    let harness =
        TestHarness::with_runner(ScriptedRunner::new().with_delay(Duration::from_millis(100)));

    let summary = harness
        .orchestrator()
        .run(ids(&["a", "b", "c", "d", "e"]))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 5);
    assert_eq!(harness.runner.peak_concurrency(), 5);
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let harness = TestHarness::new();
    harness.runner.fail("bad", 1);

    let summary = harness
        .orchestrator()
        .run(ids(&["good", "bad", "fine"]))
        .await
        .unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.exit_code(), 1);
    assert!(
        matches!(&summary.job("bad").unwrap().outcome, JobOutcome::Failed { reason } if reason.contains("exit code 1"))
    );

    let mut lines = harness.ledger_lines();
    lines.sort();
    assert_eq!(lines, ids(&["fine", "good"]));
}

#[tokio::test]
async fn test_failed_item_is_retried_next_run() {
    let harness = TestHarness::new();
    harness.runner.fail("flaky", 1);
    harness.orchestrator().run(ids(&["flaky"])).await.unwrap();
    assert!(harness.ledger_lines().is_empty());

    harness
        .runner
        .succeed_after("flaky", Duration::from_millis(1));
    let summary = harness.orchestrator().run(ids(&["flaky"])).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.runner.calls_for("flaky"), 2);
    assert_eq!(harness.ledger_lines(), ids(&["flaky"]));
}

#[tokio::test]
async fn test_ledger_write_failure_needs_reconciliation() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator();

    // Replace the ledger file with a directory so appends fail.
    std::fs::remove_file(&harness.ledger_path).unwrap();
    std::fs::create_dir(&harness.ledger_path).unwrap();

    let summary = orchestrator.run(ids(&["a"])).await.unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.exit_code(), 1);
    assert!(matches!(
        summary.job("a").unwrap().outcome,
        JobOutcome::SucceededWithLedgerError { .. }
    ));
    assert_eq!(summary.needs_reconciliation(), vec!["a"]);
    assert!(summary.to_string().contains("NOT recorded"));

    // Not recorded, so the next run does the work again.
    std::fs::remove_dir(&harness.ledger_path).unwrap();
    let summary = harness.orchestrator().run(ids(&["a"])).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.runner.calls_for("a"), 2);
    assert_eq!(harness.ledger_lines(), ids(&["a"]));
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    let harness = TestHarness::new();
    harness.runner.hang("slow-1");
    harness.runner.hang("slow-2");
    harness
        .runner
        .succeed_after("quick", Duration::from_millis(5));

    let token = CancellationToken::new();
    let orchestrator = harness.orchestrator().with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run(ids(&["slow-1", "quick", "slow-2"])),
    )
    .await
    .expect("run should finish after cancellation")
    .unwrap();

    assert_counts_add_up(&summary);
    assert!(summary.interrupted);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.errored, 2);
    assert_eq!(summary.job("slow-1").unwrap().outcome, JobOutcome::Cancelled);
    assert_eq!(summary.job("slow-2").unwrap().outcome, JobOutcome::Cancelled);
    assert_eq!(summary.exit_code(), 1);
    assert!(summary.to_string().contains("INTERRUPTED"));

    // Completed work stays recorded.
    assert_eq!(harness.ledger_lines(), ids(&["quick"]));
    assert!(orchestrator.pending().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_launches_nothing() {
    let harness = TestHarness::new();
    let token = CancellationToken::new();
    token.cancel();

    let summary = harness
        .orchestrator()
        .with_cancellation(token)
        .run(ids(&["a", "b"]))
        .await
        .unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.errored, 2);
    assert!(summary
        .jobs
        .iter()
        .all(|job| job.outcome == JobOutcome::Cancelled));
    assert_eq!(harness.runner.spawn_count(), 0);
    assert!(harness.ledger_lines().is_empty());
}

#[tokio::test]
async fn test_already_done_wins_over_cancellation() {
    let harness = TestHarness::new();
    harness.orchestrator().run(ids(&["done"])).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let summary = harness
        .orchestrator()
        .with_cancellation(token)
        .run(ids(&["done"]))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_without_ledger_work_is_repeated() {
    let harness = TestHarness::new();
    let orchestrator = Orchestrator::new(harness.runner.clone());

    orchestrator.run(ids(&["a"])).await.unwrap();
    let summary = orchestrator.run(ids(&["a"])).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.runner.calls_for("a"), 2);
    assert!(harness.ledger_lines().is_empty());
}

#[tokio::test]
async fn test_post_processor_sees_successful_artifacts() {
    let out = PathBuf::from("/downloads/album");
    let harness =
        TestHarness::with_runner(ScriptedRunner::new().with_artifacts(vec![out.clone()]));
    harness.runner.fail("broken", 1);
    let processor = Arc::new(RecordingPostProcessor::new());

    let summary = harness
        .orchestrator()
        .with_post_processor(processor.clone())
        .run(ids(&["ok", "broken"]))
        .await
        .unwrap();

    let recorded = processor.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].identifier, "ok");
    assert_eq!(recorded[0].dirs, vec![out]);

    match &summary.job("ok").unwrap().outcome {
        JobOutcome::Succeeded {
            post_process: Some(report),
        } => assert_eq!(report.files_processed, 1),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_post_processing_errors_do_not_fail_the_job() {
    let harness = TestHarness::with_runner(
        ScriptedRunner::new().with_artifacts(vec![PathBuf::from("/downloads")]),
    );

    let summary = harness
        .orchestrator()
        .with_post_processor(Arc::new(RecordingPostProcessor::failing()))
        .run(ids(&["a"]))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.exit_code(), 0);
    match &summary.job("a").unwrap().outcome {
        JobOutcome::Succeeded {
            post_process: Some(report),
        } => assert_eq!(report.errors, 1),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(harness.ledger_lines(), ids(&["a"]));
}

#[tokio::test]
async fn test_mixed_run_summary() {
    let harness = TestHarness::new();
    harness.orchestrator().run(ids(&["old"])).await.unwrap();
    harness.runner.fail("bad", 2);

    let summary = harness
        .orchestrator()
        .run(ids(&["old", "new", "bad", "new"]))
        .await
        .unwrap();

    assert_counts_add_up(&summary);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.errored, 1);

    let counts = summary.outcome_counts();
    assert_eq!(counts.get("skipped_already_done"), Some(&1));
    assert_eq!(counts.get("skipped_duplicate"), Some(&1));
    assert_eq!(counts.get("failed"), Some(&1));

    let sequences: Vec<usize> = summary.jobs.iter().map(|j| j.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_repeat_and_failure_scenario() {
    let harness = TestHarness::new();
    harness.runner.fail("b", 1);

    let summary = harness.orchestrator().run(ids(&["a", "a", "b"])).await.unwrap();

    assert_counts_add_up(&summary);
    let a: Vec<&JobOutcome> = summary.jobs_for("a").map(|j| &j.outcome).collect();
    assert_eq!(a.len(), 2);
    assert!(a.iter().any(|o| matches!(o, JobOutcome::Succeeded { .. })));
    assert!(a.contains(&&JobOutcome::SkippedDuplicate));
    assert!(matches!(
        summary.job("b").unwrap().outcome,
        JobOutcome::Failed { .. }
    ));
    assert_eq!(harness.ledger_lines(), ids(&["a"]));
    assert_ne!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_finished_task_is_recorded_despite_late_cancel() {
    let harness = TestHarness::new();
    harness.runner.hang("other");
    harness.runner.succeed_then_cancel("done");

    let token = CancellationToken::new();
    let orchestrator = harness.orchestrator().with_cancellation(token.clone());

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run(ids(&["other", "done"])),
    )
    .await
    .expect("run should finish after cancellation")
    .unwrap();

    assert_counts_add_up(&summary);
    assert!(summary.interrupted);
    assert!(token.is_cancelled());
    assert!(matches!(
        summary.job("done").unwrap().outcome,
        JobOutcome::Succeeded { .. }
    ));
    assert_eq!(summary.job("other").unwrap().outcome, JobOutcome::Cancelled);
    assert_eq!(harness.ledger_lines(), ids(&["done"]));
}

#[tokio::test]
async fn test_panicking_post_processor_keeps_success() {
    let harness = TestHarness::with_runner(
        ScriptedRunner::new().with_artifacts(vec![PathBuf::from("/downloads")]),
    );

    let summary = harness
        .orchestrator()
        .with_post_processor(Arc::new(RecordingPostProcessor::panicking()))
        .run(ids(&["a"]))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.exit_code(), 0);
    match &summary.job("a").unwrap().outcome {
        JobOutcome::Succeeded {
            post_process: Some(report),
        } => assert_eq!(report.errors, 1),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(harness.ledger_lines(), ids(&["a"]));
}

/// Post-processor that notes the ledger contents when it is called.
struct LedgerSnapshot {
    ledger_path: PathBuf,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl PostProcessor for LedgerSnapshot {
    fn name(&self) -> &str {
        "ledger-snapshot"
    }

    async fn process(
        &self,
        _identifier: &str,
        _dirs: &[PathBuf],
        _cancel: &CancellationToken,
    ) -> Result<PostProcessReport, PostProcessError> {
        *self.seen.lock().unwrap() = read_lines(&self.ledger_path);
        Ok(PostProcessReport::default())
    }

    async fn validate(&self) -> Result<(), PostProcessError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_ledger_is_written_before_post_processing() {
    let harness = TestHarness::with_runner(
        ScriptedRunner::new().with_artifacts(vec![PathBuf::from("/downloads")]),
    );
    let snapshot = Arc::new(LedgerSnapshot {
        ledger_path: harness.ledger_path.clone(),
        seen: Mutex::new(Vec::new()),
    });

    harness
        .orchestrator()
        .with_post_processor(snapshot.clone())
        .run(ids(&["a"]))
        .await
        .unwrap();

    assert_eq!(*snapshot.seen.lock().unwrap(), ids(&["a"]));
}
