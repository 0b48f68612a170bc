//! Task runner whose behavior is scripted per identifier.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::task::{TaskError, TaskReport, TaskRunner};

/// What a [`ScriptedRunner`] does for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Succeed after the given delay.
    Succeed(Duration),
    /// Exit with the given code after the runner's default delay.
    Fail(i32),
    /// Block until cancelled.
    Hang,
    /// Panic as soon as the task starts.
    Panic,
    /// Finish successfully, cancelling the shared token on the way out.
    SucceedThenCancel,
}

/// Mock implementation of [`TaskRunner`].
///
/// Unscripted identifiers succeed after the default delay. Every call to
/// `run` counts as one spawned process.
#[derive(Debug)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, Script>>,
    default_delay: Duration,
    artifact_dirs: Vec<PathBuf>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_delay: Duration::from_millis(10),
            artifact_dirs: Vec::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Set how long unscripted tasks take.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Report these directories from every successful task.
    pub fn with_artifacts(mut self, dirs: Vec<PathBuf>) -> Self {
        self.artifact_dirs = dirs;
        self
    }

    pub fn script(&self, identifier: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string(), script);
    }

    pub fn succeed_after(&self, identifier: &str, delay: Duration) {
        self.script(identifier, Script::Succeed(delay));
    }

    pub fn fail(&self, identifier: &str, code: i32) {
        self.script(identifier, Script::Fail(code));
    }

    pub fn hang(&self, identifier: &str) {
        self.script(identifier, Script::Hang);
    }

    pub fn panic_on(&self, identifier: &str) {
        self.script(identifier, Script::Panic);
    }

    pub fn succeed_then_cancel(&self, identifier: &str) {
        self.script(identifier, Script::SucceedThenCancel);
    }

    /// Number of tasks started.
    pub fn spawn_count(&self) -> usize {
        self.calls().len()
    }

    /// Identifiers in the order their tasks started.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of tasks started for `identifier`.
    pub fn calls_for(&self, identifier: &str) -> usize {
        self.calls().iter().filter(|c| *c == identifier).count()
    }

    /// Highest number of tasks that were running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn script_for(&self, identifier: &str) -> Script {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
            .unwrap_or(Script::Succeed(self.default_delay))
    }

    fn report(&self) -> TaskReport {
        TaskReport {
            artifact_dirs: self.artifact_dirs.clone(),
        }
    }
}

/// Decrements the in-flight count when a task ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, TaskError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identifier.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let wait = |delay: Duration| async move {
            tokio::select! {
                biased;
                _ = tokio::time::sleep(delay) => true,
                _ = cancel.cancelled() => false,
            }
        };

        match self.script_for(identifier) {
            Script::Succeed(delay) => {
                if wait(delay).await {
                    Ok(self.report())
                } else {
                    Err(TaskError::Cancelled)
                }
            }
            Script::Fail(code) => {
                if wait(self.default_delay).await {
                    Err(TaskError::Exit {
                        program: PathBuf::from("scripted"),
                        code: Some(code),
                    })
                } else {
                    Err(TaskError::Cancelled)
                }
            }
            Script::Hang => {
                cancel.cancelled().await;
                Err(TaskError::Cancelled)
            }
            Script::Panic => panic!("scripted panic for {}", identifier),
            Script::SucceedThenCancel => {
                cancel.cancel();
                Ok(self.report())
            }
        }
    }

    async fn validate(&self) -> Result<(), TaskError> {
        Ok(())
    }
}
