//! Test doubles for the runner and post-processor seams.
//!
//! These let the orchestrator be exercised end to end without spawning
//! real downloads.
//!
//! # Example
//!
//! ```rust,ignore
//! use ytbatch_core::testing::ScriptedRunner;
//!
//! let runner = Arc::new(ScriptedRunner::new().with_delay(Duration::from_millis(20)));
//! runner.fail("broken", 1);
//! runner.hang("stuck");
//!
//! let summary = Orchestrator::new(runner.clone()).run(ids).await?;
//! assert_eq!(runner.spawn_count(), 3);
//! ```

mod recording_post_processor;
mod scripted_runner;

pub use recording_post_processor::{RecordedProcess, RecordingPostProcessor};
pub use scripted_runner::{Script, ScriptedRunner};
