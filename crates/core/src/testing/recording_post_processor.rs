//! Post-processor that only records what it was asked to do.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::postprocess::{PostProcessError, PostProcessReport, PostProcessor};

/// One recorded `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedProcess {
    pub identifier: String,
    pub dirs: Vec<PathBuf>,
}

/// Mock implementation of [`PostProcessor`].
#[derive(Debug, Default)]
pub struct RecordingPostProcessor {
    calls: Mutex<Vec<RecordedProcess>>,
    fail: bool,
    panic: bool,
}

impl RecordingPostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `process` call return an error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Make every `process` call panic after recording it.
    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<RecordedProcess> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PostProcessor for RecordingPostProcessor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn process(
        &self,
        identifier: &str,
        dirs: &[PathBuf],
        _cancel: &CancellationToken,
    ) -> Result<PostProcessReport, PostProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedProcess {
                identifier: identifier.to_string(),
                dirs: dirs.to_vec(),
            });

        if self.panic {
            panic!("recording post-processor set to panic for {}", identifier);
        }
        if self.fail {
            return Err(PostProcessError::FfmpegUnusable {
                reason: "recording post-processor set to fail".to_string(),
            });
        }

        Ok(PostProcessReport {
            attempted: true,
            files_processed: dirs.len(),
            errors: 0,
        })
    }

    async fn validate(&self) -> Result<(), PostProcessError> {
        Ok(())
    }
}
