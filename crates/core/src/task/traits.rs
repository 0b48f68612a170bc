//! Trait definitions for the task module.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::TaskError;

/// What a successful task left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Directories the task wrote its final files into, if it told us.
    pub artifact_dirs: Vec<PathBuf>,
}

/// Performs the work for one identifier.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs the task for `identifier` to completion.
    ///
    /// Returns [`TaskError::Cancelled`] if `cancel` fires before the task
    /// has finished. A task that already finished successfully is reported
    /// as such even if `cancel` fired in the meantime.
    async fn run(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, TaskError>;

    /// Validates that the runner is properly configured and ready.
    async fn validate(&self) -> Result<(), TaskError>;
}
