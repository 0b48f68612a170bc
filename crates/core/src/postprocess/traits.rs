//! Trait definitions for the postprocess module.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::PostProcessError;

/// Outcome of post-processing one job's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostProcessReport {
    /// Whether there was anything to work on.
    pub attempted: bool,
    /// Files that were updated.
    pub files_processed: usize,
    /// Files that could not be updated.
    pub errors: usize,
}

impl PostProcessReport {
    /// Adds up the reports for several directories.
    pub fn merge(mut self, other: PostProcessReport) -> Self {
        self.attempted |= other.attempted;
        self.files_processed += other.files_processed;
        self.errors += other.errors;
        self
    }

    /// Short human readable status.
    pub fn describe(&self) -> String {
        if !self.attempted {
            "thumbnail not embedded".to_string()
        } else if self.errors > 0 {
            format!(
                "thumbnails embedded in {} files, {} errors",
                self.files_processed, self.errors
            )
        } else {
            format!("thumbnails embedded in {} files", self.files_processed)
        }
    }
}

/// Works on the files a successful task produced.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Returns the name of this post-processor.
    fn name(&self) -> &str;

    /// Processes the given output directories of `identifier`.
    ///
    /// Stops early once `cancel` fires, leaving unprocessed files as they are.
    async fn process(
        &self,
        identifier: &str,
        dirs: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<PostProcessReport, PostProcessError>;

    /// Validates that the post-processor is properly configured and ready.
    async fn validate(&self) -> Result<(), PostProcessError>;
}
