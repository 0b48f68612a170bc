//! Post-processing of task output.
//!
//! Runs after a task succeeded and before its identifier is recorded. A
//! post-processor reports its own problems; they are shown with the job's
//! result but never turn a successful download into a failure.

mod error;
mod thumbnail;
mod traits;

pub use error::PostProcessError;
pub use thumbnail::ThumbnailEmbedder;
pub use traits::{PostProcessReport, PostProcessor};
