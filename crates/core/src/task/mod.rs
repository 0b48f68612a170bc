//! External task execution.
//!
//! A [`TaskRunner`] performs the actual work for one identifier, normally by
//! running yt-dlp as a child process. The runner owns the child for its
//! whole life: it streams the child's output through, kills it when the run
//! is cancelled, and maps its exit status to a [`TaskError`].
//!
//! # Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use ytbatch_core::task::{CommandRunner, TaskRunner};
//!
//! let runner = CommandRunner::new(config.task.clone());
//! runner.validate().await?;
//!
//! let cancel = CancellationToken::new();
//! let report = runner.run("https://youtu.be/dQw4w9WgXcQ", &cancel).await?;
//! println!("artifacts in {:?}", report.artifact_dirs);
//! ```

mod args;
mod command;
mod error;
mod traits;

pub use args::TaskArgs;
pub use command::CommandRunner;
pub use error::TaskError;
pub use traits::{TaskReport, TaskRunner};
