//! Error types for the task module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can end a task before it succeeded.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Program binary not found.
    #[error("Program not found: {program}")]
    ProgramNotFound { program: PathBuf },

    /// The process could not be started.
    #[error("Failed to start {program}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and reported failure.
    #[error("{program} exited with {}", describe_code(*code))]
    Exit { program: PathBuf, code: Option<i32> },

    /// I/O error while supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before the task finished.
    #[error("Task cancelled")]
    Cancelled,
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl TaskError {
    /// Creates a spawn error, singling out a missing binary.
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let program = program.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::ProgramNotFound { program }
        } else {
            Self::Spawn { program, source }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_not_found() {
        let err = TaskError::spawn(
            "yt-dlp",
            std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        );
        assert!(matches!(err, TaskError::ProgramNotFound { .. }));
    }

    #[test]
    fn test_spawn_other_error() {
        let err = TaskError::spawn(
            "yt-dlp",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, TaskError::Spawn { .. }));
    }

    #[test]
    fn test_exit_message() {
        let err = TaskError::Exit {
            program: PathBuf::from("yt-dlp"),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "yt-dlp exited with exit code 2");

        let err = TaskError::Exit {
            program: PathBuf::from("yt-dlp"),
            code: None,
        };
        assert!(err.to_string().contains("signal"));
    }
}
