//! Error types for the ledger module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or appending to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger location could not be determined.
    #[error("Failed to locate ledger file: {0}")]
    Locate(#[source] std::io::Error),

    /// The ledger file could not be opened or created for reading.
    #[error("Failed to open ledger file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ledger file exists but could not be read.
    #[error("Failed to read ledger file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending an identifier failed. The identifier is not recorded.
    #[error("Failed to append {identifier:?} to ledger file {path}")]
    Write {
        path: PathBuf,
        identifier: String,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    /// Whether the run can continue after this error.
    ///
    /// Only write failures are local to one job; anything else means the
    /// dedup state cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Write { .. })
    }
}
