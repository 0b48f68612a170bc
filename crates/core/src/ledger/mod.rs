//! Persistent completion ledger.
//!
//! The ledger is a newline-delimited text file holding one identifier per
//! line. Every identifier in it has completed successfully in some past run.
//! The file is the source of truth: it is read fully into memory at startup
//! and only ever appended to afterwards.

mod error;
mod store;

pub use error::LedgerError;
pub use store::Ledger;
