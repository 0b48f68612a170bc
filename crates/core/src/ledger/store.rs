//! File-backed ledger implementation.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::error::LedgerError;
use crate::metrics;

/// Durable, deduplicated record of identifiers that completed successfully.
///
/// One mutex covers both the in-memory set and the file, so a check followed
/// by a write can never interleave with another append.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Mutex<HashSet<String>>,
}

impl Ledger {
    /// Open the ledger at `path`, creating an empty file if none exists.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = Self::read_entries(&path)?;
        info!("Loaded {} entries from ledger {:?}", entries.len(), path);

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Read every identifier in the file at `path`.
    ///
    /// Blank lines are skipped, lines are trimmed and repeated lines collapse.
    /// A missing file is created. An existing file only has to be readable;
    /// if it cannot be written, appends fail per identifier instead.
    pub fn read_entries(path: &Path) -> Result<HashSet<String>, LedgerError> {
        let open_error = |source| LedgerError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Creating ledger file {:?}", path);
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(open_error)?;
                File::open(path).map_err(open_error)?
            }
            Err(e) => return Err(open_error(e)),
        };

        let mut entries = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let line = line.trim();
            if !line.is_empty() {
                entries.insert(line.to_string());
            }
        }

        Ok(entries)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `identifier` has been recorded.
    pub fn contains(&self, identifier: &str) -> bool {
        self.lock().contains(identifier)
    }

    /// Number of recorded identifiers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `identifier` as completed.
    ///
    /// Appending an identifier that is already present is a no-op. The
    /// in-memory set is only updated after the line reached the file.
    pub fn append(&self, identifier: &str) -> Result<(), LedgerError> {
        let mut entries = self.lock();

        if entries.contains(identifier) {
            debug!("{:?} already present in ledger", identifier);
            return Ok(());
        }

        match self.write_line(identifier) {
            Ok(()) => {
                entries.insert(identifier.to_string());
                metrics::LEDGER_APPENDS.with_label_values(&["ok"]).inc();
                Ok(())
            }
            Err(source) => {
                metrics::LEDGER_APPENDS.with_label_values(&["error"]).inc();
                Err(LedgerError::Write {
                    path: self.path.clone(),
                    identifier: identifier.to_string(),
                    source,
                })
            }
        }
    }

    fn write_line(&self, identifier: &str) -> std::io::Result<()> {
        if identifier.contains(|c: char| c == '\n' || c == '\r') {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "identifier contains a line break",
            ));
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(format!("{}\n", identifier).as_bytes())?;
        file.sync_data()
    }

    // The set is only mutated after a successful write, so a poisoned lock
    // still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
