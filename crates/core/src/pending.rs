//! In-flight admission gate.
//!
//! Tracks the identifiers currently executing in this process so the same
//! identifier never runs twice at once. This is independent of the ledger,
//! which only knows about past runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Set of identifiers currently being worked on.
#[derive(Debug, Default)]
pub struct PendingTracker {
    in_flight: Mutex<HashSet<String>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `identifier` if absent. Returns false if it is already in flight.
    pub fn acquire(&self, identifier: &str) -> bool {
        self.lock().insert(identifier.to_string())
    }

    /// Remove `identifier`. Removing an absent identifier is a no-op.
    pub fn release(&self, identifier: &str) {
        self.lock().remove(identifier);
    }

    /// Acquire `identifier` and tie its release to the returned guard.
    ///
    /// The guard releases on drop, which covers early returns, task
    /// cancellation and panics.
    pub fn admit(self: &Arc<Self>, identifier: &str) -> Option<PendingGuard> {
        if !self.acquire(identifier) {
            return None;
        }
        Some(PendingGuard {
            tracker: Arc::clone(self),
            identifier: identifier.to_string(),
        })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.lock().contains(identifier)
    }

    /// Number of identifiers currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission held by one job. Releases the identifier when dropped.
#[derive(Debug)]
pub struct PendingGuard {
    tracker: Arc<PendingTracker>,
    identifier: String,
}

impl PendingGuard {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.identifier);
    }
}
