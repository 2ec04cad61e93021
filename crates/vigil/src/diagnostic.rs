//! # Diagnostic Log
//!
//! A bounded, most-recent-N record of noteworthy events shown to operators
//! in the panel. Entries are never mutated after insertion; when the log is
//! full the oldest entry is evicted first.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

/// Maximum number of retained entries
pub const MAX_LOG_ENTRIES: usize = 10;

/// Format of the entry timestamp (local wall-clock time)
const ENTRY_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticLogEntry {
    /// Formatted local time of insertion
    pub time: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<DiagnosticLogEntry>,
    capacity: usize,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    /// Create a log retaining at most `capacity` entries. A zero capacity
    /// is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.push_at(message, Local::now());
    }

    /// Append an entry stamped with `now`, evicting the oldest entry if full.
    pub fn push_at(&mut self, message: impl Into<String>, now: DateTime<Local>) {
        let message = message.into();
        info!(target: "vigil::diagnostic", message = %message, "Diagnostic entry");

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(DiagnosticLogEntry {
            time: now.format(ENTRY_TIME_FORMAT).to_string(),
            message,
        });
    }

    /// Entries in chronological order (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &DiagnosticLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&DiagnosticLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<DiagnosticLogEntry> {
        self.entries.iter().cloned().collect()
    }
}
