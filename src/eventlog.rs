//! Bounded rolling log of fleet events for the operator surface.

use crate::fleet::slot::SlotId;
use chrono::Utc;
use std::collections::VecDeque;
use std::fmt;

/// Maximum entries retained
pub const MAX_ENTRIES: usize = 100;

/// Default number of entries returned to the operator surface
pub const VIEW_LIMIT: usize = 30;

/// Where a log entry originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    System,
    Slot(SlotId),
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::System => write!(f, "SYSTEM"),
            LogSource::Slot(id) => write!(f, "BOT {id}"),
        }
    }
}

/// Rolling event log, newest entries first
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<String>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_ENTRIES),
        }
    }

    /// Record an event, evicting the oldest entry past [`MAX_ENTRIES`]
    pub fn push(&mut self, source: LogSource, message: impl AsRef<str>) {
        let timestamp = Utc::now().format("%H:%M:%S");
        let entry = format!("[{timestamp}] [{source}] {}", message.as_ref());
        log::debug!("{entry}");

        self.entries.push_front(entry);
        if self.entries.len() > MAX_ENTRIES {
            self.entries.pop_back();
        }
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<String> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
