//! File-backed persistence wrappers for server history and runtime settings.
//!
//! Both stores are thin read/write wrappers over small JSON files, touched
//! only at startup and on operator changes. File errors are logged and
//! non-fatal; a missing or corrupt file yields defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum entries retained in the server history
pub const MAX_HISTORY: usize = 10;

/// One previously used server address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub host: String,
    pub port: u16,
    pub timestamp: DateTime<Utc>,
    pub name: String,
}

/// Most-recent-first list of server addresses, deduplicated by address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerHistory {
    entries: Vec<ServerEntry>,
}

impl ServerHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an address: any existing entry for the same host/port is
    /// removed, the new entry goes first, and the list is truncated to
    /// [`MAX_HISTORY`]
    pub fn record(&mut self, host: &str, port: u16) {
        self.entries
            .retain(|entry| !(entry.host == host && entry.port == port));
        self.entries.insert(
            0,
            ServerEntry {
                host: host.to_string(),
                port,
                timestamp: Utc::now(),
                name: format!("{host}:{port}"),
            },
        );
        self.entries.truncate(MAX_HISTORY);
    }

    /// Entries, newest first
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runtime settings the operator can toggle while the fleet runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuntimeSettings {
    /// Reconnect automatically after a session ends
    pub auto_reconnect: bool,

    /// Jiggle a random movement intent periodically while online
    pub anti_idle: bool,

    /// Record observed chat messages in the event log
    pub chat_log: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            anti_idle: true,
            chat_log: true,
        }
    }
}

/// File store for [`ServerHistory`]
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the history, falling back to empty on a missing or corrupt file
    pub fn load(&self) -> ServerHistory {
        load_json(&self.path).unwrap_or_else(|| {
            log::info!("No usable history at {}, starting fresh", self.path.display());
            ServerHistory::new()
        })
    }

    /// Write the history back; failures are logged, not propagated
    pub fn save(&self, history: &ServerHistory) {
        save_json(&self.path, history);
    }
}

/// File store for [`RuntimeSettings`]
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load settings, falling back to defaults on a missing or corrupt file
    pub fn load(&self) -> RuntimeSettings {
        load_json(&self.path).unwrap_or_default()
    }

    /// Write settings back; failures are logged, not propagated
    pub fn save(&self, settings: &RuntimeSettings) {
        save_json(&self.path, settings);
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Failed to parse {}: {e}", path.display());
            None
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) {
    let raw = match serde_json::to_string_pretty(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("Failed to serialize {}: {e}", path.display());
            return;
        }
    };
    if let Err(e) = fs::write(path, raw) {
        log::error!("Failed to write {}: {e}", path.display());
    }
}
