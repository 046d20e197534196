//! Fleet configuration models.

use crate::persist::RuntimeSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::time::Duration;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Remote server address and protocol version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            version: default_version(),
        }
    }
}

fn default_version() -> String {
    "1.20.1".to_string()
}

/// Optional in-world auth sequence sent after spawning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub password: String,
}

/// Optional command chatted once after joining
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinCommandConfig {
    pub enabled: bool,
    pub command: String,
}

/// Complete fleet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Remote server to connect to
    pub server: ServerAddress,

    /// In-world auth sequence
    #[serde(default)]
    pub auth: AuthConfig,

    /// Post-join command
    #[serde(default)]
    pub join_command: JoinCommandConfig,

    /// Operator-togglable runtime settings
    #[serde(default)]
    pub settings: RuntimeSettings,

    /// Slots created automatically when the fleet starts
    #[serde(default = "default_initial_slots")]
    pub initial_slots: usize,

    /// Delay before automatic reconnection after a session ends, in seconds
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_initial_slots() -> usize {
    1
}

fn default_reconnect_delay_secs() -> u64 {
    15
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            server: ServerAddress::default(),
            auth: AuthConfig::default(),
            join_command: JoinCommandConfig::default(),
            settings: RuntimeSettings::default(),
            initial_slots: default_initial_slots(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl FleetConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.trim().is_empty() {
            return Err("Server host must not be empty".to_string());
        }

        if self.initial_slots > crate::fleet::slot::MAX_SLOTS {
            return Err(format!(
                "Initial slot count must be at most {}",
                crate::fleet::slot::MAX_SLOTS
            ));
        }

        if self.auth.enabled && self.auth.password.is_empty() {
            return Err("Auth is enabled but no password is set".to_string());
        }

        if self.join_command.enabled && self.join_command.command.trim().is_empty() {
            return Err("Join command is enabled but empty".to_string());
        }

        Ok(())
    }

    /// Delay before automatic reconnection after a session ends
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
