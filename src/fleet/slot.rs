//! Bot slot records and connection lifecycle models.

use crate::session::GameSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tokio::time::{Duration, Instant};

/// Bot slot identifier (operator-visible, 1..=[`MAX_SLOTS`])
pub type SlotId = u32;

/// Maximum number of slots the fleet can hold
pub const MAX_SLOTS: usize = 20;

/// Attempts allowed before the reconnect throttle kicks in
pub const THROTTLE_FREE_ATTEMPTS: u32 = 3;

/// Cooldown window enforced after repeated connection attempts
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(30);

/// Connection lifecycle status of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Connecting,
    Online,
    Kicked,
    Error,
    Disconnected,
    Starting,
    Stopped,
    Removed,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            SlotStatus::Connecting => "connecting",
            SlotStatus::Online => "online",
            SlotStatus::Kicked => "kicked",
            SlotStatus::Error => "error",
            SlotStatus::Disconnected => "disconnected",
            SlotStatus::Starting => "starting",
            SlotStatus::Stopped => "stopped",
            SlotStatus::Removed => "removed",
        };
        write!(f, "{repr}")
    }
}

/// Operator-controlled run state, independent of the connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlState {
    Running,
    Stopped,
}

/// One fleet slot: a logical bot identity/connection unit.
///
/// A slot persists across disconnect/reconnect cycles and is destroyed only
/// by an explicit permanent removal. At most one live session exists per
/// slot at any time; `online` implies the session handle is present and the
/// status is [`SlotStatus::Online`].
pub struct BotSlot {
    /// Slot id
    pub id: SlotId,

    /// Live session handle, if any
    pub session: Option<Arc<dyn GameSession>>,

    /// Whether the slot is currently online (spawned in the world)
    pub online: bool,

    /// Connection lifecycle status
    pub status: SlotStatus,

    /// Operator run/stop control state
    pub control: ControlState,

    /// Last time the slot was seen transitioning (for the operator surface)
    pub last_seen: DateTime<Utc>,

    /// Current health
    pub health: f32,

    /// Current food level
    pub food: f32,

    /// Connection attempts since the last successful spawn
    pub reconnect_attempts: u32,

    /// When the last connection attempt (or kick/error) was stamped
    pub last_reconnect_attempt: Option<Instant>,

    /// Whether the last kick was classified as a ban
    pub banned: bool,

    /// Whether the operator removed this slot (soft removal flag)
    pub manually_removed: bool,

    /// Session generation counter; stale timer/session messages carry an
    /// older epoch and are dropped
    pub epoch: u64,
}

impl BotSlot {
    /// Create a fresh slot in the given control state
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            session: None,
            online: false,
            status: SlotStatus::Starting,
            control: ControlState::Running,
            last_seen: Utc::now(),
            health: 20.0,
            food: 20.0,
            reconnect_attempts: 0,
            last_reconnect_attempt: None,
            banned: false,
            manually_removed: false,
            epoch: 0,
        }
    }

    /// Flag the slot offline and record the terminal status
    pub fn mark_offline(&mut self, status: SlotStatus) {
        self.online = false;
        self.status = status;
        self.last_seen = Utc::now();
    }

    /// Whether the slot is eligible to receive a dispatched command
    pub fn commandable(&self) -> bool {
        self.online && self.control != ControlState::Stopped
    }
}

impl fmt::Debug for BotSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotSlot")
            .field("id", &self.id)
            .field("online", &self.online)
            .field("status", &self.status)
            .field("control", &self.control)
            .field("reconnect_attempts", &self.reconnect_attempts)
            .field("banned", &self.banned)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Remaining cooldown before another connection attempt is allowed.
///
/// Returns `None` when the attempt may proceed now. The deferral is the
/// remainder of the window, not a fresh window: an attempt at elapsed time
/// `e` defers by exactly `30s - e`.
pub fn throttle_delay(attempts: u32, elapsed: Duration) -> Option<Duration> {
    if attempts > THROTTLE_FREE_ATTEMPTS && elapsed < THROTTLE_WINDOW {
        Some(THROTTLE_WINDOW - elapsed)
    } else {
        None
    }
}

/// Substrings that classify a kick reason as a ban
const BAN_KEYWORDS: [&str; 6] = ["ban", "banned", "permanent", "blacklist", "hacking", "cheat"];

/// Best-effort ban classifier: flat case-insensitive substring match over
/// the kick reason. Can misclassify kicks that mention a keyword in an
/// unrelated context.
pub fn is_ban_reason(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    BAN_KEYWORDS.iter().any(|keyword| reason.contains(keyword))
}
