//! Fleet actor message types.

use super::errors::FleetError;
use super::slot::{ControlState, SlotId, SlotStatus};
use crate::persist::RuntimeSettings;
use crate::session::SessionEvent;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Command delivery target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    /// Every eligible slot
    All,
    /// One specific slot
    Slot(SlotId),
}

/// Messages that can be sent to the fleet actor
#[derive(Debug)]
pub enum FleetMessage {
    /// Add up to `count` slots with random identities
    AddSlots {
        count: usize,
        response: oneshot::Sender<Result<Vec<SlotId>, FleetError>>,
    },

    /// Add one slot with a custom name and optional identifier
    AddCustomSlot {
        name: String,
        uuid: Option<String>,
        response: oneshot::Sender<Result<SlotId, FleetError>>,
    },

    /// Stop a slot (manual control)
    StopSlot {
        id: SlotId,
        response: oneshot::Sender<bool>,
    },

    /// Resume a stopped slot
    StartSlot {
        id: SlotId,
        response: oneshot::Sender<bool>,
    },

    /// Remove a slot, permanently or as a soft flag
    RemoveSlot {
        id: SlotId,
        permanent: bool,
        response: oneshot::Sender<bool>,
    },

    /// Permanently remove every slot
    RemoveAll { response: oneshot::Sender<usize> },

    /// Dispatch a chat command to one or all eligible slots
    Command {
        text: String,
        target: CommandTarget,
        response: oneshot::Sender<Result<Vec<SlotId>, FleetError>>,
    },

    /// Switch to a new server address, reconnecting all non-stopped slots
    ChangeServer {
        host: String,
        port: u16,
        response: oneshot::Sender<()>,
    },

    /// Replace the runtime settings
    UpdateSettings {
        settings: RuntimeSettings,
        response: oneshot::Sender<()>,
    },

    /// Enumerate slots and fleet totals
    Snapshot {
        response: oneshot::Sender<FleetSnapshot>,
    },

    /// Read the rolling event log, newest first
    Logs {
        limit: usize,
        response: oneshot::Sender<Vec<String>>,
    },

    /// Clear the rolling event log
    ClearLogs { response: oneshot::Sender<()> },

    /// End all sessions and stop the actor
    Shutdown { response: oneshot::Sender<()> },

    /// Internal: a session signal forwarded from a slot's event pump
    Session {
        id: SlotId,
        epoch: u64,
        event: SessionEvent,
    },

    /// Internal: a scheduled connection attempt came due
    RetryConnect { id: SlotId },

    /// Internal: combat decision tick for a locked engagement
    CombatTick { id: SlotId, epoch: u64 },

    /// Internal: the delayed first mocking message came due
    CombatGreeting { id: SlotId, epoch: u64 },

    /// Internal: the global leave window elapsed
    LeaveExpired,
}

/// Operator-facing view of one slot
#[derive(Debug, Clone, serde::Serialize)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub name: String,
    pub online: bool,
    pub status: SlotStatus,
    pub control: ControlState,
    pub health: f32,
    pub food: f32,
    pub last_seen: DateTime<Utc>,
    pub reconnect_attempts: u32,
    pub banned: bool,
}

/// Operator-facing view of the whole fleet
#[derive(Debug, Clone, serde::Serialize)]
pub struct FleetSnapshot {
    /// Slots sorted by id
    pub slots: Vec<SlotSnapshot>,

    /// Slots currently online
    pub online: usize,

    /// Slots the operator has stopped
    pub stopped: usize,

    /// Whether global leave mode is active
    pub leave_active: bool,
}

impl FleetSnapshot {
    /// Total slots held, online or not
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Find a slot view by id
    pub fn slot(&self, id: SlotId) -> Option<&SlotSnapshot> {
        self.slots.iter().find(|slot| slot.id == id)
    }
}
