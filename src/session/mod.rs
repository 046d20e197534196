//! Narrow interface to the game-protocol collaborator.
//!
//! The concrete protocol client (connect/chat/inventory/movement primitives)
//! lives outside this crate. The fleet consumes it through [`Connector`] and
//! [`GameSession`], and receives session signals as an ordered
//! [`SessionEvent`] stream.

use crate::identity::Identity;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by the session collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The collaborator refused to open a session at all
    #[error("connection refused: {0}")]
    Refused(String),

    /// The session is already closed
    #[error("session closed")]
    Closed,
}

/// Movement intents understood by the session collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Sprint,
}

/// All movement directions, used for randomized anti-idle movement
pub const MOVE_DIRECTIONS: [MoveDirection; 6] = [
    MoveDirection::Forward,
    MoveDirection::Back,
    MoveDirection::Left,
    MoveDirection::Right,
    MoveDirection::Jump,
    MoveDirection::Sprint,
];

/// Information about the entity that last damaged the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackerInfo {
    /// Attacker display name
    pub name: String,

    /// Whether the attacker is a player-controlled entity
    pub is_player: bool,
}

/// Signals delivered by a live session.
///
/// For a given session, events are delivered in the order the underlying
/// connection produced them; they are never reordered or coalesced.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The bot entity spawned into the world; the session is fully online
    Spawned,
    /// Own health changed
    HealthChanged(f32),
    /// Own food level changed
    FoodChanged(f32),
    /// The bot's own entity received damage
    SelfDamaged { attacker: Option<AttackerInfo> },
    /// The bot's own entity died
    Died,
    /// A chat message was observed
    Chat { sender: String, text: String },
    /// Another participant joined the world
    PlayerJoined(String),
    /// Another participant left the world
    PlayerLeft(String),
    /// The server kicked the session, with a human-readable reason
    Kicked { reason: String },
    /// A network or protocol failure occurred
    Errored { message: String },
    /// The session ended; no further events follow
    Ended,
}

/// Snapshot of a locked target as seen by the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    /// Target health; non-positive means dead
    pub health: f64,

    /// Distance from the bot to the target, in world units
    pub distance: f64,
}

/// A live connection to the remote server for one slot.
///
/// Action methods must not block the caller beyond queueing the action with
/// the underlying connection; queries are expected to answer from local
/// session state.
#[async_trait]
pub trait GameSession: Send + Sync {
    /// Send a chat message
    async fn chat(&self, text: &str);

    /// End the session with a human-readable reason
    async fn quit(&self, reason: &str);

    /// Equip an inventory item into the main hand
    async fn equip(&self, item: &str);

    /// Issue an attack action against the named entity
    async fn attack(&self, target: &str);

    /// Stop any attack action in progress
    async fn stop_attack(&self);

    /// Press or release a movement intent
    async fn set_movement_intent(&self, direction: MoveDirection, active: bool);

    /// Ask the movement collaborator to follow the target at a distance
    async fn pursue(&self, target: &str, distance: f64);

    /// Item names currently held in inventory
    async fn inventory_items(&self) -> Vec<String>;

    /// Whether the bot's own entity currently exists in the world
    async fn self_alive(&self) -> bool;

    /// Current state of the named entity, or `None` if it is invalid/gone
    async fn target_state(&self, name: &str) -> Option<TargetState>;
}

/// Factory opening new sessions.
///
/// `connect` must return promptly: connection establishment continues in the
/// background, and establishment failures are delivered on the event stream
/// as [`SessionEvent::Errored`] followed by [`SessionEvent::Ended`]. An
/// immediate `Err` is reserved for requests the collaborator cannot even
/// begin (e.g. an unresolvable address).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new session presenting the given identity
    async fn connect(
        &self,
        host: &str,
        port: u16,
        identity: &Identity,
        protocol_version: &str,
    ) -> Result<(Arc<dyn GameSession>, mpsc::Receiver<SessionEvent>), SessionError>;
}
