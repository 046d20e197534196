//! # Craft Fleet
//!
//! An orchestrator for a fleet of autonomous game-world clients ("bot
//! slots"). Each slot keeps its own identity, connects to a remote server
//! through a pluggable session collaborator, reacts to being attacked, and
//! reconnects after failure with throttling and ban-triggered identity
//! rotation.
//!
//! ## Architecture
//!
//! All fleet state is owned by a single actor task fed by an async message
//! inbox, so registry mutation is always atomic with respect to observation:
//!
//! - **Identity registry**: display name + unique id per slot, rotated
//!   wholesale on ban detection or explicit operator request
//! - **Fleet registry**: the process-wide table of slot records
//! - **Connection supervisor**: per-slot connect → online → disconnect →
//!   reconnect lifecycle with throttling and kick classification
//! - **Global leave coordinator**: chat-triggered, time-boxed mass
//!   withdrawal that suppresses reconnection fleet-wide
//! - **Combat engine**: reactive engagement state machine with a periodic
//!   decision tick
//! - **Command dispatcher**: routes operator text commands to one or all
//!   eligible slots
//!
//! The game-protocol client itself is out of scope and consumed through the
//! [`session::Connector`] / [`session::GameSession`] traits.
//!
//! ## Example
//!
//! ```no_run
//! use craft_fleet::{FleetActor, FleetConfig};
//! use std::sync::Arc;
//!
//! # fn connector() -> Arc<dyn craft_fleet::session::Connector> { unimplemented!() }
//! #[tokio::main]
//! async fn main() {
//!     let (actor, handle) = FleetActor::new(FleetConfig::default(), connector());
//!     tokio::spawn(actor.run());
//!
//!     let ids = handle.add_slots(3).await.unwrap();
//!     println!("started slots: {ids:?}");
//! }
//! ```

/// Combat engagement engine: target locking, weapon choice, tick decisions.
pub mod combat;

/// Fleet-wide configuration models.
pub mod config;

/// Bounded rolling log of fleet events for the operator surface.
pub mod eventlog;

/// Fleet actor, registry, slot records, and operator messages.
pub mod fleet;

/// Bot identity generation and rotation.
pub mod identity;

/// File-backed server history and runtime settings wrappers.
pub mod persist;

/// Narrow interface to the game-protocol collaborator.
pub mod session;

pub use config::FleetConfig;
pub use fleet::{
    actor::{FleetActor, FleetHandle},
    errors::FleetError,
    messages::{CommandTarget, FleetSnapshot, SlotSnapshot},
    slot::{ControlState, MAX_SLOTS, SlotId, SlotStatus},
};
pub use identity::{Identity, IdentityRegistry};
pub use persist::{RuntimeSettings, ServerHistory};
pub use session::{Connector, GameSession, SessionEvent};
