//! Fleet operation error types.

use super::slot::SlotId;
use thiserror::Error;

/// Errors surfaced to the operator by fleet operations.
///
/// Validation, capacity, and not-found failures are rejected before any
/// state is mutated. Throttling and global-leave deferrals are internal
/// scheduling decisions and never appear here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FleetError {
    /// Operator-supplied display name is shorter than 4 characters
    #[error("bot name must be at least 4 characters: {name}")]
    NameTooShort { name: String },

    /// Operator-supplied unique identifier failed to parse
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Fleet already holds the maximum number of slots
    #[error("maximum of {max} bot slots reached")]
    CapacityReached { max: usize },

    /// Control or command request referenced an unknown slot id
    #[error("slot {0} does not exist")]
    SlotNotFound(SlotId),

    /// Command dispatch with a missing or blank command string
    #[error("no command provided")]
    EmptyCommand,

    /// The fleet actor has shut down and no longer accepts requests
    #[error("fleet is closed")]
    FleetClosed,
}
