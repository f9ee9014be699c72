use thiserror::Error;

use crate::location::Location;
use crate::room::RoomId;

/// Errors raised by room construction, merging and scanning.
///
/// Boxes that cannot be absorbed during a merge are not errors; those tasks are silently pruned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The room id does not address a room of the current network.
    #[error("room {0} is not part of the network")]
    UnknownRoom(RoomId),
    /// Both merge arguments name the same room.
    #[error("room {0} cannot be merged with itself")]
    SameRoom(RoomId),
    /// The rooms of a merge are not adjacent.
    #[error("rooms {first} and {second} share no portal")]
    NoSharedPortal {
        /// First merge argument.
        first: RoomId,
        /// Second merge argument.
        second: RoomId,
    },
    /// Only the room holding the player may carry start variants.
    #[error("rooms {first} and {second} both carry start variants")]
    MultipleStartRooms {
        /// First merge argument.
        first: RoomId,
        /// Second merge argument.
        second: RoomId,
    },
    /// A box starts where it can never be moved off a non-goal cell.
    #[error("box at {0} can never be moved")]
    DeadBox(Location),
    /// The product state space of two rooms does not fit in memory addressing.
    #[error("state space of rooms {first} and {second} overflows")]
    StateOverflow {
        /// First factor of the product.
        first: RoomId,
        /// Second factor of the product.
        second: RoomId,
    },
    /// A merge would grow beyond the configured [`Limits`](crate::Limits).
    #[error("{what} count {count} exceeds the limit of {limit}")]
    LimitExceeded {
        /// What was counted.
        what: &'static str,
        /// The count the merge would reach.
        count: usize,
        /// The configured cap.
        limit: usize,
    },
    /// The progress callback asked to stop.
    #[error("{phase} cancelled after {processed} steps")]
    Cancelled {
        /// The phase that was running.
        phase: &'static str,
        /// Work items handled before the stop.
        processed: usize,
    },
    /// A structural check failed; always a bug.
    #[error("room invariant violated: {0}")]
    Invariant(String),
}
