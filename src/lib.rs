#![warn(missing_docs)]

//! # `sokoroom`
//!
//! Reduction of [Sokoban](https://en.wikipedia.org/wiki/Sokoban) state spaces by room decomposition.
//! Begin by building a board with [`BoardBuilder`](builder::BoardBuilder), either feature by feature or by parsing level text.
//! Convert it to a [`RoomNetwork`], then repeatedly [`merge`](RoomNetwork::merge) neighboring rooms and
//! [`scan_deadlocks`](RoomNetwork::scan_deadlocks) until one room remains; its finishing start variants are the solutions.
//!
//! # Internals
//! Every walkable cell starts out as its own room. A room knows
//! - its **states**: the box configurations it can be in, numbered densely, where state 0 is the solved one;
//! - its **portals**: the board edges leading into it, each with a box swap (how the state changes when a box is pushed in there)
//!   and an index of the variants the player can take after entering there;
//! - its **variants**: ways for the player to pass through, each from an old to a new state, with the moves and pushes spent,
//!   the boxes pushed out and the portal left through (or none, when the level ends inside the room).
//!
//! Merging two rooms builds the product of their state spaces and walks the player back and forth between the two halves,
//! so that only the moves crossing the outer border survive as variants of the merged room.
//! The deadlock scanner then drops variants that are unreachable from the start, or that can never lead to the solved state,
//! and compaction renumbers what is left.
//!
//! Everything is single threaded; long loops report to a [`Progress`] which can cancel them.

pub use board::{Board, Tile};
pub use builder::{BoardBuilder, BuilderInvalidReason};
pub use config::Limits;
pub use error::RoomError;
pub use location::{Location, Pos, Step};
pub use network::RoomNetwork;
pub use portal::{Portal, PortalId};
pub use progress::{Progress, Silent};
pub use room::{Room, RoomId};
pub use state::StateId;
pub use variant::{Variant, VariantId};

pub mod bits;
pub(crate) mod board;
pub mod builder;
pub mod compact;
pub(crate) mod config;
pub mod deadlock;
pub(crate) mod error;
pub mod fingerprint;
pub(crate) mod location;
pub mod merge;
pub(crate) mod network;
pub mod portal;
pub(crate) mod progress;
pub mod room;
pub mod state;
mod tests;
pub mod variant;
