//! Board edges between rooms, with their box swaps and variant indexes.

use fnv::FnvHashMap;
use itertools::Itertools;

use crate::error::RoomError;
use crate::location::{Pos, Step};
use crate::room::RoomId;
use crate::state::StateId;
use crate::variant::VariantId;

/// Index of an incoming portal inside its room.
///
/// Portal arrays are parallel: the outgoing portal with the same index leads back through the same board edge.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PortalId(pub(crate) usize);

impl PortalId {
    /// Position of the portal in its room's portal array.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How the room's state changes when a box is pushed in through one portal.
///
/// States without an entry cannot absorb a box there. A mapping is never the identity.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StateBoxSwap {
    map: FnvHashMap<StateId, StateId>,
}

impl StateBoxSwap {
    /// Pushing a box in while the room is in `from` leaves it in `to`.
    pub fn insert(&mut self, from: StateId, to: StateId) {
        debug_assert_ne!(from, to, "a box swap must change the state");
        self.map.insert(from, to);
    }

    /// The state after a box is pushed in while in `from`, if the room can take it.
    pub fn get(&self, from: StateId) -> Option<StateId> {
        self.map.get(&from).copied()
    }

    /// Number of states that can absorb a box here.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// No state can absorb a box through this portal.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All `(from, to)` pairs, ordered by `from`.
    pub fn pairs(&self) -> Vec<(StateId, StateId)> {
        self.map.iter().map(|(from, to)| (*from, *to)).sorted().collect()
    }

    /// Rewrite both sides through `remap`, dropping pairs where either side vanishes.
    pub(crate) fn remap(&self, remap: impl Fn(StateId) -> Option<StateId>) -> Self {
        Self {
            map: self.map.iter()
                .filter_map(|(from, to)| Some((remap(*from)?, remap(*to)?)))
                .collect(),
        }
    }
}

/// A contiguous run of variants sharing an old state and an entry portal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VariantSpan {
    /// First variant of the run.
    pub start: VariantId,
    /// Length of the run.
    pub count: usize,
}

impl VariantSpan {
    /// The variants of the run, in order.
    pub fn ids(&self) -> impl Iterator<Item = VariantId> {
        (self.start.0..self.start.0 + self.count).map(VariantId)
    }

    /// The run holds no variant.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Per-state index of the variants entered through one portal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VariantSpans {
    map: FnvHashMap<StateId, VariantSpan>,
}

impl VariantSpans {
    /// Record `variant` under `state`. Variants of one state must be pushed back to back.
    pub fn push(&mut self, state: StateId, variant: VariantId) -> Result<(), RoomError> {
        match self.map.get_mut(&state) {
            None => {
                self.map.insert(state, VariantSpan { start: variant, count: 1 });
                Ok(())
            }
            Some(span) if span.start.0 + span.count == variant.0 => {
                span.count += 1;
                Ok(())
            }
            Some(span) => Err(RoomError::Invariant(format!(
                "variant {} does not extend span {}+{} of state {}",
                variant.0, span.start.0, span.count, state.0
            ))),
        }
    }

    /// The run of variants for `state`, if any.
    pub fn get(&self, state: StateId) -> Option<VariantSpan> {
        self.map.get(&state).copied()
    }

    /// Variants for `state`, empty when there are none.
    pub fn variants(&self, state: StateId) -> impl Iterator<Item = VariantId> {
        self.get(state)
            .unwrap_or(VariantSpan { start: VariantId(0), count: 0 })
            .ids()
    }

    /// Whether the player can do anything after entering here in `state`.
    pub fn has_variants(&self, state: StateId) -> bool {
        self.get(state).is_some_and(|span| !span.is_empty())
    }

    /// All spans, ordered by state.
    pub fn spans(&self) -> Vec<(StateId, VariantSpan)> {
        self.map.iter().map(|(state, span)| (*state, *span)).sorted_by_key(|(state, _)| *state).collect()
    }

    /// Number of states with a run.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// No state has a run.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Total number of variants indexed.
    pub fn variant_count(&self) -> usize {
        self.map.values().map(|span| span.count).sum()
    }
}

/// A board edge the player or a box can cross to enter a room.
///
/// Owned by the room it leads into. `from_room.portals[opposite]` is the same edge crossed the other way.
#[derive(Clone, Debug)]
pub struct Portal {
    /// The room the player or box comes from.
    pub from_room: RoomId,
    /// The cell on the far side of the edge.
    pub from_pos: Pos,
    /// The cell inside the owning room.
    pub to_pos: Pos,
    /// Direction of travel from `from_pos` to `to_pos`.
    pub direction: Step,
    /// Index of the same edge in `from_room`.
    pub opposite: PortalId,
    /// A box pushed in here can go no further, so the player can never follow it through.
    pub blocked_box: bool,
    /// State change caused by a box pushed in here.
    pub swap: StateBoxSwap,
    /// Variants available after entering here, by state.
    pub spans: VariantSpans,
}
