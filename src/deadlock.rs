//! Pruning of variants that can never be part of a solution.

use fnv::{FnvHashMap, FnvHashSet};
use tracing::{debug, trace};

use crate::bits::LiveSet;
use crate::board::Board;
use crate::compact::{remove_unused_states, renew_variants};
use crate::error::RoomError;
use crate::portal::PortalId;
use crate::progress::{Progress, Ticker};
use crate::room::Room;
use crate::state::StateId;
use crate::variant::{Variant, VariantId};

pub(crate) const BUILD_REVERSE_MAP: &str = "build reverse map";
pub(crate) const SCAN_FORWARD: &str = "scan forward";
pub(crate) const SCAN_BACKWARD: &str = "scan backward";

/// Backward view of a room: who leads into each state.
#[derive(Clone, Debug, Default)]
pub struct RoomReverse {
    // per portal: swap target -> swap origin
    inverse_swaps: Vec<FnvHashMap<StateId, StateId>>,
    by_new_state: Vec<Vec<VariantId>>,
}

impl RoomReverse {
    /// States that become `state` when a box is pushed in, one entry per portal that allows it.
    pub fn swap_origins(&self, state: StateId) -> impl Iterator<Item = StateId> + '_ {
        self.inverse_swaps.iter().filter_map(move |inverse| inverse.get(&state).copied())
    }

    /// Variants ending in `state`.
    pub fn variants_into(&self, state: StateId) -> &[VariantId] {
        self.by_new_state.get(state.0).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A finishing variant only counts when every box it pushed out lands on a goal.
fn finishes(board: &Board, room: &Room, variant: &Variant) -> bool {
    variant.exited_boxes.iter().all(|b| board.is_goal(room.exit_pos(*b)))
}

/// Where the player stands after leaving the room.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct ForwardTask {
    state: StateId,
    left_by: Option<PortalId>,
    // a box went out through `left_by` right before the player
    exported: bool,
}

/// Removes the variants of one room that can not lie on a path from the start position to the solved board.
///
/// A variant survives only if it is reachable from the start and can still lead to state 0.
pub struct DeadlockScanner<'b> {
    board: &'b Board,
    tick_interval: u64,
    closures: FnvHashMap<StateId, Vec<StateId>>,
}

impl<'b> DeadlockScanner<'b> {
    /// A scanner for rooms of `board`, polling its progress every `tick_interval` iterations.
    pub fn new(board: &'b Board, tick_interval: u64) -> Self {
        Self { board, tick_interval, closures: FnvHashMap::default() }
    }

    /// Run every phase on `room`; returns the number of variants removed.
    ///
    /// On cancellation the room is left untouched.
    pub fn scan(&mut self, room: &mut Room, progress: &mut dyn Progress) -> Result<usize, RoomError> {
        self.closures.clear();
        let mut ticker = Ticker::new(progress, BUILD_REVERSE_MAP, self.tick_interval);

        let reverse = Self::build_reverse_map(room, &mut ticker)?;
        ticker.enter(SCAN_FORWARD);
        let forward = self.scan_forward(room, &mut ticker)?;
        ticker.enter(SCAN_BACKWARD);
        let backward = self.scan_backward(room, &reverse, &mut ticker)?;

        let removed = Self::remove_unused_variants(room, &forward, &backward)?;
        debug!(room = %room.index, removed, variants = room.variants.len(), states = room.states.len(), "deadlock scan");
        Ok(removed)
    }

    pub(crate) fn build_reverse_map(room: &Room, ticker: &mut Ticker) -> Result<RoomReverse, RoomError> {
        let mut reverse = RoomReverse {
            inverse_swaps: Vec::with_capacity(room.portals.len()),
            by_new_state: vec![Vec::new(); room.states.len()],
        };

        for portal in &room.portals {
            ticker.tick(reverse.inverse_swaps.len())?;
            reverse.inverse_swaps.push(portal.swap.pairs().into_iter().map(|(from, to)| (to, from)).collect());
        }

        for (id, variant) in room.variants.iter() {
            ticker.tick(id.0)?;
            reverse.by_new_state[variant.new_state.0].push(id);
        }

        Ok(reverse)
    }

    /// States reachable from `state` by pushing boxes in through a non-empty set of portals, lowest portal first.
    fn closure(&mut self, room: &Room, state: StateId) -> Vec<StateId> {
        if let Some(cached) = self.closures.get(&state) {
            return cached.clone();
        }

        let mut reached = Vec::new();
        let mut stack = vec![(state, 0)];
        while let Some((current, next_portal)) = stack.pop() {
            for p in next_portal..room.portals.len() {
                if let Some(target) = room.portals[p].swap.get(current) {
                    reached.push(target);
                    stack.push((target, p + 1));
                }
            }
        }
        reached.sort_unstable();
        reached.dedup();
        reached.retain(|s| *s != state);

        self.closures.insert(state, reached.clone());
        reached
    }

    pub(crate) fn scan_forward(&mut self, room: &Room, ticker: &mut Ticker) -> Result<LiveSet, RoomError> {
        let mut forward = LiveSet::new(room.variants.len());
        let mut seen = FnvHashSet::default();
        let mut stack = Vec::new();
        let board = self.board;

        let visit = |id: VariantId, forward: &mut LiveSet, seen: &mut FnvHashSet<ForwardTask>, stack: &mut Vec<ForwardTask>| {
            let variant = room.variant(id);
            if variant.is_terminal() {
                if finishes(board, room, variant) {
                    forward.set(id.0);
                }
                return;
            }
            forward.set(id.0);
            let task = ForwardTask {
                state: variant.new_state,
                left_by: variant.exit,
                exported: variant.exit.is_some_and(|exit| variant.exited_boxes.contains(&exit)),
            };
            if seen.insert(task) {
                stack.push(task);
            }
        };

        if room.start_variant_count > 0 {
            for id in room.start_variants() {
                visit(id, &mut forward, &mut seen, &mut stack);
            }
        } else {
            let task = ForwardTask { state: room.start_state, left_by: None, exported: false };
            seen.insert(task);
            stack.push(task);
        }

        let mut processed = 0;
        while let Some(task) = stack.pop() {
            ticker.tick(processed)?;
            processed += 1;

            let candidates = std::iter::once(task.state).chain(self.closure(room, task.state)).collect::<Vec<_>>();
            for candidate in candidates {
                for (p, portal) in room.portals.iter().enumerate() {
                    for id in portal.spans.variants(candidate) {
                        let variant = room.variant(id);
                        // walking straight back in changes nothing
                        if candidate == task.state && task.left_by == Some(PortalId(p)) && !task.exported && variant.is_pure_move() {
                            continue;
                        }
                        visit(id, &mut forward, &mut seen, &mut stack);
                    }
                }
            }
        }

        Ok(forward)
    }

    pub(crate) fn scan_backward(&self, room: &Room, reverse: &RoomReverse, ticker: &mut Ticker) -> Result<LiveSet, RoomError> {
        let mut backward = LiveSet::new(room.variants.len());
        let mut live = LiveSet::new(room.states.len());
        let mut stack = vec![StateId::SOLVED];
        live.set(StateId::SOLVED.0);

        let mut processed = 0;
        while let Some(state) = stack.pop() {
            ticker.tick(processed)?;
            processed += 1;

            for origin in reverse.swap_origins(state) {
                if !live.set(origin.0) {
                    stack.push(origin);
                }
            }

            for id in reverse.variants_into(state) {
                let variant = room.variant(*id);
                if variant.is_terminal() && !(state == StateId::SOLVED && finishes(self.board, room, variant)) {
                    continue;
                }
                backward.set(id.0);
                if !live.set(variant.old_state.0) {
                    stack.push(variant.old_state);
                }
            }
        }

        Ok(backward)
    }

    /// Keep the variants marked by both scans and compact the room.
    pub fn remove_unused_variants(room: &mut Room, forward: &LiveSet, backward: &LiveSet) -> Result<usize, RoomError> {
        let live = LiveSet::both(forward, backward);
        if live.is_full() {
            return Ok(0);
        }

        for (id, variant) in room.variants.iter().filter(|(id, _)| !live.get(id.0)) {
            trace!(room = %room.index, variant = id.0, "dropping {}", variant);
        }

        let before = room.variants.len();
        renew_variants(room, &live)?;
        remove_unused_states(room)?;
        debug_assert!(room.validate().is_ok());

        Ok(before - room.variants.len())
    }
}
