//! Renumbering primitives that keep a room's catalogs dense after pruning.
//!
//! Every function here invalidates previously obtained [`StateId`]s and [`VariantId`]s of the room.

use tracing::trace;

use crate::bits::{LiveSet, SkipMap};
use crate::error::RoomError;
use crate::portal::VariantSpans;
use crate::room::Room;
use crate::state::{StateCatalog, StateId};
use crate::variant::{VariantCatalog, VariantId};

/// Keep only the variants marked in `live`, in their original order, and rebuild every span.
///
/// Returns the number of variants dropped.
pub fn renew_variants(room: &mut Room, live: &LiveSet) -> Result<usize, RoomError> {
    if live.len() != room.variants.len() {
        return Err(RoomError::Invariant(format!(
            "variant liveness covers {} of {} variants", live.len(), room.variants.len()
        )));
    }
    if live.is_full() {
        return Ok(0);
    }

    let skip = SkipMap::from_live(live);
    let mut variants = VariantCatalog::with_capacity(skip.kept());
    for (index, variant) in std::mem::take(&mut room.variants).into_vec().into_iter().enumerate() {
        if live.get(index) {
            variants.push(variant);
        }
    }
    room.variants = variants;
    room.start_variant_count = (0..room.start_variant_count).filter(|index| live.get(*index)).count();

    for portal in room.portals.iter_mut() {
        let mut spans = VariantSpans::default();
        for (state, span) in portal.spans.spans() {
            for id in span.ids() {
                if let Some(new) = skip.get(id.0) {
                    spans.push(state, VariantId(new))?;
                }
            }
        }
        portal.spans = spans;
    }

    Ok(skip.removed())
}

/// Keep only the states marked in `live` and remap every reference to them.
///
/// State 0 and the start state must be live, and no variant may reference a dropped state.
/// Swaps touching a dropped state disappear. Returns the number of states dropped.
pub fn renew_states(room: &mut Room, live: &LiveSet) -> Result<usize, RoomError> {
    if live.len() != room.states.len() {
        return Err(RoomError::Invariant(format!(
            "state liveness covers {} of {} states", live.len(), room.states.len()
        )));
    }
    if !live.get(StateId::SOLVED.0) || !live.get(room.start_state.0) {
        return Err(RoomError::Invariant("the solved and start states cannot be dropped".into()));
    }
    if live.is_full() {
        return Ok(0);
    }

    let skip = SkipMap::from_live(live);
    let remap = |state: StateId| skip.get(state.0).map(StateId);

    let mut states = StateCatalog::with_capacity(skip.kept(), skip.kept());
    for (id, boxes) in room.states.iter() {
        if live.get(id.0) {
            states.insert(boxes);
        }
    }

    let mut variants = VariantCatalog::with_capacity(room.variants.len());
    for (id, mut variant) in std::mem::take(&mut room.variants).into_vec().into_iter().enumerate() {
        match (remap(variant.old_state), remap(variant.new_state)) {
            (Some(old), Some(new)) => {
                variant.old_state = old;
                variant.new_state = new;
                variants.push(variant);
            }
            _ => return Err(RoomError::Invariant(format!("variant {} references a dropped state", id))),
        }
    }

    for portal in room.portals.iter_mut() {
        portal.swap = portal.swap.remap(&remap);
        let mut spans = VariantSpans::default();
        for (state, span) in portal.spans.spans() {
            let state = remap(state)
                .ok_or_else(|| RoomError::Invariant("a span is keyed by a dropped state".into()))?;
            for id in span.ids() {
                spans.push(state, id)?;
            }
        }
        portal.spans = spans;
    }

    room.states = states;
    room.variants = variants;
    room.start_state = remap(room.start_state)
        .ok_or_else(|| RoomError::Invariant("start state dropped".into()))?;

    Ok(skip.removed())
}

/// States that can still take part in a solution.
pub fn live_states(room: &Room) -> LiveSet {
    let mut live = LiveSet::new(room.states.len());
    live.set(StateId::SOLVED.0);
    live.set(room.start_state.0);

    for id in room.start_variants() {
        live.set(room.variants.get(id).old_state.0);
    }

    for portal in &room.portals {
        for (state, span) in portal.spans.spans() {
            if !span.is_empty() {
                live.set(state.0);
            }
        }

        for (from, to) in portal.swap.pairs() {
            if portal.spans.has_variants(to) || room.all_on_goals(to) {
                live.set(from.0);
                live.set(to.0);
            }
        }
    }

    live
}

/// Drop dead states, and the variants that touch them, until nothing changes.
///
/// Returns the number of states dropped.
pub fn remove_unused_states(room: &mut Room) -> Result<usize, RoomError> {
    let mut removed = 0;
    loop {
        let live = live_states(room);
        if live.is_full() {
            break;
        }

        let mut keep = LiveSet::new(room.variants.len());
        for (id, variant) in room.variants.iter() {
            if live.get(variant.old_state.0) && live.get(variant.new_state.0) {
                keep.set(id.0);
            }
        }
        let dropped_variants = renew_variants(room, &keep)?;
        let dropped_states = renew_states(room, &live)?;
        trace!(room = %room.index, dropped_states, dropped_variants, "compaction pass");
        removed += dropped_states;
    }

    Ok(removed)
}

/// Full compaction: drop dead states and variants to a fixpoint.
pub fn compact(room: &mut Room) -> Result<usize, RoomError> {
    let removed = remove_unused_states(room)?;
    debug_assert!(room.validate().is_ok());
    Ok(removed)
}
