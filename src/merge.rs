//! Merging two adjacent rooms into one.

use itertools::Itertools;
use tracing::{debug, trace};

use crate::compact::compact;
use crate::config::Limits;
use crate::error::RoomError;
use crate::fingerprint::{Buckets, Fingerprint};
use crate::network::RoomNetwork;
use crate::portal::{Portal, PortalId, StateBoxSwap, VariantSpans};
use crate::progress::{Progress, Ticker};
use crate::room::{Room, RoomId};
use crate::state::{StateCatalog, StateId};
use crate::variant::{Variant, VariantCatalog};

pub(crate) const MERGE_STATES: &str = "merge states";
pub(crate) const MERGE_START_VARIANTS: &str = "merge start variants";
pub(crate) const MERGE_PORTAL_VARIANTS: &str = "merge portal variants";

/// The player is about to act inside one of the two source rooms.
struct Task {
    states: [StateId; 2],
    side: usize,
    // `None` while still at the starting position
    entry: Option<PortalId>,
    moves: u64,
    pushes: u64,
    path: String,
    // boxes already pushed out of the merged room, as new portal ids
    boxes: Vec<PortalId>,
}

#[derive(Eq, PartialEq)]
struct TaskKey {
    states: [StateId; 2],
    boxes: Vec<PortalId>,
    side: usize,
    entry: PortalId,
}

impl TaskKey {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new()
            .mix(self.states[0].0 as u64)
            .mix(self.states[1].0 as u64)
            .mix(self.boxes.len() as u64)
            .mix_all(self.boxes.iter().map(|b| b.0 as u64))
            .mix(self.side as u64)
            .mix(self.entry.0 as u64)
    }
}

#[derive(Eq, PartialEq)]
struct EmitKey {
    new_state: StateId,
    exit: Option<PortalId>,
    boxes: Vec<PortalId>,
}

impl EmitKey {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new()
            .mix(self.new_state.0 as u64)
            .mix(self.exit.map_or(u64::MAX, |exit| exit.0 as u64))
            .mix_all(self.boxes.iter().map(|b| b.0 as u64))
    }
}

/// Combines two adjacent rooms into one room over the product of their state spaces.
///
/// The source rooms are only read; the caller installs the result into the network.
pub struct RoomMerger<'n> {
    network: &'n RoomNetwork,
    ids: [RoomId; 2],
    rooms: [&'n Room; 2],
    // old portal index -> new portal index, `None` for portals between the two rooms
    portal_map: [Vec<Option<PortalId>>; 2],
    // new portal index -> (side, old portal index)
    origins: Vec<(usize, PortalId)>,
    state_counts: [usize; 2],
    max_boxes: usize,
    limits: Limits,
}

impl<'n> RoomMerger<'n> {
    /// Check the merge preconditions and partition the portals of `a` and `b`.
    ///
    /// The room covering the lower board position becomes the first factor, so the result does not depend on argument order.
    pub fn new(network: &'n RoomNetwork, a: RoomId, b: RoomId) -> Result<Self, RoomError> {
        let room_a = network.room(a)?;
        let room_b = network.room(b)?;
        if a == b {
            return Err(RoomError::SameRoom(a));
        }
        if !room_a.portals.iter().any(|portal| portal.from_room == b) {
            return Err(RoomError::NoSharedPortal { first: a, second: b });
        }
        if room_a.start_variant_count > 0 && room_b.start_variant_count > 0 {
            return Err(RoomError::MultipleStartRooms { first: a, second: b });
        }

        let (ids, rooms) = if room_a.positions.first() <= room_b.positions.first() {
            ([a, b], [room_a, room_b])
        } else {
            ([b, a], [room_b, room_a])
        };

        let state_counts = [rooms[0].states.len(), rooms[1].states.len()];
        let product = state_counts[0].checked_mul(state_counts[1])
            .ok_or(RoomError::StateOverflow { first: ids[0], second: ids[1] })?;
        let limits = *network.limits();
        if product > limits.max_states {
            return Err(RoomError::LimitExceeded { what: "product state", count: product, limit: limits.max_states });
        }

        let mut origins = Vec::new();
        let portal_map = [0, 1].map(|side| {
            rooms[side].portals.iter().enumerate()
                .map(|(p, portal)| {
                    (portal.from_room != ids[1 - side]).then(|| {
                        origins.push((side, PortalId(p)));
                        PortalId(origins.len() - 1)
                    })
                })
                .collect_vec()
        });

        Ok(Self {
            network,
            ids,
            rooms,
            portal_map,
            origins,
            state_counts,
            max_boxes: (rooms[0].max_boxes + rooms[1].max_boxes).min(network.box_count()),
            limits,
        })
    }

    fn encode(&self, states: [StateId; 2]) -> StateId {
        StateId(states[0].0 * self.state_counts[1] + states[1].0)
    }

    fn decode(&self, state: StateId) -> [StateId; 2] {
        [StateId(state.0 / self.state_counts[1]), StateId(state.0 % self.state_counts[1])]
    }

    fn box_count(&self, states: [StateId; 2]) -> usize {
        self.rooms[0].states.box_count(states[0]) + self.rooms[1].states.box_count(states[1])
    }

    fn within_cap(&self, states: [StateId; 2]) -> bool {
        self.box_count(states) <= self.max_boxes
    }

    /// Build the merged room, compacted and ready to replace the two sources.
    pub fn merge(self, progress: &mut dyn Progress) -> Result<Room, RoomError> {
        let mut ticker = Ticker::new(progress, MERGE_STATES, self.limits.tick_interval);

        let total = self.state_counts[0] * self.state_counts[1];
        let positions = total.checked_mul(self.max_boxes.max(1))
            .ok_or(RoomError::StateOverflow { first: self.ids[0], second: self.ids[1] })?;
        let mut states = StateCatalog::with_capacity(total, positions.min(self.limits.max_states));
        for (s1, s2) in self.rooms[0].states.ids().cartesian_product(self.rooms[1].states.ids()) {
            ticker.tick(states.len())?;
            let boxes = self.rooms[0].states.get(s1).iter()
                .merge(self.rooms[1].states.get(s2).iter())
                .copied()
                .collect_vec();
            let id = states.insert(&boxes);
            debug_assert_eq!(id, self.encode([s1, s2]));
        }

        let mut portals = self.origins.iter()
            .map(|(side, p)| {
                let old = &self.rooms[*side].portals[p.0];
                Portal {
                    from_room: old.from_room,
                    from_pos: old.from_pos,
                    to_pos: old.to_pos,
                    direction: old.direction,
                    opposite: old.opposite,
                    blocked_box: old.blocked_box,
                    swap: self.lift_swap(*side, &old.swap),
                    spans: VariantSpans::default(),
                }
            })
            .collect_vec();

        let start_state = self.encode([self.rooms[0].start_state, self.rooms[1].start_state]);
        let mut variants = VariantCatalog::new();

        ticker.enter(MERGE_START_VARIANTS);
        let mut start_variant_count = 0;
        if let Some(side) = (0..2).find(|side| self.rooms[*side].start_variant_count > 0) {
            let seed = [self.rooms[0].start_state, self.rooms[1].start_state];
            for variant in self.propagate(side, None, seed, &mut ticker)? {
                variants.push(variant);
                start_variant_count += 1;
            }
            self.check_variant_limit(&variants)?;
        }

        ticker.enter(MERGE_PORTAL_VARIANTS);
        for (k, (side, p)) in self.origins.iter().enumerate() {
            for state in (0..total).map(StateId) {
                let halves = self.decode(state);
                if !self.within_cap(halves) {
                    continue;
                }
                for variant in self.propagate(*side, Some(*p), halves, &mut ticker)? {
                    let id = variants.push(variant);
                    portals[k].spans.push(state, id)?;
                }
            }
            self.check_variant_limit(&variants)?;
        }

        let mut room = Room {
            index: self.ids[0],
            positions: self.rooms[0].positions.iter().merge(self.rooms[1].positions.iter()).copied().collect(),
            goals: self.rooms[0].goals.iter().merge(self.rooms[1].goals.iter()).copied().collect(),
            max_boxes: self.max_boxes,
            portals,
            states,
            variants,
            start_state,
            start_variant_count,
        };
        let product_states = room.states.len();
        compact(&mut room)?;

        debug!(
            first = %self.ids[0], second = %self.ids[1],
            product_states, states = room.states.len(), variants = room.variants.len(),
            start_variants = room.start_variant_count, portals = room.portals.len(),
            "merged rooms"
        );
        Ok(room)
    }

    fn check_variant_limit(&self, variants: &VariantCatalog) -> Result<(), RoomError> {
        if variants.len() > self.limits.max_variants {
            return Err(RoomError::LimitExceeded { what: "variant", count: variants.len(), limit: self.limits.max_variants });
        }
        Ok(())
    }

    /// Carry a source portal's box swap over to every product state.
    fn lift_swap(&self, side: usize, swap: &StateBoxSwap) -> StateBoxSwap {
        let mut lifted = StateBoxSwap::default();
        for (s1, s2) in self.rooms[0].states.ids().cartesian_product(self.rooms[1].states.ids()) {
            let mut halves = [s1, s2];
            if !self.within_cap(halves) {
                continue;
            }
            let origin = self.encode(halves);
            if let Some(target) = swap.get(halves[side]) {
                halves[side] = target;
                if self.within_cap(halves) {
                    lifted.insert(origin, self.encode(halves));
                }
            }
        }
        lifted
    }

    /// Fold the boxes a variant pushed out into the merged picture.
    ///
    /// Boxes leaving through an outer portal are appended to the carried list; boxes crossing into the other source room
    /// change its state. `None` if the other room cannot take a box, or an outer portal would receive a second box.
    fn resolve_boxes(&self, side: usize, variant: &Variant, states: &mut [StateId; 2], carried: &[PortalId]) -> Option<Vec<PortalId>> {
        let other = 1 - side;
        let mut boxes = carried.to_vec();
        for b in &variant.exited_boxes {
            match self.portal_map[side][b.0] {
                Some(k) => {
                    if boxes.contains(&k) {
                        return None;
                    }
                    boxes.push(k);
                }
                None => {
                    let entry = self.rooms[side].portals[b.0].opposite;
                    states[other] = self.rooms[other].portals[entry.0].swap.get(states[other])?;
                }
            }
        }
        Some(boxes)
    }

    /// Every merged variant starting with the player entering `side` through `entry` (or standing at the start) in `seed`.
    fn propagate(&self, side: usize, entry: Option<PortalId>, seed: [StateId; 2], ticker: &mut Ticker) -> Result<Vec<Variant>, RoomError> {
        let origin = self.encode(seed);
        let outer_entry = entry.and_then(|p| self.portal_map[side][p.0]);

        let mut best: Buckets<TaskKey, u64> = Buckets::default();
        let mut emitted: Buckets<EmitKey, usize> = Buckets::default();
        let mut out: Vec<Variant> = Vec::new();
        let mut stack = vec![Task { states: seed, side, entry, moves: 0, pushes: 0, path: String::new(), boxes: vec![] }];

        while let Some(task) = stack.pop() {
            ticker.tick(best.len())?;

            let room = self.rooms[task.side];
            let current = task.states[task.side];
            let candidates = match task.entry {
                None => room.start_variants().filter(|id| room.variant(*id).old_state == current).collect_vec(),
                Some(p) => room.portals[p.0].spans.variants(current).collect_vec(),
            };

            for id in candidates {
                let variant = room.variant(id);
                let mut states = task.states;
                states[task.side] = variant.new_state;
                let Some(boxes) = self.resolve_boxes(task.side, variant, &mut states, &task.boxes) else {
                    continue;
                };
                if !self.within_cap(states) {
                    continue;
                }

                let moves = task.moves + variant.moves;
                let pushes = task.pushes + variant.pushes;
                let path = format!("{}{}", task.path, variant.path);

                let Some(exit) = variant.exit else {
                    let new_state = self.encode(states);
                    if new_state == StateId::SOLVED {
                        Self::emit(&mut emitted, &mut out, Variant { old_state: origin, new_state, moves, pushes, path, exited_boxes: boxes, exit: None });
                    }
                    continue;
                };

                let outgoing = self.network.outgoing(room, exit);
                if outgoing.blocked_box && variant.exited_boxes.contains(&exit) {
                    continue;
                }

                match self.portal_map[task.side][exit.0] {
                    Some(k) => {
                        if pushes == 0 && outer_entry == Some(k) {
                            continue;
                        }
                        Self::emit(&mut emitted, &mut out, Variant {
                            old_state: origin,
                            new_state: self.encode(states),
                            moves,
                            pushes,
                            path,
                            exited_boxes: boxes,
                            exit: Some(k),
                        });
                    }
                    None => {
                        let other = 1 - task.side;
                        let entry = room.portals[exit.0].opposite;
                        let key = TaskKey { states, boxes: boxes.iter().copied().sorted().collect(), side: other, entry };
                        let fp = key.fingerprint();
                        match best.get_mut(fp, &key) {
                            Some(known) if *known <= moves => continue,
                            Some(known) => *known = moves,
                            None => best.insert_new(fp, key, moves),
                        }
                        stack.push(Task { states, side: other, entry: Some(entry), moves, pushes, path, boxes });
                    }
                }
            }
        }

        out.sort_by_key(Variant::class);
        Ok(out)
    }

    /// Record `variant` unless an equivalent one is at least as cheap.
    fn emit(emitted: &mut Buckets<EmitKey, usize>, out: &mut Vec<Variant>, variant: Variant) {
        let key = EmitKey {
            new_state: variant.new_state,
            exit: variant.exit,
            boxes: variant.exited_boxes.iter().copied().sorted().collect(),
        };
        let fp = key.fingerprint();
        match emitted.get_mut(fp, &key) {
            Some(index) => {
                let known = &mut out[*index];
                if (variant.moves, variant.pushes) < (known.moves, known.pushes) {
                    *known = variant;
                }
            }
            None => {
                trace!(%variant, "merged variant");
                emitted.insert_new(fp, key, out.len());
                out.push(variant);
            }
        }
    }
}
