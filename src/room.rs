//! Rooms: connected groups of cells with their own states, portals and variants.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::board::Board;
use crate::error::RoomError;
use crate::location::Pos;
use crate::portal::{Portal, PortalId, StateBoxSwap, VariantSpans};
use crate::state::{StateCatalog, StateId};
use crate::variant::{Variant, VariantCatalog, VariantId};

/// Index of a room inside its [`RoomNetwork`](crate::RoomNetwork).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RoomId(pub(crate) usize);

impl RoomId {
    /// Position of the room in the network.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected set of board cells treated as one unit of the state space.
///
/// Variants `[0, start_variant_count)` are the ones the player can take from the starting position;
/// every other variant is listed in exactly one portal's [`VariantSpans`].
#[derive(Clone, Debug)]
pub struct Room {
    pub(crate) index: RoomId,
    pub(crate) positions: Vec<Pos>,
    pub(crate) goals: Vec<Pos>,
    pub(crate) max_boxes: usize,
    pub(crate) portals: Vec<Portal>,
    pub(crate) states: StateCatalog,
    pub(crate) variants: VariantCatalog,
    pub(crate) start_state: StateId,
    pub(crate) start_variant_count: usize,
}

impl Room {
    /// The id of this room in its network.
    pub fn index(&self) -> RoomId {
        self.index
    }

    /// Sorted board positions covered by this room.
    pub fn positions(&self) -> &[Pos] {
        &self.positions
    }

    /// Whether `pos` belongs to this room.
    pub fn contains(&self, pos: Pos) -> bool {
        self.positions.binary_search(&pos).is_ok()
    }

    /// Sorted goal positions inside this room.
    pub fn goals(&self) -> &[Pos] {
        &self.goals
    }

    /// Most boxes the room can hold at once.
    pub fn max_boxes(&self) -> usize {
        self.max_boxes
    }

    /// Incoming portals, indexed by [`PortalId`].
    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    /// Incoming portal `id`.
    /// 
    /// Panics if `id` does not belong to this room.
    pub fn portal(&self, id: PortalId) -> &Portal {
        &self.portals[id.0]
    }

    /// The box configurations of this room.
    pub fn states(&self) -> &StateCatalog {
        &self.states
    }

    /// All variants, start variants first.
    pub fn variants(&self) -> &VariantCatalog {
        &self.variants
    }

    /// Variant `id`.
    /// 
    /// Panics if `id` does not belong to this room.
    pub fn variant(&self, id: VariantId) -> &Variant {
        self.variants.get(id)
    }

    /// The state the room is in when the level starts.
    pub fn start_state(&self) -> StateId {
        self.start_state
    }

    /// Number of variants leading away from the player's start position.
    pub fn start_variant_count(&self) -> usize {
        self.start_variant_count
    }

    /// Ids of the start variants.
    pub fn start_variants(&self) -> impl Iterator<Item = VariantId> {
        (0..self.start_variant_count).map(VariantId)
    }

    /// Whether every box of `state` stands on a goal of this room.
    pub fn all_on_goals(&self, state: StateId) -> bool {
        self.states.get(state).iter().all(|pos| self.goals.binary_search(pos).is_ok())
    }

    /// Draw `state` on the whole board: this room's cells in level notation, other walkable cells as `-`.
    pub fn render_state(&self, board: &Board, state: StateId) -> String {
        let boxes = self.states.get(state);
        let (width, height) = (board.width().get(), board.height().get());
        let mut out = String::with_capacity((width + 1) * height);

        for pos in 0..width * height {
            out.push(match (self.contains(pos), boxes.binary_search(&pos).is_ok(), board.is_goal(pos)) {
                (true, true, true) => '*',
                (true, true, false) => '$',
                (true, false, true) => '.',
                (true, false, false) => ' ',
                (false, _, _) if board.is_wall(pos) => '#',
                (false, _, _) => '-',
            });
            if pos % width == width - 1 {
                out.push('\n');
            }
        }

        out
    }

    /// The neighbor cell a box or player reaches when leaving through outgoing portal `id`.
    pub fn exit_pos(&self, id: PortalId) -> Pos {
        self.portals[id.0].from_pos
    }

    /// Build the room covering only `pos`.
    ///
    /// Portals are numbered in [`Step`](crate::location::Step) order over the walkable neighbors; `room_of` names the room of each neighbor.
    pub(crate) fn single_cell(board: &Board, index: RoomId, pos: Pos, room_of: impl Fn(Pos) -> RoomId) -> Result<Self, RoomError> {
        let goal = board.is_goal(pos);
        let corner = board.is_corner(pos);
        let has_box = board.is_box(pos);

        let mut states = StateCatalog::with_capacity(2, 1);
        let start_state = if goal {
            states.insert(&[pos]);
            if !(has_box && corner) {
                states.insert(&[]);
            }
            if has_box { StateId(0) } else { StateId(1) }
        } else {
            if has_box && corner {
                return Err(RoomError::DeadBox(board.location(pos)));
            }
            states.insert(&[]);
            if !corner {
                states.insert(&[pos]);
            }
            if has_box { StateId(1) } else { StateId(0) }
        };
        let empty = states.find(&[]);
        let boxed = states.find(&[pos]);

        let mut portals = Vec::with_capacity(4);
        for (direction, neighbor) in board.neighbors(pos) {
            if !board.is_walkable(neighbor) {
                continue;
            }
            let travel = direction.invert();

            let opposite = board.neighbors(neighbor).into_iter()
                .filter(|(_, p)| board.is_walkable(*p))
                .position(|(_, p)| p == pos)
                .ok_or_else(|| RoomError::Invariant(format!("cell {} is not a neighbor of {}", pos, neighbor)))?;

            let mut swap = StateBoxSwap::default();
            if let (Some(empty), Some(boxed)) = (empty, boxed) {
                let pusher = board.step(neighbor, direction);
                if !board.is_corner(neighbor) && pusher.is_some_and(|p| board.is_walkable(p)) {
                    swap.insert(empty, boxed);
                }
            }

            portals.push(Portal {
                from_room: room_of(neighbor),
                from_pos: neighbor,
                to_pos: pos,
                direction: travel,
                opposite: PortalId(opposite),
                blocked_box: !board.step(pos, travel).is_some_and(|p| board.is_walkable(p)),
                swap,
                spans: VariantSpans::default(),
            });
        }

        let mut room = Self {
            index,
            positions: vec![pos],
            goals: if goal { vec![pos] } else { vec![] },
            max_boxes: states.max_box_count(),
            portals,
            states,
            variants: VariantCatalog::new(),
            start_state,
            start_variant_count: 0,
        };
        room.seed_variants(board, pos, empty, boxed, corner, goal)?;

        Ok(room)
    }

    fn seed_variants(&mut self, board: &Board, pos: Pos, empty: Option<StateId>, boxed: Option<StateId>, corner: bool, goal: bool) -> Result<(), RoomError> {
        let exits = self.portals.iter()
            .map(|portal| (portal.direction.invert(), portal.from_pos))
            .collect_vec();
        let step = |o: usize| exits[o].0.to_char().to_string();

        if board.player() == pos {
            for o in 0..exits.len() {
                self.variants.push(Variant {
                    old_state: self.start_state,
                    new_state: self.start_state,
                    moves: 1,
                    pushes: 0,
                    path: step(o),
                    exited_boxes: vec![],
                    exit: Some(PortalId(o)),
                });
                self.start_variant_count += 1;
            }
        }

        for i in 0..self.portals.len() {
            let travel = self.portals[i].direction;
            // a box standing here leaves in the direction the player entered
            let box_portal = exits.iter()
                .position(|(dir, target)| *dir == travel && !board.is_dead(*target))
                .map(PortalId);

            let mut added: Vec<(StateId, Variant)> = Vec::new();
            let pass = |state: StateId, added: &mut Vec<(StateId, Variant)>| {
                for o in (0..exits.len()).filter(|o| *o != i) {
                    added.push((state, Variant {
                        old_state: state,
                        new_state: state,
                        moves: 1,
                        pushes: 0,
                        path: step(o),
                        exited_boxes: vec![],
                        exit: Some(PortalId(o)),
                    }));
                }
            };
            let push = |from: StateId, to: StateId, b: PortalId, added: &mut Vec<(StateId, Variant)>| {
                for o in 0..exits.len() {
                    let (dir, target) = exits[o];
                    // following the box would push it a second time
                    let beyond = board.step(target, dir);
                    if o == b.0 && beyond.map_or(true, |p| board.is_dead(p)) {
                        continue;
                    }
                    added.push((from, Variant {
                        old_state: from,
                        new_state: to,
                        moves: 1,
                        pushes: 1,
                        path: step(o),
                        exited_boxes: vec![b],
                        exit: Some(PortalId(o)),
                    }));
                }
            };

            match (goal, empty, boxed) {
                (false, Some(empty), boxed) => {
                    pass(empty, &mut added);
                    if let (Some(boxed), Some(b), false) = (boxed, box_portal, corner) {
                        push(boxed, empty, b, &mut added);
                        if board.is_goal(exits[b.0].1) {
                            added.push((boxed, Variant {
                                old_state: boxed,
                                new_state: empty,
                                moves: 0,
                                pushes: 1,
                                path: String::new(),
                                exited_boxes: vec![b],
                                exit: None,
                            }));
                        }
                    }
                }
                (true, empty, Some(boxed)) => {
                    if let (Some(empty), Some(b), false) = (empty, box_portal, corner) {
                        push(boxed, empty, b, &mut added);
                    }
                    if let Some(empty) = empty {
                        pass(empty, &mut added);
                    }
                }
                _ => return Err(RoomError::Invariant(format!("cell {} has no usable states", pos))),
            }

            for (state, variant) in added {
                let id = self.variants.push(variant);
                self.portals[i].spans.push(state, id)?;
            }
        }

        Ok(())
    }

    /// Check the catalog and portal invariants of this room in isolation.
    pub fn validate(&self) -> Result<(), RoomError> {
        let fail = |message: String| -> Result<(), RoomError> {
            Err(RoomError::Invariant(format!("room {}: {}", self.index, message)))
        };

        if self.states.is_empty() {
            return fail("no states".into());
        }
        if !self.positions.windows(2).all(|w| w[0] < w[1]) {
            return fail("positions not sorted".into());
        }
        if !self.states.contains(self.start_state) {
            return fail(format!("start state {} out of range", self.start_state.0));
        }
        if self.start_variant_count > self.variants.len() {
            return fail("start variant count exceeds catalog".into());
        }
        for (id, boxes) in self.states.iter() {
            if boxes.len() > self.max_boxes {
                return fail(format!("state {} holds {} boxes", id.0, boxes.len()));
            }
            if !boxes.iter().all(|pos| self.contains(*pos)) {
                return fail(format!("state {} has a box outside the room", id.0));
            }
        }

        let mut owner = vec![None; self.variants.len()];
        for start in self.start_variants() {
            owner[start.0] = Some(usize::MAX);
            if self.variants.get(start).old_state != self.start_state {
                return fail(format!("start variant {} does not leave the start state", start.0));
            }
        }

        for (id, variant) in self.variants.iter() {
            if !self.states.contains(variant.old_state) || !self.states.contains(variant.new_state) {
                return fail(format!("variant {} references a missing state", id.0));
            }
            if variant.exit.is_some_and(|exit| exit.0 >= self.portals.len())
                || variant.exited_boxes.iter().any(|b| b.0 >= self.portals.len()) {
                return fail(format!("variant {} references a missing portal", id.0));
            }
            if !variant.exited_boxes.iter().all_unique() {
                return fail(format!("variant {} exits two boxes through one portal", id.0));
            }
            if variant.pushes < variant.exited_boxes.len() as u64 || variant.path.chars().count() as u64 != variant.moves {
                return fail(format!("variant {} has inconsistent counters", id.0));
            }
        }

        for (p, portal) in self.portals.iter().enumerate() {
            if !self.contains(portal.to_pos) || self.contains(portal.from_pos) {
                return fail(format!("portal {} does not cross the room border", p));
            }
            for (from, to) in portal.swap.pairs() {
                if !self.states.contains(from) || !self.states.contains(to) || from == to {
                    return fail(format!("portal {} has an invalid box swap", p));
                }
            }
            for (state, span) in portal.spans.spans() {
                if span.is_empty() {
                    return fail(format!("portal {} has an empty span", p));
                }
                for id in span.ids() {
                    let Some(slot) = owner.get_mut(id.0) else {
                        return fail(format!("variant {} is out of range", id.0));
                    };
                    if slot.replace(p).is_some() {
                        return fail(format!("variant {} is listed twice", id.0));
                    }
                    if self.variants.get(id).old_state != state {
                        return fail(format!("variant {} is spanned under the wrong state", id.0));
                    }
                }
            }
        }

        if owner.iter().any(Option::is_none) {
            return fail("a variant belongs to no span".into());
        }

        Ok(())
    }
}
