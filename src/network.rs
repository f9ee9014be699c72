use itertools::Itertools;
use petgraph::graphmap::UnGraphMap;
use tracing::{debug, info};
use unordered_pair::UnorderedPair;

use crate::board::Board;
use crate::config::Limits;
use crate::deadlock::DeadlockScanner;
use crate::error::RoomError;
use crate::location::Pos;
use crate::merge::RoomMerger;
use crate::portal::{Portal, PortalId};
use crate::progress::Progress;
use crate::room::{Room, RoomId};
use crate::variant::Variant;

/// All rooms of one board, kept densely numbered.
///
/// Rooms reference each other through their portals; merging two rooms relinks every neighbor and renumbers the rest.
#[derive(Clone, Debug)]
pub struct RoomNetwork {
    pub(crate) board: Board,
    pub(crate) rooms: Vec<Room>,
    pub(crate) limits: Limits,
}

impl RoomNetwork {
    /// One room per walkable cell, with [`Limits::default`].
    pub fn from_board(board: Board) -> Result<Self, RoomError> {
        Self::with_limits(board, Limits::default())
    }

    /// One room per walkable cell, with merges bounded by `limits`.
    /// 
    /// Fails with [`RoomError::DeadBox`] when a box can never be moved.
    pub fn with_limits(board: Board, limits: Limits) -> Result<Self, RoomError> {
        if let Some(stuck) = board.boxes().iter().find(|pos| !board.is_walkable(**pos)) {
            return Err(RoomError::DeadBox(board.location(*stuck)));
        }

        let mut lookup = vec![usize::MAX; board.size()];
        for (index, pos) in board.walkable_positions().iter().enumerate() {
            lookup[*pos] = index;
        }

        let rooms = board.walkable_positions().iter().enumerate()
            .map(|(index, pos)| Room::single_cell(&board, RoomId(index), *pos, |neighbor| RoomId(lookup[neighbor])))
            .collect::<Result<Vec<_>, _>>()?;

        let network = Self { board, rooms, limits };
        network.validate()?;
        info!(rooms = network.rooms.len(), boxes = network.box_count(), "room network built");

        Ok(network)
    }

    /// The board the rooms were built from.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The limits applied to merges and progress polling.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// All rooms, indexed by [`RoomId`].
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Number of rooms left.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the board had no walkable cell.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Number of boxes on the board.
    pub fn box_count(&self) -> usize {
        self.board.boxes().len()
    }

    /// The room with id `id`, or [`RoomError::UnknownRoom`].
    pub fn room(&self, id: RoomId) -> Result<&Room, RoomError> {
        self.rooms.get(id.0).ok_or(RoomError::UnknownRoom(id))
    }

    /// The room covering `pos`, if the player can reach it.
    pub fn room_of(&self, pos: Pos) -> Option<RoomId> {
        self.rooms.iter().find(|room| room.contains(pos)).map(|room| room.index)
    }

    /// The room holding the player's start variants.
    pub fn start_room(&self) -> Option<RoomId> {
        self.rooms.iter().find(|room| room.start_variant_count > 0).map(|room| room.index)
    }

    /// The portal `room` is left through when a variant exits through `exit`.
    pub fn outgoing(&self, room: &Room, exit: PortalId) -> &Portal {
        let portal = &room.portals[exit.0];
        &self.rooms[portal.from_room.0].portals[portal.opposite.0]
    }

    /// Rooms as nodes, edge weights counting the portal pairs between them.
    pub fn adjacency(&self) -> UnGraphMap<RoomId, usize> {
        let mut graph = UnGraphMap::with_capacity(self.rooms.len(), self.rooms.len() * 2);
        for room in &self.rooms {
            graph.add_node(room.index);
            for portal in room.portals.iter().filter(|portal| room.index < portal.from_room) {
                match graph.edge_weight_mut(room.index, portal.from_room) {
                    Some(weight) => *weight += 1,
                    None => {
                        graph.add_edge(room.index, portal.from_room, 1);
                    }
                }
            }
        }
        graph
    }

    /// Every pair of rooms sharing at least one portal, ordered by their lower id.
    pub fn neighbor_pairs(&self) -> Vec<UnorderedPair<RoomId>> {
        self.adjacency().all_edges()
            .map(|(a, b, _)| UnorderedPair::from((a.min(b), a.max(b))))
            .sorted_by_key(|pair| (pair.0, pair.1))
            .collect()
    }

    /// Replace rooms `a` and `b` by their merge. Returns the id of the merged room.
    ///
    /// Every [`RoomId`] above the higher of the two ids shifts down by one. On error the network is unchanged.
    pub fn merge(&mut self, a: RoomId, b: RoomId, progress: &mut dyn Progress) -> Result<RoomId, RoomError> {
        let merged = RoomMerger::new(self, a, b)?.merge(progress)?;
        let id = self.install(merged, a, b);
        debug_assert!(self.validate().is_ok());
        info!(room = %id, rooms = self.rooms.len(), states = self.rooms[id.0].states.len(), variants = self.rooms[id.0].variants.len(), "merge committed");
        Ok(id)
    }

    fn install(&mut self, mut merged: Room, a: RoomId, b: RoomId) -> RoomId {
        let keep = a.min(b);
        let removed = a.max(b);

        for (k, portal) in merged.portals.iter().enumerate() {
            let back = &mut self.rooms[portal.from_room.0].portals[portal.opposite.0];
            back.from_room = keep;
            back.opposite = PortalId(k);
        }

        merged.index = keep;
        self.rooms[keep.0] = merged;
        self.rooms.remove(removed.0);

        for (index, room) in self.rooms.iter_mut().enumerate() {
            room.index = RoomId(index);
            for portal in room.portals.iter_mut() {
                if portal.from_room > removed {
                    portal.from_room = RoomId(portal.from_room.0 - 1);
                }
            }
        }

        keep
    }

    /// Drop the variants of room `id` that cannot be part of a solution. Returns how many were removed.
    ///
    /// On cancellation the room is unchanged.
    pub fn scan_deadlocks(&mut self, id: RoomId, progress: &mut dyn Progress) -> Result<usize, RoomError> {
        if id.0 >= self.rooms.len() {
            return Err(RoomError::UnknownRoom(id));
        }
        let mut scanner = DeadlockScanner::new(&self.board, self.limits.tick_interval);
        scanner.scan(&mut self.rooms[id.0], progress)
    }

    /// Scan every room once. Returns the total number of variants removed.
    pub fn scan_all(&mut self, progress: &mut dyn Progress) -> Result<usize, RoomError> {
        let mut removed = 0;
        for index in 0..self.rooms.len() {
            removed += self.scan_deadlocks(RoomId(index), progress)?;
        }
        debug!(removed, "scanned all rooms");
        Ok(removed)
    }

    /// The cheapest finishing start variant, by moves then pushes, once a single room is left.
    pub fn best_solution(&self) -> Option<&Variant> {
        let [room] = self.rooms.as_slice() else {
            return None;
        };
        room.start_variants()
            .map(|id| room.variant(id))
            .filter(|variant| variant.is_terminal())
            .min_by_key(|variant| (variant.moves, variant.pushes))
    }

    /// Check every room plus the links between them.
    pub fn validate(&self) -> Result<(), RoomError> {
        let mut start_rooms = 0;
        for (index, room) in self.rooms.iter().enumerate() {
            if room.index.0 != index {
                return Err(RoomError::Invariant(format!("room {} stored at {}", room.index, index)));
            }
            room.validate()?;
            if room.start_variant_count > 0 {
                start_rooms += 1;
            }

            for (p, portal) in room.portals.iter().enumerate() {
                let back = self.rooms.get(portal.from_room.0)
                    .and_then(|other| other.portals.get(portal.opposite.0))
                    .ok_or_else(|| RoomError::Invariant(format!("portal {} of room {} has no opposite", p, index)))?;
                if back.from_room != room.index || back.opposite != PortalId(p) || back.from_pos != portal.to_pos {
                    return Err(RoomError::Invariant(format!("portal {} of room {} is not mutual", p, index)));
                }
            }
        }

        if start_rooms > 1 {
            return Err(RoomError::Invariant(format!("{} rooms carry start variants", start_rooms)));
        }
        Ok(())
    }
}
