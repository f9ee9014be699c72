//! Box configurations of a room and their dense numbering.

use fnv::FnvHashMap;

use crate::fingerprint::Fingerprint;
use crate::location::Pos;

/// Index of a box configuration inside one room's [`StateCatalog`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// The configuration a room must end in for the level to be solved.
    pub const SOLVED: StateId = StateId(0);

    /// Position of the state in its catalog.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only catalog mapping sorted box position sets to dense [`StateId`]s.
///
/// Positions of all states are stored back to back; lookups go through a fingerprint index and compare content.
#[derive(Clone, Debug)]
pub struct StateCatalog {
    positions: Vec<Pos>,
    // offsets[id]..offsets[id + 1] addresses a state in `positions`
    offsets: Vec<usize>,
    index: FnvHashMap<u64, Vec<StateId>>,
}

impl Default for StateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn fingerprint(boxes: &[Pos]) -> Fingerprint {
    Fingerprint::new()
        .mix(boxes.len() as u64)
        .mix_all(boxes.iter().map(|pos| *pos as u64))
}

impl StateCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self { positions: Vec::new(), offsets: vec![0], index: FnvHashMap::default() }
    }

    /// An empty catalog with room for `states` states holding `positions` boxes in total.
    pub fn with_capacity(states: usize, positions: usize) -> Self {
        let mut offsets = Vec::with_capacity(states + 1);
        offsets.push(0);
        Self {
            positions: Vec::with_capacity(positions),
            offsets,
            index: FnvHashMap::with_capacity_and_hasher(states, Default::default()),
        }
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether no state has been added yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a box configuration, returning the existing id if it is already catalogued.
    ///
    /// `boxes` must be sorted and free of duplicates.
    pub fn insert(&mut self, boxes: &[Pos]) -> StateId {
        debug_assert!(boxes.windows(2).all(|w| w[0] < w[1]), "state positions must be strictly sorted");

        let fp = fingerprint(boxes).value();
        if let Some(bucket) = self.index.get(&fp) {
            if let Some(id) = bucket.iter().find(|id| self.get(**id) == boxes) {
                return *id;
            }
        }

        let id = StateId(self.len());
        self.positions.extend_from_slice(boxes);
        self.offsets.push(self.positions.len());
        self.index.entry(fp).or_default().push(id);
        id
    }

    /// The id of `boxes`, if catalogued.
    pub fn find(&self, boxes: &[Pos]) -> Option<StateId> {
        self.index.get(&fingerprint(boxes).value())?
            .iter()
            .find(|id| self.get(**id) == boxes)
            .copied()
    }

    /// Box positions of `id`, sorted.
    ///
    /// Panics if `id` does not belong to this catalog.
    pub fn get(&self, id: StateId) -> &[Pos] {
        &self.positions[self.offsets[id.0]..self.offsets[id.0 + 1]]
    }

    /// Number of boxes in state `id`.
    pub fn box_count(&self, id: StateId) -> usize {
        self.offsets[id.0 + 1] - self.offsets[id.0]
    }

    /// Whether `id` addresses a state of this catalog.
    pub fn contains(&self, id: StateId) -> bool {
        id.0 < self.len()
    }

    /// All ids, in order.
    pub fn ids(&self) -> impl Iterator<Item = StateId> + Clone {
        (0..self.len()).map(StateId)
    }

    /// All states with their box positions, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &[Pos])> + '_ {
        self.ids().map(move |id| (id, self.get(id)))
    }

    /// Largest number of boxes in any state.
    pub fn max_box_count(&self) -> usize {
        self.ids().map(|id| self.box_count(id)).max().unwrap_or(0)
    }
}
