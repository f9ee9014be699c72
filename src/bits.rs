//! Bitsets marking live states and variants, and the renumbering derived from them.

use fixedbitset::FixedBitSet;

/// Liveness marks over a dense id range.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LiveSet {
    bits: FixedBitSet,
}

impl LiveSet {
    /// All entries unmarked.
    pub fn new(len: usize) -> Self {
        Self { bits: FixedBitSet::with_capacity(len) }
    }

    /// All entries marked.
    pub fn full(len: usize) -> Self {
        let mut bits = FixedBitSet::with_capacity(len);
        bits.insert_range(..);
        Self { bits }
    }

    /// Number of entries covered, marked or not.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the set covers no entries at all.
    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Mark `index`, returning whether it was already marked.
    pub fn set(&mut self, index: usize) -> bool {
        self.bits.put(index)
    }

    /// Unmark `index`.
    pub fn clear(&mut self, index: usize) {
        self.bits.set(index, false);
    }

    /// Whether `index` is marked.
    pub fn get(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    /// Number of marked entries.
    pub fn count(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Every entry is marked.
    pub fn is_full(&self) -> bool {
        self.count() == self.len()
    }

    /// Keep only the entries also marked in `other`.
    pub fn intersect_in_place(&mut self, other: &LiveSet) {
        self.bits.intersect_with(&other.bits);
    }

    /// Entries marked by both a forward and a backward pass.
    pub fn both(forward: &LiveSet, backward: &LiveSet) -> LiveSet {
        let mut live = forward.clone();
        live.intersect_in_place(backward);
        live
    }

    /// Marked entries in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }
}

/// Dense renumbering derived from a [`LiveSet`]: marked entries keep their relative order.
#[derive(Clone, Debug)]
pub struct SkipMap {
    map: Vec<Option<usize>>,
    kept: usize,
}

impl SkipMap {
    /// Number the marked entries of `live` densely from zero.
    pub fn from_live(live: &LiveSet) -> Self {
        let mut kept = 0;
        let map = (0..live.len())
            .map(|index| {
                live.get(index).then(|| {
                    kept += 1;
                    kept - 1
                })
            })
            .collect();
        Self { map, kept }
    }

    /// New index of `old`, `None` if it was dropped.
    pub fn get(&self, old: usize) -> Option<usize> {
        self.map.get(old).copied().flatten()
    }

    /// Number of surviving entries.
    pub fn kept(&self) -> usize {
        self.kept
    }

    /// Number of dropped entries.
    pub fn removed(&self) -> usize {
        self.map.len() - self.kept
    }
}
