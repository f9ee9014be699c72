//! Variants: the ways a player can pass through a room, and their path notation.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::portal::PortalId;
use crate::state::StateId;

/// Index of a [`Variant`] inside one room's [`VariantCatalog`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VariantId(pub(crate) usize);

impl VariantId {
    /// Position of the variant in its catalog.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One way for the player to pass through a room.
///
/// The player enters (through a portal, or by starting inside), rearranges the room from `old_state` to `new_state`,
/// pushes the boxes in `exited_boxes` out through those outgoing portals in order, and leaves through `exit`.
/// A variant without exit finishes the level while the player is still inside.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Variant {
    /// Room state when the player enters.
    pub old_state: StateId,
    /// Room state when the player leaves.
    pub new_state: StateId,
    /// Player steps taken inside the room.
    pub moves: u64,
    /// Box pushes made inside the room.
    pub pushes: u64,
    /// Player moves, one character per move.
    pub path: String,
    /// Outgoing portals boxes were pushed through, in push order.
    pub exited_boxes: Vec<PortalId>,
    /// Outgoing portal the player leaves through; `None` when the level is finished.
    pub exit: Option<PortalId>,
}

impl Variant {
    /// The level is finished inside the room.
    pub fn is_terminal(&self) -> bool {
        self.exit.is_none()
    }

    /// The player only walked; no box moved.
    pub fn is_pure_move(&self) -> bool {
        self.pushes == 0
    }

    pub(crate) fn class(&self) -> VariantClass {
        if self.is_terminal() {
            VariantClass::Terminal
        } else if self.is_pure_move() {
            VariantClass::Move
        } else {
            VariantClass::Push
        }
    }
}

/// One line, e.g. `1 -> 0, 1 moves, 1 pushes, path l, boxes out 1, exit 0`.
impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}, {} moves, {} pushes", self.old_state.0, self.new_state.0, self.moves, self.pushes)?;
        if !self.path.is_empty() {
            write!(f, ", path {}", compress_path(&self.path))?;
        }
        if !self.exited_boxes.is_empty() {
            write!(f, ", boxes out {}", self.exited_boxes.iter().map(|b| b.0).join(" "))?;
        }
        match self.exit {
            Some(exit) => write!(f, ", exit {}", exit.0),
            None => write!(f, ", finish"),
        }
    }
}

/// Emission order of merged variants.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) enum VariantClass {
    Move,
    Push,
    Terminal,
}

/// Append-only list of a room's variants.
#[derive(Clone, Debug, Default)]
pub struct VariantCatalog {
    variants: Vec<Variant>,
}

impl VariantCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty catalog with room for `capacity` variants.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { variants: Vec::with_capacity(capacity) }
    }

    /// Append `variant` and return its id.
    pub fn push(&mut self, variant: Variant) -> VariantId {
        debug_assert!(variant.pushes >= variant.exited_boxes.len() as u64);
        debug_assert_eq!(variant.path.chars().count() as u64, variant.moves);
        self.variants.push(variant);
        VariantId(self.variants.len() - 1)
    }

    /// Panics if `id` does not belong to this catalog.
    pub fn get(&self, id: VariantId) -> &Variant {
        &self.variants[id.0]
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the catalog holds no variant.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// All ids, in order.
    pub fn ids(&self) -> impl Iterator<Item = VariantId> + Clone {
        (0..self.variants.len()).map(VariantId)
    }

    /// All variants with their ids, in order.
    pub fn iter(&self) -> impl Iterator<Item = (VariantId, &Variant)> + '_ {
        self.variants.iter().enumerate().map(|(index, variant)| (VariantId(index), variant))
    }

    pub(crate) fn into_vec(self) -> Vec<Variant> {
        self.variants
    }
}

/// Run-length encode a move path: runs of three or more equal moves become `<count><move>`.
///
/// Paths that are empty or already contain digits are returned unchanged.
pub fn compress_path(path: &str) -> String {
    if path.is_empty() || path.chars().any(|c| c.is_ascii_digit()) {
        return path.to_string();
    }

    let chars: Vec<char> = path.chars().collect();
    let mut out = String::with_capacity(path.len());
    let mut pos = 0;
    while pos < chars.len() {
        let run = chars[pos..].iter().take_while(|c| **c == chars[pos]).count();
        if run < 3 {
            out.push(chars[pos]);
            pos += 1;
        } else {
            out.push_str(&run.to_string());
            out.push(chars[pos]);
            pos += run;
        }
    }

    out
}

/// Inverse of [`compress_path`].
pub fn uncompress_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut count = 0usize;
    for c in path.chars() {
        match c.to_digit(10) {
            Some(digit) => count = count * 10 + digit as usize,
            None => {
                out.extend(std::iter::repeat(c).take(count.max(1)));
                count = 0;
            }
        }
    }
    out
}
