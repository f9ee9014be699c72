use std::fmt::{Display, Formatter};
use std::num::NonZero;

use strum::VariantArray;

pub(crate) type Coord = usize;
/// A board dimension, width or height.
pub type Dimension = NonZero<Coord>;
/// A linear board index, `y * width + x`.
pub type Pos = usize;

#[derive(Clone, Eq, Hash, Copy, PartialEq, Ord, PartialOrd, Debug)]
/// A location `(x, y)` on a board. The top left corner is `Location(0, 0)`.
pub struct Location(pub Coord, pub Coord);

impl Location {
    pub(crate) fn as_index(&self) -> (Coord, Coord) {
        (self.1, self.0)
    }

    pub(crate) fn offset_by(self, rhs: (isize, isize)) -> Self {
        Self(self.0.wrapping_add_signed(rhs.0), self.1.wrapping_add_signed(rhs.1))
    }

    pub(crate) fn from_pos(pos: Pos, width: Dimension) -> Self {
        Self(pos % width.get(), pos / width.get())
    }

    pub(crate) fn to_pos(self, width: Dimension) -> Pos {
        self.1 * width.get() + self.0
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// A single player step on the square grid.
///
/// The declaration order is the order in which a cell's portals are numbered.
#[derive(Copy, Clone, VariantArray, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub enum Step {
    /// Towards row 0.
    Up,
    /// Away from row 0.
    Down,
    /// Towards column 0.
    Left,
    /// Away from column 0.
    Right,
}

impl Step {
    /// Attempt the step from `location` and return the resultant [`Location`].
    /// Stepping off the top or left edge wraps to a huge coordinate, which every bounds check rejects.
    pub fn attempt_from(&self, location: Location) -> Location {
        match self {
            Self::Up => location.offset_by((0, -1)),
            Self::Down => location.offset_by((0, 1)),
            Self::Left => location.offset_by((-1, 0)),
            Self::Right => location.offset_by((1, 0)),
        }
    }

    /// The opposite direction.
    pub fn invert(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// The move character used in solution paths.
    pub fn to_char(&self) -> char {
        match self {
            Self::Up => 'u',
            Self::Down => 'd',
            Self::Left => 'l',
            Self::Right => 'r',
        }
    }
}
