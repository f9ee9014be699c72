use std::fmt::{Display, Formatter};

use fixedbitset::FixedBitSet;
use ndarray::Array2;
use strum::VariantArray;

use crate::location::{Dimension, Location, Pos, Step};

/// The static content of a board cell.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Tile {
    /// Open floor.
    #[default]
    Floor,
    /// Impassable for boxes and player.
    Wall,
    /// Floor a box must end on.
    Goal,
}

/// A Sokoban board: static tiles plus the starting boxes and player.
///
/// Cells are addressed by [`Pos`], the row-major linear index. Anything outside the grid counts as wall.
/// [`Board`]s should be built using a [`BoardBuilder`](crate::builder::BoardBuilder).
#[derive(Clone, Debug)]
pub struct Board {
    pub(crate) dims: (Dimension, Dimension),
    pub(crate) tiles: Array2<Tile>,
    pub(crate) boxes: Vec<Pos>,
    pub(crate) player: Pos,
    pub(crate) walkable: FixedBitSet,
    pub(crate) walkable_positions: Vec<Pos>,
}

impl Board {
    pub(crate) fn new(dims: (Dimension, Dimension), tiles: Array2<Tile>, mut boxes: Vec<Pos>, player: Pos) -> Self {
        boxes.sort_unstable();
        boxes.dedup();

        let mut board = Self {
            dims,
            tiles,
            boxes,
            player,
            walkable: FixedBitSet::with_capacity(dims.0.get() * dims.1.get()),
            walkable_positions: Vec::new(),
        };

        // flood fill from the player; boxes never split the reachable area
        let mut stack = vec![player];
        board.walkable.insert(player);
        while let Some(pos) = stack.pop() {
            for (_, next) in board.neighbors(pos) {
                if !board.is_wall(next) && !board.walkable.put(next) {
                    stack.push(next);
                }
            }
        }
        board.walkable_positions = board.walkable.ones().collect();

        board
    }

    /// Number of columns.
    pub fn width(&self) -> Dimension {
        self.dims.0
    }

    /// Number of rows.
    pub fn height(&self) -> Dimension {
        self.dims.1
    }

    /// Number of cells in the grid.
    pub fn size(&self) -> usize {
        self.dims.0.get() * self.dims.1.get()
    }

    /// The `(x, y)` location of `pos`.
    pub fn location(&self, pos: Pos) -> Location {
        Location::from_pos(pos, self.dims.0)
    }

    /// Convert a [`Location`] to a [`Pos`], or `None` if it lies outside the grid.
    pub fn pos(&self, location: Location) -> Option<Pos> {
        if location.0 < self.dims.0.get() && location.1 < self.dims.1.get() {
            Some(location.to_pos(self.dims.0))
        } else {
            None
        }
    }

    /// The tile at `pos`; anything off the grid is a wall.
    pub fn tile(&self, pos: Pos) -> Tile {
        if pos >= self.size() {
            return Tile::Wall;
        }
        self.tiles[self.location(pos).as_index()]
    }

    /// Whether `pos` is a wall or off the grid.
    pub fn is_wall(&self, pos: Pos) -> bool {
        self.tile(pos) == Tile::Wall
    }

    /// Whether `pos` is a goal.
    pub fn is_goal(&self, pos: Pos) -> bool {
        self.tile(pos) == Tile::Goal
    }

    /// Whether the player can ever stand on `pos`.
    pub fn is_walkable(&self, pos: Pos) -> bool {
        pos < self.size() && self.walkable.contains(pos)
    }

    /// Whether a step from `pos` in `direction` stays inside the grid, and where it lands.
    pub fn step(&self, pos: Pos, direction: Step) -> Option<Pos> {
        self.pos(direction.attempt_from(self.location(pos)))
    }

    /// All in-grid orthogonal neighbors of `pos`, in [`Step`] order.
    pub fn neighbors(&self, pos: Pos) -> Vec<(Step, Pos)> {
        Step::VARIANTS.iter()
            .filter_map(|dir| self.step(pos, *dir).map(|next| (*dir, next)))
            .collect()
    }

    /// Sorted positions reachable by the player.
    pub fn walkable_positions(&self) -> &[Pos] {
        &self.walkable_positions
    }

    fn wall_towards(&self, pos: Pos, direction: Step) -> bool {
        self.step(pos, direction).map_or(true, |next| self.is_wall(next))
    }

    /// A box on `pos` could never be moved again.
    pub fn is_corner(&self, pos: Pos) -> bool {
        let horizontal = self.wall_towards(pos, Step::Left) || self.wall_towards(pos, Step::Right);
        let vertical = self.wall_towards(pos, Step::Up) || self.wall_towards(pos, Step::Down);
        horizontal && vertical
    }

    /// A box pushed onto `pos` can never reach a goal: either it cannot stand there or it is stuck off-goal.
    pub fn is_dead(&self, pos: Pos) -> bool {
        !self.is_walkable(pos) || (self.is_corner(pos) && !self.is_goal(pos))
    }

    /// Sorted starting box positions.
    pub fn boxes(&self) -> &[Pos] {
        &self.boxes
    }

    /// Whether a box starts on `pos`.
    pub fn is_box(&self, pos: Pos) -> bool {
        self.boxes.binary_search(&pos).is_ok()
    }

    /// The player's starting position.
    pub fn player(&self) -> Pos {
        self.player
    }

    /// Number of goals on the board.
    pub fn goal_count(&self) -> usize {
        self.tiles.iter().filter(|tile| **tile == Tile::Goal).count()
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut out = String::with_capacity(self.tiles.nrows() * (self.tiles.ncols() + 1));

        for (y, row) in self.tiles.rows().into_iter().enumerate() {
            for (x, tile) in row.iter().enumerate() {
                let pos = Location(x, y).to_pos(self.dims.0);
                out.push(match (tile, self.is_box(pos), pos == self.player) {
                    (Tile::Wall, _, _) => '#',
                    (Tile::Goal, true, _) => '*',
                    (Tile::Goal, false, true) => '+',
                    (Tile::Goal, false, false) => '.',
                    (Tile::Floor, true, _) => '$',
                    (Tile::Floor, false, true) => '@',
                    (Tile::Floor, false, false) => ' ',
                });
            }
            out.push('\n');
        }

        write!(f, "{}", out)
    }
}
