//! Construction of boards, feature by feature or from level text.

use std::num::NonZero;

use itertools::Itertools;
use ndarray::Array2;

use crate::board::{Board, Tile};
use crate::location::{Dimension, Location};

/// Reasons a builder may become invalid while building.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuilderInvalidReason {
    /// A feature like a wall or box was placed outside the bounds specified by `dims` on a builder.
    FeatureOutOfBounds,
    /// A level text contained no cells at all.
    EmptyLevel,
    /// A level text contained a character outside the classic Sokoban alphabet.
    UnknownCharacter(char),
    /// A box or the player was placed on a wall, or a wall on top of one of them.
    FeatureOnWall,
    /// No player was placed.
    MissingPlayer,
    /// More than one player was placed.
    DuplicatePlayer,
    /// The number of boxes differs from the number of goals.
    BoxGoalMismatch {
        /// Boxes placed.
        boxes: usize,
        /// Goals placed.
        goals: usize,
    },
}

/// A builder for rectangular Sokoban boards.
///
/// Builders mutate themselves while building but can be [`Clone`]d to save their state at some point.
/// Once a builder is invalid, further feature calls do nothing.
#[derive(Clone, Debug)]
pub struct BoardBuilder {
    // width, height
    dims: (Dimension, Dimension),
    tiles: Array2<Tile>,
    boxes: Vec<Location>,
    players: Vec<Location>,
    invalid_reasons: Vec<BuilderInvalidReason>,
}

impl Default for BoardBuilder {
    fn default() -> Self {
        Self::with_dims((NonZero::<usize>::MIN, NonZero::<usize>::MIN))
    }
}

impl BoardBuilder {
    /// Construct a new [`Self`] with the specified dimensions, specified in `(x, y)` order.
    pub fn with_dims(dims: (Dimension, Dimension)) -> Self {
        Self {
            dims,
            tiles: Array2::from_elem((dims.1.get(), dims.0.get()), Tile::Floor),
            boxes: Default::default(),
            players: Default::default(),
            invalid_reasons: Default::default(),
        }
    }

    /// Read a level in the classic text notation, one row per line.
    ///
    /// `#` wall, ` ` floor, `.` goal, `$` box, `*` box on goal, `@` player, `+` player on goal.
    /// `-` and `_` are accepted as floor. Short rows are padded with floor.
    pub fn parse(level: &str) -> Self {
        let rows = level.lines()
            .map(|line| line.trim_end_matches('\r'))
            .skip_while(|line| line.trim().is_empty())
            .collect_vec();
        let rows = match rows.iter().rposition(|line| !line.trim().is_empty()) {
            Some(last) => &rows[..=last],
            None => &rows[..0],
        };

        let width = rows.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let (Some(width), Some(height)) = (NonZero::new(width), NonZero::new(rows.len())) else {
            let mut builder = Self::default();
            builder.invalid_reasons.push(BuilderInvalidReason::EmptyLevel);
            return builder;
        };

        let mut builder = Self::with_dims((width, height));
        for (y, line) in rows.iter().enumerate() {
            for (x, c) in line.chars().enumerate() {
                let location = Location(x, y);
                match c {
                    '#' => { builder.add_wall(location); }
                    ' ' | '-' | '_' => {}
                    '.' => { builder.add_goal(location); }
                    '$' => { builder.add_box(location); }
                    '*' => { builder.add_goal(location).add_box(location); }
                    '@' => { builder.set_player(location); }
                    '+' => { builder.add_goal(location).set_player(location); }
                    other => {
                        if builder.invalid_reasons.is_empty() {
                            builder.invalid_reasons.push(BuilderInvalidReason::UnknownCharacter(other));
                        }
                    }
                }
            }
        }

        builder
    }

    fn in_bounds(&mut self, location: Location) -> bool {
        if location.0 >= self.dims.0.get() || location.1 >= self.dims.1.get() {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOutOfBounds);
            return false;
        }
        true
    }

    /// Place a wall at `location`.
    ///
    /// May cause the builder to enter a [`FeatureOutOfBounds`](BuilderInvalidReason::FeatureOutOfBounds) invalid state if `location` is out of bounds,
    /// or [`FeatureOnWall`](BuilderInvalidReason::FeatureOnWall) if a box or the player already stands there.
    pub fn add_wall(&mut self, location: Location) -> &mut Self {
        if !self.invalid_reasons.is_empty() || !self.in_bounds(location) {
            return self;
        }

        if self.boxes.contains(&location) || self.players.contains(&location) {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOnWall);
            return self;
        }

        self.tiles[location.as_index()] = Tile::Wall;
        self
    }

    /// Mark `location` as a goal.
    pub fn add_goal(&mut self, location: Location) -> &mut Self {
        if !self.invalid_reasons.is_empty() || !self.in_bounds(location) {
            return self;
        }

        if self.tiles[location.as_index()] == Tile::Wall {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOnWall);
            return self;
        }

        self.tiles[location.as_index()] = Tile::Goal;
        self
    }

    /// Place a box at `location`. Placing a second box on the same cell does nothing.
    pub fn add_box(&mut self, location: Location) -> &mut Self {
        if !self.invalid_reasons.is_empty() || !self.in_bounds(location) {
            return self;
        }

        if self.tiles[location.as_index()] == Tile::Wall {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOnWall);
            return self;
        }

        if !self.boxes.contains(&location) {
            self.boxes.push(location);
        }
        self
    }

    /// Place the player at `location`.
    pub fn set_player(&mut self, location: Location) -> &mut Self {
        if !self.invalid_reasons.is_empty() || !self.in_bounds(location) {
            return self;
        }

        if self.tiles[location.as_index()] == Tile::Wall {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOnWall);
            return self;
        }

        self.players.push(location);
        self
    }

    /// Remove the most recently placed box.
    ///
    /// If the builder is in an invalid state or no boxes are present, this function does nothing.
    pub fn pop_box(&mut self) -> &mut Self {
        if self.invalid_reasons.is_empty() {
            self.boxes.pop();
        }
        self
    }

    /// Check the validity of this builder, ensuring no [`BuilderInvalidReason`] condition has arisen so far.
    ///
    /// Returns `None` if the builder is valid, `Some(&Vec<BuilderInvalidReason>)` otherwise.
    /// Whole-board conditions such as a missing player are only detected by [`Self::build`].
    pub fn is_valid(&self) -> Option<&Vec<BuilderInvalidReason>> {
        if self.invalid_reasons.is_empty() {
            None
        } else {
            Some(&self.invalid_reasons)
        }
    }

    /// Convert the state of this builder into a [`Board`].
    /// If the builder is invalid for any reason, a [`Vec`] of [`BuilderInvalidReason`] will indicate why.
    pub fn build(&self) -> Result<Board, Vec<BuilderInvalidReason>> {
        let mut reasons = self.invalid_reasons.clone();
        if reasons.is_empty() {
            match self.players.len() {
                0 => reasons.push(BuilderInvalidReason::MissingPlayer),
                1 => {}
                _ => reasons.push(BuilderInvalidReason::DuplicatePlayer),
            }

            let goals = self.tiles.iter().filter(|tile| **tile == Tile::Goal).count();
            if goals != self.boxes.len() {
                reasons.push(BuilderInvalidReason::BoxGoalMismatch { boxes: self.boxes.len(), goals });
            }
        }

        if !reasons.is_empty() {
            return Err(reasons);
        }

        let width = self.dims.0;
        Ok(Board::new(
            self.dims,
            self.tiles.clone(),
            self.boxes.iter().map(|location| location.to_pos(width)).collect(),
            self.players[0].to_pos(width),
        ))
    }
}
