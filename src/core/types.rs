// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

/// A cell on the face-centered cubic integer lattice, identified by its
/// `(i, j, k)` coordinates. Cells double as offset vectors: a piece
/// orientation is a list of `Cell` offsets relative to its anchor.
///
/// `Ord` is the lexicographic order of the coordinate triple; the lattice
/// relies on it to assign stable cell indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell(pub i32, pub i32, pub i32);

impl Cell {
    pub const fn i(self) -> i32 {
        self.0
    }

    pub const fn j(self) -> i32 {
        self.1
    }

    pub const fn k(self) -> i32 {
        self.2
    }

    /// Taxicab distance between two cells on the raw coordinate grid.
    pub const fn manhattan(self, other: Cell) -> i32 {
        (self.0 - other.0).abs() + (self.1 - other.1).abs() + (self.2 - other.2).abs()
    }
}

impl ops::Add for Cell {
    type Output = Cell;

    fn add(self, rhs: Cell) -> Cell {
        Cell(self.0 + rhs.0, self.1 + rhs.1, self.2 + rhs.2)
    }
}

impl ops::Sub for Cell {
    type Output = Cell;

    fn sub(self, rhs: Cell) -> Cell {
        Cell(self.0 - rhs.0, self.1 - rhs.1, self.2 - rhs.2)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.0, self.1, self.2)
    }
}

/// The twelve FCC neighbor offsets. This set is fixed by the lattice
/// definition and is not a tunable.
pub const FCC_NEIGHBORS: [Cell; 12] = [
    Cell(1, 0, 0),
    Cell(-1, 0, 0),
    Cell(0, 1, 0),
    Cell(0, -1, 0),
    Cell(0, 0, 1),
    Cell(0, 0, -1),
    Cell(1, -1, 0),
    Cell(-1, 1, 0),
    Cell(1, 0, -1),
    Cell(-1, 0, 1),
    Cell(0, 1, -1),
    Cell(0, -1, 1),
];

/// A single orientation of a piece: four offsets, one of which is the
/// `(0,0,0)` anchor.
pub type Orientation = [Cell; 4];

/// Number of lattice cells covered by every piece.
pub const CELLS_PER_PIECE: usize = 4;
