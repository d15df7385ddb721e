// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Canonical indexing of the container's cells, plus the adjacency and
//! boundary tables every other component reads.
//!
//! Cell indices are assigned by sorting the `(i, j, k)` triples; index 0 is
//! the lexicographically smallest cell, and all bitmask positions follow this
//! ordering. Neighbor lists and boundary flags are frozen at construction.

use rustc_hash::FxHashMap;

use crate::container::ContainerError;
use crate::core::{Cell, FCC_NEIGHBORS};

pub struct Lattice {
    cells: Vec<Cell>,
    index: FxHashMap<Cell, u32>,
    neighbors: Vec<Vec<u32>>,
    boundary: Vec<bool>,
}

impl Lattice {
    /// Builds the lattice over the given container cells. Rejects an empty
    /// cell list and duplicate cells.
    pub fn new(container_cells: &[Cell]) -> Result<Lattice, ContainerError> {
        if container_cells.is_empty() {
            return Err(ContainerError::Empty);
        }

        let mut cells = container_cells.to_vec();
        cells.sort();
        for window in cells.windows(2) {
            if window[0] == window[1] {
                return Err(ContainerError::DuplicateCell(window[0]));
            }
        }

        let index: FxHashMap<Cell, u32> = cells
            .iter()
            .enumerate()
            .map(|(n, &cell)| (cell, n as u32))
            .collect();

        let mut neighbors = Vec::with_capacity(cells.len());
        let mut boundary = Vec::with_capacity(cells.len());
        for &cell in &cells {
            let mut adjacent = Vec::new();
            let mut on_boundary = false;
            for offset in FCC_NEIGHBORS {
                match index.get(&(cell + offset)) {
                    Some(&n) => adjacent.push(n),
                    None => on_boundary = true,
                }
            }
            neighbors.push(adjacent);
            boundary.push(on_boundary);
        }

        Ok(Lattice {
            cells,
            index,
            neighbors,
            boundary,
        })
    }

    /// Number of cells in the container.
    pub fn len(&self) -> u32 {
        self.cells.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, idx: u32) -> Cell {
        self.cells[idx as usize]
    }

    pub fn index_of(&self, cell: Cell) -> Option<u32> {
        self.index.get(&cell).copied()
    }

    /// Indices of the FCC-adjacent cells that are also inside the container.
    pub fn neighbors_of(&self, idx: u32) -> &[u32] {
        &self.neighbors[idx as usize]
    }

    /// True when any of the twelve neighbor offsets leaves the container.
    pub fn is_boundary(&self, idx: u32) -> bool {
        self.boundary[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Vec<Cell> {
        vec![Cell(0, 0, 0), Cell(1, 1, 0), Cell(1, 0, 1), Cell(0, 1, 1)]
    }

    #[test]
    fn index_zero_is_smallest_cell() {
        let mut shuffled = tetrahedron();
        shuffled.reverse();
        let lattice = Lattice::new(&shuffled).unwrap();
        assert_eq!(lattice.cell(0), Cell(0, 0, 0));
        assert_eq!(lattice.index_of(Cell(0, 0, 0)), Some(0));
        assert_eq!(lattice.len(), 4);
    }

    #[test]
    fn neighborship_is_symmetric() {
        let lattice = Lattice::new(&tetrahedron()).unwrap();
        for idx in 0..lattice.len() {
            for &n in lattice.neighbors_of(idx) {
                assert!(
                    lattice.neighbors_of(n).contains(&idx),
                    "{} -> {} not symmetric",
                    idx,
                    n
                );
            }
        }
    }

    #[test]
    fn tetrahedron_adjacency() {
        // (0,0,0) is FCC-adjacent to none of the other three; those three form
        // a triangle among themselves.
        let lattice = Lattice::new(&tetrahedron()).unwrap();
        let origin = lattice.index_of(Cell(0, 0, 0)).unwrap();
        assert!(lattice.neighbors_of(origin).is_empty());
        for idx in 0..lattice.len() {
            if idx != origin {
                assert_eq!(lattice.neighbors_of(idx).len(), 2);
            }
        }
    }

    #[test]
    fn all_cells_of_small_container_are_boundary() {
        let lattice = Lattice::new(&tetrahedron()).unwrap();
        for idx in 0..lattice.len() {
            assert!(lattice.is_boundary(idx));
        }
    }

    #[test]
    fn interior_cell_is_not_boundary() {
        // A cell plus its full 12-neighborhood: the center has no missing
        // neighbor.
        let mut cells = vec![Cell(0, 0, 0)];
        for offset in FCC_NEIGHBORS {
            cells.push(Cell(0, 0, 0) + offset);
        }
        let lattice = Lattice::new(&cells).unwrap();
        let center = lattice.index_of(Cell(0, 0, 0)).unwrap();
        assert!(!lattice.is_boundary(center));
        assert_eq!(lattice.neighbors_of(center).len(), 12);
    }

    #[test]
    fn empty_container_rejected() {
        assert!(matches!(Lattice::new(&[]), Err(ContainerError::Empty)));
    }

    #[test]
    fn duplicate_cell_rejected() {
        let cells = vec![Cell(0, 0, 0), Cell(0, 0, 0)];
        assert!(matches!(
            Lattice::new(&cells),
            Err(ContainerError::DuplicateCell(Cell(0, 0, 0)))
        ));
    }
}
