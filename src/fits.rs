// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Precomputed placement tables: for every (piece, anchor cell) pair, the
//! orientations that fit entirely inside the container, each with its
//! occupancy bitmask and the tuple of covered cell indices.
//!
//! The table is built once at solver startup and immutable afterwards; the
//! search's legality test then reduces to one bitmask intersection.

use crate::core::{Cell, CellSet, CELLS_PER_PIECE};
use crate::lattice::Lattice;
use crate::pieces::PieceLibrary;

/// One legal placement of one piece orientation at one anchor cell.
#[derive(Debug, Clone)]
pub struct Fit {
    /// Index of the orientation in the piece's orientation list.
    pub orientation: u16,
    /// Bitmask over cell indices; exactly four bits set.
    pub mask: CellSet,
    /// The covered cell indices, in orientation offset order. Always
    /// includes the anchor's own index.
    pub covered: [u32; CELLS_PER_PIECE],
}

/// Fit lists for every (piece, anchor) pair, indexed `[piece][anchor]`.
/// Anchors where a piece has no fit hold an empty list.
pub struct FitTable {
    fits: Vec<Vec<Vec<Fit>>>,
    total: usize,
}

impl FitTable {
    pub fn new(lattice: &Lattice, library: &PieceLibrary) -> FitTable {
        let cell_count = lattice.len();
        let mut fits = Vec::with_capacity(library.len());
        let mut total = 0;
        for piece in 0..library.len() as u16 {
            let mut per_anchor = Vec::with_capacity(cell_count as usize);
            for anchor in 0..cell_count {
                let fits_here = fits_at_anchor(lattice, library, piece, anchor);
                total += fits_here.len();
                per_anchor.push(fits_here);
            }
            fits.push(per_anchor);
        }

        FitTable { fits, total }
    }

    /// The fits of `piece` anchored at cell index `anchor`.
    pub fn at(&self, piece: u16, anchor: u32) -> &[Fit] {
        &self.fits[piece as usize][anchor as usize]
    }

    pub fn piece_count(&self) -> usize {
        self.fits.len()
    }

    /// Total number of fits across all pieces and anchors.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

fn fits_at_anchor(lattice: &Lattice, library: &PieceLibrary, piece: u16, anchor: u32) -> Vec<Fit> {
    let origin: Cell = lattice.cell(anchor);
    let mut fits = Vec::new();

    'orientations: for (n, orientation) in library.orientations(piece).iter().enumerate() {
        let mut covered = [0u32; CELLS_PER_PIECE];
        for (slot, &offset) in orientation.iter().enumerate() {
            match lattice.index_of(origin + offset) {
                Some(idx) => covered[slot] = idx,
                None => continue 'orientations,
            }
        }

        let mut mask = CellSet::empty(lattice.len());
        for &idx in &covered {
            mask.insert(idx);
        }
        fits.push(Fit {
            orientation: n as u16,
            mask,
            covered,
        });
    }

    fits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Cell;
    use std::collections::BTreeMap;

    fn tetra_cells() -> Vec<Cell> {
        vec![Cell(0, 0, 0), Cell(1, 1, 0), Cell(1, 0, 1), Cell(0, 1, 1)]
    }

    fn single_piece_library() -> PieceLibrary {
        let mut map = BTreeMap::new();
        map.insert(
            "A".to_owned(),
            vec![[Cell(0, 0, 0), Cell(1, 1, 0), Cell(1, 0, 1), Cell(0, 1, 1)]],
        );
        PieceLibrary::from_orientation_map(map).unwrap()
    }

    #[test]
    fn trivial_container_has_one_fit() {
        let lattice = Lattice::new(&tetra_cells()).unwrap();
        let library = single_piece_library();
        let table = FitTable::new(&lattice, &library);

        assert_eq!(table.len(), 1);
        let anchor = lattice.index_of(Cell(0, 0, 0)).unwrap();
        let fits = table.at(0, anchor);
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].orientation, 0);
        assert_eq!(fits[0].mask.len(), 4);
        assert!(fits[0].covered.contains(&anchor));

        // the other anchors push the piece outside the container
        for idx in 0..lattice.len() {
            if idx != anchor {
                assert!(table.at(0, idx).is_empty());
            }
        }
    }

    #[test]
    fn fit_covers_its_own_anchor() {
        // two interlocking tetrahedra worth of cells
        let mut cells = tetra_cells();
        cells.extend([Cell(1, 0, 0), Cell(0, 1, 0), Cell(0, 0, 1), Cell(1, 1, 1)]);
        let lattice = Lattice::new(&cells).unwrap();
        let library = single_piece_library();
        let table = FitTable::new(&lattice, &library);

        for anchor in 0..lattice.len() {
            for fit in table.at(0, anchor) {
                assert!(fit.covered.contains(&anchor));
                assert_eq!(fit.mask.len(), 4);
                for &idx in &fit.covered {
                    assert!(idx < lattice.len());
                    assert!(fit.mask.contains(idx));
                }
            }
        }
    }
}
