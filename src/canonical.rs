// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Container canonicalization and the derived solution identifiers.
//!
//! A container is canonicalized by trying all 24 proper cubic rotations,
//! translating each rotated copy so its per-axis minima sit at zero, and
//! keeping the rotation whose sorted serialization is lexicographically
//! smallest. The container identifier (CID) hashes that serialization;
//! solution identifiers hash the placements transformed into the same
//! canonical frame, either order-agnostic (`sid_state`) or in placement
//! order (`sid_route`).

use lazy_static::lazy_static;
use sha2::{Digest, Sha256};

use crate::core::Cell;

/// A signed axis permutation: one of the 24 rotations of the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    perm: [usize; 3],
    signs: [i32; 3],
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation {
        perm: [0, 1, 2],
        signs: [1, 1, 1],
    };

    pub fn apply(&self, cell: Cell) -> Cell {
        let v = [cell.0, cell.1, cell.2];
        Cell(
            self.signs[0] * v[self.perm[0]],
            self.signs[1] * v[self.perm[1]],
            self.signs[2] * v[self.perm[2]],
        )
    }
}

fn permutation_parity(perm: [usize; 3]) -> i32 {
    let mut inversions = 0;
    for a in 0..3 {
        for b in a + 1..3 {
            if perm[a] > perm[b] {
                inversions += 1;
            }
        }
    }
    if inversions % 2 == 0 {
        1
    } else {
        -1
    }
}

lazy_static! {
    /// The 24 proper rotations: sign-permutation matrices of determinant +1.
    pub static ref PROPER_ROTATIONS: Vec<Rotation> = {
        const PERMS: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let mut rotations = Vec::with_capacity(24);
        for perm in PERMS {
            let parity = permutation_parity(perm);
            for sx in [-1, 1] {
                for sy in [-1, 1] {
                    for sz in [-1, 1] {
                        if parity * sx * sy * sz == 1 {
                            rotations.push(Rotation {
                                perm,
                                signs: [sx, sy, sz],
                            });
                        }
                    }
                }
            }
        }
        rotations
    };
}

/// The chosen canonical frame for a cell set: the winning rotation, the
/// translation that zeroes the minima, and the canonical serialization.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub rotation: Rotation,
    pub translation: Cell,
    pub serialized: String,
}

impl Canonical {
    /// Maps a cell into the canonical frame.
    pub fn transform(&self, cell: Cell) -> Cell {
        self.rotation.apply(cell) + self.translation
    }
}

fn serialize_cells(cells: &[Cell]) -> String {
    let parts: Vec<String> = cells
        .iter()
        .map(|c| format!("{},{},{}", c.0, c.1, c.2))
        .collect();
    parts.join(";")
}

/// Canonicalizes a cell set over the 24 proper rotations.
pub fn canonicalize(cells: &[Cell]) -> Canonical {
    let mut best: Option<Canonical> = None;

    for &rotation in PROPER_ROTATIONS.iter() {
        let rotated: Vec<Cell> = cells.iter().map(|&c| rotation.apply(c)).collect();
        let min_i = rotated.iter().map(|c| c.0).min().unwrap_or(0);
        let min_j = rotated.iter().map(|c| c.1).min().unwrap_or(0);
        let min_k = rotated.iter().map(|c| c.2).min().unwrap_or(0);
        let translation = Cell(-min_i, -min_j, -min_k);

        let mut shifted: Vec<Cell> = rotated.into_iter().map(|c| c + translation).collect();
        shifted.sort();
        let serialized = serialize_cells(&shifted);

        let better = match &best {
            Some(current) => serialized < current.serialized,
            None => true,
        };
        if better {
            best = Some(Canonical {
                rotation,
                translation,
                serialized,
            });
        }
    }

    best.expect("at least one rotation considered")
}

pub fn sha256_hex(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// The container identifier: SHA-256 of the canonical serialization.
pub fn container_cid(canonical: &Canonical) -> String {
    sha256_hex(&canonical.serialized)
}

fn piece_cells_string(canonical: &Canonical, cells: &[Cell]) -> String {
    let mut transformed: Vec<Cell> = cells.iter().map(|&c| canonical.transform(c)).collect();
    transformed.sort();
    let parts: Vec<String> = transformed
        .iter()
        .map(|c| format!("{}:{}:{}", c.0, c.1, c.2))
        .collect();
    parts.join(",")
}

/// Order-agnostic solution identifier: pieces sorted by id.
pub fn sid_state(cid: &str, canonical: &Canonical, pieces: &[(String, Vec<Cell>)]) -> String {
    let mut segments: Vec<String> = pieces
        .iter()
        .map(|(id, cells)| format!("{}={}", id, piece_cells_string(canonical, cells)))
        .collect();
    segments.sort();
    sha256_hex(&format!("{}|{}", cid, segments.join("|")))
}

/// Order-aware solution identifier: pieces in the order they were placed.
pub fn sid_route(cid: &str, canonical: &Canonical, pieces: &[(String, Vec<Cell>)]) -> String {
    let segments: Vec<String> = pieces
        .iter()
        .map(|(id, cells)| format!("{}={}", id, piece_cells_string(canonical, cells)))
        .collect();
    sha256_hex(&format!("{}|{}", cid, segments.join("-> ")))
}
