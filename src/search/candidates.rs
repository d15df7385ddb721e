//! Anchor selection, candidate construction, scoring, and local pruning.
//!
//! Depth-first packing lives or dies on which placement is tried first. On
//! entry to a depth the engine picks an anchor (the tightest unoccupied
//! cell), enumerates the placements that cover it, rejects placements that
//! visibly strand empty space, and ranks the survivors so that low-exposure
//! placements are tried before speculative ones.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::RouletteMode;
use crate::core::CellSet;
use crate::fits::Fit;
use crate::lattice::Lattice;

use super::{Candidate, SearchState, TryKey};

const ROULETTE_SALT: u64 = 0xC0FFEE;

struct Scored<'a> {
    score: f64,
    dist: i32,
    tries: u32,
    origin: u32,
    fit: &'a Fit,
}

impl<'a> SearchState<'a> {
    /// Builds the candidate deque for the current depth and pushes it onto
    /// the frontier. Past the end of the slot order this is a no-op.
    pub(super) fn build_frontier(&mut self) {
        if self.cursor >= self.order.len() {
            return;
        }
        let piece = self.order[self.cursor];
        let ranked = self.build_candidates(piece);
        self.frontier.push(VecDeque::from(ranked));
    }

    fn build_candidates(&mut self, piece: u16) -> Vec<Candidate<'a>> {
        let lattice = self.lattice;
        let fits = self.fits;

        let anchor = select_anchor(lattice, &self.occupancy);
        if let Some((_, degree)) = anchor {
            *self.stats.anchor_degree_hist.entry(degree).or_insert(0) += 1;
        }
        let in_corridor = match anchor {
            Some((_, 1)) => true,
            Some((_, 2)) => self.tuning.deg2_corridor,
            _ => false,
        };

        // Conditional gating: arm the mod-4 prune the first time the current
        // empties are already mod-4 clean.
        if self.tuning.hole4
            && self.tuning.hole4_conditional
            && !self.hole4_armed
            && empties_mod4_ok(lattice, &self.occupancy)
        {
            self.hole4_armed = true;
        }
        let hole4_active =
            self.tuning.hole4 && (!self.tuning.hole4_conditional || self.hole4_armed);

        let mut scored: Vec<Scored<'a>> = Vec::new();

        // Phase 1: cover the anchor.
        if let Some((anchor_idx, _)) = anchor {
            for fit in fits.at(piece, anchor_idx) {
                if !self.occupancy.intersects(&fit.mask) {
                    self.consider(anchor_idx, fit, anchor, hole4_active, &mut scored);
                }
            }
        }

        // Fallback: any unoccupied origin.
        if scored.is_empty() {
            *self.stats.fallback_by_piece.entry(piece).or_insert(0) += 1;
            for origin in 0..lattice.len() {
                if self.occupancy.contains(origin) {
                    continue;
                }
                for fit in fits.at(piece, origin) {
                    if !self.occupancy.intersects(&fit.mask) {
                        self.consider(origin, fit, anchor, hole4_active, &mut scored);
                    }
                }
            }
        }

        self.rank_and_cap(piece, scored, in_corridor)
    }

    fn consider(
        &mut self,
        origin: u32,
        fit: &'a Fit,
        anchor: Option<(u32, u32)>,
        hole4_active: bool,
        out: &mut Vec<Scored<'a>>,
    ) {
        let lattice = self.lattice;
        self.stats.considered += 1;

        let occ_after = self.occupancy.or(&fit.mask);
        if creates_isolated_empty(lattice, &occ_after, &fit.covered) {
            self.stats.pruned_isolated += 1;
            return;
        }
        if hole4_active && !empties_mod4_ok(lattice, &occ_after) {
            self.stats.pruned_mod4 += 1;
            return;
        }

        let exposed = exposed_empties(lattice, &occ_after, &fit.covered);
        let exposure = exposed.len() as u32;
        let boundary_exposure = exposed
            .iter()
            .filter(|&&idx| lattice.is_boundary(idx))
            .count() as u32;
        let leaves = exposed
            .iter()
            .filter(|&&idx| is_leaf_empty(lattice, &occ_after, idx))
            .count() as u32;

        *self.stats.exposure_hist.entry(exposure).or_insert(0) += 1;
        *self
            .stats
            .boundary_exposure_hist
            .entry(boundary_exposure)
            .or_insert(0) += 1;
        *self.stats.leaf_hist.entry(leaves).or_insert(0) += 1;

        let score = self.tuning.exposure_weight * exposure as f64
            + self.tuning.boundary_exposure_weight * boundary_exposure as f64
            + self.tuning.leaf_weight * leaves as f64;

        let dist = match anchor {
            None => 0,
            Some((anchor_idx, _)) => {
                if fit.covered.contains(&anchor_idx) {
                    -10
                } else if lattice
                    .neighbors_of(anchor_idx)
                    .iter()
                    .any(|n| fit.covered.contains(n))
                {
                    -5
                } else {
                    lattice.cell(anchor_idx).manhattan(lattice.cell(origin))
                }
            }
        };

        out.push(Scored {
            score,
            dist,
            tries: 0,
            origin,
            fit,
        });
    }

    fn rank_and_cap(
        &mut self,
        piece: u16,
        mut scored: Vec<Scored<'a>>,
        in_corridor: bool,
    ) -> Vec<Candidate<'a>> {
        if scored.is_empty() {
            *self.stats.choices_hist.entry(0).or_insert(0) += 1;
            return Vec::new();
        }

        for entry in &mut scored {
            entry.tries = self
                .try_counts
                .get(&TryKey {
                    piece,
                    origin: entry.origin,
                    orientation: entry.fit.orientation,
                })
                .copied()
                .unwrap_or(0);
        }

        scored.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .expect("candidate scores are finite")
                .then(a.dist.cmp(&b.dist))
                .then(a.tries.cmp(&b.tries))
                .then(a.origin.cmp(&b.origin))
                .then(a.fit.orientation.cmp(&b.fit.orientation))
        });

        let cap = if in_corridor {
            self.tuning.branch_cap_tight
        } else {
            self.tuning.branch_cap_open
        };
        scored.truncate(cap);

        let roulette = if in_corridor {
            RouletteMode::None
        } else {
            self.tuning.roulette
        };
        if roulette == RouletteMode::LeastTried {
            // Scores are nonnegative, so the IEEE bit pattern orders the same
            // way the float does and can key the bucket map.
            let mut buckets: BTreeMap<(u64, u32), Vec<Scored<'a>>> = BTreeMap::new();
            for entry in scored {
                buckets
                    .entry((entry.score.to_bits(), entry.tries))
                    .or_default()
                    .push(entry);
            }
            let mut rng = SmallRng::seed_from_u64(self.seed ^ ROULETTE_SALT ^ self.cursor as u64);
            let mut reordered = Vec::new();
            for (_, mut bucket) in buckets {
                bucket.shuffle(&mut rng);
                reordered.append(&mut bucket);
            }
            scored = reordered;
        }

        *self.stats.choices_hist.entry(scored.len()).or_insert(0) += 1;
        scored
            .into_iter()
            .map(|entry| Candidate {
                origin: entry.origin,
                fit: entry.fit,
            })
            .collect()
    }
}

/// The unoccupied cell with the fewest unoccupied neighbors; ties break
/// toward the smaller index. Returns the cell and its degree.
fn select_anchor(lattice: &Lattice, occupancy: &CellSet) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32)> = None;
    for idx in 0..lattice.len() {
        if occupancy.contains(idx) {
            continue;
        }
        let degree = lattice
            .neighbors_of(idx)
            .iter()
            .filter(|&&n| !occupancy.contains(n))
            .count() as u32;
        match best {
            Some((_, best_degree)) if degree >= best_degree => {}
            _ => best = Some((idx, degree)),
        }
    }
    best
}

/// True when the hypothetical occupancy strands an empty cell with no empty
/// neighbor. Only cells in or adjacent to the new placement can be affected.
fn creates_isolated_empty(lattice: &Lattice, occ_after: &CellSet, covered: &[u32; 4]) -> bool {
    let mut to_check: Vec<u32> = Vec::with_capacity(52);
    for &idx in covered {
        to_check.push(idx);
        to_check.extend_from_slice(lattice.neighbors_of(idx));
    }
    to_check.sort_unstable();
    to_check.dedup();

    to_check.into_iter().any(|idx| {
        !occ_after.contains(idx)
            && lattice
                .neighbors_of(idx)
                .iter()
                .all(|&n| occ_after.contains(n))
    })
}

/// The distinct unoccupied neighbors of the four newly filled cells.
fn exposed_empties(lattice: &Lattice, occ_after: &CellSet, covered: &[u32; 4]) -> Vec<u32> {
    let mut exposed = Vec::new();
    for &idx in covered {
        for &n in lattice.neighbors_of(idx) {
            if !occ_after.contains(n) && !exposed.contains(&n) {
                exposed.push(n);
            }
        }
    }
    exposed
}

/// An empty cell with exactly one empty neighbor.
fn is_leaf_empty(lattice: &Lattice, occ_after: &CellSet, idx: u32) -> bool {
    let mut empties = 0;
    for &n in lattice.neighbors_of(idx) {
        if !occ_after.contains(n) {
            empties += 1;
            if empties >= 2 {
                return false;
            }
        }
    }
    empties == 1
}

/// Flood-fills the unoccupied region; true when every connected empty
/// component has a size divisible by four.
pub(crate) fn empties_mod4_ok(lattice: &Lattice, occupancy: &CellSet) -> bool {
    let mut seen = vec![false; lattice.len() as usize];
    for start in 0..lattice.len() {
        if occupancy.contains(start) || seen[start as usize] {
            continue;
        }
        let mut size = 0u32;
        let mut stack = vec![start];
        seen[start as usize] = true;
        while let Some(cell) = stack.pop() {
            size += 1;
            for &n in lattice.neighbors_of(cell) {
                if !occupancy.contains(n) && !seen[n as usize] {
                    seen[n as usize] = true;
                    stack.push(n);
                }
            }
        }
        if size % 4 != 0 {
            return false;
        }
    }
    true
}
