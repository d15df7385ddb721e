// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The depth-first packing search.
//!
//! A `SearchState` owns one attempt: an occupancy bitmask, a stack of
//! placements, one candidate deque per depth, and a bounded transposition
//! table. `step_once` performs a single unit of forward or backward motion;
//! the run driver loops it and decides when to restart.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::config::Tuning;
use crate::core::CellSet;
use crate::fits::{Fit, FitTable};
use crate::lattice::Lattice;
use crate::table::TranspositionTable;
use crate::zobrist::ZobristKeys;

mod candidates;

/// One applied placement: a piece occupying four container cells.
#[derive(Clone)]
pub struct Placement<'a> {
    /// The piece's index in the library.
    pub piece: u16,
    /// Anchor cell index the fit was taken from.
    pub origin: u32,
    pub fit: &'a Fit,
}

/// A ranked, not-yet-applied placement sitting in a depth's frontier.
#[derive(Clone)]
pub(crate) struct Candidate<'a> {
    origin: u32,
    fit: &'a Fit,
}

/// Key for the per-attempt placement try counts.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
struct TryKey {
    piece: u16,
    origin: u32,
    orientation: u16,
}

/// Counters and histograms accumulated over one attempt.
#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    /// Number of `step_once` calls.
    pub steps: u64,
    pub forced_singletons: u64,
    /// Candidates examined before pruning.
    pub considered: u64,
    pub pruned_isolated: u64,
    pub pruned_mod4: u64,
    pub exposure_hist: BTreeMap<u32, u64>,
    pub boundary_exposure_hist: BTreeMap<u32, u64>,
    pub leaf_hist: BTreeMap<u32, u64>,
    pub choices_hist: BTreeMap<usize, u64>,
    pub anchor_degree_hist: BTreeMap<u32, u64>,
    /// Times a piece fell back to any-origin candidate construction.
    pub fallback_by_piece: BTreeMap<u16, u64>,
    pub best_depth_ever: u32,
}

pub struct SearchState<'a> {
    lattice: &'a Lattice,
    fits: &'a FitTable,
    tuning: Tuning,
    seed: u64,
    order: Vec<u16>,
    cursor: usize,
    occupancy: CellSet,
    placements: Vec<Placement<'a>>,
    frontier: Vec<VecDeque<Candidate<'a>>>,
    table: TranspositionTable,
    keys: ZobristKeys,
    try_counts: FxHashMap<TryKey, u32>,
    hole4_armed: bool,
    stats: SearchStats,
    started: Instant,
    solved: bool,
}

impl<'a> SearchState<'a> {
    /// Builds a fresh attempt. `order` is the slot order after the driver's
    /// shuffle and opener rotation; `seed` feeds the Zobrist tables and the
    /// roulette RNG.
    pub fn new(
        lattice: &'a Lattice,
        fits: &'a FitTable,
        tuning: &Tuning,
        seed: u64,
        order: Vec<u16>,
    ) -> SearchState<'a> {
        let keys = ZobristKeys::new(seed, lattice.len(), order.len());
        let table = TranspositionTable::new(tuning.tt_max, tuning.tt_trim_keep);
        SearchState {
            lattice,
            fits,
            tuning: tuning.clone(),
            seed,
            order,
            cursor: 0,
            occupancy: CellSet::empty(lattice.len()),
            placements: Vec::new(),
            frontier: Vec::new(),
            table,
            keys,
            try_counts: FxHashMap::default(),
            hole4_armed: false,
            stats: SearchStats::default(),
            started: Instant::now(),
            solved: false,
        }
    }

    pub fn placed_count(&self) -> u32 {
        self.placements.len() as u32
    }

    pub fn total_pieces(&self) -> u32 {
        self.order.len() as u32
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn placements(&self) -> &[Placement<'a>] {
        &self.placements
    }

    pub fn occupancy(&self) -> &CellSet {
        &self.occupancy
    }

    pub fn order(&self) -> &[u16] {
        &self.order
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn best_depth_ever(&self) -> u32 {
        self.stats.best_depth_ever
    }

    pub fn table_hits(&self) -> u64 {
        self.table.hits()
    }

    pub fn table_prunes(&self) -> u64 {
        self.table.prunes()
    }

    /// One unit of forward or backward motion. Returns `(progressed,
    /// solved)`; `(false, false)` with an empty placement stack means the
    /// attempt is exhausted at the root.
    pub fn step_once(&mut self) -> (bool, bool) {
        if self.solved {
            return (false, true);
        }
        self.stats.steps += 1;

        let total = self.order.len();
        if self.cursor >= total {
            self.solved = true;
            self.note_depth();
            return (true, true);
        }

        // This configuration was already explored at least as deep; step
        // back instead of expanding it again.
        let hash = self.keys.hash(&self.occupancy, self.cursor);
        if self.table.should_prune(hash, self.cursor as u32) {
            if self.cursor == 0 {
                return (false, false);
            }
            self.backtrack_once();
            self.note_depth();
            return (true, false);
        }

        if self.frontier.len() <= self.cursor {
            self.build_frontier();
        }

        let mut progressed = false;
        loop {
            if self.cursor >= total {
                break;
            }

            if self.frontier[self.cursor].is_empty() {
                if self.cursor == 0 {
                    self.note_depth();
                    return (progressed, false);
                }
                self.backtrack_once();
                progressed = true;
                break;
            }

            let forced = self.frontier[self.cursor].len() == 1;
            let candidate = self.frontier[self.cursor]
                .pop_front()
                .expect("frontier checked non-empty");
            self.apply(&candidate);
            progressed = true;

            if forced {
                self.stats.forced_singletons += 1;
                if self.frontier.len() <= self.cursor {
                    self.build_frontier();
                }
                continue;
            }
            break;
        }

        if self.cursor >= total {
            self.solved = true;
        }
        self.note_depth();
        (progressed, self.solved)
    }

    /// O(1) forward move: OR the mask in, push the placement, advance the
    /// cursor.
    fn apply(&mut self, candidate: &Candidate<'a>) {
        let piece = self.order[self.cursor];
        self.occupancy.union_with(&candidate.fit.mask);
        *self
            .try_counts
            .entry(TryKey {
                piece,
                origin: candidate.origin,
                orientation: candidate.fit.orientation,
            })
            .or_insert(0) += 1;
        self.placements.push(Placement {
            piece,
            origin: candidate.origin,
            fit: candidate.fit,
        });
        self.cursor += 1;
    }

    /// O(1) backward move: drop this depth's frontier, pop the placement,
    /// AND-NOT the mask out, then record the abandoned configuration in the
    /// transposition table.
    fn backtrack_once(&mut self) {
        if self.frontier.len() > self.cursor {
            self.frontier.pop();
        }
        self.cursor -= 1;
        if let Some(placement) = self.placements.pop() {
            self.occupancy.subtract(&placement.fit.mask);
        }
        let hash = self.keys.hash(&self.occupancy, self.cursor);
        self.table.record(hash, self.cursor as u32);
    }

    fn note_depth(&mut self) {
        let placed = self.placed_count();
        if placed > self.stats.best_depth_ever {
            self.stats.best_depth_ever = placed;
        }
    }
}
