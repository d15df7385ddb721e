// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tuning options for the engine and the run driver.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::table::{TT_MAX, TT_TRIM_KEEP};

/// Seed used when the caller provides none; every attempt then runs
/// identically.
pub const DEFAULT_RNG_SEED: u64 = 1337;
/// Branch cap in open regions.
pub const DEFAULT_BRANCH_CAP_OPEN: usize = 18;
/// Branch cap in corridors.
pub const DEFAULT_BRANCH_CAP_TIGHT: usize = 10;
/// Opener rotations to try per seed when depth 0 is exhausted.
pub const DEFAULT_TRY_OPENERS: u32 = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown shuffle mode: {0:?} (expected none, within-buckets or full)")]
    UnknownShuffleMode(String),
    #[error("unknown roulette mode: {0:?} (expected least-tried or none)")]
    UnknownRouletteMode(String),
    #[error("{0} must be positive, got {1}")]
    NonPositiveWindow(&'static str, f64),
    #[error("max_results must be at least 1")]
    ZeroResults,
    #[error("branch caps must be at least 1")]
    ZeroBranchCap,
    #[error("tt_trim_keep ({keep}) must not exceed tt_max ({max})")]
    TrimExceedsMax { keep: usize, max: usize },
    #[error("heuristic weights must not be negative")]
    NegativeWeight,
}

/// How the driver perturbs the piece slot order between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMode {
    /// Leave the preferred-then-sorted order unchanged.
    #[default]
    None,
    /// Shuffle inside contiguous runs of pieces sharing a preference bucket.
    WithinBuckets,
    /// Shuffle the whole order.
    Full,
}

impl FromStr for ShuffleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<ShuffleMode, ConfigError> {
        match s {
            "none" => Ok(ShuffleMode::None),
            "within-buckets" => Ok(ShuffleMode::WithinBuckets),
            "full" => Ok(ShuffleMode::Full),
            other => Err(ConfigError::UnknownShuffleMode(other.to_owned())),
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShuffleMode::None => "none",
            ShuffleMode::WithinBuckets => "within-buckets",
            ShuffleMode::Full => "full",
        };
        write!(f, "{}", name)
    }
}

/// Candidate reordering inside a depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouletteMode {
    /// Shuffle candidates within equal (score, try-count) buckets.
    #[default]
    LeastTried,
    None,
}

impl FromStr for RouletteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<RouletteMode, ConfigError> {
        match s {
            "least-tried" => Ok(RouletteMode::LeastTried),
            "none" => Ok(RouletteMode::None),
            other => Err(ConfigError::UnknownRouletteMode(other.to_owned())),
        }
    }
}

/// The full tuning record. Engine knobs and driver knobs share this struct;
/// each attempt's `SearchState` reads the engine-facing fields and the driver
/// reads the rest.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Base RNG seed. Unset means [`DEFAULT_RNG_SEED`] on every attempt.
    pub rng_seed: Option<u64>,
    /// General per-attempt stall window in seconds.
    pub restart_on_stall: Option<f64>,
    /// Depth-keyed stall overrides.
    pub stall_below_23: Option<f64>,
    pub stall_at_23: Option<f64>,
    pub stall_at_24: Option<f64>,
    /// Distinct solutions to emit before terminating.
    pub max_results: usize,
    pub shuffle_pieces: ShuffleMode,
    /// Opener rotations per seed when depth 0 exhausts.
    pub try_openers: u32,
    /// Connected-empty-size-mod-4 prune.
    pub hole4: bool,
    /// Defer the mod-4 prune until the empties are first observed mod-4
    /// clean.
    pub hole4_conditional: bool,
    /// Seconds between rolling world snapshots.
    pub snapshot_interval: Option<f64>,
    /// Also snapshot on best-depth improvement.
    pub snapshot_on_depth: bool,
    /// Log a container thickness diagnostic before solving.
    pub check_thickness: bool,

    pub branch_cap_open: usize,
    pub branch_cap_tight: usize,
    pub roulette: RouletteMode,
    /// Treat anchor degree 2 as a corridor as well as degree 1.
    pub deg2_corridor: bool,
    pub exposure_weight: f64,
    pub boundary_exposure_weight: f64,
    pub leaf_weight: f64,
    pub tt_max: usize,
    pub tt_trim_keep: usize,
}

impl Default for Tuning {
    fn default() -> Tuning {
        Tuning {
            rng_seed: None,
            restart_on_stall: None,
            stall_below_23: None,
            stall_at_23: None,
            stall_at_24: None,
            max_results: 1,
            shuffle_pieces: ShuffleMode::None,
            try_openers: DEFAULT_TRY_OPENERS,
            hole4: false,
            hole4_conditional: false,
            snapshot_interval: None,
            snapshot_on_depth: false,
            check_thickness: false,
            branch_cap_open: DEFAULT_BRANCH_CAP_OPEN,
            branch_cap_tight: DEFAULT_BRANCH_CAP_TIGHT,
            roulette: RouletteMode::LeastTried,
            deg2_corridor: false,
            exposure_weight: 1.0,
            boundary_exposure_weight: 0.8,
            leaf_weight: 0.8,
            tt_max: TT_MAX,
            tt_trim_keep: TT_TRIM_KEEP,
        }
    }
}

impl Tuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::ZeroResults);
        }
        if self.branch_cap_open == 0 || self.branch_cap_tight == 0 {
            return Err(ConfigError::ZeroBranchCap);
        }
        if self.tt_trim_keep > self.tt_max {
            return Err(ConfigError::TrimExceedsMax {
                keep: self.tt_trim_keep,
                max: self.tt_max,
            });
        }
        if self.exposure_weight < 0.0
            || self.boundary_exposure_weight < 0.0
            || self.leaf_weight < 0.0
        {
            return Err(ConfigError::NegativeWeight);
        }

        let windows = [
            ("restart_on_stall", self.restart_on_stall),
            ("stall_below_23", self.stall_below_23),
            ("stall_at_23", self.stall_at_23),
            ("stall_at_24", self.stall_at_24),
            ("snapshot_interval", self.snapshot_interval),
        ];
        for (name, window) in windows {
            if let Some(value) = window {
                if !(value > 0.0) {
                    return Err(ConfigError::NonPositiveWindow(name, value));
                }
            }
        }

        Ok(())
    }

    /// The stall window in effect for a given best depth, if any.
    pub fn stall_window(&self, best_depth: u32) -> Option<f64> {
        let keyed = if best_depth >= 24 {
            self.stall_at_24
        } else if best_depth >= 23 {
            self.stall_at_23
        } else {
            self.stall_below_23
        };
        keyed.or(self.restart_on_stall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_mode_parses() {
        assert_eq!("none".parse::<ShuffleMode>().unwrap(), ShuffleMode::None);
        assert_eq!(
            "within-buckets".parse::<ShuffleMode>().unwrap(),
            ShuffleMode::WithinBuckets
        );
        assert_eq!("full".parse::<ShuffleMode>().unwrap(), ShuffleMode::Full);
        assert!(matches!(
            "bogus".parse::<ShuffleMode>(),
            Err(ConfigError::UnknownShuffleMode(_))
        ));
    }

    #[test]
    fn defaults_validate() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn zero_results_rejected() {
        let tuning = Tuning {
            max_results: 0,
            ..Tuning::default()
        };
        assert!(matches!(tuning.validate(), Err(ConfigError::ZeroResults)));
    }

    #[test]
    fn negative_window_rejected() {
        let tuning = Tuning {
            restart_on_stall: Some(-2.0),
            ..Tuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::NonPositiveWindow("restart_on_stall", _))
        ));
    }

    #[test]
    fn trim_bound_rejected() {
        let tuning = Tuning {
            tt_max: 10,
            tt_trim_keep: 20,
            ..Tuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::TrimExceedsMax { .. })
        ));
    }

    #[test]
    fn stall_window_prefers_depth_keyed_value() {
        let tuning = Tuning {
            restart_on_stall: Some(60.0),
            stall_at_23: Some(20.0),
            stall_at_24: Some(10.0),
            ..Tuning::default()
        };
        assert_eq!(tuning.stall_window(25), Some(10.0));
        assert_eq!(tuning.stall_window(24), Some(10.0));
        assert_eq!(tuning.stall_window(23), Some(20.0));
        // below 23 has no keyed override here, so the general window applies
        assert_eq!(tuning.stall_window(5), Some(60.0));
    }

    #[test]
    fn stall_window_absent_when_nothing_configured() {
        assert_eq!(Tuning::default().stall_window(10), None);
    }
}
