// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The run driver: loads the inputs, then repeatedly restarts fresh search
//! attempts under seed and opener rotation until enough distinct solutions
//! have been found, the container is proved unsolvable, or an external
//! controller stops the run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use derive_more::Display;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::canonical::{self, Canonical};
use crate::config::{ConfigError, ShuffleMode, Tuning, DEFAULT_RNG_SEED};
use crate::container::{Container, ContainerError};
use crate::core::Cell;
use crate::fits::FitTable;
use crate::lattice::Lattice;
use crate::pieces::{PieceLibrary, PieceLibraryError};
use crate::progress::{ProgressEvent, ProgressWriter};
use crate::runctl::{RunControl, RunState};
use crate::search::SearchState;
use crate::snapshot::{SnapshotWriter, WorldSnapshot};

const PROGRESS_CADENCE: Duration = Duration::from_secs(5);
const CONTROL_POLL: Duration = Duration::from_millis(50);
const PAUSE_SLEEP: Duration = Duration::from_millis(100);
const SHUFFLE_SALT: u64 = 0xD1CE;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Pieces(#[from] PieceLibraryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to prepare output files: {0}")]
    Setup(#[from] std::io::Error),
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum AttemptOutcome {
    #[display(fmt = "solved")]
    Solved,
    #[display(fmt = "exhausted_root")]
    ExhaustedRoot,
    #[display(fmt = "stalled")]
    Stalled,
    #[display(fmt = "stopped_by_user")]
    StoppedByUser,
}

/// Control transitions surfaced on the progress stream.
#[derive(Debug, Clone, Copy)]
enum ControlKind {
    Paused,
    Resumed,
    Stopped,
}

/// How the whole run ended; rendered into the final progress event's
/// `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    #[display(fmt = "solved")]
    Solved,
    #[display(fmt = "exhausted")]
    Exhausted,
    #[display(fmt = "stalled")]
    Stalled,
    #[display(fmt = "stopped_by_user")]
    StoppedByUser,
}

/// Where the run's files live, plus the tuning record.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub container_path: PathBuf,
    pub pieces_path: PathBuf,
    pub results_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub tuning: Tuning,
}

/// Summary of a completed run, printed by the binary as compact JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: FinalStatus,
    pub solutions_found: usize,
    pub runs: u32,
    pub placed: u32,
    pub best_depth: u32,
    pub total: u32,
    pub attempts_per_sec: u64,
    pub elapsed_sec: f64,
}

/// A solution's identity for dedup: each piece with its sorted covered
/// indices, the whole list sorted.
type Signature = Vec<(String, Vec<u32>)>;

pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub fn run(config: &RunConfig) -> Result<RunReport, DriverError> {
    config.tuning.validate()?;
    let container = Container::load(&config.container_path)?;
    let library = PieceLibrary::load(&config.pieces_path)?;
    let lattice = Lattice::new(&container.cells)?;
    let fits = FitTable::new(&lattice, &library);
    let canonical = canonical::canonicalize(lattice.cells());
    let container_name = Container::name_of(&config.container_path);

    info!(
        container = %container_name,
        cells = lattice.len(),
        pieces = library.len(),
        fits = fits.len(),
        "solver ready"
    );
    if config.tuning.check_thickness {
        log_thickness(&lattice);
    }

    let mut driver = Driver {
        tuning: &config.tuning,
        library: &library,
        lattice: &lattice,
        canonical: &canonical,
        container_name: container_name.clone(),
        container_path: config.container_path.to_string_lossy().into_owned(),
        r: container.r,
        snapshots: SnapshotWriter::new(&config.results_dir, &container_name)?,
        progress: ProgressWriter::new(&config.logs_dir)?,
        control: RunControl::open(&config.logs_dir),
        global_best: 0,
        last_attempt_steps: 0,
    };

    Ok(driver.run_attempts(&fits))
}

struct Driver<'a> {
    tuning: &'a Tuning,
    library: &'a PieceLibrary,
    lattice: &'a Lattice,
    canonical: &'a Canonical,
    container_name: String,
    container_path: String,
    r: f64,
    snapshots: SnapshotWriter,
    progress: ProgressWriter,
    control: RunControl,
    global_best: u32,
    last_attempt_steps: u64,
}

impl<'a> Driver<'a> {
    fn run_attempts(&mut self, fits: &FitTable) -> RunReport {
        let tuning = self.tuning;
        let piece_count = self.library.len() as u32;
        let effective_openers = tuning.try_openers.min(piece_count.saturating_sub(1));
        let multiple = tuning.max_results > 1;
        let started = Instant::now();

        let mut seen: HashSet<Signature> = HashSet::new();
        let mut found = 0usize;
        let mut run_index = 0u32;
        let mut seed_offset = 0u64;
        let mut opener = 0u32;
        let mut cycle_all_zero = true;
        let mut zero_openers: HashSet<u16> = HashSet::new();
        let mut last_placed = 0u32;
        let mut last_rate = 0u64;

        let status = loop {
            run_index += 1;
            let seed = tuning
                .rng_seed
                .map(|base| base.wrapping_add(seed_offset))
                .unwrap_or(DEFAULT_RNG_SEED);

            let mut order = self.library.slot_order();
            apply_shuffle(&mut order, self.library, tuning.shuffle_pieces, seed);
            if !order.is_empty() {
                let order_len = order.len();
                order.rotate_left(opener as usize % order_len);
            }
            let first_piece = order.first().copied();

            let mut engine = SearchState::new(self.lattice, fits, tuning, seed, order);
            let outcome = self.attempt(&mut engine, run_index, seed);
            last_placed = engine.placed_count();
            last_rate = rate_of(&engine);
            self.last_attempt_steps = engine.stats().steps;
            debug!(
                run = run_index,
                seed,
                outcome = %outcome,
                placed = engine.placed_count(),
                best = engine.best_depth_ever(),
                steps = engine.stats().steps,
                forced = engine.stats().forced_singletons,
                pruned_isolated = engine.stats().pruned_isolated,
                pruned_mod4 = engine.stats().pruned_mod4,
                tt_prunes = engine.table_prunes(),
                "attempt finished"
            );

            match outcome {
                AttemptOutcome::Solved => {
                    let placements = self.extract_placements(&engine);
                    let signature = signature_of(&placements, &engine);
                    if seen.insert(signature) {
                        found += 1;
                        self.write_solution(&placements, found, multiple);
                        self.emit_progress(&engine, run_index, seed, Some("solved".to_owned()));
                    } else {
                        debug!(run = run_index, "duplicate solution signature");
                        if tuning.rng_seed.is_none() {
                            // identical attempts can only replay this solution
                            break FinalStatus::Solved;
                        }
                    }
                    if found >= tuning.max_results {
                        break FinalStatus::Solved;
                    }
                    seed_offset += 1;
                    opener = 0;
                    cycle_all_zero = true;
                }
                AttemptOutcome::ExhaustedRoot => {
                    let zero = engine.best_depth_ever() == 0;
                    cycle_all_zero &= zero;
                    if zero {
                        if let Some(piece) = first_piece {
                            zero_openers.insert(piece);
                        }
                        // no piece can open the container at all
                        if zero_openers.len() == self.library.len() {
                            break FinalStatus::Exhausted;
                        }
                    }

                    if opener < effective_openers {
                        opener += 1;
                    } else {
                        // a full opener cycle exhausted at the root
                        let proved = tuning.rng_seed.is_none()
                            || (cycle_all_zero && tuning.shuffle_pieces == ShuffleMode::None);
                        if proved {
                            break FinalStatus::Exhausted;
                        }
                        seed_offset += 1;
                        opener = 0;
                        cycle_all_zero = true;
                    }
                }
                AttemptOutcome::Stalled => {
                    if tuning.rng_seed.is_none() {
                        // the next attempt would replay this stall verbatim
                        break FinalStatus::Stalled;
                    }
                    seed_offset += 1;
                    opener = 0;
                    cycle_all_zero = true;
                }
                AttemptOutcome::StoppedByUser => {
                    break FinalStatus::StoppedByUser;
                }
            }
        };

        let final_event = ProgressEvent::Progress {
            run: run_index,
            seed: tuning
                .rng_seed
                .map(|base| base.wrapping_add(seed_offset))
                .unwrap_or(DEFAULT_RNG_SEED),
            placed: last_placed,
            best_depth: self.global_best,
            total: piece_count,
            attempts: self.last_attempt_steps,
            attempts_per_sec: last_rate,
            status: Some(status.to_string()),
        };
        if let Err(err) = self.progress.emit(&final_event) {
            warn!(error = %err, "failed to write final progress event");
        }

        info!(status = %status, found, runs = run_index, best = self.global_best, "run finished");

        RunReport {
            status,
            solutions_found: found,
            runs: run_index,
            placed: last_placed,
            best_depth: self.global_best,
            total: piece_count,
            attempts_per_sec: last_rate,
            elapsed_sec: started.elapsed().as_secs_f64(),
        }
    }

    /// Drives one attempt to an outcome.
    fn attempt(&mut self, engine: &mut SearchState<'_>, run: u32, seed: u64) -> AttemptOutcome {
        let mut attempt_best = 0u32;
        let mut last_improve = Instant::now();
        let mut last_event = Instant::now();
        let mut last_snapshot = Instant::now();
        let mut next_poll = Instant::now();

        loop {
            if Instant::now() >= next_poll {
                next_poll = Instant::now() + CONTROL_POLL;
                match self.control.poll() {
                    RunState::Run => {}
                    RunState::Pause => {
                        if !self.pause_until_resumed(run, seed) {
                            return AttemptOutcome::StoppedByUser;
                        }
                    }
                    RunState::Stop => {
                        self.emit_control(run, seed, ControlKind::Stopped);
                        return AttemptOutcome::StoppedByUser;
                    }
                }
            }

            let (progressed, solved) = engine.step_once();

            if engine.best_depth_ever() > attempt_best {
                attempt_best = engine.best_depth_ever();
                last_improve = Instant::now();
                if attempt_best > self.global_best {
                    self.global_best = attempt_best;
                }
                self.emit_progress(engine, run, seed, None);
                if self.tuning.snapshot_on_depth {
                    self.write_current(engine);
                }
            }

            if solved {
                return AttemptOutcome::Solved;
            }
            if !progressed && engine.cursor() == 0 && engine.placements().is_empty() {
                return AttemptOutcome::ExhaustedRoot;
            }

            if last_event.elapsed() >= PROGRESS_CADENCE {
                last_event = Instant::now();
                self.emit_progress(engine, run, seed, None);
            }
            if let Some(interval) = self.tuning.snapshot_interval {
                if last_snapshot.elapsed().as_secs_f64() >= interval {
                    last_snapshot = Instant::now();
                    self.write_current(engine);
                }
            }

            if let Some(window) = self.tuning.stall_window(engine.best_depth_ever()) {
                if last_improve.elapsed().as_secs_f64() > window {
                    return AttemptOutcome::Stalled;
                }
            }
        }
    }

    /// Sleeps through a pause. Returns false when the pause resolved to a
    /// stop.
    fn pause_until_resumed(&mut self, run: u32, seed: u64) -> bool {
        self.emit_control(run, seed, ControlKind::Paused);
        loop {
            std::thread::sleep(PAUSE_SLEEP);
            match self.control.poll() {
                RunState::Pause => {}
                RunState::Run => {
                    self.emit_control(run, seed, ControlKind::Resumed);
                    return true;
                }
                RunState::Stop => {
                    self.emit_control(run, seed, ControlKind::Stopped);
                    return false;
                }
            }
        }
    }

    fn emit_progress(
        &mut self,
        engine: &SearchState<'_>,
        run: u32,
        seed: u64,
        status: Option<String>,
    ) {
        let rate = rate_of(engine);
        let event = ProgressEvent::Progress {
            run,
            seed,
            placed: engine.placed_count(),
            best_depth: self.global_best.max(engine.best_depth_ever()),
            total: engine.total_pieces(),
            attempts: engine.stats().steps,
            attempts_per_sec: rate,
            status,
        };
        println!(
            "[{:7.2}s] run={} placed={}/{} best={} attempts={} rate={}/s",
            engine.elapsed_seconds(),
            run,
            engine.placed_count(),
            engine.total_pieces(),
            self.global_best.max(engine.best_depth_ever()),
            engine.stats().steps,
            rate,
        );
        if let Err(err) = self.progress.emit(&event) {
            warn!(error = %err, "failed to write progress event");
        }
    }

    fn emit_control(&mut self, run: u32, seed: u64, kind: ControlKind) {
        let ts = unix_now();
        let event = match kind {
            ControlKind::Paused => ProgressEvent::Paused { run, seed, ts },
            ControlKind::Resumed => ProgressEvent::Resumed { run, seed, ts },
            ControlKind::Stopped => ProgressEvent::Stopped { run, seed, ts },
        };
        if let Err(err) = self.progress.emit(&event) {
            warn!(error = %err, "failed to write control event");
        }
    }

    fn extract_placements(&self, engine: &SearchState<'_>) -> Vec<(String, Vec<Cell>)> {
        engine
            .placements()
            .iter()
            .map(|placement| {
                let id = self.library.id(placement.piece).to_owned();
                let cells = placement
                    .fit
                    .covered
                    .iter()
                    .map(|&idx| self.lattice.cell(idx))
                    .collect();
                (id, cells)
            })
            .collect()
    }

    fn snapshot_of(&self, placements: &[(String, Vec<Cell>)]) -> WorldSnapshot {
        WorldSnapshot::build(
            &self.container_name,
            &self.container_path,
            self.r,
            self.canonical,
            placements,
            unix_now(),
        )
    }

    fn write_current(&mut self, engine: &SearchState<'_>) {
        let placements = self.extract_placements(engine);
        let snapshot = self.snapshot_of(&placements);
        if let Err(err) = self.snapshots.write_current(&snapshot) {
            warn!(error = %err, "failed to write rolling snapshot");
        }
    }

    fn write_solution(&mut self, placements: &[(String, Vec<Cell>)], index: usize, multiple: bool) {
        let snapshot = self.snapshot_of(placements);
        match self.snapshots.write_solution(&snapshot, index, multiple) {
            Ok(path) => info!(path = %path.display(), "solution written"),
            Err(err) => warn!(error = %err, "failed to write solution snapshot"),
        }
    }
}

fn rate_of(engine: &SearchState<'_>) -> u64 {
    let elapsed = engine.elapsed_seconds().max(1e-9);
    (engine.stats().steps as f64 / elapsed).round() as u64
}

/// The solution's identity: each piece with its sorted covered cell indices,
/// the whole list sorted.
fn signature_of(placements: &[(String, Vec<Cell>)], engine: &SearchState<'_>) -> Signature {
    let mut signature: Signature = placements
        .iter()
        .zip(engine.placements())
        .map(|((id, _), placement)| {
            let mut covered = placement.fit.covered.to_vec();
            covered.sort_unstable();
            (id.clone(), covered)
        })
        .collect();
    signature.sort();
    signature
}

/// Deterministic order perturbation for an attempt.
fn apply_shuffle(order: &mut [u16], library: &PieceLibrary, mode: ShuffleMode, seed: u64) {
    match mode {
        ShuffleMode::None => {}
        ShuffleMode::Full => {
            let mut rng = SmallRng::seed_from_u64(seed ^ SHUFFLE_SALT);
            order.shuffle(&mut rng);
        }
        ShuffleMode::WithinBuckets => {
            let mut rng = SmallRng::seed_from_u64(seed ^ SHUFFLE_SALT);
            let mut start = 0;
            while start < order.len() {
                let bucket = library.preference_bucket(order[start]);
                let mut end = start + 1;
                while end < order.len() && library.preference_bucket(order[end]) == bucket {
                    end += 1;
                }
                order[start..end].shuffle(&mut rng);
                start = end;
            }
        }
    }
}

fn log_thickness(lattice: &Lattice) {
    let mut min_degree = usize::MAX;
    let mut max_degree = 0usize;
    let mut total = 0usize;
    let mut thin = 0usize;
    for idx in 0..lattice.len() {
        let degree = lattice.neighbors_of(idx).len();
        min_degree = min_degree.min(degree);
        max_degree = max_degree.max(degree);
        total += degree;
        if degree <= 2 {
            thin += 1;
        }
    }
    let mean = total as f64 / lattice.len().max(1) as f64;
    info!(
        min_degree,
        max_degree,
        mean_degree = format!("{:.2}", mean).as_str(),
        thin_cells = thin,
        "container thickness profile"
    );
}
