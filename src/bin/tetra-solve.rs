// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use structopt::StructOpt;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

use tetra::config::{ShuffleMode, Tuning};
use tetra::driver::{self, RunConfig};

/// Packs four-cell pieces into an FCC container and writes world snapshots.
#[derive(Debug, StructOpt)]
struct Options {
    /// Container JSON describing the cells to tile.
    #[structopt(name = "CONTAINER")]
    container: PathBuf,
    /// Piece library JSON: orientation lists per piece, or single
    /// orientations keyed `id__k`.
    #[structopt(name = "PIECES")]
    pieces: PathBuf,
    /// Directory for world snapshots.
    #[structopt(long, default_value = "results")]
    results: PathBuf,
    /// Directory for the progress stream, summary and run-control file.
    #[structopt(long, default_value = "logs")]
    logs: PathBuf,
    /// Base RNG seed; attempt k runs with seed + k.
    #[structopt(long)]
    seed: Option<u64>,
    /// General per-attempt stall window in seconds.
    #[structopt(long)]
    restart_on_stall: Option<f64>,
    /// Stall window while the best depth is below 23.
    #[structopt(long)]
    stall_below_23: Option<f64>,
    /// Stall window at best depth 23.
    #[structopt(long)]
    stall_at_23: Option<f64>,
    /// Stall window at best depth 24 and above.
    #[structopt(long)]
    stall_at_24: Option<f64>,
    /// Distinct solutions to find before exiting.
    #[structopt(long, default_value = "1")]
    max_results: usize,
    /// Piece order shuffle: none, within-buckets or full.
    #[structopt(long)]
    shuffle_pieces: Option<ShuffleMode>,
    /// Opener rotations per seed when depth 0 exhausts.
    #[structopt(long, default_value = "6")]
    try_openers: u32,
    /// Enable the connected-empty-size-mod-4 prune.
    #[structopt(long)]
    hole4: bool,
    /// Arm the mod-4 prune only once the empties are first mod-4 clean.
    #[structopt(long)]
    hole4_conditional: bool,
    /// Seconds between rolling world snapshots.
    #[structopt(long)]
    snapshot_interval: Option<f64>,
    /// Also snapshot on best-depth improvement.
    #[structopt(long)]
    snapshot_on_depth: bool,
    /// Log a container thickness diagnostic before solving.
    #[structopt(long)]
    check_thickness: bool,
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(LevelFilter::INFO)
        .with_env_filter(EnvFilter::from_env("TETRA_LOG"))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let options = Options::from_args();
    let tuning = Tuning {
        rng_seed: options.seed,
        restart_on_stall: options.restart_on_stall,
        stall_below_23: options.stall_below_23,
        stall_at_23: options.stall_at_23,
        stall_at_24: options.stall_at_24,
        max_results: options.max_results,
        shuffle_pieces: options.shuffle_pieces.unwrap_or_default(),
        try_openers: options.try_openers,
        hole4: options.hole4,
        hole4_conditional: options.hole4_conditional,
        snapshot_interval: options.snapshot_interval,
        snapshot_on_depth: options.snapshot_on_depth,
        check_thickness: options.check_thickness,
        ..Tuning::default()
    };

    let config = RunConfig {
        container_path: options.container,
        pieces_path: options.pieces,
        results_dir: options.results,
        logs_dir: options.logs,
        tuning,
    };

    let report = driver::run(&config)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
