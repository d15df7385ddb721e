// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! World snapshots: the machine-readable JSON dump of a partial or complete
//! solution and its human-readable layered-text rendering.
//!
//! All files are written with atomic replace: the content lands in a temp
//! path that is renamed over the destination, retrying briefly on transient
//! permission errors so that a viewer polling the file never reads a torn
//! write. Snapshot failures are reported to the caller, which logs and keeps
//! searching; they never abort an attempt.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::canonical::{self, Canonical};
use crate::core::Cell;

pub const SCHEMA: &str = "tetra_spheres_solution/1.0";

/// Total time spent retrying a rename before giving up.
const REPLACE_RETRY_WINDOW: Duration = Duration::from_millis(1200);
const REPLACE_RETRY_PAUSE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    #[serde(rename = "R")]
    pub rotation: [[f64; 3]; 3],
    pub t: [f64; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct Presentation {
    pub mode: String,
    pub frame: Frame,
}

impl Presentation {
    /// The fixed square frame: identity rotation, zero translation.
    fn square() -> Presentation {
        Presentation {
            mode: "square".to_owned(),
            frame: Frame {
                rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                t: [0.0, 0.0, 0.0],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldPiece {
    pub id: String,
    pub cells_ijk: Vec<[i32; 3]>,
    pub world_centers: Vec<[f64; 3]>,
}

/// The world JSON document. Its text rendering is produced from the same
/// value, so the identifiers in both files always agree.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub schema: String,
    pub container_name: String,
    pub container_path: String,
    pub r: f64,
    pub presentation: Presentation,
    pub pieces_order: Vec<String>,
    pub pieces: Vec<WorldPiece>,
    pub depth: u32,
    pub timestamp: f64,
    pub container_cid_sha256: String,
    pub sid_state_sha256: String,
    pub sid_route_sha256: String,
}

/// Sphere-center world coordinates of a lattice cell:
/// `u = j + k`, `v = i + k`, `w = i + j`, scaled by `r * sqrt(2)`.
pub fn world_center(cell: Cell, r: f64) -> [f64; 3] {
    let d = r * std::f64::consts::SQRT_2;
    [
        (cell.1 + cell.2) as f64 * d,
        (cell.0 + cell.2) as f64 * d,
        (cell.0 + cell.1) as f64 * d,
    ]
}

impl WorldSnapshot {
    /// Assembles a snapshot for the given placements (piece id plus covered
    /// cells, in placement order), deriving CID and SIDs from the container's
    /// canonical frame.
    pub fn build(
        container_name: &str,
        container_path: &str,
        r: f64,
        canonical: &Canonical,
        placements: &[(String, Vec<Cell>)],
        timestamp: f64,
    ) -> WorldSnapshot {
        let cid = canonical::container_cid(canonical);
        let sid_state = canonical::sid_state(&cid, canonical, placements);
        let sid_route = canonical::sid_route(&cid, canonical, placements);

        let pieces = placements
            .iter()
            .map(|(id, cells)| WorldPiece {
                id: id.clone(),
                cells_ijk: cells.iter().map(|c| [c.0, c.1, c.2]).collect(),
                world_centers: cells.iter().map(|&c| world_center(c, r)).collect(),
            })
            .collect();

        WorldSnapshot {
            schema: SCHEMA.to_owned(),
            container_name: container_name.to_owned(),
            container_path: container_path.to_owned(),
            r,
            presentation: Presentation::square(),
            pieces_order: placements.iter().map(|(id, _)| id.clone()).collect(),
            pieces,
            depth: placements.len() as u32,
            timestamp,
            container_cid_sha256: cid,
            sid_state_sha256: sid_state,
            sid_route_sha256: sid_route,
        }
    }

    /// Renders the layered ASCII view: rows are `v = i + k` top-down, columns
    /// are `u = j + k` right-to-left, layers are `w = i + j`. Each cell shows
    /// the first character of the occupying piece id.
    pub fn render_layers(&self) -> String {
        let mut occupant: HashMap<Cell, char> = HashMap::new();
        for piece in &self.pieces {
            let glyph = piece.id.chars().next().unwrap_or('?');
            for cell in &piece.cells_ijk {
                occupant.insert(Cell(cell[0], cell[1], cell[2]), glyph);
            }
        }

        let mut text = String::new();
        text.push_str("[solution world view]\n");
        text.push_str(&format!("timestamp: {:.3}\n", self.timestamp));
        text.push_str(&format!(
            "container_cid_sha256: {}\n",
            self.container_cid_sha256
        ));
        text.push_str(&format!("sid_state_sha256: {}\n", self.sid_state_sha256));
        text.push_str(&format!("sid_route_sha256: {}\n", self.sid_route_sha256));
        text.push('\n');

        if occupant.is_empty() {
            text.push_str("[empty]\n");
            return text;
        }

        let us: Vec<i32> = occupant.keys().map(|c| c.1 + c.2).collect();
        let vs: Vec<i32> = occupant.keys().map(|c| c.0 + c.2).collect();
        let ws: Vec<i32> = occupant.keys().map(|c| c.0 + c.1).collect();
        let (umin, umax) = (*us.iter().min().unwrap(), *us.iter().max().unwrap());
        let (vmin, vmax) = (*vs.iter().min().unwrap(), *vs.iter().max().unwrap());
        let (wmin, wmax) = (*ws.iter().min().unwrap(), *ws.iter().max().unwrap());

        text.push_str(&format!(
            "Legend: rows=v (i+k: {}..{}), cols=u (j+k: {}..{}), layers=w (i+j: {}..{})\n\n",
            vmin, vmax, umin, umax, wmin, wmax
        ));

        for w in wmin..=wmax {
            text.push_str(&format!("Layer w=i+j={}:\n\n", w));
            for v in (vmin..=vmax).rev() {
                let mut row = String::new();
                for u in (umin..=umax).rev() {
                    // invert (u, v, w) back to doubled (i, j, k)
                    let i2 = v + w - u;
                    let j2 = u + w - v;
                    let k2 = u + v - w;
                    if (i2 | j2 | k2) & 1 != 0 {
                        row.push_str("  ");
                        continue;
                    }
                    let cell = Cell(i2 / 2, j2 / 2, k2 / 2);
                    match occupant.get(&cell) {
                        Some(&glyph) => {
                            row.push(glyph);
                            row.push(' ');
                        }
                        None => row.push_str("  "),
                    }
                }
                text.push_str(row.trim_end());
                text.push('\n');
            }
            text.push('\n');
        }

        let trimmed = text.trim_end();
        format!("{}\n", trimmed)
    }
}

/// Writes `contents` to `path` via a temp file and rename, retrying the
/// rename on transient permission errors for up to ~1.2 s.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;

    let started = Instant::now();
    loop {
        match fs::rename(&tmp, path) {
            Ok(()) => return Ok(()),
            Err(err)
                if err.kind() == io::ErrorKind::PermissionDenied
                    && started.elapsed() < REPLACE_RETRY_WINDOW =>
            {
                std::thread::sleep(REPLACE_RETRY_PAUSE);
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
        }
    }
}

/// Writes the world JSON and layered-text pair for a run.
pub struct SnapshotWriter {
    results_dir: PathBuf,
    container_name: String,
}

impl SnapshotWriter {
    pub fn new(results_dir: &Path, container_name: &str) -> io::Result<SnapshotWriter> {
        fs::create_dir_all(results_dir)?;
        Ok(SnapshotWriter {
            results_dir: results_dir.to_path_buf(),
            container_name: container_name.to_owned(),
        })
    }

    fn write_pair(&self, snapshot: &WorldSnapshot, stem: &str) -> io::Result<PathBuf> {
        let json_path = self.results_dir.join(format!("{}.world.json", stem));
        let text_path = self.results_dir.join(format!("{}.world_layers.txt", stem));
        let json = serde_json::to_vec_pretty(snapshot).expect("world snapshot serializes");
        atomic_write(&json_path, &json)?;
        atomic_write(&text_path, snapshot.render_layers().as_bytes())?;
        Ok(json_path)
    }

    /// The rolling snapshot of the current partial solution.
    pub fn write_current(&self, snapshot: &WorldSnapshot) -> io::Result<PathBuf> {
        self.write_pair(snapshot, &format!("{}.current", self.container_name))
    }

    /// A found solution. With `max_results` of 1 the plain name is used;
    /// otherwise each solution gets its own `resultK` pair.
    pub fn write_solution(
        &self,
        snapshot: &WorldSnapshot,
        result_index: usize,
        multiple: bool,
    ) -> io::Result<PathBuf> {
        let stem = if multiple {
            format!("{}.result{}", self.container_name, result_index)
        } else {
            self.container_name.clone()
        };
        self.write_pair(snapshot, &stem)
    }
}
