// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Loading of container files: the JSON documents that enumerate the FCC
//! cells a solution must tile.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::core::Cell;

/// Failure to produce a usable container. Any of these aborts the driver
/// before the first attempt.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container file unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("container JSON malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("container has no cells")]
    Empty,
    #[error("container repeats cell {0}")]
    DuplicateCell(Cell),
}

fn default_radius() -> f64 {
    0.5
}

/// A parsed container document. `lattice`, `version` and `meta` are carried
/// through informationally; only `cells` and `r` affect the solver.
#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub lattice: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default = "default_radius")]
    pub r: f64,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    pub cells: Vec<Cell>,
}

impl Container {
    /// Reads and validates a container file.
    pub fn load(path: &Path) -> Result<Container, ContainerError> {
        let text = fs::read_to_string(path)?;
        let container: Container = serde_json::from_str(&text)?;
        if container.cells.is_empty() {
            return Err(ContainerError::Empty);
        }
        Ok(container)
    }

    /// Display name for output files: the file stem of the container path.
    pub fn name_of(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "container".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    #[test]
    fn loads_minimal_document() {
        let dir = scratch_dir("container-minimal");
        let path = dir.join("box.json");
        std::fs::write(
            &path,
            r#"{"lattice": "FCC", "version": 1, "r": 0.25, "meta": {"name": "Box"},
               "cells": [[0,0,0],[1,0,0]]}"#,
        )
        .unwrap();

        let container = Container::load(&path).unwrap();
        assert_eq!(container.r, 0.25);
        assert_eq!(container.cells, vec![Cell(0, 0, 0), Cell(1, 0, 0)]);
        assert_eq!(Container::name_of(&path), "box");
    }

    #[test]
    fn radius_defaults_when_absent() {
        let dir = scratch_dir("container-radius");
        let path = dir.join("r.json");
        std::fs::write(&path, r#"{"cells": [[0,0,0]]}"#).unwrap();
        assert_eq!(Container::load(&path).unwrap().r, 0.5);
    }

    #[test]
    fn empty_cells_rejected() {
        let dir = scratch_dir("container-empty");
        let path = dir.join("empty.json");
        std::fs::write(&path, r#"{"cells": []}"#).unwrap();
        assert!(matches!(
            Container::load(&path),
            Err(ContainerError::Empty)
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        let dir = scratch_dir("container-bad");
        let path = dir.join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Container::load(&path),
            Err(ContainerError::Malformed(_))
        ));
    }

    #[test]
    fn missing_file_rejected() {
        let dir = scratch_dir("container-missing");
        assert!(matches!(
            Container::load(&dir.join("nope.json")),
            Err(ContainerError::Unreadable(_))
        ));
    }
}
