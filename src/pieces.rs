// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The piece library: every piece's orientations, loaded from JSON and
//! normalized to one internal representation.
//!
//! Two on-disk shapes are accepted:
//!   1. `{"A": [[[0,0,0],[1,0,0],[0,1,0],[1,-1,0]], ...], ...}` where each
//!      value is the full orientation list of one piece, and
//!   2. `{"A__0": [[0,0,0],...], "A__1": [[0,0,0],...], ...}` where every key
//!      holds a single orientation and orientations group by the prefix
//!      before `__`.
//! Orientations are consumed verbatim; this module never generates rotations
//! on its own.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::core::{Cell, Orientation};

#[derive(Debug, Error)]
pub enum PieceLibraryError {
    #[error("piece library unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("piece library is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("piece library matches neither accepted format")]
    UnrecognizedFormat,
    #[error("piece library has no pieces")]
    Empty,
    #[error("piece {0} orientation {1} does not contain the (0,0,0) anchor")]
    MissingAnchor(String, usize),
}

/// Preferred slot-order bias, grouped into preference buckets. The flattened
/// sequence is intersected with the available piece ids; pieces outside the
/// preference land in a trailing bucket in sorted order.
pub const PREFERENCE_BUCKETS: &[&[&str]] = &[
    &["A", "C", "E", "G", "I", "J", "H", "F", "D", "B", "Y"],
    &["X", "W", "L", "K", "V", "U", "T"],
    &["N", "M"],
    &["S", "R", "Q", "P", "O"],
];

/// The normalized piece library: piece ids with their ordered orientation
/// lists. Ids are stored sorted, so a piece's position here is a stable
/// handle used throughout the solver.
#[derive(Debug, Clone)]
pub struct PieceLibrary {
    ids: Vec<String>,
    orientations: Vec<Vec<Orientation>>,
}

type RawTriple = [i32; 3];
type RawOrientation = [RawTriple; 4];

impl PieceLibrary {
    pub fn load(path: &Path) -> Result<PieceLibrary, PieceLibraryError> {
        let text = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        Self::from_json(&value)
    }

    /// Normalizes a JSON document in either accepted shape.
    pub fn from_json(value: &serde_json::Value) -> Result<PieceLibrary, PieceLibraryError> {
        if let Ok(map) =
            serde_json::from_value::<BTreeMap<String, Vec<RawOrientation>>>(value.clone())
        {
            let grouped = map
                .into_iter()
                .map(|(id, oris)| (id, oris.into_iter().map(convert).collect()))
                .collect();
            return Self::from_orientation_map(grouped);
        }

        if let Ok(map) = serde_json::from_value::<BTreeMap<String, RawOrientation>>(value.clone())
        {
            return Self::from_orientation_map(group_by_prefix(map));
        }

        Err(PieceLibraryError::UnrecognizedFormat)
    }

    /// Builds a library from the normalized mapping, validating that every
    /// orientation carries its anchor offset.
    pub fn from_orientation_map(
        map: BTreeMap<String, Vec<Orientation>>,
    ) -> Result<PieceLibrary, PieceLibraryError> {
        if map.is_empty() {
            return Err(PieceLibraryError::Empty);
        }

        let mut ids = Vec::with_capacity(map.len());
        let mut orientations = Vec::with_capacity(map.len());
        for (id, oris) in map {
            if oris.is_empty() {
                return Err(PieceLibraryError::UnrecognizedFormat);
            }
            for (n, ori) in oris.iter().enumerate() {
                if !ori.contains(&Cell(0, 0, 0)) {
                    return Err(PieceLibraryError::MissingAnchor(id, n));
                }
            }
            ids.push(id);
            orientations.push(oris);
        }

        Ok(PieceLibrary { ids, orientations })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, piece: u16) -> &str {
        &self.ids[piece as usize]
    }

    pub fn orientations(&self, piece: u16) -> &[Orientation] {
        &self.orientations[piece as usize]
    }

    /// The slot order before any shuffle or opener rotation: the preference
    /// sequence intersected with the available ids, then every remaining id
    /// in sorted order.
    pub fn slot_order(&self) -> Vec<u16> {
        let mut order = Vec::with_capacity(self.ids.len());
        for bucket in PREFERENCE_BUCKETS {
            for &preferred in *bucket {
                if let Ok(n) = self.ids.binary_search_by(|id| id.as_str().cmp(preferred)) {
                    order.push(n as u16);
                }
            }
        }
        for (n, id) in self.ids.iter().enumerate() {
            if !PREFERENCE_BUCKETS
                .iter()
                .any(|bucket| bucket.contains(&id.as_str()))
            {
                order.push(n as u16);
            }
        }
        order
    }

    /// The preference bucket a piece belongs to; unlisted pieces share the
    /// index one past the last bucket.
    pub fn preference_bucket(&self, piece: u16) -> usize {
        let id = self.id(piece);
        PREFERENCE_BUCKETS
            .iter()
            .position(|bucket| bucket.contains(&id))
            .unwrap_or(PREFERENCE_BUCKETS.len())
    }
}

fn convert(raw: RawOrientation) -> Orientation {
    [
        Cell(raw[0][0], raw[0][1], raw[0][2]),
        Cell(raw[1][0], raw[1][1], raw[1][2]),
        Cell(raw[2][0], raw[2][1], raw[2][2]),
        Cell(raw[3][0], raw[3][1], raw[3][2]),
    ]
}

/// Collapses the keyed-by-`id__k` shape into the orientation-list shape.
/// Numeric suffixes order orientations; ties and non-numeric suffixes fall
/// back to the key's lexicographic order.
fn group_by_prefix(map: BTreeMap<String, RawOrientation>) -> BTreeMap<String, Vec<Orientation>> {
    let mut keyed: BTreeMap<String, Vec<(u32, String, Orientation)>> = BTreeMap::new();
    for (key, raw) in map {
        let (prefix, suffix) = match key.split_once("__") {
            Some((prefix, suffix)) => (prefix.to_owned(), suffix.to_owned()),
            None => (key.clone(), String::new()),
        };
        let rank = suffix.parse::<u32>().unwrap_or(u32::MAX);
        keyed
            .entry(prefix)
            .or_default()
            .push((rank, suffix, convert(raw)));
    }

    keyed
        .into_iter()
        .map(|(id, mut entries)| {
            entries.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
            (id, entries.into_iter().map(|(_, _, ori)| ori).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetra_orientation() -> serde_json::Value {
        serde_json::json!([[0, 0, 0], [1, 1, 0], [1, 0, 1], [0, 1, 1]])
    }

    #[test]
    fn loads_orientation_list_format() {
        let doc = serde_json::json!({
            "A": [tetra_orientation()],
            "B": [tetra_orientation(), tetra_orientation()],
        });
        let library = PieceLibrary::from_json(&doc).unwrap();
        assert_eq!(library.ids(), &["A".to_owned(), "B".to_owned()]);
        assert_eq!(library.orientations(0).len(), 1);
        assert_eq!(library.orientations(1).len(), 2);
        assert_eq!(library.orientations(0)[0][1], Cell(1, 1, 0));
    }

    #[test]
    fn loads_grouped_suffix_format() {
        let doc = serde_json::json!({
            "A__0": tetra_orientation(),
            "A__1": tetra_orientation(),
            "A__10": tetra_orientation(),
            "A__2": tetra_orientation(),
            "B__0": tetra_orientation(),
        });
        let library = PieceLibrary::from_json(&doc).unwrap();
        assert_eq!(library.ids(), &["A".to_owned(), "B".to_owned()]);
        // numeric suffix order, not lexicographic: 0, 1, 2, 10
        assert_eq!(library.orientations(0).len(), 4);
        assert_eq!(library.orientations(1).len(), 1);
    }

    #[test]
    fn both_formats_normalize_identically() {
        let listed = serde_json::json!({ "A": [tetra_orientation()] });
        let grouped = serde_json::json!({ "A__0": tetra_orientation() });
        let a = PieceLibrary::from_json(&listed).unwrap();
        let b = PieceLibrary::from_json(&grouped).unwrap();
        assert_eq!(a.ids(), b.ids());
        assert_eq!(a.orientations(0), b.orientations(0));
    }

    #[test]
    fn unrecognized_format_rejected() {
        let doc = serde_json::json!({ "A": [[0, 0, 0]] });
        assert!(matches!(
            PieceLibrary::from_json(&doc),
            Err(PieceLibraryError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn missing_anchor_rejected() {
        let doc = serde_json::json!({
            "A": [[[1, 0, 0], [2, 0, 0], [1, 1, 0], [1, 0, 1]]],
        });
        assert!(matches!(
            PieceLibrary::from_json(&doc),
            Err(PieceLibraryError::MissingAnchor(_, 0))
        ));
    }

    #[test]
    fn slot_order_prefers_then_sorts() {
        let mut map = BTreeMap::new();
        for id in ["A", "C", "Z1", "Z0", "N"] {
            map.insert(
                id.to_owned(),
                vec![[Cell(0, 0, 0), Cell(1, 1, 0), Cell(1, 0, 1), Cell(0, 1, 1)]],
            );
        }
        let library = PieceLibrary::from_orientation_map(map).unwrap();
        let order: Vec<&str> = library
            .slot_order()
            .into_iter()
            .map(|n| library.id(n))
            .collect();
        assert_eq!(order, vec!["A", "C", "N", "Z0", "Z1"]);
    }

    #[test]
    fn preference_buckets_cover_known_ids() {
        let mut map = BTreeMap::new();
        for id in ["A", "X", "N", "S", "Z"] {
            map.insert(
                id.to_owned(),
                vec![[Cell(0, 0, 0), Cell(1, 1, 0), Cell(1, 0, 1), Cell(0, 1, 1)]],
            );
        }
        let library = PieceLibrary::from_orientation_map(map).unwrap();
        let bucket_of = |id: &str| {
            let n = library.ids().iter().position(|x| x == id).unwrap() as u16;
            library.preference_bucket(n)
        };
        assert_eq!(bucket_of("A"), 0);
        assert_eq!(bucket_of("X"), 1);
        assert_eq!(bucket_of("N"), 2);
        assert_eq!(bucket_of("S"), 3);
        assert_eq!(bucket_of("Z"), PREFERENCE_BUCKETS.len());
    }
}
