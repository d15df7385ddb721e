// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tetra::canonical::canonicalize;
use tetra::config::Tuning;
use tetra::core::Cell;
use tetra::fits::FitTable;
use tetra::lattice::Lattice;
use tetra::pieces::PieceLibrary;
use tetra::search::SearchState;

const STRAIGHT: [Cell; 4] = [Cell(0, 0, 0), Cell(1, 0, 0), Cell(2, 0, 0), Cell(3, 0, 0)];
const SQUARE: [Cell; 4] = [Cell(0, 0, 0), Cell(1, 0, 0), Cell(0, 1, 0), Cell(1, 1, 0)];

fn plate_cells(width: i32, height: i32) -> Vec<Cell> {
    let mut cells = Vec::new();
    for i in 0..width {
        for j in 0..height {
            cells.push(Cell(i, j, 0));
        }
    }
    cells
}

fn plate_library(ids: &[&str]) -> PieceLibrary {
    let mut map = BTreeMap::new();
    for id in ids {
        map.insert(id.to_string(), vec![STRAIGHT, SQUARE]);
    }
    PieceLibrary::from_orientation_map(map).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let cells = plate_cells(8, 4);
    let lattice = Lattice::new(&cells).unwrap();
    let library = plate_library(&["A", "B", "C", "D", "E", "F", "G", "H"]);
    let fits = FitTable::new(&lattice, &library);
    let tuning = Tuning::default();

    c.bench_function("fit-table-build", |b| {
        b.iter(|| FitTable::new(black_box(&lattice), black_box(&library)));
    });

    c.bench_function("plate-attempt", |b| {
        b.iter(|| {
            let mut state = SearchState::new(
                black_box(&lattice),
                black_box(&fits),
                &tuning,
                1337,
                library.slot_order(),
            );
            loop {
                let (progressed, solved) = state.step_once();
                if solved
                    || (!progressed && state.cursor() == 0 && state.placements().is_empty())
                {
                    break;
                }
            }
            state.placed_count()
        });
    });

    c.bench_function("canonicalize-plate", |b| {
        b.iter(|| canonicalize(black_box(&cells)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
