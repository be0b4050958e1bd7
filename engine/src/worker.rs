//! Strip workers: each one computes the next state of a contiguous band of rows.

use crate::grid::{next_state, CellState, Grid};

/// Rows `[start, end)` handed to worker `index` for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strip {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Strip {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `[0, height)` into `workers` contiguous strips. The first
/// `height % workers` strips take one extra row.
pub fn partition(height: usize, workers: usize) -> Vec<Strip> {
    if workers == 0 {
        return Vec::new();
    }
    let base = height / workers;
    let extra = height % workers;

    let mut start = 0;
    (0..workers)
        .map(|index| {
            let len = base + usize::from(index < extra);
            let strip = Strip {
                index,
                start,
                end: start + len,
            };
            start += len;
            strip
        })
        .collect()
}

/// Read-only window a worker computes from: its rows plus one halo row on each side.
#[derive(Debug, Clone, Copy)]
pub struct StripView<'a> {
    pub above: &'a [CellState],
    pub rows: &'a [Vec<CellState>],
    pub below: &'a [CellState],
}

impl<'a> StripView<'a> {
    pub fn of(grid: &'a Grid, strip: Strip) -> Self {
        StripView {
            above: grid.row(strip.start as isize - 1),
            rows: &grid.rows()[strip.start..strip.end],
            below: grid.row(strip.end as isize),
        }
    }

    fn row(&self, index: isize) -> &'a [CellState] {
        if index < 0 {
            self.above
        } else if index as usize >= self.rows.len() {
            self.below
        } else {
            &self.rows[index as usize]
        }
    }

    fn alive_neighbors(&self, row: isize, col: usize, width: usize) -> usize {
        let mut count = 0;

        for dr in [-1, 0, 1] {
            let cells = self.row(row + dr);
            for dc in [-1, 0, 1] {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let neighbor_col = (col as isize + dc).rem_euclid(width as isize) as usize;
                if cells[neighbor_col].is_alive() {
                    count += 1;
                }
            }
        }

        count
    }
}

/// Compute the next generation of the rows in `view`.
pub fn compute_strip(view: &StripView<'_>) -> Vec<Vec<CellState>> {
    let width = view.above.len();

    view.rows
        .iter()
        .enumerate()
        .map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(|(col, &cell)| next_state(cell, view.alive_neighbors(row as isize, col, width)))
                .collect()
        })
        .collect()
}
