use rand::Rng;

use crate::grid::CellState::{Alive, Dead};

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum CellState {
    #[default]
    Dead,
    Alive,
}

impl CellState {
    /// Image intensities above zero are alive.
    pub fn from_byte(value: u8) -> Self {
        if value > 0 {
            Alive
        } else {
            Dead
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Alive => 255,
            Dead => 0,
        }
    }

    pub fn is_alive(self) -> bool {
        self == Alive
    }
}

/// Apply the Game of Life rule to one cell given its live neighbour count.
pub fn next_state(current: CellState, alive_neighbors: usize) -> CellState {
    match (current, alive_neighbors) {
        (Alive, 2..=3) => Alive, // Survives
        (Dead, 3) => Alive,      // Becomes alive
        _ => Dead,               // Dies or remains dead
    }
}

/// Coordinate of a cell: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Cell { x, y }
    }
}

/// A toroidal board. Rows are stored top to bottom, every row has `width` cells.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    cells: Vec<Vec<CellState>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Grid {
            width,
            cells: vec![vec![Dead; width]; height],
        }
    }

    /// Build a board with the given cells alive. Coordinates wrap.
    pub fn with_alive(width: usize, height: usize, alive: &[Cell]) -> Self {
        let mut grid = Grid::new(width, height);
        if width == 0 || height == 0 {
            return grid;
        }
        for cell in alive {
            grid.cells[cell.y % height][cell.x % width] = Alive;
        }
        grid
    }

    /// Interpret `width * height` row-major intensities. `None` if the length is off.
    pub fn from_bytes(width: usize, height: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != width * height {
            return None;
        }
        let cells = bytes
            .chunks(width.max(1))
            .take(height)
            .map(|row| row.iter().copied().map(CellState::from_byte).collect())
            .collect();
        Some(Grid { width, cells })
    }

    /// Assemble a board from freshly computed rows.
    pub(crate) fn from_rows(width: usize, cells: Vec<Vec<CellState>>) -> Self {
        debug_assert!(cells.iter().all(|row| row.len() == width));
        Grid { width, cells }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.cells
            .iter()
            .flat_map(|row| row.iter().map(|cell| cell.to_byte()))
            .collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn rows(&self) -> &[Vec<CellState>] {
        &self.cells
    }

    /// Row `y`, wrapping around the vertical axis.
    pub fn row(&self, y: isize) -> &[CellState] {
        let y = y.rem_euclid(self.height() as isize) as usize;
        &self.cells[y]
    }

    /// Cell at `(x, y)`, wrapping around both axes.
    pub fn get(&self, x: isize, y: isize) -> CellState {
        let x = x.rem_euclid(self.width as isize) as usize;
        self.row(y)[x]
    }

    pub fn alive_cells(&self) -> Vec<Cell> {
        let mut alive = Vec::new();
        for (y, row) in self.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if cell.is_alive() {
                    alive.push(Cell { x, y });
                }
            }
        }
        alive
    }

    pub fn alive_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|cell| cell.is_alive()).count())
            .sum()
    }

    /// Fill every cell with a fair coin flip from `rng`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for row in self.cells.iter_mut() {
            for cell in row.iter_mut() {
                *cell = if rng.random_bool(0.5) { Alive } else { Dead };
            }
        }
    }

    /// Advance the whole board by one step on the calling thread.
    ///
    /// The distributor never uses this; it is the single-threaded reference the
    /// strip workers are checked against.
    pub fn next_generation(&self) -> Grid {
        let mut next_grid = vec![vec![Dead; self.width]; self.height()];

        for (row, next_row) in next_grid.iter_mut().enumerate() {
            for (col, next_cell) in next_row.iter_mut().enumerate() {
                let alive_neighbors = self.alive_neighbors(row, col);
                *next_cell = next_state(self.cells[row][col], alive_neighbors);
            }
        }

        Grid::from_rows(self.width, next_grid)
    }

    /// Count the number of alive neighbors for a cell
    pub fn alive_neighbors(&self, row: usize, col: usize) -> usize {
        let mut count = 0;

        for dr in [-1, 0, 1].iter() {
            for dc in [-1, 0, 1].iter() {
                if *dr == 0 && *dc == 0 {
                    continue;
                }

                if self.get(col as isize + dc, row as isize + dr) == Alive {
                    count += 1;
                }
            }
        }

        count
    }
}
