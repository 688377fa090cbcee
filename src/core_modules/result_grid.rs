// THEORY:
// The `result_grid` module buffers every tile's rescaled detections in a
// fixed-size 2D grid indexed by `(grid_col, grid_row)`, ring-padded with one
// row/column of permanently empty sentinel cells on all four sides. The
// padding gives boundary tiles a well-defined, empty 8-neighborhood, so the
// deduplication sweep reads neighbors with uniform arithmetic and no bounds
// checks. The sentinel cells never hold real detections; they only encode the
// "no neighbor" case.

use crate::core_modules::detection::{Detection, TileResult};

/// Fixed 2D buffer of per-tile results for one image. Interior cells are
/// addressed with the tile's grid coordinates; the surrounding sentinel ring
/// is an implementation detail and stays empty for the grid's lifetime.
#[derive(Debug)]
pub struct ResultGrid {
    cells: Vec<TileResult>,
    num_cols: u32,
    num_rows: u32,
    padded_cols: u32,
}

impl ResultGrid {
    pub fn new(num_cols: u32, num_rows: u32) -> Self {
        let padded_cols = num_cols + 2;
        let padded_rows = num_rows + 2;
        Self {
            cells: vec![Vec::new(); (padded_cols * padded_rows) as usize],
            num_cols,
            num_rows,
            padded_cols,
        }
    }

    pub fn num_cols(&self) -> u32 {
        self.num_cols
    }

    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    fn index(&self, padded_col: u32, padded_row: u32) -> usize {
        (padded_row * self.padded_cols + padded_col) as usize
    }

    /// Stores one tile's detections. `col`/`row` are interior grid
    /// coordinates, offset internally past the sentinel ring.
    pub fn insert(&mut self, col: u32, row: u32, result: TileResult) {
        debug_assert!(col < self.num_cols && row < self.num_rows);
        let idx = self.index(col + 1, row + 1);
        self.cells[idx] = result;
    }

    pub fn tile(&self, col: u32, row: u32) -> &TileResult {
        debug_assert!(col < self.num_cols && row < self.num_rows);
        &self.cells[self.index(col + 1, row + 1)]
    }

    /// All detections of the eight tiles surrounding `(col, row)`, excluding
    /// the tile itself. Out-of-grid neighbors resolve to the empty sentinel
    /// cells, so boundary tiles need no special casing.
    pub fn neighbors(&self, col: u32, row: u32) -> Vec<&Detection> {
        debug_assert!(col < self.num_cols && row < self.num_rows);
        let pc = col + 1;
        let pr = row + 1;
        let mut out = Vec::new();
        for dr in 0..3u32 {
            for dc in 0..3u32 {
                if dr == 1 && dc == 1 {
                    continue;
                }
                let idx = self.index(pc + dc - 1, pr + dr - 1);
                out.extend(self.cells[idx].iter());
            }
        }
        out
    }
}
