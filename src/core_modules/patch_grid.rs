// THEORY:
// The `patch_grid` module computes the overlap-tile layout for one image.
// Whole-slide scans are far too large to feed to a detector in one pass, so
// the image is covered by fixed-size square patches whose starts are spaced
// `stride = patch_size / 2` apart in both axes, giving every patch a 50%
// overlap with each neighbor. An object that straddles one patch boundary is
// therefore fully contained in at least one other patch, which is what makes
// the downstream cross-tile deduplication sound.
//
// Key architectural principles:
// 1.  **Dense grid indices**: a patch starting at `x0` has
//     `grid_col = ceil(x0 / stride)`, and because starts are always stride
//     multiples this collapses to `x0 / stride`. Columns and rows are dense
//     integers, so tile results can live in a flat 2D grid instead of a
//     keyed map.
// 2.  **Overhang is allowed**: the right/bottom edge of a patch is always
//     `start + patch_size`, even past the image border. The excess is
//     synthetic background supplied later by the patch extractor, never real
//     image content.
// 3.  **Fail early on bad configuration**: a `patch_size <= 1` cannot produce
//     a positive stride and is rejected before any tile work starts.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("patch size must be greater than 1, got {0}")]
    PatchTooSmall(u32),
}

/// One tile of the overlap grid: pixel bounds in image space plus the tile's
/// integer position in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSpec {
    pub x0: u32,
    pub y0: u32,
    /// Exclusive right edge; may exceed the image width.
    pub x1: u32,
    /// Exclusive bottom edge; may exceed the image height.
    pub y1: u32,
    pub grid_col: u32,
    pub grid_row: u32,
}

/// The full tile layout for one image, fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct PatchGrid {
    pub patch_size: u32,
    pub stride: u32,
    pub num_cols: u32,
    pub num_rows: u32,
    /// Row-major, matching the sweep order of the deduplicator.
    pub patches: Vec<PatchSpec>,
}

impl PatchGrid {
    /// Computes the ordered tile layout covering `[0, width) x [0, height)`.
    pub fn new(width: u32, height: u32, patch_size: u32) -> Result<Self, GridError> {
        if patch_size <= 1 {
            return Err(GridError::PatchTooSmall(patch_size));
        }
        let stride = patch_size / 2;
        let num_cols = width.div_ceil(stride);
        let num_rows = height.div_ceil(stride);

        let mut patches = Vec::with_capacity((num_cols * num_rows) as usize);
        for grid_row in 0..num_rows {
            let y0 = grid_row * stride;
            for grid_col in 0..num_cols {
                let x0 = grid_col * stride;
                patches.push(PatchSpec {
                    x0,
                    y0,
                    x1: x0 + patch_size,
                    y1: y0 + patch_size,
                    grid_col,
                    grid_row,
                });
            }
        }

        Ok(Self {
            patch_size,
            stride,
            num_cols,
            num_rows,
            patches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_patch_size() {
        assert!(matches!(
            PatchGrid::new(100, 100, 0),
            Err(GridError::PatchTooSmall(0))
        ));
        assert!(matches!(
            PatchGrid::new(100, 100, 1),
            Err(GridError::PatchTooSmall(1))
        ));
    }

    #[test]
    fn grid_covers_image_with_half_overlap() {
        let grid = PatchGrid::new(1000, 600, 100).expect("valid grid");
        assert_eq!(grid.stride, 50);
        assert_eq!(grid.num_cols, 20);
        assert_eq!(grid.num_rows, 12);
        assert_eq!(grid.patches.len(), 240);

        // Every pixel of [0, W) x [0, H) lies inside at least one patch.
        let covered_x = grid
            .patches
            .iter()
            .any(|p| p.x0 <= 999 && 999 < p.x1 && p.y0 == 0);
        assert!(covered_x);

        // Consecutive patches along one axis overlap by exactly the stride.
        let row0: Vec<&PatchSpec> = grid.patches.iter().filter(|p| p.grid_row == 0).collect();
        for pair in row0.windows(2) {
            assert_eq!(pair[1].x0 - pair[0].x0, grid.stride);
            assert_eq!(pair[0].x1 - pair[1].x0, grid.stride);
        }
    }

    #[test]
    fn grid_indices_are_dense_and_derived_from_origin() {
        let grid = PatchGrid::new(450, 450, 100).expect("valid grid");
        for patch in &grid.patches {
            assert_eq!(patch.grid_col, patch.x0 / grid.stride);
            assert_eq!(patch.grid_row, patch.y0 / grid.stride);
            // ceil(x0 / stride) == x0 / stride because starts are stride multiples.
            assert_eq!(patch.grid_col, patch.x0.div_ceil(grid.stride));
        }
        let max_col = grid.patches.iter().map(|p| p.grid_col).max().unwrap();
        assert_eq!(max_col, grid.num_cols - 1);
    }

    #[test]
    fn last_patch_may_overhang_the_edge() {
        let grid = PatchGrid::new(130, 130, 100).expect("valid grid");
        let last = grid.patches.last().unwrap();
        assert!(last.x1 > 130);
        assert!(last.y1 > 130);
        assert_eq!(last.x1 - last.x0, 100);
        assert_eq!(last.y1 - last.y0, 100);
    }

    #[test]
    fn odd_patch_size_uses_floor_stride() {
        let grid = PatchGrid::new(50, 50, 11).expect("valid grid");
        assert_eq!(grid.stride, 5);
    }
}
