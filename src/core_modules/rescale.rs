// THEORY:
// The `rescale` module re-anchors patch-local detections to the whole-image
// origin. Because a tile's origin is exactly `stride * grid_col` /
// `stride * grid_row`, the mapping is a pure translation: no scaling or
// rotation, pixel sizes are preserved 1:1 between the two frames. The
// translation applies to the box corners and to every polygon vertex so the
// frame invariant (box and outline always in the same frame) holds.

use crate::core_modules::detection::{CoordFrame, Detection, TileResult};

/// Translates one patch-local detection into the global frame of the tile at
/// `(grid_col, grid_row)`.
pub fn to_global(detection: &Detection, grid_col: u32, grid_row: u32, stride: u32) -> Detection {
    debug_assert_eq!(detection.frame, CoordFrame::PatchLocal);
    let dx = (stride * grid_col) as f64;
    let dy = (stride * grid_row) as f64;
    Detection {
        bbox: detection.bbox.translate(dx, dy),
        score: detection.score,
        label: detection.label,
        polygon: detection
            .polygon
            .iter()
            .map(|&(x, y)| (x + dx, y + dy))
            .collect(),
        frame: CoordFrame::Global,
    }
}

/// Rescales a whole tile's raw detections, preserving their order.
pub fn rescale_tile(raw: &[Detection], grid_col: u32, grid_row: u32, stride: u32) -> TileResult {
    raw.iter()
        .map(|d| to_global(d, grid_col, grid_row, stride))
        .collect()
}
