// THEORY:
// The `dedup` module is the core of the engine. The 50%-overlap tiling means
// a real object near a tile seam is independently detected once per
// overlapping tile; exactly one copy must survive or the per-well counts and
// areas are wrong. For each tile, every detection is compared against the
// detections of the eight surrounding tiles (already in the global frame):
//
// 1.  A neighbor whose box covers at least 90% of the detection's own area
//     (uncovered fraction below 0.1) flags the detection as a duplicate
//     candidate: very likely the same physical object seen from two tiles.
// 2.  A flagged detection survives only if its box area is strictly larger
//     than every flagging neighbor's, and its top-left corner lies strictly
//     inside the real image bounds.
//
// The area tie-break, rather than score, favors the copy whose box most
// fully captures the object: partial views near a tile edge tend to be
// smaller. On an exact area tie neither copy is strictly larger, so both are
// dropped; a tie never double-counts. The origin-inside-image check guards
// the padded edge/corner tiles, where a "detection" can sit entirely in the
// synthetic background beyond the image.
//
// Malformed detections (non-finite coordinates, zero-area boxes) are dropped
// locally and excluded from every comparison; a bad detection never aborts
// the image.

use crate::core_modules::detection::{Detection, MergedDetectionSet};
use crate::core_modules::result_grid::ResultGrid;

/// A detection is a duplicate candidate against a neighbor when the fraction
/// of its own area the neighbor leaves uncovered falls below this threshold,
/// i.e. the neighbor's box covers at least 90% of it.
pub const UNCOVERED_FRACTION_THRESHOLD: f64 = 0.1;

/// Decides whether one well-formed detection survives against its
/// neighborhood. `neighbors` must already be filtered to well-formed,
/// global-frame detections.
pub fn keep_detection(
    detection: &Detection,
    neighbors: &[&Detection],
    image_width: u32,
    image_height: u32,
) -> bool {
    let area = detection.bbox.area();
    let flagged: Vec<&&Detection> = neighbors
        .iter()
        .filter(|n| {
            let intersection = detection.bbox.intersection_area(&n.bbox);
            (area - intersection) / area < UNCOVERED_FRACTION_THRESHOLD
        })
        .collect();

    if flagged.is_empty() {
        return true;
    }

    let strictly_largest = flagged.iter().all(|n| area > n.bbox.area());
    let origin_inside = detection.bbox.x1 < f64::from(image_width)
        && detection.bbox.y1 < f64::from(image_height);
    strictly_largest && origin_inside
}

/// Sweeps the result grid in row-major tile order, deduplicating every tile
/// against its 8-neighborhood and concatenating the survivors into the
/// image's merged detection set. Within-tile order is preserved. The sweep
/// reads but never mutates tile results, so per-tile decisions stay
/// independent of each other.
pub fn merge_grid(grid: &ResultGrid, image_width: u32, image_height: u32) -> MergedDetectionSet {
    let mut merged = MergedDetectionSet::new();

    for row in 0..grid.num_rows() {
        for col in 0..grid.num_cols() {
            let tile = grid.tile(col, row);
            if tile.is_empty() {
                continue;
            }

            let neighbors: Vec<&Detection> = grid
                .neighbors(col, row)
                .into_iter()
                .filter(|n| n.is_well_formed())
                .collect();

            for detection in tile {
                if !detection.is_well_formed() {
                    log::debug!(
                        "dropping malformed detection in tile ({col}, {row}): {:?}",
                        detection.bbox
                    );
                    continue;
                }
                if neighbors.is_empty()
                    || keep_detection(detection, &neighbors, image_width, image_height)
                {
                    merged.push(detection.clone());
                }
            }
        }
    }

    merged
}
