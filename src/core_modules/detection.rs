// THEORY:
// The `detection` module defines the "dumb" data containers shared by every
// stage of the tiled-inference pipeline: the axis-aligned `BoundingBox`, the
// `Detection` (box + confidence + class label + outline polygon), and the
// collection aliases used between stages.
//
// Key architectural principles:
// 1.  **Coordinate-frame tagging**: every `Detection` carries the frame its
//     coordinates live in (`PatchLocal` straight out of the detector, or
//     `Global` after rescaling). Only global-frame detections may ever be
//     compared across tiles or emitted, and the tag makes mixing the two
//     frames a visible bug instead of a silent miscount.
// 2.  **Data containers, not analyzers**: these types hold geometry and know
//     how to compute their own summary values (area, intersection,
//     well-formedness). Deciding what to *do* with those values belongs to the
//     deduplicator and the area engine.
// 3.  **Degenerate input is data, not an error**: the detector is an external
//     collaborator and its output may be noisy. `is_well_formed` is the single
//     place that defines which detections are usable; callers filter, they
//     never panic.

/// An axis-aligned bounding box in pixel coordinates, `(x1, y1)` top-left and
/// `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Surface area of the box. Inverted boxes clamp to zero instead of going
    /// negative so that downstream ratios stay meaningful.
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Area of the axis-aligned intersection with `other`; zero when the two
    /// boxes do not overlap.
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Returns a copy shifted by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> BoundingBox {
        BoundingBox::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }
}

/// Which origin a detection's coordinates are anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordFrame {
    /// Origin at the top-left of the patch that produced the detection.
    PatchLocal,
    /// Origin at the top-left of the whole image.
    Global,
}

/// One object instance reported by the detector: bounding box, confidence
/// score, class label, and the outline polygon of the segmented object.
/// Box and polygon are always in the same coordinate frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub label: i64,
    /// Ordered outline vertices. Serialized as a flattened `x, y, x, y, ...`
    /// sequence (always an even count) in the detection tables.
    pub polygon: Vec<(f64, f64)>,
    pub frame: CoordFrame,
}

impl Detection {
    /// A detection is usable by the deduplicator only if its geometry is
    /// finite and its box has positive area. Anything else is dropped at the
    /// comparison boundary rather than propagated as an error.
    pub fn is_well_formed(&self) -> bool {
        self.bbox.is_finite()
            && self.bbox.area() > 0.0
            && self.score.is_finite()
            && self.polygon.iter().all(|(x, y)| x.is_finite() && y.is_finite())
    }
}

/// All global-frame detections produced by a single tile.
pub type TileResult = Vec<Detection>;

/// The ordered set of detections surviving deduplication for one image.
/// Order is row-major tile order with within-tile order preserved; it matters
/// only for reproducibility of the output tables.
pub type MergedDetectionSet = Vec<Detection>;

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score: 0.9,
            label: 0,
            polygon: vec![(x1, y1), (x2, y1), (x2, y2)],
            frame: CoordFrame::Global,
        }
    }

    #[test]
    fn box_area_and_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.area(), 100.0);
        assert_eq!(a.intersection_area(&b), 25.0);
        assert_eq!(b.intersection_area(&a), 25.0);
    }

    #[test]
    fn disjoint_boxes_have_zero_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn inverted_box_area_clamps_to_zero() {
        let a = BoundingBox::new(10.0, 10.0, 0.0, 0.0);
        assert_eq!(a.area(), 0.0);
    }

    #[test]
    fn translate_shifts_both_corners() {
        let a = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        let shifted = a.translate(10.0, 20.0);
        assert_eq!(shifted, BoundingBox::new(11.0, 22.0, 13.0, 24.0));
    }

    #[test]
    fn well_formedness_rejects_non_finite_and_zero_area() {
        assert!(det(0.0, 0.0, 10.0, 10.0).is_well_formed());
        assert!(!det(0.0, 0.0, 0.0, 10.0).is_well_formed());

        let mut bad = det(0.0, 0.0, 10.0, 10.0);
        bad.bbox.x2 = f64::NAN;
        assert!(!bad.is_well_formed());

        let mut bad_poly = det(0.0, 0.0, 10.0, 10.0);
        bad_poly.polygon[1] = (f64::INFINITY, 0.0);
        assert!(!bad_poly.is_well_formed());
    }
}
