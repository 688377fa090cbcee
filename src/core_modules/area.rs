// THEORY:
// The `area` module turns the merged detection set into per-image area
// statistics in physical units. Each kept detection contributes the area of
// its outline polygon, computed with the shoelace formula over the ordered
// vertices; pixel areas convert to µm² through the square of the run's
// calibration ratio (µm per pixel). Per-image totals accumulate into the
// per-well report: when the caller supplies the well's area in pixels the
// module also reports what percentage of the well the detections cover,
// otherwise the percentage is a distinct "not computed" state, never zero.

use crate::core_modules::detection::Detection;

/// Signed-area magnitude of a simple polygon via the shoelace formula:
/// `0.5 * |sum(x_i * y_{i+1} - x_{i+1} * y_i)|` with wrapping indices.
/// Returns `None` when fewer than 3 finite vertices remain; area is
/// undefined for such degenerate outlines and the caller flags them.
pub fn shoelace_area(polygon: &[(f64, f64)]) -> Option<f64> {
    let points: Vec<(f64, f64)> = polygon
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.len() < 3 {
        return None;
    }

    let mut sum = 0.0;
    for i in 0..points.len() {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % points.len()];
        sum += x1 * y2 - x2 * y1;
    }
    Some(0.5 * sum.abs())
}

/// Rounds to 3 decimal places, the precision of every reported area figure.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Converts a pixel area to physical units: `pixel_area * ratio²`, where
/// `ratio` is the run-wide physical length per pixel.
pub fn pixel_to_physical(pixel_area: f64, ratio: f64) -> f64 {
    round3(pixel_area * ratio * ratio)
}

/// Per-image area statistics, one record per processed image.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaRecord {
    pub image_id: String,
    /// Total polygon area over all kept detections, in pixels².
    pub pixel_area: f64,
    /// `pixel_area` converted through the calibration ratio, in µm².
    pub physical_area: f64,
    /// Percentage of the well covered, present only when a well area was
    /// supplied for the run.
    pub percent_of_well: Option<f64>,
    /// Detections whose outline had fewer than 3 valid points and therefore
    /// contributed zero area.
    pub skipped_polygons: usize,
}

/// Accumulates the area statistics for one image's merged detection set.
/// An empty set is a normal terminal state and produces a zero-area record.
pub fn measure_image(
    image_id: &str,
    detections: &[Detection],
    ratio: f64,
    well_area_px: Option<f64>,
) -> AreaRecord {
    let mut pixel_total = 0.0;
    let mut skipped = 0usize;

    for detection in detections {
        match shoelace_area(&detection.polygon) {
            Some(area) => pixel_total += area,
            None => {
                skipped += 1;
                log::debug!(
                    "skipping degenerate outline ({} points) in {image_id}",
                    detection.polygon.len()
                );
            }
        }
    }

    let pixel_area = round3(pixel_total);
    AreaRecord {
        image_id: image_id.to_string(),
        pixel_area,
        physical_area: pixel_to_physical(pixel_total, ratio),
        percent_of_well: well_area_px.map(|well| round3(pixel_total / well * 100.0)),
        skipped_polygons: skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::detection::{BoundingBox, CoordFrame};

    fn det_with_polygon(polygon: Vec<(f64, f64)>) -> Detection {
        Detection {
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            score: 0.9,
            label: 0,
            polygon,
            frame: CoordFrame::Global,
        }
    }

    #[test]
    fn shoelace_unit_square() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert_eq!(shoelace_area(&square), Some(1.0));
    }

    #[test]
    fn shoelace_triangle() {
        let triangle = [(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)];
        assert_eq!(shoelace_area(&triangle), Some(6.0));
    }

    #[test]
    fn shoelace_orientation_is_irrelevant() {
        let clockwise = [(0.0, 0.0), (0.0, 3.0), (4.0, 0.0)];
        assert_eq!(shoelace_area(&clockwise), Some(6.0));
    }

    #[test]
    fn shoelace_rejects_degenerate_outlines() {
        assert_eq!(shoelace_area(&[]), None);
        assert_eq!(shoelace_area(&[(0.0, 0.0), (1.0, 1.0)]), None);
        // A NaN vertex does not count toward the 3-point minimum.
        assert_eq!(
            shoelace_area(&[(0.0, 0.0), (1.0, 0.0), (f64::NAN, 1.0)]),
            None
        );
    }

    #[test]
    fn unit_conversion_squares_the_ratio() {
        assert_eq!(pixel_to_physical(100.0, 0.5), 25.0);
        assert_eq!(pixel_to_physical(1.0, 0.7784), 0.606);
    }

    #[test]
    fn measure_image_totals_and_percent() {
        let detections = vec![
            det_with_polygon(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            det_with_polygon(vec![(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)]),
        ];
        let record = measure_image("well_a3.png", &detections, 0.5, Some(1000.0));
        assert_eq!(record.pixel_area, 106.0);
        assert_eq!(record.physical_area, 26.5);
        assert_eq!(record.percent_of_well, Some(10.6));
        assert_eq!(record.skipped_polygons, 0);
    }

    #[test]
    fn percent_is_absent_without_a_well_area() {
        let detections = vec![det_with_polygon(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ])];
        let record = measure_image("well_b1.png", &detections, 1.0, None);
        assert_eq!(record.percent_of_well, None);
        assert_eq!(record.physical_area, 1.0);
    }

    #[test]
    fn degenerate_polygons_are_counted_not_fatal() {
        let detections = vec![
            det_with_polygon(vec![(0.0, 0.0), (1.0, 1.0)]),
            det_with_polygon(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]),
        ];
        let record = measure_image("well_c2.png", &detections, 1.0, None);
        assert_eq!(record.pixel_area, 4.0);
        assert_eq!(record.skipped_polygons, 1);
    }

    #[test]
    fn empty_detection_set_contributes_zero() {
        let record = measure_image("well_d4.png", &[], 0.7784, Some(500_000.0));
        assert_eq!(record.pixel_area, 0.0);
        assert_eq!(record.physical_area, 0.0);
        assert_eq!(record.percent_of_well, Some(0.0));
    }
}
