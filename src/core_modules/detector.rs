// THEORY:
// The `detector` module is the boundary to the external object detector. The
// pipeline never depends on any detection library's internals; it only knows
// the narrow `ObjectDetector` capability: given one background-filled patch,
// return zero or more patch-local detections. Confidence floor and maximum
// detection count belong to the detector's own configuration and pass
// through this boundary unmodified.
//
// The crate ships one reference backend, `IntensityDetector`, so the full
// pipeline can run and be tested without an external model: osteoclasts are
// TRAP-stained and darker than the white well background, so a grayscale
// threshold followed by border tracing yields boxes and outline polygons in
// the same shape a segmentation model produces. Production runs substitute a
// model-backed implementation of the same trait.

use anyhow::Result;
use image::RgbImage;
use imageproc::contours::{BorderType, find_contours};

use crate::core_modules::detection::{BoundingBox, CoordFrame, Detection};

/// Pass-through configuration owned by the detector, not reinterpreted by
/// the pipeline.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Minimum confidence for a detection to be reported.
    pub confidence_floor: f32,
    /// Hard cap on detections per patch.
    pub max_detections: usize,
    /// Compute device selector, e.g. "cpu" or "cuda:0". The reference
    /// backend runs on the CPU regardless; model backends honor it.
    pub device: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            confidence_floor: 0.25,
            max_detections: 30_000,
            device: "cpu".to_string(),
        }
    }
}

/// The capability the pipeline requires from any detector backend.
/// Detections come back in patch-local coordinates, already filtered and
/// capped per the backend's settings.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, patch: &RgbImage) -> Result<Vec<Detection>>;
}

impl<T: ObjectDetector + ?Sized> ObjectDetector for std::sync::Arc<T> {
    fn detect(&self, patch: &RgbImage) -> Result<Vec<Detection>> {
        (**self).detect(patch)
    }
}

/// Classical intensity-threshold backend: grayscale, binarize against the
/// stain threshold, trace component borders, report each outer border as one
/// detection with its bounding box and outline polygon.
pub struct IntensityDetector {
    settings: DetectorSettings,
    /// Luma below this value counts as stained foreground.
    intensity_threshold: u8,
    /// Components with a smaller box area are treated as stain noise.
    min_component_area: f64,
}

impl IntensityDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            intensity_threshold: 200,
            min_component_area: 64.0,
        }
    }

    pub fn with_threshold(mut self, intensity_threshold: u8) -> Self {
        self.intensity_threshold = intensity_threshold;
        self
    }

    /// Mean normalized darkness over a box region, used as the confidence
    /// score of a component.
    fn region_score(gray: &image::GrayImage, bbox: &BoundingBox) -> f32 {
        let x_lo = bbox.x1.max(0.0) as u32;
        let y_lo = bbox.y1.max(0.0) as u32;
        let x_hi = (bbox.x2 as u32).min(gray.width());
        let y_hi = (bbox.y2 as u32).min(gray.height());
        if x_hi <= x_lo || y_hi <= y_lo {
            return 0.0;
        }

        let mut sum = 0.0f64;
        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                sum += f64::from(255 - gray.get_pixel(x, y).0[0]);
            }
        }
        let count = f64::from((x_hi - x_lo) * (y_hi - y_lo));
        (sum / count / 255.0) as f32
    }
}

impl ObjectDetector for IntensityDetector {
    fn detect(&self, patch: &RgbImage) -> Result<Vec<Detection>> {
        let gray = image::imageops::grayscale(patch);
        let binary = image::GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y).0[0] < self.intensity_threshold {
                image::Luma([255u8])
            } else {
                image::Luma([0u8])
            }
        });

        let mut detections = Vec::new();
        for contour in find_contours::<i32>(&binary) {
            if contour.border_type != BorderType::Outer || contour.points.len() < 3 {
                continue;
            }

            let min_x = contour.points.iter().map(|p| p.x).min().unwrap_or(0);
            let min_y = contour.points.iter().map(|p| p.y).min().unwrap_or(0);
            let max_x = contour.points.iter().map(|p| p.x).max().unwrap_or(0);
            let max_y = contour.points.iter().map(|p| p.y).max().unwrap_or(0);
            let bbox = BoundingBox::new(
                f64::from(min_x),
                f64::from(min_y),
                f64::from(max_x + 1),
                f64::from(max_y + 1),
            );
            if bbox.area() < self.min_component_area {
                continue;
            }

            let score = Self::region_score(&gray, &bbox);
            if score < self.settings.confidence_floor {
                continue;
            }

            detections.push(Detection {
                bbox,
                score,
                label: 0,
                polygon: contour
                    .points
                    .iter()
                    .map(|p| (f64::from(p.x), f64::from(p.y)))
                    .collect(),
                frame: CoordFrame::PatchLocal,
            });
        }

        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.settings.max_detections);
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white_patch(size: u32) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb([255, 255, 255]))
    }

    fn detector() -> IntensityDetector {
        IntensityDetector::new(DetectorSettings::default())
    }

    #[test]
    fn blank_background_yields_no_detections() {
        // The white patch fill must never read as structure.
        let detections = detector().detect(&white_patch(128)).expect("detect");
        assert!(detections.is_empty());
    }

    #[test]
    fn dark_blob_is_detected_with_box_and_outline() {
        let mut patch = white_patch(128);
        for y in 30..60 {
            for x in 40..80 {
                patch.put_pixel(x, y, Rgb([40, 20, 30]));
            }
        }

        let detections = detector().detect(&patch).expect("detect");
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.frame, CoordFrame::PatchLocal);
        assert!(d.bbox.x1 >= 39.0 && d.bbox.x2 <= 81.0);
        assert!(d.bbox.y1 >= 29.0 && d.bbox.y2 <= 61.0);
        assert!(d.polygon.len() >= 3);
        assert!(d.score >= 0.25);
    }

    #[test]
    fn tiny_specks_are_filtered_out() {
        let mut patch = white_patch(64);
        patch.put_pixel(10, 10, Rgb([0, 0, 0]));
        patch.put_pixel(30, 30, Rgb([0, 0, 0]));

        let detections = detector().detect(&patch).expect("detect");
        assert!(detections.is_empty());
    }

    #[test]
    fn detection_cap_is_honored() {
        let mut patch = white_patch(200);
        // Nine well-separated dark squares.
        for by in 0..3 {
            for bx in 0..3 {
                for y in 0..12 {
                    for x in 0..12 {
                        patch.put_pixel(bx * 60 + 10 + x, by * 60 + 10 + y, Rgb([10, 10, 10]));
                    }
                }
            }
        }

        let settings = DetectorSettings {
            max_detections: 4,
            ..DetectorSettings::default()
        };
        let detections = IntensityDetector::new(settings).detect(&patch).expect("detect");
        assert_eq!(detections.len(), 4);
    }
}
