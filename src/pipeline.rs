// THEORY:
// The `pipeline` module is the top-level API for processing one whole-slide
// image end to end. It encapsulates the full stack into a single interface:
// grid generation, per-tile detector invocation over background-filled
// patches, rescaling into the global frame, the buffered result grid, the
// neighborhood deduplication sweep, area measurement, and the per-image
// output files. Its purpose is to give callers (the CLI and the parallel
// worker pool) one entry point per image, with every tunable carried in an
// explicit `RunConfig` that is constructed once and never mutated mid-run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use thiserror::Error;

use crate::core_modules::annotate;
use crate::core_modules::area::{self, AreaRecord};
use crate::core_modules::dedup;
use crate::core_modules::detection::MergedDetectionSet;
use crate::core_modules::detector::ObjectDetector;
use crate::core_modules::patch_extract::extract_patch;
use crate::core_modules::patch_grid::{GridError, PatchGrid};
use crate::core_modules::report;
use crate::core_modules::rescale;
use crate::core_modules::result_grid::ResultGrid;

/// Calibration of the scanner the reference model was trained at:
/// micrometres per pixel, and the model's input window in pixels.
pub const UM_PER_PIXEL_DEFAULT: f64 = 0.7784;
pub const REFERENCE_PATCH_PIXELS: u32 = 832;
/// Physical width of one patch; fixed so that runs at other magnifications
/// tile with the same physical window.
pub const UM_PER_PATCH: f64 = UM_PER_PIXEL_DEFAULT * REFERENCE_PATCH_PIXELS as f64;

/// Configuration for a whole run, validated up front and passed by
/// reference through the pipeline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub img_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Location of the detector model; consumed by model-backed detector
    /// implementations, ignored by the built-in reference backend.
    pub model_path: PathBuf,
    /// Physical length per pixel (µm/px) of the input scans.
    pub ratio: f64,
    /// Total well area in pixels, when percent-of-well reporting is wanted.
    pub well_area_px: Option<f64>,
    pub device: String,
}

impl RunConfig {
    /// Pixel patch size for this run, derived from the fixed physical patch
    /// width and the run's calibration ratio.
    pub fn patch_size(&self) -> u32 {
        (UM_PER_PATCH / self.ratio) as u32
    }

    /// Configuration errors abort the run before any tile is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ratio.is_finite() && self.ratio > 0.0) {
            return Err(ConfigError::InvalidRatio(self.ratio));
        }
        if self.out_dir == self.img_dir {
            return Err(ConfigError::OutputEqualsInput);
        }
        let patch_size = self.patch_size();
        if patch_size <= 1 {
            return Err(ConfigError::Grid(GridError::PatchTooSmall(patch_size)));
        }
        if let Some(well) = self.well_area_px {
            if !(well.is_finite() && well > 0.0) {
                return Err(ConfigError::InvalidWellArea(well));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("output directory equals input directory; choose a distinct output location")]
    OutputEqualsInput,
    #[error("calibration ratio must be positive and finite, got {0}")]
    InvalidRatio(f64),
    #[error("well area must be positive and finite, got {0}")]
    InvalidWellArea(f64),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Everything one image produced: the merged detection set and its area
/// record. The parallel coordinator appends these to the shared reports in
/// deterministic input order.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    pub image_id: String,
    pub detections: MergedDetectionSet,
    pub areas: AreaRecord,
}

/// The main, top-level struct for the tiled-inference engine: one detector
/// backend plus one validated run configuration.
pub struct SlidePipeline<D: ObjectDetector> {
    config: RunConfig,
    detector: D,
    patch_size: u32,
}

impl<D: ObjectDetector> SlidePipeline<D> {
    pub fn new(config: RunConfig, detector: D) -> Result<Self, ConfigError> {
        config.validate()?;
        let patch_size = config.patch_size();
        Ok(Self {
            config,
            detector,
            patch_size,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the core pipeline on one in-memory image:
    /// grid -> per-tile detect -> rescale -> result grid -> dedup -> areas.
    ///
    /// A detector failure on one tile degrades that tile to an empty result
    /// and continues; it never fails the image.
    pub fn process_image(&self, image: &RgbImage, image_id: &str) -> Result<ImageSummary> {
        let grid = PatchGrid::new(image.width(), image.height(), self.patch_size)?;
        log::info!(
            "{image_id}: {}x{} px, {} tiles ({} x {})",
            image.width(),
            image.height(),
            grid.patches.len(),
            grid.num_cols,
            grid.num_rows,
        );

        // Stage 1: inference + rescaling for every tile, buffered in the
        // ring-padded result grid. The full grid must be rescaled before any
        // deduplication decision reads a neighborhood.
        let mut results = ResultGrid::new(grid.num_cols, grid.num_rows);
        for spec in &grid.patches {
            let patch = extract_patch(image, spec, self.patch_size);
            let raw = match self.detector.detect(&patch) {
                Ok(detections) => detections,
                Err(err) => {
                    log::warn!(
                        "{image_id}: detector failed on tile ({}, {}), treating as empty: {err:#}",
                        spec.grid_col,
                        spec.grid_row
                    );
                    Vec::new()
                }
            };
            let global = rescale::rescale_tile(&raw, spec.grid_col, spec.grid_row, grid.stride);
            results.insert(spec.grid_col, spec.grid_row, global);
        }

        // Stage 2: neighborhood deduplication sweep and row-major merge.
        let detections = dedup::merge_grid(&results, image.width(), image.height());

        // Stage 3: area statistics over the survivors.
        let areas = area::measure_image(
            image_id,
            &detections,
            self.config.ratio,
            self.config.well_area_px,
        );
        log::info!(
            "{image_id}: {} detections kept, {} µm² total",
            detections.len(),
            areas.physical_area
        );

        Ok(ImageSummary {
            image_id: image_id.to_string(),
            detections,
            areas,
        })
    }

    /// Loads one image file, runs the core pipeline, and writes the
    /// per-image artifacts (detection table and annotated image) into the
    /// output directory.
    pub fn process_file(&self, path: &Path) -> Result<ImageSummary> {
        let image_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("non-UTF8 image filename: {}", path.display()))?
            .to_string();
        let image = image::open(path)
            .with_context(|| format!("opening image {}", path.display()))?
            .to_rgb8();

        let summary = self.process_image(&image, &image_id)?;

        let table_path = report::detection_table_path(&self.config.out_dir, &image_id);
        report::write_detection_table(&table_path, &summary.detections)?;

        let grid = PatchGrid::new(image.width(), image.height(), self.patch_size)?;
        let annotated = annotate::render_annotations(&image, &grid, &summary.detections);
        let annotated_path = self.config.out_dir.join(&image_id);
        image::DynamicImage::ImageRgba8(annotated)
            .to_rgb8()
            .save(&annotated_path)
            .with_context(|| format!("saving annotated image {}", annotated_path.display()))?;

        Ok(summary)
    }
}
