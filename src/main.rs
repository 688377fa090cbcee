// CLI entry point: parses the run configuration, wires up the detector
// backend, and drives the parallel per-image pipeline over the input folder.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use osteo_vision::core_modules::detector::{DetectorSettings, IntensityDetector, ObjectDetector};
use osteo_vision::parallel_pipeline;
use osteo_vision::pipeline::{RunConfig, UM_PER_PIXEL_DEFAULT};

#[derive(Parser, Debug)]
#[command(
    name = "osteo_vision",
    about = "Overlap-tile osteoclast detection and area quantification for whole-slide microscopy scans."
)]
struct Args {
    /// Folder of input scans. Hidden files are ignored.
    #[arg(long, default_value = "img")]
    img_foldername: PathBuf,

    /// Folder for tables, reports, and annotated images. Must differ from
    /// the input folder; created when missing.
    #[arg(long, default_value = "out")]
    out_foldername: PathBuf,

    /// Detector model location, for model-backed detector builds.
    #[arg(long, default_value = "model.pt")]
    model_path: PathBuf,

    /// Calibration ratio of the scans, in µm per pixel.
    #[arg(long, default_value_t = UM_PER_PIXEL_DEFAULT)]
    ratio: f64,

    /// Compute device passed through to the detector backend.
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Total well area in pixels; 0 disables percent-of-well reporting.
    #[arg(long, default_value_t = 0)]
    total_well_area_in_pixels: u64,

    /// Confidence floor passed through to the detector backend.
    #[arg(long, default_value_t = 0.25)]
    confidence: f32,

    /// Per-patch detection cap passed through to the detector backend.
    #[arg(long, default_value_t = 30_000)]
    max_det: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = RunConfig {
        img_dir: args.img_foldername,
        out_dir: args.out_foldername,
        model_path: args.model_path,
        ratio: args.ratio,
        well_area_px: (args.total_well_area_in_pixels != 0)
            .then_some(args.total_well_area_in_pixels as f64),
        device: args.device,
    };
    // Abort on configuration errors before any image is touched.
    config.validate()?;

    if config.well_area_px.is_none() {
        log::info!(
            "no well area supplied; percent area will be reported as None \
             (set --total-well-area-in-pixels to enable it)"
        );
    }

    let detector: Arc<dyn ObjectDetector> = Arc::new(IntensityDetector::new(DetectorSettings {
        confidence_floor: args.confidence,
        max_detections: args.max_det,
        device: config.device.clone(),
    }));

    let summaries = parallel_pipeline::process_directory(config, detector).await?;

    let total_detections: usize = summaries.iter().map(|s| s.detections.len()).sum();
    log::info!(
        "run complete: {} images, {} detections",
        summaries.len(),
        total_detections
    );
    Ok(())
}
