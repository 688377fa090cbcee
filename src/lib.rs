// THEORY:
// This file is the main entry point for the `osteo_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the CLI binary).
//
// The primary goal is to export the `SlidePipeline` and its associated data
// structures (`RunConfig`, `ImageSummary`, `Detection`, etc.) as the clean,
// high-level interface for the entire tiled-inference engine. All the complex
// internal modules (`core_modules`) stay encapsulated behind it, providing a
// clean separation of concerns.

pub mod core_modules;
pub mod pipeline;
pub mod parallel_pipeline;

// Re-export key data structures for the public API.
pub use crate::core_modules::area::AreaRecord;
pub use crate::core_modules::detection::{
    BoundingBox, CoordFrame, Detection, MergedDetectionSet, TileResult,
};
pub use crate::core_modules::detector::{DetectorSettings, IntensityDetector, ObjectDetector};
pub use crate::core_modules::patch_grid::{GridError, PatchGrid, PatchSpec};
pub use crate::pipeline::{ConfigError, ImageSummary, RunConfig, SlidePipeline};
