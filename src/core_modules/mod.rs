pub mod annotate;
pub mod area;
pub mod dedup;
pub mod detection;
pub mod detector;
pub mod patch_extract;
pub mod patch_grid;
pub mod report;
pub mod rescale;
pub mod result_grid;
