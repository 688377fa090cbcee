// THEORY:
// The `report` module owns every text artifact the run produces:
//
// 1.  Per-image detection tables: one CSV file per image, a header row, then
//     one row per kept detection in merged order. The row layout is an
//     explicit serialization contract: the four box coordinates and the
//     objectness score, followed by the flattened outline polygon as an
//     `x, y, x, y, ...` sequence (always an even count; the class label
//     column is deliberately not written). An image with zero kept
//     detections gets a single human-readable sentinel line instead;
//     consumers must check for the sentinel before parsing rows.
// 2.  The shared per-well area report and detection-count log, one appended
//     line per image, accumulated across the whole run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core_modules::area::AreaRecord;
use crate::core_modules::detection::Detection;

/// Sentinel written as the entire table body when an image has no kept
/// detections.
pub const NO_DETECTIONS_SENTINEL: &str = "No osteoclasts detected";

/// Shared accumulating report files, created in the output directory.
pub const AREA_REPORT_FILENAME: &str = "ocl_area.txt";
pub const COUNT_REPORT_FILENAME: &str = "ocl_counts.txt";

const TABLE_HEADER: [&str; 10] = [
    "box_x1", "box_y1", "box_x2", "box_y2", "objectness_score", "mask_x1", "mask_y1", "mask_x2",
    "mask_y2", "...",
];

/// Table path for one image: the image filename with its extension swapped
/// for `.txt`, inside the output directory.
pub fn detection_table_path(out_dir: &Path, image_id: &str) -> PathBuf {
    out_dir.join(Path::new(image_id).with_extension("txt"))
}

/// Writes one image's detection table, or the sentinel line when the merged
/// set is empty.
pub fn write_detection_table(path: &Path, detections: &[Detection]) -> Result<()> {
    if detections.is_empty() {
        std::fs::write(path, NO_DETECTIONS_SENTINEL)
            .with_context(|| format!("writing sentinel table {}", path.display()))?;
        return Ok(());
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("creating detection table {}", path.display()))?;
    writer.write_record(TABLE_HEADER)?;

    for detection in detections {
        let mut record = vec![
            detection.bbox.x1.to_string(),
            detection.bbox.y1.to_string(),
            detection.bbox.x2.to_string(),
            detection.bbox.y2.to_string(),
            detection.score.to_string(),
        ];
        for (x, y) in &detection.polygon {
            record.push(x.to_string());
            record.push(y.to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Appends one image's line to the shared per-well area report:
/// `<image_id>:  Total area = <µm²>: % area = <percent|None>`.
pub fn append_area_line(path: &Path, record: &AreaRecord) -> Result<()> {
    let percent = record
        .percent_of_well
        .map(|p| p.to_string())
        .unwrap_or_else(|| "None".to_string());
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening area report {}", path.display()))?;
    writeln!(
        file,
        "{}:  Total area = {}: % area = {}",
        record.image_id, record.physical_area, percent
    )?;
    Ok(())
}

/// Appends one image's detection count to the shared count log.
pub fn append_count_line(path: &Path, image_id: &str, count: usize) -> Result<()> {
    let stem = Path::new(image_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_id);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening count log {}", path.display()))?;
    writeln!(file, "{stem}: {count}")?;
    Ok(())
}
