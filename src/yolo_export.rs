//! Detector training labels from annotation records.
//!
//! Each lead box becomes one `class cx cy w h` line, normalised to the image
//! size, in a `.txt` file named after the record.

use crate::annotation::{AnnotationRecord, LeadAnnotation};
use crate::atomic_write;
use crate::bbox::BoundingBox;
use crate::error::{Result, SynthError};
use std::path::Path;

/// Class names by id; the rhythm strip is `L`.
pub const CLASS_NAMES: [&str; 13] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6", "L",
];

pub const RHYTHM_CLASS: usize = 12;

/// Records without a `rhythm_strip` marker: a lead II box wider than this
/// is taken to be the rhythm strip.
const RHYTHM_WIDTH_THRESHOLD: i32 = 1000;

/// Class of a lead entry, `None` for leads outside the class map.
pub fn class_id(lead: &LeadAnnotation, bbox: &BoundingBox) -> Option<usize> {
    if lead.rhythm_strip || (lead.lead_name == "II" && bbox.width() > RHYTHM_WIDTH_THRESHOLD) {
        return Some(RHYTHM_CLASS);
    }
    CLASS_NAMES[..RHYTHM_CLASS]
        .iter()
        .position(|name| *name == lead.lead_name)
}

/// Normalised `(cx, cy, w, h)` of a box on a `width` x `height` image.
pub fn to_yolo(bbox: &BoundingBox, width: u32, height: u32) -> (f64, f64, f64, f64) {
    let (w_img, h_img) = (width as f64, height as f64);
    let (w, h) = (bbox.width() as f64, bbox.height() as f64);
    (
        (bbox.x_min() as f64 + w / 2.0) / w_img,
        (bbox.y_min() as f64 + h / 2.0) / h_img,
        w / w_img,
        h / h_img,
    )
}

/// Label lines for one record; leads without a box or class are left out.
pub fn record_to_yolo_lines(record: &AnnotationRecord) -> Vec<String> {
    record
        .leads
        .iter()
        .filter_map(|lead| {
            let bbox = lead.lead_bounding_box.as_ref()?;
            let class = class_id(lead, bbox)?;
            let (cx, cy, w, h) = to_yolo(bbox, record.width, record.height);
            Some(format!("{class} {cx:.6} {cy:.6} {w:.6} {h:.6}"))
        })
        .collect()
}

/// Counts from [`export_dir`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub converted: usize,
    pub skipped: usize,
}

/// Convert every `.json` record in `data_dir` into a label file in
/// `output_dir`.
pub fn export_dir(data_dir: &Path, output_dir: &Path) -> Result<ExportSummary> {
    std::fs::create_dir_all(output_dir).map_err(|e| SynthError::io(output_dir, e))?;
    let mut json_files: Vec<_> = std::fs::read_dir(data_dir)
        .map_err(|e| SynthError::io(data_dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    json_files.sort();
    log::info!("Found {} annotation files in {}", json_files.len(), data_dir.display());

    let mut summary = ExportSummary::default();
    for path in json_files {
        let record = match AnnotationRecord::read(&path) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                summary.skipped += 1;
                continue;
            }
        };
        let Some(stem) = path.file_stem() else {
            continue;
        };
        let target = output_dir.join(format!("{}.txt", stem.to_string_lossy()));
        let lines = record_to_yolo_lines(&record);
        atomic_write::write_bytes(lines.join("\n").as_bytes(), &target)?;
        summary.converted += 1;
    }
    log::info!(
        "Wrote {} label files to {} ({} skipped)",
        summary.converted,
        output_dir.display(),
        summary.skipped
    );
    Ok(summary)
}
