//! Paired realistic/mask crops for segmentation training.
//!
//! Each box cuts the same region out of a page and its mask; the two crops
//! are written under the same name into twin directories.

use crate::annotation::AnnotationRecord;
use crate::atomic_write;
use crate::error::{RenderError, Result, SynthError};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// A labelled pixel rectangle `(x1, y1)`..`(x2, y2)`, exclusive at the far edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropBox {
    pub label: String,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl CropBox {
    /// `(x, y, width, height)` inside a `width` x `height` image, `None` if
    /// nothing is left after clamping.
    fn clamped(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        let (x1, x2) = (clamp(self.x1, width), clamp(self.x2, width));
        let (y1, y2) = (clamp(self.y1, height), clamp(self.y2, height));
        (x2 > x1 && y2 > y1).then(|| (x1, y1, x2 - x1, y2 - y1))
    }
}

/// Lead boxes of a record as crop boxes; the rhythm strip is labelled `L`.
pub fn boxes_from_record(record: &AnnotationRecord) -> Vec<CropBox> {
    record
        .leads
        .iter()
        .filter_map(|lead| {
            let bbox = lead.lead_bounding_box.as_ref()?;
            Some(CropBox {
                label: if lead.rhythm_strip {
                    "L".to_string()
                } else {
                    lead.lead_name.clone()
                },
                x1: bbox.x_min(),
                y1: bbox.y_min(),
                x2: bbox.x_max(),
                y2: bbox.y_max(),
            })
        })
        .collect()
}

/// Crop `image` and `mask` by every box and write `<base>_<label>.png` into
/// each output directory. Returns the number of pairs written.
pub fn crop_pair(
    image: &DynamicImage,
    mask: &DynamicImage,
    boxes: &[CropBox],
    base: &str,
    image_out: &Path,
    mask_out: &Path,
) -> Result<usize> {
    let (width, height) = (image.width(), image.height());
    if (mask.width(), mask.height()) != (width, height) {
        return Err(RenderError::MaskSize {
            image: (width, height),
            mask: (mask.width(), mask.height()),
        }
        .into());
    }

    let mut written = 0;
    for b in boxes {
        let Some((x, y, w, h)) = b.clamped(width, height) else {
            log::debug!("{base}: box {} lies outside the image", b.label);
            continue;
        };
        let name = format!("{base}_{}.png", b.label);
        atomic_write::write_png(&image.crop_imm(x, y, w, h), &image_out.join(&name))?;
        atomic_write::write_png(&mask.crop_imm(x, y, w, h), &mask_out.join(&name))?;
        written += 1;
    }
    Ok(written)
}

/// Directories used by [`crop_dir`].
#[derive(Debug, Clone)]
pub struct CropDirs {
    pub image_dir: PathBuf,
    pub mask_dir: PathBuf,
    pub annotation_dir: PathBuf,
    pub image_output_dir: PathBuf,
    pub mask_output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropSummary {
    pub pages: usize,
    pub crops: usize,
    pub skipped: usize,
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| SynthError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Crop every page that has an annotation record, an image and a mask.
pub fn crop_dir(dirs: &CropDirs) -> Result<CropSummary> {
    for dir in [&dirs.image_output_dir, &dirs.mask_output_dir] {
        std::fs::create_dir_all(dir).map_err(|e| SynthError::io(dir, e))?;
    }
    let mut records: Vec<PathBuf> = std::fs::read_dir(&dirs.annotation_dir)
        .map_err(|e| SynthError::io(&dirs.annotation_dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    records.sort();

    let mut summary = CropSummary::default();
    for record_path in records {
        let Some(base) = record_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let image_path = dirs.image_dir.join(format!("{base}.png"));
        let mask_path = dirs.mask_dir.join(format!("{base}.png"));
        if !image_path.is_file() || !mask_path.is_file() {
            log::warn!("{base}: image or mask missing, skipping");
            summary.skipped += 1;
            continue;
        }
        let record = match AnnotationRecord::read(&record_path) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping {}: {e}", record_path.display());
                summary.skipped += 1;
                continue;
            }
        };
        let (image, mask) = match (open_image(&image_path), open_image(&mask_path)) {
            (Ok(image), Ok(mask)) => (image, mask),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("{base}: {e}, skipping");
                summary.skipped += 1;
                continue;
            }
        };
        summary.crops += crop_pair(
            &image,
            &mask,
            &boxes_from_record(&record),
            &base,
            &dirs.image_output_dir,
            &dirs.mask_output_dir,
        )?;
        summary.pages += 1;
    }
    log::info!(
        "Cropped {} pages into {} pairs ({} skipped)",
        summary.pages,
        summary.crops,
        summary.skipped
    );
    Ok(summary)
}
