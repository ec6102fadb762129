//! Whole-file writes: the target either holds the complete output or is
//! left untouched.

use crate::error::{Result, SynthError};
use image::{DynamicImage, ImageFormat};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn temp_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).map_err(|e| SynthError::io(dir, e))
}

fn persist(file: NamedTempFile, path: &Path) -> Result<()> {
    file.persist(path)
        .map(|_| ())
        .map_err(|e| SynthError::io(path, e.error))
}

pub fn write_bytes(bytes: &[u8], path: &Path) -> Result<()> {
    let mut file = temp_beside(path)?;
    file.write_all(bytes).map_err(|e| SynthError::io(path, e))?;
    persist(file, path)
}

/// Encode `image` as PNG at `path`.
pub fn write_png(image: &DynamicImage, path: &Path) -> Result<()> {
    let mut file = temp_beside(path)?;
    image
        .write_to(file.as_file_mut(), ImageFormat::Png)
        .map_err(|source| SynthError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    persist(file, path)
}
