//! Per-frame annotation records.
//!
//! A record is assembled with [`AnnotationBuilder`] right after a frame is
//! rendered, written to `<frame>.json`, and dropped.

use crate::atomic_write;
use crate::bbox::BoundingBox;
use crate::error::{Result, SynthError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One lead entry of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadAnnotation {
    pub lead_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_sample: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_sample: Option<usize>,
    /// Trace sample positions as `[y, x]` pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plotted_pixels: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rhythm_strip: bool,
}

impl LeadAnnotation {
    pub fn new(lead_name: impl Into<String>) -> Self {
        Self {
            lead_name: lead_name.into(),
            lead_bounding_box: None,
            text_bounding_box: None,
            start_sample: None,
            end_sample: None,
            plotted_pixels: None,
            rhythm_strip: false,
        }
    }
}

/// Appearance of the page, stored when `store_configs` is 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceFlags {
    pub dc_pulse: bool,
    pub bw: bool,
    pub gridlines: bool,
    pub printed_text: bool,
    pub number_of_columns_in_image: usize,
    pub full_mode_lead: String,
}

/// Geometry and metadata of one rendered frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub width: u32,
    pub height: u32,
    pub sampling_frequency: f64,
    pub x_grid: f64,
    pub y_grid: f64,
    pub resolution: u32,
    pub pad_inches: f64,
    #[serde(default)]
    pub leads: Vec<LeadAnnotation>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<AppearanceFlags>,
}

impl AnnotationRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the record atomically as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json().map_err(|source| SynthError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        atomic_write::write_bytes(json.as_bytes(), path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SynthError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| SynthError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Collects lead entries for one frame and produces an [`AnnotationRecord`].
#[derive(Debug, Clone)]
pub struct AnnotationBuilder {
    record: AnnotationRecord,
}

impl AnnotationBuilder {
    pub fn new(width: u32, height: u32, sampling_frequency: f64) -> Self {
        Self {
            record: AnnotationRecord {
                width,
                height,
                sampling_frequency,
                x_grid: 0.0,
                y_grid: 0.0,
                resolution: 0,
                pad_inches: 0.0,
                leads: Vec::new(),
                appearance: None,
            },
        }
    }

    /// Pixel pitch of one grid square, rounded to 3 decimals.
    pub fn grid_pitch(mut self, x_grid: f64, y_grid: f64) -> Self {
        self.record.x_grid = round3(x_grid);
        self.record.y_grid = round3(y_grid);
        self
    }

    pub fn resolution(mut self, dpi: u32, pad_inches: f64) -> Self {
        self.record.resolution = dpi;
        self.record.pad_inches = pad_inches;
        self
    }

    pub fn lead(mut self, lead: LeadAnnotation) -> Self {
        self.record.leads.push(lead);
        self
    }

    pub fn appearance(mut self, flags: Option<AppearanceFlags>) -> Self {
        self.record.appearance = flags;
        self
    }

    pub fn build(self) -> AnnotationRecord {
        self.record
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
