//! Error taxonomy for the synthesis pipeline.
//!
//! Input errors are recoverable per record, configuration errors are fatal
//! for the invocation, render errors flag internal contract violations, and
//! I/O failures are handed back to whoever drives the batch.

use std::path::PathBuf;

/// Invalid or unusable run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("`{key}` must be positive, got {value}")]
    NonPositive { key: &'static str, value: f64 },

    #[error("`{key}` must be a probability in [0, 1], got {value}")]
    Probability { key: &'static str, value: f64 },

    #[error("Unknown colour set `colour{index}` (available: {available})")]
    UnknownColourSet { index: u32, available: String },

    #[error("Colour set `{set}` has a component outside [0, 1]: {value}")]
    ColourRange { set: String, value: f64 },

    #[error("`{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Malformed or missing waveform record.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed header {path}: {reason}")]
    Header { path: PathBuf, reason: String },

    #[error("Unsupported WFDB storage format {format} in {path}")]
    UnsupportedFormat { path: PathBuf, format: u32 },

    #[error("Bad signal file {path}: {reason}")]
    Signal { path: PathBuf, reason: String },

    #[error("Record `{0}` has no leads")]
    NoLeads(String),

    #[error("Record `{name}` has invalid sampling rate {rate}")]
    SampleRate { name: String, rate: f64 },

    #[error("No WFDB records found under {0}")]
    NoRecords(PathBuf),
}

/// Violation of the renderer's own contracts.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Frame has {found} lead segments but the page layout has {expected} cells")]
    LayoutMismatch { expected: usize, found: usize },

    #[error("Failed to load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("Image and mask sizes differ: {image:?} vs {mask:?}")]
    MaskSize { image: (u32, u32), mask: (u32, u32) },
}

/// Umbrella error for library operations.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SynthError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SynthError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that only concern the current input record.
    pub fn is_input_error(&self) -> bool {
        matches!(self, SynthError::Input(_))
    }
}

pub type Result<T, E = SynthError> = std::result::Result<T, E>;
