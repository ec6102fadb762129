//! Synthetic ECG page generation from WFDB recordings.
//!
//! A recording is cut into page-sized frames; each frame is drawn as a
//! realistic paper ECG and as a binary trace mask from one shared layout,
//! with per-lead bounding boxes written to a JSON annotation record.

pub mod annotation;
pub mod appearance;
pub mod atomic_write;
pub mod bbox;
pub mod config;
pub mod crop_pairs;
pub mod error;
pub mod generate;
pub mod layout;
pub mod recording;
pub mod render;
pub mod signal_window;
pub mod wfdb_read;
pub mod wfdb_write;
pub mod yolo_export;

pub use config::Config;
pub use error::{Result, SynthError};
pub use generate::{BatchSummary, ErrorPolicy, Generator, OutputOptions};
pub use recording::{Lead, Recording};
