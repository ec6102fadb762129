//! Run configuration, loaded once from YAML and passed by reference.
//!
//! Defaults follow a US-letter page of standard ECG paper at 25 mm/s and
//! 10 mm/mV. `paper_len` and `abs_lead_step` have no default and must be
//! present in the file.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Paper geometry, stroke widths and bounding-box tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParameters {
    /// Page width in inches
    pub width: f64,
    /// Page height in inches
    pub height: f64,
    /// Millivolts per major grid square
    pub y_grid_size: f64,
    /// Seconds per major grid square
    pub x_grid_size: f64,
    /// Inches per major grid square, vertically
    pub y_grid_inch: f64,
    /// Inches per major grid square, horizontally
    pub x_grid_inch: f64,
    /// Lead label font size in points
    pub lead_fontsize: f64,
    /// Trace stroke width in points
    pub line_width: f64,
    /// Calibration pulse duration in seconds
    pub dc_offset_length: f64,
    /// Floor for a lead box's full height, in millivolts
    pub min_bbox_height_mv: f64,
    /// Added above and below the signal's largest excursion, in millivolts
    pub bbox_vertical_margin_mv: f64,
    /// Major grid stroke width in points
    pub grid_line_width: f64,
}

impl Default for LayoutParameters {
    fn default() -> Self {
        Self {
            width: 11.0,
            height: 8.5,
            y_grid_size: 0.5,
            x_grid_size: 0.2,
            y_grid_inch: 5.0 / 25.4,
            x_grid_inch: 5.0 / 25.4,
            lead_fontsize: 11.0,
            line_width: 0.75,
            dc_offset_length: 0.2,
            min_bbox_height_mv: 2.0,
            bbox_vertical_margin_mv: 0.1,
            grid_line_width: 0.5,
        }
    }
}

/// Major/minor grid colours as RGB fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColourSet {
    pub major: [f64; 3],
    pub minor: [f64; 3],
}

impl Default for ColourSet {
    fn default() -> Self {
        Self {
            major: [1.0, 0.0, 0.0],
            minor: [0.996, 0.8745, 0.8588],
        }
    }
}

impl ColourSet {
    /// Grayscale grid used for black-and-white pages.
    pub fn grayscale() -> Self {
        Self {
            major: [0.4, 0.4, 0.4],
            minor: [0.75, 0.75, 0.75],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColourConfig {
    /// Keyed `colour1`..`colourN`
    pub standard_sets: BTreeMap<String, ColourSet>,
}

impl Default for ColourConfig {
    fn default() -> Self {
        let mut standard_sets = BTreeMap::new();
        standard_sets.insert("colour5".to_string(), ColourSet::default());
        Self { standard_sets }
    }
}

/// Per-frame Bernoulli probabilities for randomised page features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub calibration_pulse: f64,
    pub grid_present: f64,
    pub print_header: f64,
    pub bw: f64,
    pub seed: Option<u64>,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            calibration_pulse: 1.0,
            grid_present: 1.0,
            print_header: 0.0,
            bw: 0.0,
            seed: None,
        }
    }
}

fn default_rhythm_strip_len() -> f64 {
    10.0
}

fn default_full_mode() -> String {
    "II".to_string()
}

fn default_resolution() -> u32 {
    100
}

fn default_standard_colours() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// Validated run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Explicit column count; see [`Config::columns_for`]
    #[serde(default)]
    pub columns: Option<usize>,
    /// Seconds of signal shown across all columns of one row
    pub paper_len: f64,
    /// Seconds the window start advances between frames
    pub abs_lead_step: f64,
    #[serde(default = "default_rhythm_strip_len")]
    pub rhythm_strip_len_seconds: f64,
    /// Rhythm-strip lead, or `"None"`
    #[serde(default = "default_full_mode")]
    pub full_mode: String,
    #[serde(default)]
    pub desired_order: Option<Vec<String>>,
    /// Dots per inch
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default)]
    pub pad_inches: f64,
    #[serde(default = "default_standard_colours")]
    pub standard_colours: u32,
    #[serde(default = "default_true")]
    pub bbox: bool,
    #[serde(default = "default_true")]
    pub lead_names: bool,
    #[serde(default = "default_true")]
    pub store_text_bbox: bool,
    /// 0: no record, 1: record, 2: record plus appearance flags
    #[serde(default)]
    pub store_configs: u8,
    #[serde(default)]
    pub store_plotted_pixels: bool,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default)]
    pub write_frame_signals: bool,
    #[serde(default)]
    pub layout_parameters: LayoutParameters,
    #[serde(default)]
    pub colors: ColourConfig,
    #[serde(default)]
    pub appearance: AppearanceConfig,

    #[serde(skip)]
    grid_colours: ColourSet,
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        positive("paper_len", self.paper_len)?;
        positive("abs_lead_step", self.abs_lead_step)?;
        positive("rhythm_strip_len_seconds", self.rhythm_strip_len_seconds)?;
        positive("resolution", self.resolution as f64)?;
        if let Some(columns) = self.columns {
            if columns == 0 {
                return Err(ConfigError::Invalid {
                    key: "columns",
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if self.pad_inches < 0.0 {
            return Err(ConfigError::Invalid {
                key: "pad_inches",
                reason: format!("must not be negative, got {}", self.pad_inches),
            });
        }
        if self.store_configs > 2 {
            return Err(ConfigError::Invalid {
                key: "store_configs",
                reason: format!("expected 0, 1 or 2, got {}", self.store_configs),
            });
        }

        let lp = &self.layout_parameters;
        positive("layout_parameters.width", lp.width)?;
        positive("layout_parameters.height", lp.height)?;
        positive("layout_parameters.y_grid_size", lp.y_grid_size)?;
        positive("layout_parameters.x_grid_size", lp.x_grid_size)?;
        positive("layout_parameters.y_grid_inch", lp.y_grid_inch)?;
        positive("layout_parameters.x_grid_inch", lp.x_grid_inch)?;
        positive("layout_parameters.lead_fontsize", lp.lead_fontsize)?;
        positive("layout_parameters.line_width", lp.line_width)?;
        positive("layout_parameters.dc_offset_length", lp.dc_offset_length)?;
        positive("layout_parameters.min_bbox_height_mv", lp.min_bbox_height_mv)?;
        positive("layout_parameters.grid_line_width", lp.grid_line_width)?;
        if lp.bbox_vertical_margin_mv < 0.0 {
            return Err(ConfigError::Invalid {
                key: "layout_parameters.bbox_vertical_margin_mv",
                reason: format!("must not be negative, got {}", lp.bbox_vertical_margin_mv),
            });
        }

        let ap = &self.appearance;
        probability("appearance.calibration_pulse", ap.calibration_pulse)?;
        probability("appearance.grid_present", ap.grid_present)?;
        probability("appearance.print_header", ap.print_header)?;
        probability("appearance.bw", ap.bw)?;

        for (name, set) in &self.colors.standard_sets {
            for value in set.major.iter().chain(set.minor.iter()) {
                if !(0.0..=1.0).contains(value) {
                    return Err(ConfigError::ColourRange {
                        set: name.clone(),
                        value: *value,
                    });
                }
            }
        }
        let key = format!("colour{}", self.standard_colours);
        self.grid_colours = *self.colors.standard_sets.get(&key).ok_or_else(|| {
            ConfigError::UnknownColourSet {
                index: self.standard_colours,
                available: self
                    .colors
                    .standard_sets
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;

        Ok(self)
    }

    /// Colours of the selected `colourN` set.
    pub fn grid_colours(&self) -> &ColourSet {
        &self.grid_colours
    }

    /// Column count for a recording with `lead_count` leads.
    ///
    /// An explicit `columns` always wins; otherwise two-lead recordings use
    /// a single column and everything else uses four.
    pub fn columns_for(&self, lead_count: usize) -> usize {
        match self.columns {
            Some(columns) => columns,
            None if lead_count == 2 => 1,
            None => 4,
        }
    }

    /// Seconds of signal in one lead cell.
    pub fn lead_length_seconds(&self, columns: usize) -> f64 {
        self.paper_len / columns as f64
    }

    /// Requested rhythm-strip lead, `None` when disabled.
    pub fn rhythm_lead(&self) -> Option<&str> {
        match self.full_mode.as_str() {
            "" | "None" | "none" => None,
            lead => Some(lead),
        }
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { key, value })
    }
}

fn probability(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml_str("paper_len: 10.0\nabs_lead_step: 2.5\n").unwrap();
        assert_eq!(config.columns_for(12), 4);
        assert_eq!(config.columns_for(2), 1);
        assert_eq!(config.resolution, 100);
        assert_eq!(config.rhythm_lead(), Some("II"));
        assert_eq!(config.layout_parameters, LayoutParameters::default());
        assert_eq!(*config.grid_colours(), ColourSet::default());
        assert_eq!(config.lead_length_seconds(4), 2.5);
    }

    #[test]
    fn test_missing_required_key_fails() {
        let err = Config::from_yaml_str("abs_lead_step: 2.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("paper_len"));
    }

    #[test]
    fn test_unknown_colour_set_is_fatal() {
        let yaml = r#"
paper_len: 10.0
abs_lead_step: 10.0
standard_colours: 3
colors:
  standard_sets:
    colour1:
      major: [0.0, 0.0, 1.0]
      minor: [0.8, 0.8, 1.0]
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        match err {
            ConfigError::UnknownColourSet { index, available } => {
                assert_eq!(index, 3);
                assert_eq!(available, "colour1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_selected_colour_set() {
        let yaml = r#"
paper_len: 10.0
abs_lead_step: 10.0
standard_colours: 1
colors:
  standard_sets:
    colour1:
      major: [0.0, 0.0, 1.0]
      minor: [0.8, 0.8, 1.0]
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.grid_colours().major, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_yaml_str("paper_len: 0.0\nabs_lead_step: 1.0\n"),
            Err(ConfigError::NonPositive { key: "paper_len", .. })
        ));
        assert!(matches!(
            Config::from_yaml_str("paper_len: 10.0\nabs_lead_step: 1.0\ncolumns: 0\n"),
            Err(ConfigError::Invalid { key: "columns", .. })
        ));
        assert!(matches!(
            Config::from_yaml_str(
                "paper_len: 10.0\nabs_lead_step: 1.0\nappearance:\n  bw: 1.5\n"
            ),
            Err(ConfigError::Probability { .. })
        ));
    }

    #[test]
    fn test_full_mode_none_disables_rhythm() {
        let config =
            Config::from_yaml_str("paper_len: 10.0\nabs_lead_step: 10.0\nfull_mode: None\n")
                .unwrap();
        assert_eq!(config.rhythm_lead(), None);
    }

    #[test]
    fn test_bundled_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.store_configs, 2);
        assert_eq!(config.desired_order.as_ref().map(Vec::len), Some(12));
        assert_eq!(*config.grid_colours(), ColourSet::default());
    }

    #[test]
    fn test_layout_parameters_partial_override() {
        let yaml = r#"
paper_len: 10.0
abs_lead_step: 10.0
layout_parameters:
  min_bbox_height_mv: 1.0
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.layout_parameters.min_bbox_height_mv, 1.0);
        assert_eq!(config.layout_parameters.width, 11.0);
    }
}
