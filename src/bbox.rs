//! Lead bounding boxes derived from signal amplitude.
//!
//! The box height is the largest absolute excursion of everything drawn in
//! the cell plus a margin on each side, floored at a minimum height and
//! clamped to the visible y-axis before conversion to pixels.

use crate::config::LayoutParameters;
use crate::layout::PageGeometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vertical sizing of lead boxes, in millivolts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxParams {
    pub margin: f64,
    pub min_height: f64,
}

impl From<&LayoutParameters> for BoxParams {
    fn from(params: &LayoutParameters) -> Self {
        Self {
            margin: params.bbox_vertical_margin_mv,
            min_height: params.min_bbox_height_mv,
        }
    }
}

/// Closed interval in plot-data millivolts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalSpan {
    pub low: f64,
    pub high: f64,
}

impl VerticalSpan {
    pub fn height(&self) -> f64 {
        self.high - self.low
    }
}

/// Largest `|sample|` over all arrays, ignoring NaN. `None` if nothing is finite.
pub fn max_deviation(arrays: &[&[f64]]) -> Option<f64> {
    arrays
        .iter()
        .flat_map(|a| a.iter())
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

/// Full box height for a given excursion.
pub fn box_height(max_deviation: f64, params: &BoxParams) -> f64 {
    (2.0 * (max_deviation + params.margin)).max(params.min_height)
}

/// Box span around `center`, clamped to `y_limits`.
///
/// A cell with no finite samples is treated as flat.
pub fn vertical_span(
    arrays: &[&[f64]],
    center: f64,
    params: &BoxParams,
    y_limits: (f64, f64),
) -> VerticalSpan {
    let deviation = max_deviation(arrays).unwrap_or_else(|| {
        log::debug!("No finite samples in cell at y={center:.3}, using flat box");
        0.0
    });
    let half = box_height(deviation, params) / 2.0;
    VerticalSpan {
        low: (center - half).max(y_limits.0),
        high: (center + half).min(y_limits.1),
    }
}

/// Four pixel corners stored as `[y, x]`, clockwise from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, [i32; 2]>", into = "BTreeMap<String, [i32; 2]>")]
pub struct BoundingBox {
    pub corners: [[i32; 2]; 4],
}

impl BoundingBox {
    /// Axis-aligned box from its pixel extremes.
    pub fn from_extents(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            corners: [[y_min, x_min], [y_min, x_max], [y_max, x_max], [y_max, x_min]],
        }
    }

    /// Box covering `x_range` (plot-data seconds) and `span`.
    ///
    /// Pixel positions are truncated toward zero.
    pub fn from_data(geometry: &PageGeometry, x_range: (f64, f64), span: VerticalSpan) -> Self {
        // Top of the span maps to the smaller image y
        let top_left = geometry.to_pixel(x_range.0, span.high);
        let bottom_right = geometry.to_pixel(x_range.1, span.low);
        Self::from_extents(
            top_left.x as i32,
            top_left.y as i32,
            bottom_right.x as i32,
            bottom_right.y as i32,
        )
    }

    pub fn x_min(&self) -> i32 {
        self.corners.iter().map(|c| c[1]).min().unwrap_or(0)
    }

    pub fn x_max(&self) -> i32 {
        self.corners.iter().map(|c| c[1]).max().unwrap_or(0)
    }

    pub fn y_min(&self) -> i32 {
        self.corners.iter().map(|c| c[0]).min().unwrap_or(0)
    }

    pub fn y_max(&self) -> i32 {
        self.corners.iter().map(|c| c[0]).max().unwrap_or(0)
    }

    pub fn width(&self) -> i32 {
        self.x_max() - self.x_min()
    }

    pub fn height(&self) -> i32 {
        self.y_max() - self.y_min()
    }
}

impl From<BoundingBox> for BTreeMap<String, [i32; 2]> {
    fn from(bbox: BoundingBox) -> Self {
        bbox.corners
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), *c))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, [i32; 2]>> for BoundingBox {
    type Error = String;

    fn try_from(map: BTreeMap<String, [i32; 2]>) -> Result<Self, Self::Error> {
        let mut corners = [[0; 2]; 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = *map
                .get(&i.to_string())
                .ok_or_else(|| format!("bounding box is missing corner {i}"))?;
        }
        Ok(Self { corners })
    }
}
