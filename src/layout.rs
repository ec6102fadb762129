//! Page geometry shared by the realistic and mask render passes.
//!
//! Three coordinate systems are involved:
//! - signal space: seconds from the start of a cell, millivolts about the
//!   cell's center line;
//! - plot-data space: seconds and millivolts across the whole page, origin
//!   bottom-left, `x` in `[0, x_max]` and `y` in `[0, y_max]`;
//! - pixel space: image coordinates, origin top-left, `y` pointing down.

use crate::config::LayoutParameters;

/// A 2D point; in pixel space `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 2D affine transform `[a, b, c, d, e, f]`:
///   | a c e |
///   | b d f |
///   | 0 0 1 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [f64; 6]);

impl Affine {
    pub const IDENTITY: Affine = Affine([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn scale(sx: f64, sy: f64) -> Self {
        Affine([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Affine([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self` applied first, then `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        let (m1, m2) = (&next.0, &self.0);
        Affine([
            m1[0] * m2[0] + m1[2] * m2[1],
            m1[1] * m2[0] + m1[3] * m2[1],
            m1[0] * m2[2] + m1[2] * m2[3],
            m1[1] * m2[2] + m1[3] * m2[3],
            m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
            m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> Point {
        let m = &self.0;
        Point {
            x: m[0] * x + m[2] * y + m[4],
            y: m[1] * x + m[3] * y + m[5],
        }
    }
}

/// Horizontal gaps are floored to this many seconds.
const GAP_QUANTUM: f64 = 0.2;

/// Placement of one lead cell in plot-data space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
    /// Left edge of the cell's drawing, before any calibration-pulse shift
    pub x_start: f64,
    /// Zero-millivolt line of the cell
    pub y_center: f64,
}

/// Geometry of one page, computed once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub dpi: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Page width in plot-data seconds
    pub x_max: f64,
    /// Page height in plot-data millivolts
    pub y_max: f64,
    pub row_height: f64,
    /// Left margin that centers the used columns
    pub x_gap: f64,
    pub lead_count: usize,
    pub columns: usize,
    /// Rows of lead cells, not counting the rhythm strip
    pub lead_rows: usize,
    /// Lead rows plus the rhythm row, if any
    pub rows: usize,
    pub has_rhythm: bool,
    pub lead_seconds: f64,
    /// Pixels per major grid square horizontally
    pub x_grid_px: f64,
    /// Pixels per major grid square vertically
    pub y_grid_px: f64,
    data_to_pixel: Affine,
}

impl PageGeometry {
    pub fn compute(
        params: &LayoutParameters,
        dpi: u32,
        lead_count: usize,
        columns: usize,
        lead_seconds: f64,
        has_rhythm: bool,
    ) -> Self {
        let columns = columns.max(1);
        let lead_rows = lead_count.div_ceil(columns);
        let rows = lead_rows + usize::from(has_rhythm);

        let y_max = params.height * params.y_grid_size / params.y_grid_inch;
        let x_max = params.width * params.x_grid_size / params.x_grid_inch;
        // One spare row above and below the cells
        let row_height = y_max / (rows + 2) as f64;
        let used = columns as f64 * lead_seconds;
        let x_gap = (((x_max - used) / 2.0) / GAP_QUANTUM).floor() * GAP_QUANTUM;

        let width_px = params.width * dpi as f64;
        let height_px = params.height * dpi as f64;
        // Plot data -> display (origin bottom-left) -> image (origin top-left)
        let data_to_pixel = Affine::scale(width_px / x_max, height_px / y_max)
            .then(&Affine([1.0, 0.0, 0.0, -1.0, 0.0, height_px]));

        Self {
            dpi,
            canvas_width: width_px.round() as u32,
            canvas_height: height_px.round() as u32,
            x_max,
            y_max,
            row_height,
            x_gap,
            lead_count,
            columns,
            lead_rows,
            rows,
            has_rhythm,
            lead_seconds,
            x_grid_px: params.x_grid_inch * dpi as f64,
            y_grid_px: params.y_grid_inch * dpi as f64,
            data_to_pixel,
        }
    }

    /// Center line of `row`, counting from the top.
    pub fn row_center(&self, row: usize) -> f64 {
        (self.rows as f64 - row as f64 - 0.5) * self.row_height
    }

    /// Cell of the lead at layout position `index`.
    pub fn lead_cell(&self, index: usize) -> Cell {
        let row = index / self.columns;
        let column = index % self.columns;
        Cell {
            row,
            column,
            x_start: column as f64 * self.lead_seconds + self.x_gap,
            y_center: self.row_center(row),
        }
    }

    /// Full-width cell below the lead rows.
    pub fn rhythm_cell(&self) -> Option<Cell> {
        self.has_rhythm.then(|| Cell {
            row: self.lead_rows,
            column: 0,
            x_start: self.x_gap,
            y_center: self.row_center(self.lead_rows),
        })
    }

    /// Visible y-axis range in plot-data units.
    pub fn y_limits(&self) -> (f64, f64) {
        (0.0, self.y_max)
    }

    /// Plot-data point to pixel space.
    pub fn to_pixel(&self, x: f64, y: f64) -> Point {
        self.data_to_pixel.apply(x, y)
    }

    /// Stroke width in points to pixels.
    pub fn points_to_px(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }
}
