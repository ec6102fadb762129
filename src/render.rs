//! Dual-mode page rendering.
//!
//! [`plan_page`] turns a frame and its [`PageGeometry`] into pixel-space
//! paths once. [`render_realistic`] and [`render_mask`] both draw from that
//! same [`PagePlan`], so the mask's white pixels are exactly where the
//! realistic page has its trace.

use crate::annotation::LeadAnnotation;
use crate::appearance::AppearanceDecision;
use crate::bbox::{self, BoundingBox, BoxParams};
use crate::config::{ColourSet, LayoutParameters};
use crate::error::RenderError;
use crate::layout::{Cell, PageGeometry, Point};
use crate::signal_window::{Frame, LeadSegment};
use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size, Canvas};
use std::path::{Path, PathBuf};

/// Stroke width of calibration pulses and column ticks, in points.
const MARKER_WIDTH_PT: f64 = 1.5;
/// Minor grid stroke width, in points.
const MINOR_GRID_WIDTH_PT: f64 = 0.4;
/// Half height of the tick between columns, in millivolts.
const TICK_HALF_HEIGHT: f64 = 0.4;
/// Lead label offset from the cell origin, in seconds and millivolts.
const LABEL_OFFSET: (f64, f64) = (0.1, -0.7);
/// Minor grid lines per major square.
const MINOR_DIVISIONS: usize = 5;

const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
const BUNDLED_FONT_NAME: &str = "assets/fonts/DejaVuSans.ttf";

const INK: Rgb<u8> = Rgb([0, 0, 0]);
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

/// Font used for lead names and printed text.
pub struct LabelFont {
    font: FontVec,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self { font })
    }

    /// DejaVu Sans, shipped with the crate.
    pub fn bundled() -> Result<Self, RenderError> {
        let font = FontVec::try_from_vec(BUNDLED_FONT.to_vec()).map_err(|e| RenderError::Font {
            path: PathBuf::from(BUNDLED_FONT_NAME),
            reason: e.to_string(),
        })?;
        Ok(Self { font })
    }
}

/// Pixel-space drawing of one lead cell.
#[derive(Debug, Clone)]
pub struct CellPlan<'a> {
    pub segment: LeadSegment<'a>,
    pub cell: Cell,
    pub is_rhythm: bool,
    /// Trace polylines, split wherever a sample is missing
    pub trace: Vec<Vec<Point>>,
    pub pulse: Option<Vec<Point>>,
    pub tick: Option<(Point, Point)>,
    /// Baseline-left anchor of the lead label
    pub label_anchor: Point,
    pub bbox: BoundingBox,
}

/// Everything both render passes need for one frame.
#[derive(Debug, Clone)]
pub struct PagePlan<'a> {
    pub geometry: PageGeometry,
    pub appearance: AppearanceDecision,
    pub cells: Vec<CellPlan<'a>>,
    pub trace_width_px: f64,
    pub marker_width_px: f64,
}

struct Planner<'g> {
    geometry: &'g PageGeometry,
    step: f64,
    shift: f64,
    pulse: Vec<f64>,
    box_params: BoxParams,
}

impl Planner<'_> {
    fn cell<'a>(&self, segment: LeadSegment<'a>, cell: Cell, is_rhythm: bool) -> CellPlan<'a> {
        let g = self.geometry;
        let with_pulse = !self.pulse.is_empty() && cell.column == 0;
        let x_from = cell.x_start + self.shift;
        let drawn_seconds = segment.samples.len() as f64 * self.step;
        let x_to = if is_rhythm {
            x_from + drawn_seconds
        } else {
            x_from + g.lead_seconds
        };

        let trace = trace_runs(g, segment.samples, x_from, cell.y_center, self.step);
        let pulse: Option<Vec<Point>> = with_pulse.then(|| {
            self.pulse
                .iter()
                .enumerate()
                .map(|(k, v)| g.to_pixel(cell.x_start + k as f64 * self.step, cell.y_center + v))
                .collect()
        });
        let tick = (!is_rhythm && g.columns > 1 && cell.column < g.columns - 1).then(|| {
            let x = x_from + drawn_seconds;
            (
                g.to_pixel(x, cell.y_center - TICK_HALF_HEIGHT),
                g.to_pixel(x, cell.y_center + TICK_HALF_HEIGHT),
            )
        });

        let pulse_samples: &[f64] = if with_pulse { &self.pulse } else { &[] };
        let span = bbox::vertical_span(
            &[pulse_samples, segment.samples],
            cell.y_center,
            &self.box_params,
            g.y_limits(),
        );

        CellPlan {
            segment,
            cell,
            is_rhythm,
            trace,
            pulse,
            tick,
            label_anchor: g.to_pixel(
                cell.x_start + LABEL_OFFSET.0,
                cell.y_center + LABEL_OFFSET.1,
            ),
            bbox: BoundingBox::from_data(g, (x_from, x_to), span),
        }
    }
}

/// Lay out a frame in pixel space.
///
/// Returns `Ok(None)` for a frame with nothing to draw.
pub fn plan_page<'a>(
    frame: &Frame<'a>,
    geometry: PageGeometry,
    params: &LayoutParameters,
    sample_rate: f64,
    appearance: AppearanceDecision,
) -> Result<Option<PagePlan<'a>>, RenderError> {
    if frame.is_empty() {
        return Ok(None);
    }
    if frame.leads.len() != geometry.lead_count || frame.rhythm.is_some() != geometry.has_rhythm {
        return Err(RenderError::LayoutMismatch {
            expected: geometry.lead_count + usize::from(geometry.has_rhythm),
            found: frame.leads.len() + usize::from(frame.rhythm.is_some()),
        });
    }

    let step = 1.0 / sample_rate;
    let planner = Planner {
        geometry: &geometry,
        step,
        shift: if appearance.dc_pulse {
            params.dc_offset_length
        } else {
            0.0
        },
        pulse: if appearance.dc_pulse {
            calibration_pulse(params.dc_offset_length, sample_rate)
        } else {
            Vec::new()
        },
        box_params: BoxParams::from(params),
    };

    let mut cells: Vec<CellPlan<'a>> = frame
        .leads
        .iter()
        .enumerate()
        .map(|(i, segment)| planner.cell(*segment, geometry.lead_cell(i), false))
        .collect();
    if let (Some(segment), Some(cell)) = (frame.rhythm, geometry.rhythm_cell()) {
        cells.push(planner.cell(segment, cell, true));
    }

    let trace_width_px = geometry.points_to_px(params.line_width);
    let marker_width_px = geometry.points_to_px(MARKER_WIDTH_PT);
    Ok(Some(PagePlan {
        geometry,
        appearance,
        cells,
        trace_width_px,
        marker_width_px,
    }))
}

/// Unit step sampled at `sample_rate`, zero for its first and last two samples.
pub fn calibration_pulse(duration: f64, sample_rate: f64) -> Vec<f64> {
    let n = (duration * sample_rate - 1e-9).ceil().max(0.0) as usize;
    (0..n)
        .map(|k| if k < 2 || k + 2 >= n { 0.0 } else { 1.0 })
        .collect()
}

fn trace_runs(g: &PageGeometry, samples: &[f64], x_from: f64, y_center: f64, step: f64) -> Vec<Vec<Point>> {
    let mut runs = Vec::new();
    let mut run = Vec::new();
    for (k, v) in samples.iter().enumerate() {
        if v.is_finite() {
            run.push(g.to_pixel(x_from + k as f64 * step, y_center + v));
        } else if !run.is_empty() {
            runs.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }
    runs
}

impl PagePlan<'_> {
    /// Lead entries for the annotation record, one per cell.
    ///
    /// `text_boxes` lines up with `cells`; pass an empty slice to omit them.
    pub fn lead_annotations(
        &self,
        text_boxes: &[Option<BoundingBox>],
        with_boxes: bool,
        with_plotted_pixels: bool,
    ) -> Vec<LeadAnnotation> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let mut lead = LeadAnnotation::new(cell.segment.name);
                lead.lead_bounding_box = with_boxes.then_some(cell.bbox);
                lead.text_bounding_box = text_boxes.get(i).copied().flatten();
                lead.start_sample = Some(cell.segment.start_sample);
                lead.end_sample = Some(cell.segment.end_sample());
                lead.rhythm_strip = cell.is_rhythm;
                if with_plotted_pixels {
                    lead.plotted_pixels = Some(
                        cell.trace
                            .iter()
                            .flatten()
                            .map(|p| [round2(p.y), round2(p.x)])
                            .collect(),
                    );
                }
                lead
            })
            .collect()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Realistic-page options that do not affect geometry.
pub struct PageStyle<'f> {
    pub grid_colours: ColourSet,
    pub show_lead_names: bool,
    pub font: Option<&'f LabelFont>,
    pub font_size_pt: f64,
    pub grid_line_width_pt: f64,
    pub x_grid_size: f64,
    pub y_grid_size: f64,
    /// Printed header line, drawn when the frame's appearance asks for it
    pub header: Option<String>,
}

/// A rendered realistic page with the label boxes it drew.
pub struct RealisticPage {
    pub image: RgbImage,
    /// One entry per plan cell; `None` where no label was drawn
    pub text_boxes: Vec<Option<BoundingBox>>,
}

/// Draw the realistic ECG page: grid, pulses, traces, ticks and text.
pub fn render_realistic(plan: &PagePlan<'_>, style: &PageStyle<'_>) -> RealisticPage {
    let g = &plan.geometry;
    let mut image = RgbImage::from_pixel(g.canvas_width, g.canvas_height, PAPER);

    if plan.appearance.grid {
        let colours = if plan.appearance.bw {
            ColourSet::grayscale()
        } else {
            style.grid_colours
        };
        draw_grid(&mut image, g, style, &colours);
    }

    for cell in &plan.cells {
        if let Some(pulse) = &cell.pulse {
            stroke_polyline(&mut image, pulse, plan.marker_width_px, INK);
        }
        for run in &cell.trace {
            stroke_polyline(&mut image, run, plan.trace_width_px, INK);
        }
        if let Some((a, b)) = cell.tick {
            stroke_segment(&mut image, a, b, plan.marker_width_px, INK);
        }
    }

    let mut text_boxes = vec![None; plan.cells.len()];
    if let Some(font) = style.font {
        let scale = PxScale::from(g.points_to_px(style.font_size_pt) as f32);
        if style.show_lead_names {
            for (slot, cell) in text_boxes.iter_mut().zip(&plan.cells) {
                *slot = Some(draw_label(&mut image, font, scale, cell.label_anchor, cell.segment.name));
            }
        }
        draw_label(&mut image, font, scale, g.to_pixel(2.0, 0.5), "25mm/s");
        draw_label(&mut image, font, scale, g.to_pixel(4.0, 0.5), "10mm/mV");
        if plan.appearance.printed_text {
            if let Some(header) = &style.header {
                let anchor = g.to_pixel(g.x_gap, g.y_max - 0.5 * g.row_height);
                draw_label(&mut image, font, scale, anchor, header);
            }
        }
    }

    RealisticPage { image, text_boxes }
}

/// Draw only the traces, white on black.
pub fn render_mask(plan: &PagePlan<'_>) -> GrayImage {
    let g = &plan.geometry;
    let mut image = GrayImage::new(g.canvas_width, g.canvas_height);
    for cell in &plan.cells {
        for run in &cell.trace {
            stroke_polyline(&mut image, run, plan.trace_width_px, Luma([255]));
        }
    }
    image
}

fn draw_label(image: &mut RgbImage, font: &LabelFont, scale: PxScale, anchor: Point, text: &str) -> BoundingBox {
    let (w, h) = text_size(scale, &font.font, text);
    let x = anchor.x.round() as i32;
    let baseline = anchor.y.round() as i32;
    let top = baseline - h as i32;
    draw_text_mut(image, INK, x, top, scale, &font.font, text);
    BoundingBox::from_extents(x, top, x + w as i32, baseline)
}

fn draw_grid(image: &mut RgbImage, g: &PageGeometry, style: &PageStyle<'_>, colours: &ColourSet) {
    let minor = to_rgb(colours.minor);
    let major = to_rgb(colours.major);
    let minor_w = g.points_to_px(MINOR_GRID_WIDTH_PT);
    let major_w = g.points_to_px(style.grid_line_width_pt);

    let x_lines = grid_positions(g.x_max, style.x_grid_size);
    let y_lines = grid_positions(g.y_max, style.y_grid_size);

    for &(x, _) in x_lines.iter().filter(|l| !l.1) {
        vertical_line(image, g.to_pixel(x, 0.0).x, minor_w, minor, true);
    }
    for &(y, _) in y_lines.iter().filter(|l| !l.1) {
        horizontal_line(image, g.to_pixel(0.0, y).y, minor_w, minor, true);
    }
    for &(x, _) in x_lines.iter().filter(|l| l.1) {
        vertical_line(image, g.to_pixel(x, 0.0).x, major_w, major, false);
    }
    for &(y, _) in y_lines.iter().filter(|l| l.1) {
        horizontal_line(image, g.to_pixel(0.0, y).y, major_w, major, false);
    }
}

/// Grid line positions in `[0, max)`, flagged major or minor.
fn grid_positions(max: f64, major_step: f64) -> Vec<(f64, bool)> {
    let minor_step = major_step / MINOR_DIVISIONS as f64;
    (0..)
        .map(|k: usize| (k as f64 * minor_step, k % MINOR_DIVISIONS == 0))
        .take_while(|(pos, _)| *pos < max)
        .collect()
}

fn line_span(center: f64, width_px: f64) -> std::ops::Range<i64> {
    let w = width_px.round().max(1.0) as i64;
    let first = (center - (w as f64 - 1.0) / 2.0).round() as i64;
    first..first + w
}

fn vertical_line(image: &mut RgbImage, x: f64, width_px: f64, colour: Rgb<u8>, dotted: bool) {
    let (w, h) = image.dimensions();
    for col in line_span(x, width_px) {
        if col < 0 || col >= w as i64 {
            continue;
        }
        for row in 0..h {
            if !dotted || (row / 2) % 2 == 0 {
                image.put_pixel(col as u32, row, colour);
            }
        }
    }
}

fn horizontal_line(image: &mut RgbImage, y: f64, width_px: f64, colour: Rgb<u8>, dotted: bool) {
    let (w, h) = image.dimensions();
    for row in line_span(y, width_px) {
        if row < 0 || row >= h as i64 {
            continue;
        }
        for col in 0..w {
            if !dotted || (col / 2) % 2 == 0 {
                image.put_pixel(col, row as u32, colour);
            }
        }
    }
}

fn to_rgb(c: [f64; 3]) -> Rgb<u8> {
    Rgb(c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
}

fn stroke_polyline<C: Canvas>(canvas: &mut C, points: &[Point], width_px: f64, colour: C::Pixel) {
    match points {
        [] => {}
        [single] => stroke_segment(canvas, *single, *single, width_px, colour),
        _ => {
            for pair in points.windows(2) {
                stroke_segment(canvas, pair[0], pair[1], width_px, colour);
            }
        }
    }
}

/// Thick line as parallel one-pixel passes along the segment normal.
fn stroke_segment<C: Canvas>(canvas: &mut C, a: Point, b: Point, width_px: f64, colour: C::Pixel) {
    let (w, h) = canvas.dimensions();
    let margin = width_px.ceil() + 1.0;
    let Some((a, b)) = clip_segment(a, b, (-margin, -margin), (w as f64 + margin, h as f64 + margin)) else {
        return;
    };

    let passes = width_px.round().max(1.0) as usize;
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = (dx * dx + dy * dy).sqrt();
    let (nx, ny) = if len > f64::EPSILON {
        (-dy / len, dx / len)
    } else {
        (0.0, 1.0)
    };
    for k in 0..passes {
        let off = k as f64 - (passes - 1) as f64 / 2.0;
        draw_line_segment_mut(
            canvas,
            ((a.x + nx * off) as f32, (a.y + ny * off) as f32),
            ((b.x + nx * off) as f32, (b.y + ny * off) as f32),
            colour,
        );
    }
}

/// Liang-Barsky clip of segment `a`-`b` to the box `lo`..`hi`.
fn clip_segment(a: Point, b: Point, lo: (f64, f64), hi: (f64, f64)) -> Option<(Point, Point)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [
        (-dx, a.x - lo.0),
        (dx, hi.0 - a.x),
        (-dy, a.y - lo.1),
        (dy, hi.1 - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    (t0 <= t1).then(|| {
        (
            Point::new(a.x + t0 * dx, a.y + t0 * dy),
            Point::new(a.x + t1 * dx, a.y + t1 * dy),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Lead, Recording};
    use approx::assert_relative_eq;
    use crate::signal_window::{WindowMode, WindowParams, Windower};

    fn small_params() -> LayoutParameters {
        LayoutParameters {
            width: 4.0,
            height: 3.0,
            ..LayoutParameters::default()
        }
    }

    fn style<'f>() -> PageStyle<'f> {
        let params = small_params();
        PageStyle {
            grid_colours: ColourSet::default(),
            show_lead_names: true,
            font: None,
            font_size_pt: params.lead_fontsize,
            grid_line_width_pt: params.grid_line_width,
            x_grid_size: params.x_grid_size,
            y_grid_size: params.y_grid_size,
            header: None,
        }
    }

    fn sine_recording(samples: usize) -> Recording {
        let leads = ["I", "II"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Lead::new(
                    *name,
                    (0..samples)
                        .map(|k| 0.8 * ((k as f64) * 0.05 + i as f64).sin())
                        .collect(),
                )
            })
            .collect();
        Recording::new("sine", 100.0, leads).unwrap()
    }

    fn plan_for<'a>(rec: &'a Recording, appearance: AppearanceDecision) -> PagePlan<'a> {
        let wp = WindowParams {
            columns: 1,
            lead_seconds: 2.0,
            step_seconds: 2.0,
            rhythm_seconds: 10.0,
        };
        let frame = Windower::new(rec, &wp, None, WindowMode::Continuous)
            .unwrap()
            .next()
            .unwrap();
        let params = small_params();
        let geometry = PageGeometry::compute(&params, 50, 2, 1, 2.0, false);
        plan_page(&frame, geometry, &params, rec.sample_rate(), appearance)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_calibration_pulse_shape() {
        let pulse = calibration_pulse(0.2, 500.0);
        assert_eq!(pulse.len(), 100);
        assert_eq!(&pulse[..2], &[0.0, 0.0]);
        assert_eq!(&pulse[98..], &[0.0, 0.0]);
        assert!(pulse[2..98].iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_mask_matches_trace_footprint() {
        let rec = sine_recording(400);
        let plan = plan_for(&rec, AppearanceDecision::fixed(false, false));
        let realistic = render_realistic(&plan, &style()).image;
        let mask = render_mask(&plan);
        assert_eq!(realistic.dimensions(), mask.dimensions());
        let mut inked = 0;
        for (x, y, px) in mask.enumerate_pixels() {
            let drawn = realistic.get_pixel(x, y) == &INK;
            assert_eq!(px.0[0] == 255, drawn, "pixel ({x}, {y}) differs");
            inked += usize::from(drawn);
        }
        assert!(inked > 100);
    }

    #[test]
    fn test_mask_ignores_pulse_but_keeps_shift() {
        let rec = sine_recording(400);
        let plain = plan_for(&rec, AppearanceDecision::fixed(false, false));
        let pulsed = plan_for(&rec, AppearanceDecision::fixed(true, true));

        // Traces move right by the pulse duration
        let first_plain = plain.cells[0].trace[0][0];
        let first_pulsed = pulsed.cells[0].trace[0][0];
        let g = &pulsed.geometry;
        let shift_px = g.to_pixel(0.2, 0.0).x - g.to_pixel(0.0, 0.0).x;
        assert_relative_eq!(first_pulsed.x - first_plain.x, shift_px, epsilon = 1e-9);

        // The pulse sits left of the trace: inked on the page, dark in the mask
        let pulse_left = pulsed.cells[0].pulse.as_ref().unwrap()[0].x.floor() as u32;
        let trace_left = first_pulsed.x.floor() as u32 - 1;
        let realistic = render_realistic(&pulsed, &style()).image;
        let mask = render_mask(&pulsed);
        let inked_in = |x_range: std::ops::Range<u32>| {
            x_range
                .flat_map(|x| (0..mask.height()).map(move |y| (x, y)))
                .filter(|&(x, y)| realistic.get_pixel(x, y) == &INK)
                .count()
        };
        assert!(inked_in(pulse_left..trace_left) > 0);
        for x in 0..trace_left {
            for y in 0..mask.height() {
                assert_eq!(mask.get_pixel(x, y).0[0], 0);
            }
        }
    }

    #[test]
    fn test_nan_gap_splits_trace() {
        let mut rec = sine_recording(400);
        let mut leads = rec.leads().to_vec();
        for v in &mut leads[0].samples[50..60] {
            *v = f64::NAN;
        }
        rec = Recording::new("gap", 100.0, leads).unwrap();
        let plan = plan_for(&rec, AppearanceDecision::fixed(false, false));
        assert_eq!(plan.cells[0].trace.len(), 2);
        assert_eq!(plan.cells[1].trace.len(), 1);
    }

    #[test]
    fn test_all_missing_lead_still_gets_box() {
        let leads = vec![
            Lead::new("I", vec![f64::NAN; 400]),
            Lead::new("II", vec![0.0; 400]),
        ];
        let rec = Recording::new("nan", 100.0, leads).unwrap();
        let plan = plan_for(&rec, AppearanceDecision::fixed(false, false));
        let cell = &plan.cells[0];
        assert!(cell.trace.is_empty());
        let px_per_mv = plan.geometry.canvas_height as f64 / plan.geometry.y_max;
        let expected = 2.0 * px_per_mv;
        assert!((cell.bbox.height() as f64 - expected).abs() <= 1.0);
    }

    #[test]
    fn test_boxes_stay_on_canvas() {
        let leads = vec![
            Lead::new("I", vec![1.0e6; 400]),
            Lead::new("II", vec![-1.0e6; 400]),
        ];
        let rec = Recording::new("huge", 100.0, leads).unwrap();
        let plan = plan_for(&rec, AppearanceDecision::fixed(true, false));
        for cell in &plan.cells {
            assert!(cell.bbox.y_min() >= 0);
            assert!(cell.bbox.y_max() <= plan.geometry.canvas_height as i32);
        }
        // Off-canvas traces are clipped rather than walked
        let mask = render_mask(&plan);
        assert_eq!(mask.dimensions(), (200, 150));
    }

    #[test]
    fn test_layout_mismatch_is_an_error() {
        let rec = sine_recording(400);
        let wp = WindowParams {
            columns: 1,
            lead_seconds: 2.0,
            step_seconds: 2.0,
            rhythm_seconds: 10.0,
        };
        let frame = Windower::new(&rec, &wp, None, WindowMode::Continuous)
            .unwrap()
            .next()
            .unwrap();
        let params = small_params();
        let geometry = PageGeometry::compute(&params, 50, 3, 1, 2.0, false);
        let err = plan_page(&frame, geometry, &params, 100.0, AppearanceDecision::fixed(false, false))
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch { expected: 3, found: 2 }));
    }

    #[test]
    fn test_grid_positions_flag_majors() {
        let lines = grid_positions(1.0, 0.5);
        assert_eq!(lines.len(), 10);
        assert!(lines[0].1 && lines[5].1);
        assert!(!lines[1].1);
    }

    #[test]
    fn test_clip_segment() {
        let clipped = clip_segment(
            Point::new(-10.0, 5.0),
            Point::new(20.0, 5.0),
            (0.0, 0.0),
            (10.0, 10.0),
        )
        .unwrap();
        assert_relative_eq!(clipped.0.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(clipped.1.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(clipped.1.y, 5.0);
        assert!(clip_segment(Point::new(-5.0, -5.0), Point::new(-1.0, -1.0), (0.0, 0.0), (1.0, 1.0)).is_none());
    }

    #[test]
    fn test_labels_drawn_with_bundled_font() {
        let rec = sine_recording(400);
        let appearance = AppearanceDecision {
            printed_text: true,
            ..AppearanceDecision::fixed(false, false)
        };
        let plan = plan_for(&rec, appearance);
        let font = LabelFont::bundled().unwrap();
        let with_text = PageStyle {
            font: Some(&font),
            header: Some("sine  100 Hz".to_string()),
            ..style()
        };
        let page = render_realistic(&plan, &with_text);
        let bare = render_realistic(&plan, &style()).image;
        let g = &plan.geometry;

        assert_eq!(page.text_boxes.len(), plan.cells.len());
        for (text, cell) in page.text_boxes.iter().zip(&plan.cells) {
            let text = text.unwrap();
            // Box sits on the label baseline, starting at the anchor
            assert_eq!(text.x_min(), cell.label_anchor.x.round() as i32);
            assert_eq!(text.y_max(), cell.label_anchor.y.round() as i32);
            assert!(text.width() > 0 && text.height() > 0);
            assert!(text.x_min() >= 0 && text.x_max() <= g.canvas_width as i32);
            assert!(text.y_min() >= 0 && text.y_max() <= g.canvas_height as i32);
            let changed = (text.x_min()..text.x_max())
                .flat_map(|x| (text.y_min()..text.y_max()).map(move |y| (x as u32, y as u32)))
                .filter(|&(x, y)| page.image.get_pixel(x, y) != bare.get_pixel(x, y))
                .count();
            assert!(changed > 0, "label {} not drawn", cell.segment.name);
        }

        // Header line across the top spare row
        let header_baseline = g.to_pixel(g.x_gap, g.y_max - 0.5 * g.row_height).y.round() as u32;
        let header_ink = (0..g.canvas_width)
            .flat_map(|x| (0..header_baseline).map(move |y| (x, y)))
            .filter(|&(x, y)| page.image.get_pixel(x, y) != bare.get_pixel(x, y))
            .count();
        assert!(header_ink > 0);

        let unlabelled = PageStyle {
            show_lead_names: false,
            ..with_text
        };
        let page = render_realistic(&plan, &unlabelled);
        assert!(page.text_boxes.iter().all(Option::is_none));
    }

    #[test]
    fn test_annotations_carry_sample_ranges() {
        let rec = sine_recording(400);
        let plan = plan_for(&rec, AppearanceDecision::fixed(true, true));
        let leads = plan.lead_annotations(&[], true, true);
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[1].lead_name, "II");
        assert_eq!(leads[1].start_sample, Some(200));
        assert_eq!(leads[1].end_sample, Some(400));
        assert_eq!(leads[0].plotted_pixels.as_ref().unwrap().len(), 200);
        assert!(leads[0].text_bounding_box.is_none());
    }
}
