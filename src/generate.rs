//! Recording-to-page pipeline and the batch driver around it.
//!
//! For each record: window into frames, then per frame sample an appearance,
//! compute the page geometry, render the realistic page and mask from one
//! shared plan, and write the image, mask and annotation record.

use crate::annotation::{AnnotationBuilder, AnnotationRecord, AppearanceFlags};
use crate::appearance::{AppearanceDecision, AppearanceSampler};
use crate::atomic_write;
use crate::config::Config;
use crate::error::{RenderError, Result, SynthError};
use crate::layout::PageGeometry;
use crate::recording::Recording;
use crate::render::{self, LabelFont, PageStyle};
use crate::signal_window::{Frame, WindowMode, WindowParams, Windower};
use crate::wfdb_read;
use crate::wfdb_write;
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::{Path, PathBuf};

/// Where and how frames are written.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub image_dir: PathBuf,
    /// `None` skips mask rendering
    pub mask_dir: Option<PathBuf>,
    /// Render one frame at this sample instead of sliding over the record
    pub start_index: Option<usize>,
}

impl OutputOptions {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            mask_dir: None,
            start_index: None,
        }
    }

    /// `masks` next to the image directory.
    pub fn default_mask_dir(image_dir: &Path) -> PathBuf {
        image_dir
            .parent()
            .unwrap_or(Path::new("."))
            .join("masks")
    }
}

/// One frame rendered in memory.
pub struct RenderedFrame {
    pub image: RgbImage,
    pub mask: Option<GrayImage>,
    pub annotation: AnnotationRecord,
}

pub struct Generator<'c> {
    config: &'c Config,
    font: LabelFont,
    sampler: AppearanceSampler,
    remaining: Option<usize>,
}

impl<'c> Generator<'c> {
    /// `seed` overrides `appearance.seed` from the config.
    pub fn new(config: &'c Config, seed: Option<u64>) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => LabelFont::load(path)?,
            None => {
                log::debug!("No font_path configured, using the bundled font");
                LabelFont::bundled()?
            }
        };
        Ok(Self {
            config,
            font,
            sampler: AppearanceSampler::new(&config.appearance, seed),
            remaining: None,
        })
    }

    /// Stop after writing `max_images` realistic images in total.
    pub fn with_image_limit(mut self, max_images: Option<usize>) -> Self {
        self.remaining = max_images;
        self
    }

    pub fn limit_reached(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Standard lead names, in the configured order.
    pub fn prepare(&self, recording: Recording) -> Recording {
        let recording = recording.standardize_lead_names();
        match &self.config.desired_order {
            Some(order) => recording.reorder(order),
            None => recording,
        }
    }

    /// Render one frame without touching the filesystem.
    ///
    /// Returns `Ok(None)` when the frame has nothing to draw.
    pub fn render_frame(
        &self,
        recording: &Recording,
        frame: &Frame<'_>,
        appearance: AppearanceDecision,
        with_mask: bool,
    ) -> Result<Option<RenderedFrame>> {
        let config = self.config;
        let params = &config.layout_parameters;
        let columns = config.columns_for(recording.leads().len());
        let geometry = PageGeometry::compute(
            params,
            config.resolution,
            frame.leads.len(),
            columns,
            config.lead_length_seconds(columns),
            frame.rhythm.is_some(),
        );
        let Some(plan) =
            render::plan_page(frame, geometry, params, recording.sample_rate(), appearance)?
        else {
            log::debug!("{}: frame {} is empty", recording.name(), frame.index);
            return Ok(None);
        };

        let style = PageStyle {
            grid_colours: *config.grid_colours(),
            show_lead_names: config.lead_names,
            font: Some(&self.font),
            font_size_pt: params.lead_fontsize,
            grid_line_width_pt: params.grid_line_width,
            x_grid_size: params.x_grid_size,
            y_grid_size: params.y_grid_size,
            header: Some(format!(
                "{}  {} Hz  25mm/s  10mm/mV",
                recording.name(),
                recording.sample_rate()
            )),
        };
        let page = render::render_realistic(&plan, &style);
        let mask = with_mask.then(|| render::render_mask(&plan));
        if let Some(mask) = &mask {
            if mask.dimensions() != page.image.dimensions() {
                return Err(RenderError::MaskSize {
                    image: page.image.dimensions(),
                    mask: mask.dimensions(),
                }
                .into());
            }
        }

        let text_boxes: &[_] = if config.store_text_bbox {
            page.text_boxes.as_slice()
        } else {
            &[]
        };
        let flags = (config.store_configs == 2).then(|| AppearanceFlags {
            dc_pulse: appearance.dc_pulse,
            bw: appearance.bw,
            gridlines: appearance.grid,
            printed_text: appearance.printed_text,
            number_of_columns_in_image: columns,
            full_mode_lead: frame
                .rhythm
                .map_or_else(|| "None".to_string(), |r| r.name.to_string()),
        });
        let g = &plan.geometry;
        let annotation = plan
            .lead_annotations(text_boxes, config.bbox, config.store_plotted_pixels)
            .into_iter()
            .fold(
                AnnotationBuilder::new(g.canvas_width, g.canvas_height, recording.sample_rate())
                    .grid_pitch(g.x_grid_px, g.y_grid_px)
                    .resolution(config.resolution, config.pad_inches),
                AnnotationBuilder::lead,
            )
            .appearance(flags)
            .build();

        Ok(Some(RenderedFrame {
            image: page.image,
            mask,
            annotation,
        }))
    }

    /// Render and write every frame of `recording`; returns the realistic
    /// image paths.
    pub fn generate_record(&mut self, recording: Recording, out: &OutputOptions) -> Result<Vec<PathBuf>> {
        let config = self.config;
        let recording = self.prepare(recording);
        let columns = config.columns_for(recording.leads().len());
        let window = WindowParams {
            columns,
            lead_seconds: config.lead_length_seconds(columns),
            step_seconds: config.abs_lead_step,
            rhythm_seconds: config.rhythm_strip_len_seconds,
        };
        let mode = out
            .start_index
            .map_or(WindowMode::Continuous, WindowMode::Single);
        let rhythm = recording.rhythm_lead(config.rhythm_lead());
        let frames = Windower::new(&recording, &window, rhythm, mode)?;

        create_dir(&out.image_dir)?;
        if let Some(dir) = &out.mask_dir {
            create_dir(dir)?;
        }

        let mut written = Vec::new();
        for frame in frames {
            if self.limit_reached() {
                break;
            }
            let appearance = self.sampler.sample();
            let Some(rendered) =
                self.render_frame(&recording, &frame, appearance, out.mask_dir.is_some())?
            else {
                continue;
            };

            let base = format!("{}-{}", recording.name(), frame.index);
            let image_path = out.image_dir.join(format!("{base}.png"));
            atomic_write::write_png(&DynamicImage::ImageRgb8(rendered.image), &image_path)?;
            if let (Some(dir), Some(mask)) = (&out.mask_dir, rendered.mask) {
                atomic_write::write_png(&DynamicImage::ImageLuma8(mask), &dir.join(format!("{base}.png")))?;
            }
            if config.store_configs > 0 {
                rendered
                    .annotation
                    .write(&out.image_dir.join(format!("{base}.json")))?;
            }
            if config.write_frame_signals {
                wfdb_write::write_frame(&frame, recording.sample_rate(), &out.image_dir, &base)?;
            }
            log::debug!("Wrote {}", image_path.display());

            written.push(image_path);
            if let Some(remaining) = &mut self.remaining {
                *remaining -= 1;
            }
        }

        if written.is_empty() {
            log::info!("{}: too short for a full frame, nothing written", recording.name());
        } else {
            log::info!("{}: wrote {} frames", recording.name(), written.len());
        }
        Ok(written)
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| SynthError::io(dir, e))
}

/// What to do when a record fails for a reason other than bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Abort,
    KeepGoing,
}

/// Outcome counts of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub frames: usize,
}

/// Generate pages for every record in `records`, in order.
///
/// Unreadable records are skipped. Configuration errors always abort; other
/// failures abort or are counted according to `policy`.
pub fn run_batch(
    generator: &mut Generator<'_>,
    records: &[PathBuf],
    out: &OutputOptions,
    policy: ErrorPolicy,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for path in records {
        if generator.limit_reached() {
            log::info!("Image limit reached, stopping");
            break;
        }
        let result = wfdb_read::read_record(path)
            .map_err(SynthError::from)
            .and_then(|recording| generator.generate_record(recording, out));
        match result {
            Ok(images) => {
                summary.processed += 1;
                summary.frames += images.len();
            }
            Err(e) if e.is_input_error() => {
                log::warn!("Skipping {}: {e}", path.display());
                summary.skipped += 1;
            }
            Err(e @ SynthError::Config(_)) => return Err(e),
            Err(e) => match policy {
                ErrorPolicy::Abort => return Err(e),
                ErrorPolicy::KeepGoing => {
                    log::error!("Failed {}: {e}", path.display());
                    summary.failed += 1;
                }
            },
        }
    }
    log::info!(
        "Batch done: {} processed, {} skipped, {} failed, {} frames written",
        summary.processed,
        summary.skipped,
        summary.failed,
        summary.frames
    );
    Ok(summary)
}
