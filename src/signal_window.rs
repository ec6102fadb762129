//! Slices a recording into page-sized frames.
//!
//! A page shows consecutive time segments laid out left-to-right and
//! top-to-bottom: lead `i` sits in row `i / columns`, and each row reads the
//! window that follows the previous row's. All leads of a frame share the
//! same start offset; the row decides how far past it they read.

use crate::error::ConfigError;
use crate::recording::{Lead, Recording};

/// Window sizing for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    pub columns: usize,
    /// Seconds per lead cell
    pub lead_seconds: f64,
    /// Seconds between successive frame starts
    pub step_seconds: f64,
    /// Seconds shown on the rhythm strip
    pub rhythm_seconds: f64,
}

/// How frames are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Slide the start forward until any lead runs out of samples.
    Continuous,
    /// Emit exactly one frame at this sample, truncating short leads.
    Single(usize),
}

/// A slice of one lead's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadSegment<'a> {
    pub name: &'a str,
    pub samples: &'a [f64],
    /// Index of `samples[0]` in the recording
    pub start_sample: usize,
}

impl<'a> LeadSegment<'a> {
    fn slice(lead: &'a Lead, start: usize, len: usize) -> Self {
        let end = start.saturating_add(len).min(lead.samples.len());
        let samples = lead.samples.get(start..end).unwrap_or(&[]);
        Self {
            name: &lead.name,
            samples,
            start_sample: start,
        }
    }

    /// One past the last sample index covered.
    pub fn end_sample(&self) -> usize {
        self.start_sample + self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One page worth of lead segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub index: usize,
    /// Sample offset shared by every lead of this frame
    pub start: usize,
    /// One segment per lead, in layout order
    pub leads: Vec<LeadSegment<'a>>,
    pub rhythm: Option<LeadSegment<'a>>,
}

impl Frame<'_> {
    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.leads.iter().all(LeadSegment::is_empty)
            && self.rhythm.as_ref().map_or(true, LeadSegment::is_empty)
    }
}

/// Lazy, finite iterator of frames over a recording.
pub struct Windower<'a> {
    recording: &'a Recording,
    rhythm: Option<&'a Lead>,
    columns: usize,
    segment_samples: usize,
    step_samples: usize,
    rhythm_samples: usize,
    max_rows: usize,
    mode: WindowMode,
    next_start: usize,
    next_index: usize,
    done: bool,
}

impl<'a> Windower<'a> {
    pub fn new(
        recording: &'a Recording,
        params: &WindowParams,
        rhythm_lead: Option<&str>,
        mode: WindowMode,
    ) -> Result<Self, ConfigError> {
        if params.columns == 0 {
            return Err(ConfigError::Invalid {
                key: "columns",
                reason: "must be at least 1".to_string(),
            });
        }
        let rate = recording.sample_rate();
        let segment_samples = samples_in(rate, params.lead_seconds);
        if segment_samples == 0 {
            return Err(ConfigError::Invalid {
                key: "paper_len",
                reason: format!(
                    "lead window of {}s is shorter than one sample at {} Hz",
                    params.lead_seconds, rate
                ),
            });
        }
        let step_samples = samples_in(rate, params.step_seconds);
        if step_samples == 0 {
            return Err(ConfigError::Invalid {
                key: "abs_lead_step",
                reason: format!(
                    "step of {}s is shorter than one sample at {} Hz",
                    params.step_seconds, rate
                ),
            });
        }
        let rhythm = rhythm_lead.and_then(|name| recording.lead(name));
        let lead_count = recording.leads().len();
        let next_start = match mode {
            WindowMode::Single(start) => start,
            WindowMode::Continuous => 0,
        };
        Ok(Self {
            recording,
            rhythm,
            columns: params.columns,
            segment_samples,
            step_samples,
            rhythm_samples: samples_in(rate, params.rhythm_seconds),
            max_rows: lead_count.div_ceil(params.columns),
            mode,
            next_start,
            next_index: 0,
            done: false,
        })
    }

    /// Samples per lead cell.
    pub fn segment_samples(&self) -> usize {
        self.segment_samples
    }

    fn has_full_window(&self, start: usize) -> bool {
        let needed = start.saturating_add(self.max_rows.saturating_mul(self.segment_samples));
        if self
            .recording
            .leads()
            .iter()
            .any(|lead| lead.samples.len() < needed)
        {
            return false;
        }
        match self.rhythm {
            Some(lead) => lead.samples.len() >= start.saturating_add(self.rhythm_samples),
            None => true,
        }
    }

    fn build(&self, start: usize) -> Frame<'a> {
        let leads = self
            .recording
            .leads()
            .iter()
            .enumerate()
            .map(|(i, lead)| {
                let row = i / self.columns;
                LeadSegment::slice(
                    lead,
                    start.saturating_add(row.saturating_mul(self.segment_samples)),
                    self.segment_samples,
                )
            })
            .collect();
        let rhythm = self
            .rhythm
            .map(|lead| LeadSegment::slice(lead, start, self.rhythm_samples));
        Frame {
            index: self.next_index,
            start,
            leads,
            rhythm,
        }
    }
}

impl<'a> Iterator for Windower<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        if self.done {
            return None;
        }
        let start = self.next_start;
        match self.mode {
            WindowMode::Single(_) => {
                self.done = true;
                let frame = self.build(start);
                if !self.has_full_window(start) {
                    log::debug!(
                        "{}: single frame at {} is truncated",
                        self.recording.name(),
                        start
                    );
                }
                Some(frame)
            }
            WindowMode::Continuous => {
                if !self.has_full_window(start) {
                    self.done = true;
                    return None;
                }
                let frame = self.build(start);
                self.next_start += self.step_samples;
                self.next_index += 1;
                Some(frame)
            }
        }
    }
}

fn samples_in(rate: f64, seconds: f64) -> usize {
    let n = rate * seconds;
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}
