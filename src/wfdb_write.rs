//! Ground-truth signal output for a rendered frame, as a WFDB format-16
//! record.

use crate::atomic_write;
use crate::error::Result;
use crate::signal_window::Frame;
use std::path::{Path, PathBuf};

/// ADC units per millivolt.
pub const FRAME_GAIN: f64 = 1000.0;
/// Stored value for a missing sample.
pub const INVALID_SAMPLE: i16 = -32768;

/// Convert millivolts to a stored sample, reserving the invalid marker for NaN.
fn millivolts_to_digital(value: f64, gain: f64) -> i16 {
    if value.is_nan() {
        return INVALID_SAMPLE;
    }
    (value * gain).round().clamp(-32767.0, 32767.0) as i16
}

/// Per-lead samples of a frame on a common time axis starting at
/// `frame.start`. Samples no segment covers are NaN.
pub fn frame_signals(frame: &Frame<'_>) -> Vec<(String, Vec<f64>)> {
    let segments: Vec<_> = frame.leads.iter().chain(frame.rhythm.iter()).collect();
    let end = segments
        .iter()
        .map(|s| s.end_sample())
        .max()
        .unwrap_or(frame.start);
    let len = end.saturating_sub(frame.start);

    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
    for seg in segments {
        let pos = match columns.iter().position(|(name, _)| name == seg.name) {
            Some(pos) => pos,
            None => {
                columns.push((seg.name.to_string(), vec![f64::NAN; len]));
                columns.len() - 1
            }
        };
        let offset = seg.start_sample.saturating_sub(frame.start);
        let column = &mut columns[pos].1;
        for (k, v) in seg.samples.iter().enumerate() {
            if let Some(slot) = column.get_mut(offset + k) {
                *slot = *v;
            }
        }
    }
    columns
}

/// Write a frame's signals as `<dir>/<name>.dat` and `<dir>/<name>.hea`;
/// returns the header path.
pub fn write_frame(frame: &Frame<'_>, sample_rate: f64, dir: &Path, name: &str) -> Result<PathBuf> {
    write_signals(&frame_signals(frame), sample_rate, dir, name)
}

/// Write equal-length signals, in millivolts, as one format-16 record.
pub fn write_signals(
    signals: &[(String, Vec<f64>)],
    sample_rate: f64,
    dir: &Path,
    name: &str,
) -> Result<PathBuf> {
    let frames = signals.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
    let dat_name = format!("{name}.dat");

    let mut data = Vec::with_capacity(frames * signals.len() * 2);
    let mut checksums = vec![0i32; signals.len()];
    for f in 0..frames {
        for (i, (_, samples)) in signals.iter().enumerate() {
            let digital = millivolts_to_digital(samples[f], FRAME_GAIN);
            checksums[i] = checksums[i].wrapping_add(digital as i32);
            data.extend_from_slice(&digital.to_le_bytes());
        }
    }

    let mut header = format!("{name} {} {sample_rate} {frames}\n", signals.len());
    for (i, (lead, samples)) in signals.iter().enumerate() {
        let initial = samples
            .first()
            .map_or(0, |v| millivolts_to_digital(*v, FRAME_GAIN));
        // 16-bit sum of all samples
        let checksum = checksums[i] as i16;
        header.push_str(&format!(
            "{dat_name} 16 {FRAME_GAIN}(0)/mV 16 0 {initial} {checksum} 0 {lead}\n"
        ));
    }

    atomic_write::write_bytes(&data, &dir.join(&dat_name))?;
    let header_path = dir.join(format!("{name}.hea"));
    atomic_write::write_bytes(header.as_bytes(), &header_path)?;
    log::debug!("Wrote signals {}", header_path.display());
    Ok(header_path)
}
