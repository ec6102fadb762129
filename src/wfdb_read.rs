//! WFDB record input: `.hea` header plus one or more `.dat` signal files.
//!
//! Storage formats 16 (little-endian i16) and 212 (two 12-bit samples packed
//! in three bytes) are supported. Signals stored in the same file are
//! interleaved sample by sample.

use crate::error::InputError;
use crate::recording::{Lead, Recording};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Gain used when a header gives 0 or omits it.
const DEFAULT_GAIN: f64 = 200.0;

/// One signal line of a header.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub file_name: String,
    pub format: u32,
    /// Bytes to skip at the start of the signal file
    pub byte_offset: u64,
    /// ADC units per physical unit
    pub gain: f64,
    pub baseline: i32,
    pub units: String,
    pub adc_zero: i32,
    pub description: String,
}

impl SignalSpec {
    fn sentinel(&self) -> i32 {
        match self.format {
            212 => -2048,
            _ => -32768,
        }
    }

    /// Scale from `units` to millivolts.
    fn to_millivolts(&self) -> f64 {
        match self.units.as_str() {
            "uV" | "μV" => 1e-3,
            "V" => 1e3,
            _ => 1.0,
        }
    }

    /// Physical value of a stored sample, NaN for the invalid-sample marker.
    pub fn physical(&self, digital: i32) -> f64 {
        if digital == self.sentinel() {
            f64::NAN
        } else {
            (digital - self.baseline) as f64 / self.gain * self.to_millivolts()
        }
    }
}

/// Parsed `.hea` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub record_name: String,
    pub sample_rate: f64,
    pub sample_count: Option<usize>,
    pub signals: Vec<SignalSpec>,
}

pub fn read_header(path: &Path) -> Result<Header, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_header(&text, path)
}

pub fn parse_header(text: &str, path: &Path) -> Result<Header, InputError> {
    let bad = |reason: String| InputError::Header {
        path: path.to_path_buf(),
        reason,
    };
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let record_line = lines.next().ok_or_else(|| bad("empty header".to_string()))?;
    let fields: Vec<&str> = record_line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(bad(format!("record line too short: `{record_line}`")));
    }
    let record_name = fields[0].split('/').next().unwrap_or(fields[0]).to_string();
    let signal_count: usize = fields[1]
        .parse()
        .map_err(|_| bad(format!("bad signal count `{}`", fields[1])))?;
    let sample_rate = match fields.get(2) {
        // `fs/counter(base)`: only the frame rate matters here
        Some(f) => f
            .split(['/', '('])
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| bad(format!("bad sampling frequency `{f}`")))?,
        None => 250.0,
    };
    let sample_count = match fields.get(3) {
        Some(n) => Some(
            n.parse::<usize>()
                .map_err(|_| bad(format!("bad sample count `{n}`")))?,
        ),
        None => None,
    };

    let mut signals = Vec::with_capacity(signal_count);
    for (i, line) in lines.take(signal_count).enumerate() {
        signals.push(parse_signal_line(line, i).map_err(&bad)?);
    }
    if signals.len() != signal_count {
        return Err(bad(format!(
            "expected {signal_count} signal lines, found {}",
            signals.len()
        )));
    }

    Ok(Header {
        record_name,
        sample_rate,
        sample_count: sample_count.filter(|n| *n > 0),
        signals,
    })
}

fn parse_signal_line(line: &str, index: usize) -> Result<SignalSpec, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(format!("signal line too short: `{line}`"));
    }

    // format[xsamp][:skew][+offset]
    let format_field = fields[1];
    let digits: String = format_field.chars().take_while(char::is_ascii_digit).collect();
    let format: u32 = digits
        .parse()
        .map_err(|_| format!("bad format `{format_field}`"))?;
    let byte_offset = match format_field.split_once('+') {
        Some((_, off)) => off
            .parse()
            .map_err(|_| format!("bad byte offset in `{format_field}`"))?,
        None => 0,
    };

    let adc_zero: i32 = match fields.get(4) {
        Some(z) => z.parse().map_err(|_| format!("bad ADC zero `{z}`"))?,
        None => 0,
    };

    // gain[(baseline)][/units]
    let (gain, baseline, units) = match fields.get(2) {
        Some(spec) => {
            let (value, units) = match spec.split_once('/') {
                Some((value, units)) => (value, units.to_string()),
                None => (*spec, "mV".to_string()),
            };
            let (gain_text, baseline) = match value.split_once('(') {
                Some((g, b)) => {
                    let b = b.trim_end_matches(')');
                    (g, b.parse().map_err(|_| format!("bad baseline `{b}`"))?)
                }
                None => (value, adc_zero),
            };
            let gain: f64 = gain_text
                .parse()
                .map_err(|_| format!("bad gain `{gain_text}`"))?;
            (gain, baseline, units)
        }
        None => (DEFAULT_GAIN, adc_zero, "mV".to_string()),
    };

    let description = if fields.len() > 8 {
        fields[8..].join(" ")
    } else {
        format!("sig{index}")
    };

    Ok(SignalSpec {
        file_name: fields[0].to_string(),
        format,
        byte_offset,
        gain: if gain == 0.0 { DEFAULT_GAIN } else { gain },
        baseline,
        units,
        adc_zero,
        description,
    })
}

/// Read the record whose header is `<record>.hea`.
///
/// `record` may name the header, the signal file, or the bare record path.
pub fn read_record(record: &Path) -> Result<Recording, InputError> {
    let header_path = record.with_extension("hea");
    let header = read_header(&header_path)?;
    let dir = header_path.parent().unwrap_or(Path::new("."));

    // Signals grouped by the file they live in, keeping header order
    let mut files: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, spec) in header.signals.iter().enumerate() {
        files.entry(spec.file_name.as_str()).or_default().push(i);
    }

    let mut samples: Vec<Vec<f64>> = vec![Vec::new(); header.signals.len()];
    for (file_name, members) in &files {
        let first = &header.signals[members[0]];
        if members.iter().any(|&i| header.signals[i].format != first.format) {
            return Err(InputError::Signal {
                path: dir.join(file_name),
                reason: "signals sharing a file use different formats".to_string(),
            });
        }
        let path = dir.join(file_name);
        let bytes = std::fs::read(&path).map_err(|source| InputError::Read {
            path: path.clone(),
            source,
        })?;
        let body = bytes.get(first.byte_offset as usize..).unwrap_or(&[]);
        let digital = match first.format {
            16 => decode_16(body),
            212 => decode_212(body),
            format => return Err(InputError::UnsupportedFormat { path, format }),
        };

        let stride = members.len();
        let frames = match header.sample_count {
            Some(n) => n.min(digital.len() / stride),
            None => digital.len() / stride,
        };
        if let Some(n) = header.sample_count {
            if frames < n {
                log::warn!(
                    "{}: header promises {n} samples, file holds {frames}",
                    path.display()
                );
            }
        }
        for (slot, &signal) in members.iter().enumerate() {
            let spec = &header.signals[signal];
            samples[signal] = (0..frames)
                .map(|f| spec.physical(digital[f * stride + slot]))
                .collect();
        }
    }

    let leads = header
        .signals
        .iter()
        .zip(samples)
        .map(|(spec, samples)| Lead::new(spec.description.clone(), samples))
        .collect();
    let recording = Recording::new(header.record_name, header.sample_rate, leads)?;
    log::debug!(
        "Read {} ({} leads at {} Hz)",
        header_path.display(),
        recording.leads().len(),
        recording.sample_rate()
    );
    Ok(recording)
}

/// Little-endian 16-bit samples; a trailing odd byte is dropped.
pub fn decode_16(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
        .collect()
}

/// Pairs of 12-bit two's-complement samples packed into three bytes.
pub fn decode_212(bytes: &[u8]) -> Vec<i32> {
    let mut out = Vec::with_capacity(bytes.len() * 2 / 3);
    for chunk in bytes.chunks(3) {
        match *chunk {
            [b0, b1, b2] => {
                out.push(sign_extend_12(b0 as i32 | ((b1 as i32 & 0x0f) << 8)));
                out.push(sign_extend_12(b2 as i32 | ((b1 as i32 & 0xf0) << 4)));
            }
            [b0, b1] => out.push(sign_extend_12(b0 as i32 | ((b1 as i32 & 0x0f) << 8))),
            _ => {}
        }
    }
    out
}

fn sign_extend_12(v: i32) -> i32 {
    if v & 0x800 != 0 {
        v - 0x1000
    } else {
        v
    }
}

/// Record paths (without extension) under `input`, sorted.
///
/// A file argument names a single record. A directory is searched
/// recursively for headers with a matching `.dat` file.
pub fn find_records(input: &Path) -> Result<Vec<PathBuf>, InputError> {
    if input.is_file() {
        return Ok(vec![input.with_extension("")]);
    }
    let mut records: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("hea"))
                .unwrap_or(false)
        })
        .map(|e| e.path().with_extension(""))
        .filter(|base| base.with_extension("dat").is_file())
        .collect();
    if records.is_empty() {
        return Err(InputError::NoRecords(input.to_path_buf()));
    }
    records.sort();
    Ok(records)
}
