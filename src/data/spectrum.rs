use std::path::Path;

use super::model::Polarization;
use crate::error::{Result, RidsError};

/// A capture file as read from disk: one frequency/value pair per sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSpectrum {
    pub freq: Vec<f64>,
    pub val: Vec<f64>,
}

/// Reads one raw capture file produced by the spectrum monitor.
pub trait SpectrumReader {
    fn read_spectrum(&self, path: &Path, polarization: Polarization) -> Result<RawSpectrum>;
}

/// Two-column text captures.
///
/// Each data line holds `freq val`, separated by whitespace or a comma.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSpectrumReader;

impl SpectrumReader for TextSpectrumReader {
    fn read_spectrum(&self, path: &Path, polarization: Polarization) -> Result<RawSpectrum> {
        let text = std::fs::read_to_string(path).map_err(|e| RidsError::filesystem(path, e))?;
        let spectrum = parse_columns(&text).map_err(|reason| RidsError::Spectrum {
            path: path.to_path_buf(),
            reason,
        })?;
        log::debug!(
            "Read {} samples ({polarization}) from {}",
            spectrum.freq.len(),
            path.display()
        );
        Ok(spectrum)
    }
}

fn parse_columns(text: &str) -> std::result::Result<RawSpectrum, String> {
    let mut spectrum = RawSpectrum::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty());

        let (Some(freq), Some(val)) = (fields.next(), fields.next()) else {
            return Err(format!("line {}: expected two columns", line_no + 1));
        };
        // JSON has no encoding for inf or NaN.
        let parse = |tok: &str| match tok.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(format!("line {}: '{tok}' is not a finite number", line_no + 1)),
            Err(_) => Err(format!("line {}: '{tok}' is not a number", line_no + 1)),
        };
        spectrum.freq.push(parse(freq)?);
        spectrum.val.push(parse(val)?);
    }

    Ok(spectrum)
}
