use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RidsError};
use crate::peaks::{DEFAULT_RIDGE_RANGE, DEFAULT_SCALE_RANGE};

/// How the n-th `ave` capture is matched with a `maxh` capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// By position in the two sorted lists; the lists must already
    /// correspond one to one in capture order.
    #[default]
    Positional,
    /// By position, but each pair's embedded time stamps must agree.
    TimeStamp,
}

/// Ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Peak events built per polarization per cycle.
    pub obs_per_file: usize,
    /// Hard ceiling on scan cycles.
    pub max_loops: usize,
    /// Pause between cycles, milliseconds.
    pub poll_interval_ms: u64,
    /// Also stop once a cycle consumes nothing and the listing did not
    /// change. Off by default: the loop keeps polling for new captures.
    pub stop_when_idle: bool,
    pub pairing: PairingMode,
    pub scale_range: (usize, usize),
    pub ridge_range: (usize, usize),
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            obs_per_file: 100,
            max_loops: 1000,
            poll_interval_ms: 0,
            stop_when_idle: false,
            pairing: PairingMode::Positional,
            scale_range: DEFAULT_SCALE_RANGE,
            ridge_range: DEFAULT_RIDGE_RANGE,
        }
    }
}

impl IngestConfig {
    /// Load from a JSON file; missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RidsError::filesystem(path, e))?;
        serde_json::from_str(&text).map_err(|e| RidsError::format(path, format!("invalid ingest config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let c = IngestConfig::default();
        assert_eq!(c.obs_per_file, 100);
        assert_eq!(c.max_loops, 1000);
        assert_eq!(c.scale_range, (1, 7));
        assert_eq!(c.ridge_range, (4, 4));
        assert_eq!(c.pairing, PairingMode::Positional);
        assert!(!c.stop_when_idle);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"obs_per_file": 5, "pairing": "time_stamp"}"#).unwrap();
        let c = IngestConfig::from_json_file(file.path()).unwrap();
        assert_eq!(c.obs_per_file, 5);
        assert_eq!(c.pairing, PairingMode::TimeStamp);
        assert_eq!(c.max_loops, 1000);
    }

    #[test]
    fn test_bad_json_is_format_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{obs_per_file").unwrap();
        assert!(matches!(
            IngestConfig::from_json_file(file.path()),
            Err(RidsError::Format { .. })
        ));
    }
}
