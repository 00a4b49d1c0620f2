use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while reading, writing or ingesting RIDS data.
#[derive(Error, Debug)]
pub enum RidsError {
    /// The container could not be decoded; nothing was merged.
    #[error("malformed RIDS container {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    /// Listing, reading, writing or deleting a file failed.
    #[error("filesystem fault on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A capture file was read but does not hold a spectrum.
    #[error("unreadable spectrum {}: {reason}", .path.display())]
    Spectrum { path: PathBuf, reason: String },

    #[error("threshold '{0}' is not numeric")]
    Threshold(String),

    #[error("peak index {index} is outside the maxhold spectrum (len {len})")]
    PeakIndex { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, RidsError>;

impl RidsError {
    pub(crate) fn format(path: &Path, reason: impl Into<String>) -> Self {
        RidsError::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn filesystem(path: &Path, source: std::io::Error) -> Self {
        RidsError::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Failures isolated to one event: the cycle records them and carries on.
    /// Everything else aborts the cycle.
    pub fn is_per_event(&self) -> bool {
        matches!(
            self,
            RidsError::Spectrum { .. } | RidsError::Threshold(_) | RidsError::PeakIndex { .. }
        )
    }
}
