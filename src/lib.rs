//! RF Interference Data System (RIDS).
//!
//! A RIDS document holds instrument metadata, per-polarization calibration
//! spectra and named events captured from a spectrum monitor. It is stored
//! as JSON (`.rids`) or gzip-compressed JSON (`.ridz`).
//!
//! The [`ingest`] pipeline drains a directory of paired average/maxhold
//! captures into a document, reducing each pair to its detected peaks.

pub mod config;
pub mod data;
pub mod error;
pub mod event;
pub mod ingest;
pub mod peaks;

pub use config::{IngestConfig, PairingMode};
pub use data::document::RidsDocument;
pub use data::model::{FieldValue, Polarization, SpectralRecord, UnitValue};
pub use error::{Result, RidsError};
pub use event::{EventBuilder, EventKind};
pub use ingest::IngestionPipeline;
pub use peaks::{CwtPeakDetector, PeakDetector};
