//! Directory ingestion: discover capture files, pair them per polarization,
//! build events and write the accumulated document.

pub mod naming;
pub mod pipeline;

pub use naming::{CaptureNaming, Classified, DottedNaming, FileType};
pub use pipeline::{CycleReport, EventFailure, IngestReport, IngestionPipeline, PairingMismatch, StopReason};
