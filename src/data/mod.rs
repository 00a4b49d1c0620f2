/// Data layer: spectra, the RIDS document and its container encodings.
///
/// Architecture:
/// ```text
///  <stamp>.ave.E / <stamp>.maxh.E          .rids / .ridz
///        │                                      │
///        ▼                                      ▼
///   ┌──────────┐                          ┌──────────┐
///   │ spectrum  │  capture → RawSpectrum   │  codec    │  JSON ± gzip ↔ object
///   └──────────┘                          └──────────┘
///        │                                      │
///        ▼                                      ▼
///   ┌──────────────┐                     ┌──────────────┐
///   │ SpectralRecord│ ──── events/cal ──▶ │ RidsDocument  │
///   └──────────────┘                     └──────────────┘
/// ```

pub mod codec;
pub mod document;
pub mod model;
pub mod spectrum;
