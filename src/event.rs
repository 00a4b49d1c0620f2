//! Turning an (average, maxhold) capture pair into one event record.

use std::path::Path;

use crate::data::document::RidsDocument;
use crate::data::model::{Polarization, SpectralRecord};
use crate::data::spectrum::{RawSpectrum, SpectrumReader};
use crate::error::{Result, RidsError};
use crate::peaks::{PeakDetector, DEFAULT_RIDGE_RANGE, DEFAULT_SCALE_RANGE};

/// How an event is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Both spectra kept verbatim.
    Baseline,
    /// Only samples at detected maxhold peaks kept.
    Peak,
}

impl EventKind {
    /// Names containing `baseline` (any case) are baselines.
    pub fn of(name: &str) -> Self {
        if name.to_ascii_lowercase().contains("baseline") {
            EventKind::Baseline
        } else {
            EventKind::Peak
        }
    }
}

/// Peak indices ran past the end of the average spectrum, so the event
/// carries no `ave` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentShortfall {
    pub max_index: usize,
    pub ave_len: usize,
}

/// A built event plus what was dropped while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBuild {
    pub record: SpectralRecord,
    pub shortfall: Option<AlignmentShortfall>,
}

/// Builds event records from capture files.
///
/// Peak events index the average spectrum with peaks found on the maxhold
/// grid, so both captures of a pair must share one sampling grid.
#[derive(Debug, Clone)]
pub struct EventBuilder<R, D> {
    reader: R,
    detector: D,
    scale_range: (usize, usize),
    ridge_range: (usize, usize),
}

impl<R: SpectrumReader, D: PeakDetector> EventBuilder<R, D> {
    pub fn new(reader: R, detector: D) -> Self {
        EventBuilder {
            reader,
            detector,
            scale_range: DEFAULT_SCALE_RANGE,
            ridge_range: DEFAULT_RIDGE_RANGE,
        }
    }

    pub fn with_ranges(mut self, scale_range: (usize, usize), ridge_range: (usize, usize)) -> Self {
        self.scale_range = scale_range;
        self.ridge_range = ridge_range;
        self
    }

    /// Read both captures and reduce them to the event `name`.
    pub fn build_event(
        &self,
        document: &RidsDocument,
        name: &str,
        ave_path: &Path,
        maxhold_path: &Path,
        polarization: Polarization,
    ) -> Result<EventBuild> {
        let ave = self.reader.read_spectrum(ave_path, polarization)?;
        let maxhold = self.reader.read_spectrum(maxhold_path, polarization)?;
        self.reduce(document, EventKind::of(name), ave, maxhold, polarization)
    }

    /// Reduce two spectra already in memory.
    pub fn reduce(
        &self,
        document: &RidsDocument,
        kind: EventKind,
        ave: RawSpectrum,
        maxhold: RawSpectrum,
        polarization: Polarization,
    ) -> Result<EventBuild> {
        let mut record = SpectralRecord::for_polarization(polarization);

        if kind == EventKind::Baseline {
            record.freq = if ave.freq.len() > maxhold.freq.len() {
                ave.freq
            } else {
                maxhold.freq
            };
            record.ave = Some(ave.val);
            record.maxhold = Some(maxhold.val);
            return Ok(EventBuild {
                record,
                shortfall: None,
            });
        }

        let threshold = document.peak_threshold()?.unwrap_or(f64::NEG_INFINITY);
        let peaks = self
            .detector
            .detect_peaks(&maxhold.val, threshold, self.scale_range, self.ridge_range);

        record.freq = select(&maxhold.freq, &peaks)?;
        record.maxhold = Some(select(&maxhold.val, &peaks)?);

        let shortfall = match select(&ave.val, &peaks) {
            Ok(values) => {
                record.ave = Some(values);
                None
            }
            Err(_) => Some(AlignmentShortfall {
                max_index: peaks.iter().copied().max().unwrap_or_default(),
                ave_len: ave.val.len(),
            }),
        };

        Ok(EventBuild { record, shortfall })
    }
}

/// `values` at `indices`, or the first index that falls outside.
fn select(values: &[f64], indices: &[usize]) -> Result<Vec<f64>> {
    indices
        .iter()
        .map(|&index| {
            values.get(index).copied().ok_or(RidsError::PeakIndex {
                index,
                len: values.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::TextSpectrumReader;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Returns fixed indices and remembers what it was asked.
    struct FixedPeaks {
        indices: Vec<usize>,
        calls: RefCell<Vec<(usize, f64, (usize, usize), (usize, usize))>>,
    }

    impl FixedPeaks {
        fn new(indices: &[usize]) -> Self {
            FixedPeaks {
                indices: indices.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PeakDetector for FixedPeaks {
        fn detect_peaks(
            &self,
            values: &[f64],
            threshold: f64,
            scale_range: (usize, usize),
            ridge_range: (usize, usize),
        ) -> Vec<usize> {
            self.calls
                .borrow_mut()
                .push((values.len(), threshold, scale_range, ridge_range));
            self.indices.clone()
        }
    }

    fn ramp(len: usize, start: f64, step: f64) -> Vec<f64> {
        (0..len).map(|i| start + step * i as f64).collect()
    }

    fn spectrum(len: usize, offset: f64) -> RawSpectrum {
        RawSpectrum {
            freq: ramp(len, 100.0, 0.5),
            val: ramp(len, offset, 1.0),
        }
    }

    fn builder(peaks: &[usize]) -> EventBuilder<TextSpectrumReader, FixedPeaks> {
        EventBuilder::new(TextSpectrumReader, FixedPeaks::new(peaks))
    }

    #[test]
    fn test_event_kind_from_name() {
        assert_eq!(EventKind::of("baseline_E"), EventKind::Baseline);
        assert_eq!(EventKind::of("BaseLine_N"), EventKind::Baseline);
        assert_eq!(EventKind::of("20171018-120000E"), EventKind::Peak);
    }

    #[test]
    fn test_peak_event_selects_detected_samples() {
        let b = builder(&[5]);
        let mut doc = RidsDocument::new();
        doc.set([("threshold", "-80 dBm")]);
        let ave = spectrum(10, -90.0);
        let maxhold = spectrum(10, -60.0);

        let built = b
            .reduce(&doc, EventKind::Peak, ave.clone(), maxhold.clone(), Polarization::E)
            .unwrap();

        assert_eq!(built.record.freq, vec![maxhold.freq[5]]);
        assert_eq!(built.record.maxhold, Some(vec![maxhold.val[5]]));
        assert_eq!(built.record.ave, Some(vec![ave.val[5]]));
        assert_eq!(built.record.polarization, Some(Polarization::E));
        assert_eq!(built.shortfall, None);

        let calls = b.detector.calls.borrow();
        assert_eq!(calls.as_slice(), &[(10, -80.0, (1, 7), (4, 4))]);
    }

    #[test]
    fn test_peak_event_with_short_ave_drops_ave() {
        let b = builder(&[5]);
        let doc = RidsDocument::new();
        let built = b
            .reduce(&doc, EventKind::Peak, spectrum(3, -90.0), spectrum(10, -60.0), Polarization::N)
            .unwrap();

        assert_eq!(built.record.ave, None);
        assert_eq!(built.record.maxhold, Some(vec![-55.0]));
        assert_eq!(
            built.shortfall,
            Some(AlignmentShortfall {
                max_index: 5,
                ave_len: 3
            })
        );
        let json = serde_json::to_value(&built.record).unwrap();
        assert!(json.get("ave").is_none());
    }

    #[test]
    fn test_unset_threshold_means_no_cutoff() {
        let b = builder(&[]);
        let built = b
            .reduce(&RidsDocument::new(), EventKind::Peak, spectrum(4, 0.0), spectrum(4, 0.0), Polarization::E)
            .unwrap();
        assert!(built.record.freq.is_empty());
        assert_eq!(built.record.ave, Some(vec![]));
        assert_eq!(b.detector.calls.borrow()[0].1, f64::NEG_INFINITY);
    }

    #[test]
    fn test_non_numeric_threshold_fails_peak_event_only() {
        let b = builder(&[1]);
        let mut doc = RidsDocument::new();
        doc.set([("threshold", "ongoing maxhold")]);

        let err = b
            .reduce(&doc, EventKind::Peak, spectrum(4, 0.0), spectrum(4, 0.0), Polarization::E)
            .unwrap_err();
        assert!(matches!(err, RidsError::Threshold(_)));

        let baseline = b.reduce(&doc, EventKind::Baseline, spectrum(4, 0.0), spectrum(4, 0.0), Polarization::E);
        assert!(baseline.is_ok());
    }

    #[test]
    fn test_peak_outside_maxhold_is_an_error() {
        let b = builder(&[12]);
        let err = b
            .reduce(&RidsDocument::new(), EventKind::Peak, spectrum(20, 0.0), spectrum(10, 0.0), Polarization::E)
            .unwrap_err();
        assert!(matches!(err, RidsError::PeakIndex { index: 12, len: 10 }));
    }

    #[test]
    fn test_baseline_keeps_longer_frequency_axis() {
        let b = builder(&[0]);
        let doc = RidsDocument::new();
        let ave = spectrum(100, -90.0);
        let maxhold = spectrum(120, -60.0);

        let built = b
            .reduce(&doc, EventKind::Baseline, ave.clone(), maxhold.clone(), Polarization::E)
            .unwrap();
        assert_eq!(built.record.freq.len(), 120);
        assert_eq!(built.record.freq, maxhold.freq);
        assert_eq!(built.record.ave, Some(ave.val.clone()));
        assert_eq!(built.record.maxhold, Some(maxhold.val.clone()));
        assert!(b.detector.calls.borrow().is_empty());

        let swapped = b
            .reduce(&doc, EventKind::Baseline, maxhold.clone(), ave.clone(), Polarization::E)
            .unwrap();
        assert_eq!(swapped.record.freq.len(), 120);
    }

    #[test]
    fn test_baseline_tie_prefers_maxhold_axis() {
        let b = builder(&[]);
        let ave = RawSpectrum {
            freq: vec![1.0, 2.0],
            val: vec![0.0, 0.0],
        };
        let maxhold = RawSpectrum {
            freq: vec![1.5, 2.5],
            val: vec![1.0, 1.0],
        };
        let built = b
            .reduce(&RidsDocument::new(), EventKind::Baseline, ave, maxhold, Polarization::N)
            .unwrap();
        assert_eq!(built.record.freq, vec![1.5, 2.5]);
    }

    #[test]
    fn test_build_event_reads_files() {
        let dir = TempDir::new().unwrap();
        let ave = dir.path().join("t1.ave.E");
        let maxh = dir.path().join("t1.maxh.E");
        std::fs::write(&ave, "100.0 -90\n100.5 -89\n101.0 -88\n").unwrap();
        std::fs::write(&maxh, "100.0 -70\n100.5 -40\n101.0 -71\n").unwrap();

        let built = builder(&[1])
            .build_event(&RidsDocument::new(), "t1E", &ave, &maxh, Polarization::E)
            .unwrap();
        assert_eq!(built.record.freq, vec![100.5]);
        assert_eq!(built.record.maxhold, Some(vec![-40.0]));
        assert_eq!(built.record.ave, Some(vec![-89.0]));
    }
}
