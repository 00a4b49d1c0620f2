use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{IngestConfig, PairingMode};
use crate::data::document::{baseline_event_name, RidsDocument};
use crate::data::model::{FieldValue, Polarization};
use crate::data::spectrum::{SpectrumReader, TextSpectrumReader};
use crate::error::{Result, RidsError};
use crate::event::{AlignmentShortfall, EventBuilder};
use crate::peaks::{CwtPeakDetector, PeakDetector};

use super::naming::{CaptureNaming, DottedNaming, FileType};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Captures of one polarization that could not be paired this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingMismatch {
    /// Unequal (or one-sided) counts; the polarization is skipped.
    Count {
        polarization: Polarization,
        ave: usize,
        maxh: usize,
    },
    /// Positional partners carry different time stamps; the pair is skipped.
    TimeStamp {
        polarization: Polarization,
        ave: String,
        maxh: String,
    },
}

/// An event that failed to build; its captures stay on disk.
#[derive(Debug)]
pub struct EventFailure {
    pub event: String,
    pub error: RidsError,
}

/// Why [`IngestionPipeline::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// A cycle found no `ave`/`maxh` files.
    #[default]
    NoCaptures,
    /// Nothing was consumed and the directory did not change.
    Idle,
    /// The cycle ceiling was reached.
    MaxLoops,
}

/// Outcome of one scan cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Sorted directory listing seen at the start of the cycle.
    pub listing: Vec<String>,
    pub found_captures: bool,
    pub events_built: Vec<String>,
    pub consumed: Vec<PathBuf>,
    pub pairing_mismatches: Vec<PairingMismatch>,
    pub failures: Vec<EventFailure>,
    pub shortfalls: Vec<(String, AlignmentShortfall)>,
    pub output: Option<PathBuf>,
}

/// Totals over a whole run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub cycles: usize,
    pub events_built: usize,
    pub files_consumed: usize,
    pub pairing_mismatches: Vec<PairingMismatch>,
    pub failures: Vec<EventFailure>,
    pub shortfalls: Vec<(String, AlignmentShortfall)>,
    /// Distinct output files written, in first-write order.
    pub outputs: Vec<PathBuf>,
    pub stop: StopReason,
}

impl IngestReport {
    fn absorb(&mut self, cycle: &mut CycleReport) {
        self.cycles += 1;
        self.events_built += cycle.events_built.len();
        self.files_consumed += cycle.consumed.len();
        self.pairing_mismatches.append(&mut cycle.pairing_mismatches);
        self.failures.append(&mut cycle.failures);
        self.shortfalls.append(&mut cycle.shortfalls);
        if let Some(output) = &cycle.output {
            if !self.outputs.contains(output) {
                self.outputs.push(output.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CaptureLists {
    ave: Vec<PathBuf>,
    maxh: Vec<PathBuf>,
}

/// Drains a capture directory into a [`RidsDocument`].
///
/// Single consumer: producers may add files at any time but must not touch
/// files already visible, since a listed file is taken as fully written.
pub struct IngestionPipeline<N, R, D> {
    naming: N,
    builder: EventBuilder<R, D>,
    config: IngestConfig,
}

impl IngestionPipeline<DottedNaming, TextSpectrumReader, CwtPeakDetector> {
    /// Dotted file names, text captures and the CWT peak finder.
    pub fn with_config(config: IngestConfig) -> Self {
        Self::new(DottedNaming, TextSpectrumReader, CwtPeakDetector, config)
    }
}

impl<N, R, D> IngestionPipeline<N, R, D>
where
    N: CaptureNaming,
    R: SpectrumReader,
    D: PeakDetector,
{
    pub fn new(naming: N, reader: R, detector: D, config: IngestConfig) -> Self {
        let builder = EventBuilder::new(reader, detector).with_ranges(config.scale_range, config.ridge_range);
        IngestionPipeline {
            naming,
            builder,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Scan `directory` until a cycle finds no captures or `max_loops` cycles
    /// have run. With `stop_when_idle` an unchanged directory also stops it.
    ///
    /// A filesystem fault aborts the run with the error. Events whose
    /// captures were already deleted are saved first.
    pub fn run(&self, document: &mut RidsDocument, directory: &Path) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut previous_listing: Option<Vec<String>> = None;

        loop {
            if report.cycles >= self.config.max_loops {
                report.stop = StopReason::MaxLoops;
                break;
            }

            let mut cycle = self.run_cycle(document, directory)?;
            report.absorb(&mut cycle);

            if !cycle.found_captures {
                report.stop = StopReason::NoCaptures;
                break;
            }
            if self.config.stop_when_idle
                && cycle.consumed.is_empty()
                && previous_listing.as_ref() == Some(&cycle.listing)
            {
                report.stop = StopReason::Idle;
                break;
            }
            previous_listing = Some(cycle.listing);

            if self.config.poll_interval_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
            }
        }

        log::info!(
            "Ingestion stopped ({:?}) after {} cycles: {} events, {} files consumed",
            report.stop,
            report.cycles,
            report.events_built,
            report.files_consumed
        );
        Ok(report)
    }

    /// One scan-pair-consume-write pass.
    pub fn run_cycle(&self, document: &mut RidsDocument, directory: &Path) -> Result<CycleReport> {
        let mut cycle = CycleReport {
            listing: list_sorted(directory)?,
            ..Default::default()
        };
        log::debug!("Scanning {} ({} entries)", directory.display(), cycle.listing.len());

        let mut captures: BTreeMap<Polarization, CaptureLists> = BTreeMap::new();
        for name in &cycle.listing {
            let Some((file_type, pol)) = self.naming.classify(name).capture() else {
                continue;
            };
            cycle.found_captures = true;
            let lists = captures.entry(pol).or_default();
            match file_type {
                FileType::Ave => lists.ave.push(directory.join(name)),
                FileType::Maxh => lists.maxh.push(directory.join(name)),
                FileType::Other => {}
            }
        }

        for pol in Polarization::ALL {
            let Some(lists) = captures.get(&pol) else {
                continue;
            };
            if let Err(error) = self.ingest_polarization(document, pol, lists, &mut cycle) {
                // Consumed captures are gone from disk; persist their events
                // before giving up on the cycle.
                if !cycle.consumed.is_empty() {
                    if let Err(save_error) = write_output(document, directory, &mut cycle) {
                        log::error!("Could not save {} consumed files: {save_error}", cycle.consumed.len());
                    }
                }
                return Err(error);
            }
        }

        write_output(document, directory, &mut cycle)?;
        Ok(cycle)
    }

    fn ingest_polarization(
        &self,
        document: &mut RidsDocument,
        pol: Polarization,
        lists: &CaptureLists,
        cycle: &mut CycleReport,
    ) -> Result<()> {
        let (ave, maxh) = (&lists.ave, &lists.maxh);
        if ave.is_empty() || maxh.is_empty() || ave.len() != maxh.len() {
            log::warn!(
                "Skipping polarization {pol}: {} ave vs {} maxh captures",
                ave.len(),
                maxh.len()
            );
            cycle.pairing_mismatches.push(PairingMismatch::Count {
                polarization: pol,
                ave: ave.len(),
                maxh: maxh.len(),
            });
            return Ok(());
        }

        let time_stamp = self.time_stamp_of(&ave[0]);
        document.time_stamp = Some(FieldValue::Text(time_stamp));

        if self.pair_matches(pol, &ave[0], &maxh[0], cycle) {
            let name = baseline_event_name(pol);
            self.build_into(document, &name, &ave[0], &maxh[0], pol, cycle)?;
        }

        let pairs = ave[1..].iter().zip(&maxh[1..]).take(self.config.obs_per_file);
        for (a, m) in pairs {
            if !self.pair_matches(pol, a, m, cycle) {
                continue;
            }
            let name = format!("{}{pol}", self.time_stamp_of(a));
            if self.build_into(document, &name, a, m, pol, cycle)? {
                remove(a)?;
                remove(m)?;
                cycle.consumed.push(a.clone());
                cycle.consumed.push(m.clone());
            }
        }
        Ok(())
    }

    /// Build one event and store it. `Ok(false)` means the event failed on
    /// its own and was recorded; filesystem faults propagate.
    fn build_into(
        &self,
        document: &mut RidsDocument,
        name: &str,
        ave: &Path,
        maxh: &Path,
        pol: Polarization,
        cycle: &mut CycleReport,
    ) -> Result<bool> {
        match self.builder.build_event(document, name, ave, maxh, pol) {
            Ok(built) => {
                if let Some(shortfall) = built.shortfall {
                    log::warn!(
                        "Event {name}: peak index {} beyond ave length {}, ave dropped",
                        shortfall.max_index,
                        shortfall.ave_len
                    );
                    cycle.shortfalls.push((name.to_string(), shortfall));
                }
                document.events.insert(name.to_string(), built.record);
                cycle.events_built.push(name.to_string());
                log::debug!("Built event {name}");
                Ok(true)
            }
            Err(error) if error.is_per_event() => {
                log::warn!("Event {name} failed: {error}");
                cycle.failures.push(EventFailure {
                    event: name.to_string(),
                    error,
                });
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn pair_matches(&self, pol: Polarization, ave: &Path, maxh: &Path, cycle: &mut CycleReport) -> bool {
        if self.config.pairing == PairingMode::Positional {
            return true;
        }
        let (a, m) = (self.time_stamp_of(ave), self.time_stamp_of(maxh));
        if a == m {
            return true;
        }
        log::warn!("Polarization {pol}: ave {a} paired with maxh {m}, skipped");
        cycle.pairing_mismatches.push(PairingMismatch::TimeStamp {
            polarization: pol,
            ave: a,
            maxh: m,
        });
        false
    }

    fn time_stamp_of(&self, path: &Path) -> String {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.naming.extract_time_stamp(name)
    }
}

/// Rewrite `<time_stamp>.ridz` in `directory`; nothing is written while the
/// time stamp is unset.
fn write_output(document: &RidsDocument, directory: &Path, cycle: &mut CycleReport) -> Result<()> {
    let Some(label) = document.time_stamp_label() else {
        log::debug!("Nothing ingested yet; no output written");
        return Ok(());
    };
    let output = directory.join(format!("{label}.ridz"));
    document.save(&output)?;
    log::info!("Wrote {} ({} events)", output.display(), document.events.len());
    cycle.output = Some(output);
    Ok(())
}

fn list_sorted(directory: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(directory).map_err(|e| RidsError::filesystem(directory, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RidsError::filesystem(directory, e))?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => log::debug!("Skipping non UTF-8 entry {raw:?}"),
        }
    }
    names.sort();
    Ok(names)
}

fn remove(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| RidsError::filesystem(path, e))
}
