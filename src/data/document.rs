use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use super::codec;
use super::model::{FieldValue, Polarization, SpectralPatch, SpectralRecord, UnitValue};
use crate::error::{Result, RidsError};

/// Header fields stored and written back verbatim.
pub const DIRECT_FIELDS: [&str; 5] = ["instrument", "receiver", "time_stamp", "freq_unit", "val_unit"];

/// Header fields stored as a `(value, unit)` pair.
pub const UNIT_FIELDS: [&str; 4] = ["channel_width", "time_constant", "threshold", "vbw"];

/// Prefix reserved for the per-polarization baseline events.
pub const BASELINE_PREFIX: &str = "baseline_";

/// Name of the baseline event for `pol`, e.g. `baseline_E`.
pub fn baseline_event_name(pol: Polarization) -> String {
    format!("{BASELINE_PREFIX}{pol}")
}

// ---------------------------------------------------------------------------
// Calibration – exactly one curve per polarization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub e: SpectralRecord,
    pub n: SpectralRecord,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            e: SpectralRecord::for_polarization(Polarization::E),
            n: SpectralRecord::for_polarization(Polarization::N),
        }
    }
}

impl Calibration {
    pub fn get(&self, pol: Polarization) -> &SpectralRecord {
        match pol {
            Polarization::E => &self.e,
            Polarization::N => &self.n,
        }
    }

    pub fn get_mut(&mut self, pol: Polarization) -> &mut SpectralRecord {
        match pol {
            Polarization::E => &mut self.e,
            Polarization::N => &mut self.n,
        }
    }
}

// ---------------------------------------------------------------------------
// RidsDocument
// ---------------------------------------------------------------------------

/// The RIDS aggregate: header, calibration curves and named events.
///
/// Loading merges into the existing document, so a header-only `.rids` file
/// can be read first and a data file on top of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RidsDocument {
    pub instrument: Option<FieldValue>,
    pub receiver: Option<FieldValue>,
    pub time_stamp: Option<FieldValue>,
    pub freq_unit: Option<FieldValue>,
    pub val_unit: Option<FieldValue>,

    pub channel_width: UnitValue,
    pub vbw: UnitValue,
    pub time_constant: UnitValue,
    pub threshold: UnitValue,

    pub comment: Option<String>,
    pub cal: Calibration,
    /// Events keyed by name; baselines use [`baseline_event_name`].
    pub events: BTreeMap<String, SpectralRecord>,
}

/// Wire shape used while decoding; everything is staged here before the
/// document is touched.
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    instrument: Option<FieldValue>,
    #[serde(default)]
    receiver: Option<FieldValue>,
    #[serde(default)]
    time_stamp: Option<FieldValue>,
    #[serde(default)]
    freq_unit: Option<FieldValue>,
    #[serde(default)]
    val_unit: Option<FieldValue>,
    #[serde(default)]
    channel_width: Option<FieldValue>,
    #[serde(default)]
    vbw: Option<FieldValue>,
    #[serde(default)]
    time_constant: Option<FieldValue>,
    #[serde(default)]
    threshold: Option<FieldValue>,
    #[serde(default)]
    cal: Option<BTreeMap<String, SpectralPatch>>,
    #[serde(default)]
    events: Option<BTreeMap<String, SpectralRecord>>,
}

impl RidsDocument {
    /// Empty document: no header, blank calibration for both polarizations.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comment(comment: &str) -> Self {
        let mut doc = Self::new();
        doc.append_comment(Some(comment));
        doc
    }

    // -- Loading ------------------------------------------------------------

    /// Merge a `.rids` / `.ridz` file into this document.
    ///
    /// On any decode error the document is left unmodified.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let map = codec::read_container(path)?;
        self.merge_map(map, path)?;
        log::debug!("Loaded {} ({} events)", path.display(), self.events.len());
        Ok(())
    }

    /// Merge an in-memory plain JSON document.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        let origin = Path::new("<memory>");
        let map = codec::decode(text.as_bytes(), codec::Encoding::Plain, origin)?;
        self.merge_map(map, origin)
    }

    fn merge_map(&mut self, map: Map<String, JsonValue>, origin: &Path) -> Result<()> {
        let raw: RawDocument = serde_json::from_value(JsonValue::Object(map))
            .map_err(|e| RidsError::format(origin, format!("unexpected field layout: {e}")))?;

        self.append_comment(raw.comment.as_deref());

        let direct = [
            (&mut self.instrument, raw.instrument),
            (&mut self.receiver, raw.receiver),
            (&mut self.time_stamp, raw.time_stamp),
            (&mut self.freq_unit, raw.freq_unit),
            (&mut self.val_unit, raw.val_unit),
        ];
        for (slot, value) in direct {
            if let Some(v) = value {
                *slot = Some(v);
            }
        }

        let unit = [
            (&mut self.channel_width, raw.channel_width),
            (&mut self.vbw, raw.vbw),
            (&mut self.time_constant, raw.time_constant),
            (&mut self.threshold, raw.threshold),
        ];
        for (slot, value) in unit {
            if let Some(v) = value {
                *slot = UnitValue::from_field(v);
            }
        }

        if let Some(mut cal) = raw.cal {
            for pol in Polarization::ALL {
                if let Some(patch) = cal.remove(pol.as_str()) {
                    self.cal.get_mut(pol).apply(patch);
                }
            }
        }

        if let Some(events) = raw.events {
            self.events.extend(events);
        }
        Ok(())
    }

    // -- Saving -------------------------------------------------------------

    /// Write the whole document; `.ridz` destinations are gzip-compressed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self
            .to_json()
            .map_err(|e| RidsError::format(path, format!("cannot encode document: {e}")))?;
        codec::write_container(path, &json)
    }

    /// Plain-text rendering of the document, as [`save`](Self::save) writes it.
    pub fn to_text(&self) -> serde_json::Result<String> {
        codec::to_text(&self.to_json()?)
    }

    /// The document as a JSON object with lexicographically sorted keys.
    pub fn to_json(&self) -> serde_json::Result<JsonValue> {
        let mut ds = Map::new();
        ds.insert("comment".into(), serde_json::to_value(&self.comment)?);

        for name in DIRECT_FIELDS {
            let value = self.direct(name).and_then(|v| v.as_ref());
            ds.insert(name.into(), serde_json::to_value(value)?);
        }
        for name in UNIT_FIELDS {
            let rendered = self.unit(name).map(UnitValue::render).unwrap_or_default();
            ds.insert(name.into(), JsonValue::String(rendered));
        }

        let mut cal = Map::new();
        for pol in Polarization::ALL {
            cal.insert(pol.as_str().into(), serde_json::to_value(self.cal.get(pol))?);
        }
        ds.insert("cal".into(), JsonValue::Object(cal));

        let mut events = Map::new();
        for (name, record) in &self.events {
            events.insert(name.clone(), serde_json::to_value(record)?);
        }
        ds.insert("events".into(), JsonValue::Object(events));

        Ok(JsonValue::Object(ds))
    }

    // -- Header access ------------------------------------------------------

    fn direct(&self, name: &str) -> Option<&Option<FieldValue>> {
        match name {
            "instrument" => Some(&self.instrument),
            "receiver" => Some(&self.receiver),
            "time_stamp" => Some(&self.time_stamp),
            "freq_unit" => Some(&self.freq_unit),
            "val_unit" => Some(&self.val_unit),
            _ => None,
        }
    }

    fn direct_mut(&mut self, name: &str) -> Option<&mut Option<FieldValue>> {
        match name {
            "instrument" => Some(&mut self.instrument),
            "receiver" => Some(&mut self.receiver),
            "time_stamp" => Some(&mut self.time_stamp),
            "freq_unit" => Some(&mut self.freq_unit),
            "val_unit" => Some(&mut self.val_unit),
            _ => None,
        }
    }

    fn unit(&self, name: &str) -> Option<&UnitValue> {
        match name {
            "channel_width" => Some(&self.channel_width),
            "vbw" => Some(&self.vbw),
            "time_constant" => Some(&self.time_constant),
            "threshold" => Some(&self.threshold),
            _ => None,
        }
    }

    fn unit_mut(&mut self, name: &str) -> Option<&mut UnitValue> {
        match name {
            "channel_width" => Some(&mut self.channel_width),
            "vbw" => Some(&mut self.vbw),
            "time_constant" => Some(&mut self.time_constant),
            "threshold" => Some(&mut self.threshold),
            _ => None,
        }
    }

    /// Bulk-assign header fields by name. Unit fields given as text are split
    /// into value and unit; unknown names are ignored.
    pub fn set<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        for (key, value) in fields {
            let key = key.as_ref();
            if let Some(slot) = self.direct_mut(key) {
                *slot = Some(value.into());
            } else if let Some(slot) = self.unit_mut(key) {
                *slot = UnitValue::from_field(value.into());
            } else {
                log::debug!("Ignoring unknown header field '{key}'");
            }
        }
    }

    /// Append to the free-text comment, one line per call. `None` is a no-op.
    pub fn append_comment(&mut self, comment: Option<&str>) {
        let Some(comment) = comment else {
            return;
        };
        match &mut self.comment {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(comment);
            }
            None => self.comment = Some(comment.to_string()),
        }
    }

    /// The threshold as a number, if one is set.
    pub fn peak_threshold(&self) -> Result<Option<f64>> {
        match &self.threshold.value {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| RidsError::Threshold(v.to_string())),
        }
    }

    /// `time_stamp` as text, used to name output files.
    pub fn time_stamp_label(&self) -> Option<String> {
        self.time_stamp.as_ref().map(|v| v.to_string())
    }
}
