use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Polarization
// ---------------------------------------------------------------------------

/// Antenna polarization channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Polarization {
    E,
    N,
}

impl Polarization {
    /// Both channels, in processing order.
    pub const ALL: [Polarization; 2] = [Polarization::E, Polarization::N];

    pub fn as_str(self) -> &'static str {
        match self {
            Polarization::E => "E",
            Polarization::N => "N",
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Polarization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "E" => Ok(Polarization::E),
            "N" => Ok(Polarization::N),
            other => Err(format!("unknown polarization '{other}'")),
        }
    }
}

/// Older writers store an unset polarization as `""`.
fn deserialize_polarization<'de, D>(deserializer: D) -> Result<Option<Polarization>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// FieldValue – a scalar header value
// ---------------------------------------------------------------------------

/// A scalar header value, kept in the JSON type it arrived with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Numeric view, used when a header value drives peak detection.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Unsigned(u) => Some(*u as f64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Unsigned(u) => write!(f, "{u}"),
            // `{:?}` keeps a trailing `.0` and the shortest exact digits.
            FieldValue::Float(v) => write!(f, "{v:?}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

// ---------------------------------------------------------------------------
// UnitValue – a (value, unit) header pair
// ---------------------------------------------------------------------------

/// Placeholder written for an unset half of a unit-split field.
pub const UNSET_TOKEN: &str = "None";

/// A header quantity stored as `(value, unit)`, e.g. `12.5 MHz` or
/// `ongoing maxhold`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitValue {
    pub value: Option<FieldValue>,
    pub unit: Option<String>,
}

impl UnitValue {
    /// Split a descriptive string on whitespace.
    ///
    /// One token becomes the value verbatim. With more tokens the first is
    /// parsed as a number when possible and the second is the unit; any
    /// further tokens are dropped. A literal `None` token is read back as
    /// unset so rendered documents reload cleanly.
    pub fn parse(text: &str) -> Self {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let token = |t: &str| (t != UNSET_TOKEN).then(|| t.to_string());
        match tokens.as_slice() {
            [] => UnitValue::default(),
            [only] => UnitValue {
                value: token(*only).map(FieldValue::Text),
                unit: None,
            },
            [first, second, ..] => {
                let value = match first.parse::<f64>() {
                    Ok(v) => Some(FieldValue::Float(v)),
                    Err(_) => token(*first).map(FieldValue::Text),
                };
                UnitValue {
                    value,
                    unit: token(*second),
                }
            }
        }
    }

    /// Build from an arbitrary header value; only text is split.
    pub fn from_field(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => UnitValue::parse(&s),
            other => UnitValue {
                value: Some(other),
                unit: None,
            },
        }
    }

    pub fn is_unset(&self) -> bool {
        self.value.is_none() && self.unit.is_none()
    }

    /// `"<value> <unit>"`, with `None` standing in for either unset half.
    pub fn render(&self) -> String {
        let value = self
            .value
            .as_ref()
            .map_or_else(|| UNSET_TOKEN.to_string(), |v| v.to_string());
        let unit = self.unit.as_deref().unwrap_or(UNSET_TOKEN);
        format!("{value} {unit}")
    }
}

// ---------------------------------------------------------------------------
// SpectralRecord – one spectrum
// ---------------------------------------------------------------------------

/// A single spectrum: calibration curve or detected event.
///
/// `ave` and `maxhold` are only populated on event records. Unset optional
/// fields are omitted from the encoded document rather than written as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_polarization",
        skip_serializing_if = "Option::is_none"
    )]
    pub polarization: Option<Polarization>,
    /// Frequency axis.
    #[serde(default)]
    pub freq: Vec<f64>,
    /// Values on the frequency axis – same length as `freq` when both are set.
    #[serde(default)]
    pub val: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ave: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxhold: Option<Vec<f64>>,
}

impl SpectralRecord {
    pub fn for_polarization(polarization: Polarization) -> Self {
        SpectralRecord {
            polarization: Some(polarization),
            ..Default::default()
        }
    }

    /// Overwrite only the fields present in `patch`.
    pub fn apply(&mut self, patch: SpectralPatch) {
        if let Some(comment) = patch.comment {
            self.comment = Some(comment);
        }
        if let Some(pol) = patch.polarization {
            self.polarization = Some(pol);
        }
        if let Some(freq) = patch.freq {
            self.freq = freq;
        }
        if let Some(val) = patch.val {
            self.val = val;
        }
        if let Some(ave) = patch.ave {
            self.ave = Some(ave);
        }
        if let Some(maxhold) = patch.maxhold {
            self.maxhold = Some(maxhold);
        }
    }
}

/// A partial [`SpectralRecord`]: absent keys stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpectralPatch {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "deserialize_polarization")]
    pub polarization: Option<Polarization>,
    #[serde(default)]
    pub freq: Option<Vec<f64>>,
    #[serde(default)]
    pub val: Option<Vec<f64>>,
    #[serde(default)]
    pub ave: Option<Vec<f64>>,
    #[serde(default)]
    pub maxhold: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_split_numeric() {
        let u = UnitValue::parse("12.5 MHz");
        assert_eq!(u.value, Some(FieldValue::Float(12.5)));
        assert_eq!(u.unit.as_deref(), Some("MHz"));
    }

    #[test]
    fn test_unit_split_descriptive() {
        let u = UnitValue::parse("ongoing maxhold");
        assert_eq!(u.value, Some(FieldValue::Text("ongoing".into())));
        assert_eq!(u.unit.as_deref(), Some("maxhold"));
    }

    #[test]
    fn test_unit_split_single_token_is_verbatim() {
        let u = UnitValue::parse("12.5");
        assert_eq!(u.value, Some(FieldValue::Text("12.5".into())));
        assert_eq!(u.unit, None);
    }

    #[test]
    fn test_unit_render_marks_unset_halves() {
        assert_eq!(UnitValue::default().render(), "None None");
        let u = UnitValue {
            value: Some(FieldValue::Float(100.0)),
            unit: None,
        };
        assert_eq!(u.render(), "100.0 None");
        assert_eq!(UnitValue::parse(&u.render()), u);
        assert!(UnitValue::parse("None None").is_unset());
    }

    #[test]
    fn test_polarization_empty_string_is_unset() {
        let rec: SpectralRecord =
            serde_json::from_str(r#"{"polarization": "", "freq": [1.0]}"#).unwrap();
        assert_eq!(rec.polarization, None);
        assert_eq!(rec.freq, vec![1.0]);
        assert!(rec.val.is_empty());
    }

    #[test]
    fn test_unset_optionals_are_omitted() {
        let rec = SpectralRecord::for_polarization(Polarization::N);
        let json = serde_json::to_value(&rec).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.get("polarization").unwrap(), "N");
        assert!(!obj.contains_key("ave"));
        assert!(!obj.contains_key("maxhold"));
        assert!(!obj.contains_key("comment"));
    }

    #[test]
    fn test_apply_patch_keeps_absent_fields() {
        let mut rec = SpectralRecord {
            comment: Some("cal".into()),
            freq: vec![1.0, 2.0],
            val: vec![3.0, 4.0],
            ..Default::default()
        };
        let patch: SpectralPatch = serde_json::from_str(r#"{"val": [5.0, 6.0]}"#).unwrap();
        rec.apply(patch);
        assert_eq!(rec.freq, vec![1.0, 2.0]);
        assert_eq!(rec.val, vec![5.0, 6.0]);
        assert_eq!(rec.comment.as_deref(), Some("cal"));
    }

    #[test]
    fn test_field_value_keeps_json_type() {
        let v: FieldValue = serde_json::from_str("5").unwrap();
        assert_eq!(v, FieldValue::Integer(5));
        let v: FieldValue = serde_json::from_str("5.5").unwrap();
        assert_eq!(v, FieldValue::Float(5.5));
        let v: FieldValue = serde_json::from_str("\"HP8563\"").unwrap();
        assert_eq!(v.as_str(), Some("HP8563"));
    }

    #[test]
    fn test_field_value_large_integer_is_exact() {
        let v: FieldValue = serde_json::from_value(serde_json::json!(18446744073709551615u64)).unwrap();
        assert_eq!(v, FieldValue::Unsigned(u64::MAX));
        assert_eq!(serde_json::to_string(&v).unwrap(), "18446744073709551615");
        assert_eq!(v.to_string(), "18446744073709551615");
    }
}
