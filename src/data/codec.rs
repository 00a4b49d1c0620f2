use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, RidsError};

// ---------------------------------------------------------------------------
// Encoding selection
// ---------------------------------------------------------------------------

/// Container encodings of the one logical RIDS layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `.rids` (or anything else) – plain JSON text.
    Plain,
    /// `.ridz` – gzip-compressed JSON text.
    Compressed,
}

impl Encoding {
    /// Dispatch by extension, case-insensitively.
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "ridz" => Encoding::Compressed,
            _ => Encoding::Plain,
        }
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Read and decode a container, returning its top-level object.
pub fn read_container(path: &Path) -> Result<Map<String, JsonValue>> {
    let bytes = std::fs::read(path).map_err(|e| RidsError::filesystem(path, e))?;
    decode(&bytes, Encoding::for_path(path), path)
}

/// Decode raw container bytes. `origin` only labels errors.
pub fn decode(bytes: &[u8], encoding: Encoding, origin: &Path) -> Result<Map<String, JsonValue>> {
    let text = match encoding {
        Encoding::Plain => String::from_utf8(bytes.to_vec())
            .map_err(|e| RidsError::format(origin, format!("not UTF-8 text: {e}")))?,
        Encoding::Compressed => {
            let mut text = String::new();
            GzDecoder::new(bytes)
                .read_to_string(&mut text)
                .map_err(|e| RidsError::format(origin, format!("decompression failed: {e}")))?;
            text
        }
    };

    let root: JsonValue = serde_json::from_str(&text)
        .map_err(|e| RidsError::format(origin, format!("invalid JSON: {e}")))?;

    match root {
        JsonValue::Object(map) => Ok(map),
        other => Err(RidsError::format(
            origin,
            format!("expected a top-level JSON object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Render a document as text: sorted keys (the `Map` is ordered), four-space
/// indent, `:` without a trailing space, numeric lists on one line.
pub fn to_text(document: &JsonValue) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CompactColonFormatter::new());
    document.serialize(&mut ser)?;
    let text = String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)?;
    Ok(collapse_numeric_lists(&text))
}

/// Encode text for the given container.
pub fn encode(text: &str, encoding: Encoding) -> io::Result<Vec<u8>> {
    match encoding {
        Encoding::Plain => Ok(text.as_bytes().to_vec()),
        Encoding::Compressed => {
            let mut gz = GzEncoder::new(Vec::new(), Compression::default());
            gz.write_all(text.as_bytes())?;
            gz.finish()
        }
    }
}

/// Encode and write a document, replacing any existing file.
pub fn write_container(path: &Path, document: &JsonValue) -> Result<()> {
    let text = to_text(document).map_err(|e| RidsError::format(path, format!("cannot encode document: {e}")))?;
    let bytes = encode(&text, Encoding::for_path(path)).map_err(|e| RidsError::filesystem(path, e))?;
    std::fs::write(path, bytes).map_err(|e| RidsError::filesystem(path, e))
}

/// Pretty printer writing `"key":value`.
struct CompactColonFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl<'a> CompactColonFormatter<'a> {
    fn new() -> Self {
        CompactColonFormatter {
            inner: PrettyFormatter::with_indent(b"    "),
        }
    }
}

impl Formatter for CompactColonFormatter<'_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b":")
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}

/// Put every purely numeric JSON array on a single line.
///
/// String literals are copied untouched, so brackets inside comments survive.
pub fn collapse_numeric_lists(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let width = c.len_utf8();
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            rest = &rest[width..];
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '[' => {
                let body = &rest[1..];
                let close = body.find(|ch: char| matches!(ch, ']' | '[' | '{' | '"'));
                match close {
                    Some(end) if body[end..].starts_with(']') && is_numeric_body(&body[..end]) => {
                        out.push('[');
                        out.extend(body[..end].chars().filter(|ch| !ch.is_whitespace()));
                        out.push(']');
                        rest = &body[end + 1..];
                        continue;
                    }
                    _ => out.push(c),
                }
            }
            _ => out.push(c),
        }
        rest = &rest[width..];
    }
    out
}

fn is_numeric_body(body: &str) -> bool {
    body.chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, ',' | '.' | '-' | '+' | 'e' | 'E'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_encoding_by_suffix() {
        assert_eq!(Encoding::for_path(Path::new("a/2017.ridz")), Encoding::Compressed);
        assert_eq!(Encoding::for_path(Path::new("2017.RIDZ")), Encoding::Compressed);
        assert_eq!(Encoding::for_path(Path::new("header.rids")), Encoding::Plain);
        assert_eq!(Encoding::for_path(Path::new("noext")), Encoding::Plain);
    }

    #[test]
    fn test_to_text_layout() {
        let doc = json!({"b": {"freq": [1.5, 2.0, 3.25]}, "a": "x", "c": []});
        let text = to_text(&doc).unwrap();
        assert_eq!(
            text,
            "{\n    \"a\":\"x\",\n    \"b\":{\n        \"freq\":[1.5,2.0,3.25]\n    },\n    \"c\":[]\n}"
        );
    }

    #[test]
    fn test_collapse_leaves_strings_alone() {
        let text = "{\n    \"comment\":\"see [1, 2]\",\n    \"v\":[\n        1,\n        -2.5e-3\n    ]\n}";
        let out = collapse_numeric_lists(text);
        assert!(out.contains("\"see [1, 2]\""));
        assert!(out.contains("\"v\":[1,-2.5e-3]"));
    }

    #[test]
    fn test_collapse_skips_arrays_of_strings() {
        let text = "[\n    \"a\",\n    \"b\"\n]";
        assert_eq!(collapse_numeric_lists(text), text);
    }

    #[test]
    fn test_compressed_roundtrip_is_exact() {
        let values: Vec<f64> = vec![0.1, 1.0 / 3.0, 2.5e-300, 123456789.123456789, -0.0];
        let doc = json!({ "val": values });
        let bytes = encode(&to_text(&doc).unwrap(), Encoding::Compressed).unwrap();
        let map = decode(&bytes, Encoding::Compressed, Path::new("t.ridz")).unwrap();
        let back: Vec<f64> = serde_json::from_value(map["val"].clone()).unwrap();
        assert_eq!(back.len(), values.len());
        for (a, b) in back.iter().zip(&values) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_rejects_plain_text_as_compressed() {
        let err = decode(b"{}", Encoding::Compressed, Path::new("x.ridz")).unwrap_err();
        assert!(matches!(err, RidsError::Format { .. }));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        let err = decode(b"[1, 2]", Encoding::Plain, Path::new("x.rids")).unwrap_err();
        match err {
            RidsError::Format { path, reason } => {
                assert_eq!(path, PathBuf::from("x.rids"));
                assert!(reason.contains("array"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        let err = decode(b"{\"a\":", Encoding::Plain, Path::new("x.rids")).unwrap_err();
        assert!(matches!(err, RidsError::Format { .. }));
    }
}
