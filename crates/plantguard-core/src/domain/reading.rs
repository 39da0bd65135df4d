//! Sensor readings decoded from serial frames.
//!
//! The firmware prints the light level as a percentage followed by a line
//! terminator, e.g. `"42\n"`.  A later firmware revision prints key/value
//! telemetry instead:
//!
//! ```text
//! DATA;LDR=42;MON=1;ALARM=0
//! STATUS;LDR=42;MON=1;ALARM=0
//! ```
//!
//! [`SensorReading::from_frame`] understands both shapes.  Readings carry no
//! identity beyond their arrival order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefixes of the key/value telemetry frames.
const TELEMETRY_PREFIXES: [&str; 2] = ["DATA;", "STATUS;"];

/// The telemetry key holding the light level.
const LDR_KEY: &str = "LDR";

/// A single scalar value as it appears on the wire.
///
/// `#[serde(untagged)]` makes serde try each variant in order, so the JSON
/// number `42` becomes `Integer(42)`, `42.5` becomes `Float(42.5)` and
/// `"dim"` becomes `Text("dim")`.  Serializing writes the value back in the
/// same JSON shape, which is what lets the relay pass readings through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Parses frame text into the narrowest scalar that fits.
    ///
    /// Non-finite floats (`"nan"`, `"inf"`) are kept as text because JSON
    /// cannot represent them.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Scalar::Integer(i);
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Scalar::Float(f),
            _ => Scalar::Text(text.to_string()),
        }
    }

    /// Numeric view of the value, if it has one.
    ///
    /// Text that looks like a number (`" 55 "`) counts as numeric, mirroring
    /// how browsers coerce the value when comparing it against thresholds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) if f.is_finite() => Some(*f),
            Scalar::Float(_) => None,
            Scalar::Text(t) => t.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(t) => f.write_str(t),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Integer(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// One light-level reading.
///
/// Serialized as `{"valor": <scalar>}`, the payload of the `luminosidade`
/// event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "valor")]
    pub value: Scalar,
}

impl SensorReading {
    pub fn new(value: impl Into<Scalar>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Decodes one serial frame (without its delimiter).
    ///
    /// Returns `None` for blank frames and for telemetry frames that carry no
    /// `LDR` field.
    pub fn from_frame(frame: &str) -> Option<Self> {
        let frame = frame.trim();
        if frame.is_empty() {
            return None;
        }

        if TELEMETRY_PREFIXES.iter().any(|p| frame.starts_with(p)) {
            return telemetry_field(frame, LDR_KEY).map(|v| Self {
                value: Scalar::parse(v),
            });
        }

        Some(Self {
            value: Scalar::parse(frame),
        })
    }
}

/// Finds `key=value` among the `;`-separated fields after the prefix.
fn telemetry_field<'a>(frame: &'a str, key: &str) -> Option<&'a str> {
    frame
        .split(';')
        .skip(1)
        .filter_map(|part| part.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_integer_frame_decodes_to_integer() {
        let r = SensorReading::from_frame("42").unwrap();
        assert_eq!(r.value, Scalar::Integer(42));
    }

    #[test]
    fn test_frame_with_residual_carriage_return_is_trimmed() {
        // A CRLF device read with an LF delimiter leaves the '\r' behind.
        let r = SensorReading::from_frame("55\r").unwrap();
        assert_eq!(r.value, Scalar::Integer(55));
    }

    #[test]
    fn test_blank_frame_is_skipped() {
        assert!(SensorReading::from_frame("").is_none());
        assert!(SensorReading::from_frame(" \r").is_none());
    }

    #[test]
    fn test_float_frame_decodes_to_float() {
        let r = SensorReading::from_frame("42.5").unwrap();
        assert_eq!(r.value, Scalar::Float(42.5));
    }

    #[test]
    fn test_non_numeric_frame_is_kept_as_text() {
        let r = SensorReading::from_frame("Luminosidade: 40").unwrap();
        assert_eq!(r.value, Scalar::Text("Luminosidade: 40".to_string()));
    }

    #[test]
    fn test_nan_text_is_not_a_float() {
        assert_eq!(Scalar::parse("NaN"), Scalar::Text("NaN".to_string()));
    }

    #[test]
    fn test_data_telemetry_frame_extracts_ldr() {
        let r = SensorReading::from_frame("DATA;LDR=123;MON=1;ALARM=0").unwrap();
        assert_eq!(r.value, Scalar::Integer(123));
    }

    #[test]
    fn test_status_telemetry_frame_extracts_ldr() {
        let r = SensorReading::from_frame("STATUS;MON=0;LDR=7").unwrap();
        assert_eq!(r.value, Scalar::Integer(7));
    }

    #[test]
    fn test_telemetry_frame_without_ldr_is_skipped() {
        assert!(SensorReading::from_frame("STATUS;MON=1;ALARM=0").is_none());
        assert!(SensorReading::from_frame("DATA;LDR=").is_none());
    }

    #[test]
    fn test_reading_serializes_with_valor_key() {
        let json = serde_json::to_string(&SensorReading::new(42)).unwrap();
        assert_eq!(json, r#"{"valor":42}"#);
    }

    #[test]
    fn test_untagged_scalar_preserves_json_shape() {
        // Arrange: the three shapes a peer might send
        for raw in [r#"{"valor":42}"#, r#"{"valor":42.5}"#, r#"{"valor":"42"}"#] {
            // Act
            let r: SensorReading = serde_json::from_str(raw).unwrap();
            let back = serde_json::to_string(&r).unwrap();

            // Assert: re-serialization is byte-identical
            assert_eq!(back, raw);
        }
    }

    #[test]
    fn test_as_f64_coerces_numeric_text() {
        assert_eq!(Scalar::Text(" 30 ".to_string()).as_f64(), Some(30.0));
        assert_eq!(Scalar::Text("dark".to_string()).as_f64(), None);
        assert_eq!(Scalar::Integer(50).as_f64(), Some(50.0));
    }
}
