//! # Published Values
//!
//! Scalar values written to the telemetry bus, and the display units
//! attached to telemetry paths.

use std::fmt;

use serde::Serialize;

/// A scalar value held by a bus path.
///
/// `Empty` is the "no value yet" state of a telemetry path before the
/// first successful cycle. It serializes as JSON `null`.
///
/// # Example
///
/// ```rust
/// use epever_bridge::SinkValue;
///
/// let voltage = SinkValue::from(13.25);
/// assert_eq!(voltage.as_f64(), Some(13.25));
/// assert_eq!(SinkValue::Empty.as_f64(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum SinkValue {
    /// Integer value (state codes, ids, flags)
    Int(i64),
    /// Floating point measurement
    Float(f64),
    /// Text (names, versions)
    Text(String),
    /// No value
    #[default]
    Empty,
}

impl SinkValue {
    /// Numeric view of the value, `None` for text and empty values.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SinkValue::Int(v) => Some(*v as f64),
            SinkValue::Float(v) => Some(*v),
            SinkValue::Text(_) | SinkValue::Empty => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SinkValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SinkValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, SinkValue::Empty)
    }

    /// Returns the type name as a string for logging/debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            SinkValue::Int(_) => "int",
            SinkValue::Float(_) => "float",
            SinkValue::Text(_) => "text",
            SinkValue::Empty => "empty",
        }
    }
}

impl fmt::Display for SinkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkValue::Int(v) => write!(f, "{}", v),
            SinkValue::Float(v) => write!(f, "{}", v),
            SinkValue::Text(v) => f.write_str(v),
            SinkValue::Empty => f.write_str("---"),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<f64> for SinkValue {
    fn from(v: f64) -> Self {
        SinkValue::Float(v)
    }
}

impl From<i64> for SinkValue {
    fn from(v: i64) -> Self {
        SinkValue::Int(v)
    }
}

impl From<u8> for SinkValue {
    fn from(v: u8) -> Self {
        SinkValue::Int(i64::from(v))
    }
}

impl From<u16> for SinkValue {
    fn from(v: u16) -> Self {
        SinkValue::Int(i64::from(v))
    }
}

impl From<u32> for SinkValue {
    fn from(v: u32) -> Self {
        SinkValue::Int(i64::from(v))
    }
}

impl From<&str> for SinkValue {
    fn from(v: &str) -> Self {
        SinkValue::Text(v.to_string())
    }
}

impl From<String> for SinkValue {
    fn from(v: String) -> Self {
        SinkValue::Text(v)
    }
}

impl<T: Into<SinkValue>> From<Option<T>> for SinkValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SinkValue::Empty, Into::into)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Display unit of a telemetry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    Volt,
    Amp,
    Watt,
    KiloWattHour,
    Celsius,
}

impl Unit {
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Amp => "A",
            Unit::Watt => "W",
            Unit::KiloWattHour => "kWh",
            Unit::Celsius => "°C",
        }
    }

    /// Human-readable text of a value in this unit, e.g. `13.25V`.
    pub fn format(&self, value: &SinkValue) -> String {
        format!("{}{}", value, self.suffix())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(SinkValue::Int(5).as_f64(), Some(5.0));
        assert_eq!(SinkValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(SinkValue::Text("x".into()).as_f64(), None);
        assert_eq!(SinkValue::Int(7).as_i64(), Some(7));
        assert_eq!(SinkValue::Float(7.0).as_i64(), None);
        assert_eq!(SinkValue::from("USB").as_str(), Some("USB"));
    }

    #[test]
    fn test_from_option() {
        assert!(SinkValue::from(None::<&str>).is_empty());
        assert_eq!(SinkValue::from(Some(3u8)), SinkValue::Int(3));
    }

    #[test]
    fn test_serialize_untagged() {
        let values = vec![
            SinkValue::Int(2),
            SinkValue::Float(13.25),
            SinkValue::from("412"),
            SinkValue::Empty,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[2,13.25,"412",null]"#);
    }

    #[test]
    fn test_unit_format() {
        assert_eq!(Unit::Volt.format(&SinkValue::Float(13.25)), "13.25V");
        assert_eq!(Unit::KiloWattHour.format(&SinkValue::Float(5.62)), "5.62kWh");
        assert_eq!(Unit::Celsius.to_string(), "°C");
        assert_eq!(SinkValue::Empty.type_name(), "empty");
    }
}
