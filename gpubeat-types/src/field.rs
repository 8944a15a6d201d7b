//! Flat field values for generic event consumers.

use std::collections::BTreeMap;
use std::fmt;

/// A single named value in an event's flattened field map.
///
/// Typed payloads ([`GpuMetrics`](crate::GpuMetrics),
/// [`GpuProcessMetrics`](crate::GpuProcessMetrics)) are the primary API;
/// `FieldValue` exists for sinks that only understand key/value records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub enum FieldValue {
    /// A non-negative count (e.g. number of processes).
    #[cfg_attr(feature = "minicbor", n(0))]
    Count(#[cfg_attr(feature = "minicbor", n(0))] u64),

    /// A measured quantity with its unit stripped.
    #[cfg_attr(feature = "minicbor", n(1))]
    Number(#[cfg_attr(feature = "minicbor", n(0))] f64),

    /// An identifier or name.
    #[cfg_attr(feature = "minicbor", n(2))]
    Text(#[cfg_attr(feature = "minicbor", n(0))] String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Count(c) => Some(*c as f64),
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
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
            FieldValue::Count(c) => write!(f, "{}", c),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Count(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Flattened view of an event payload, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;
