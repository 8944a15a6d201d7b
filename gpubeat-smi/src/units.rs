//! Parsing of `"<number> <unit>"` strings such as `"16384 MiB"` or `"5 %"`.

use tracing::{debug, warn};

use crate::SmiError;

/// Placeholder the tool prints for values it cannot report.
const NOT_AVAILABLE: &str = "N/A";

/// A numeric value together with the unit label it was reported with.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl Quantity {
    /// Split a `"<number> <unit>"` string on its first space.
    ///
    /// The unit is everything after the first space, so `"12 KiB/s"` and
    /// `"3 per second"` keep their full label. A number that fails to parse
    /// yields `0.0`. A string without any space is rejected.
    ///
    /// ```rust
    /// use gpubeat_smi::Quantity;
    ///
    /// let q = Quantity::parse("16384 MiB").unwrap();
    /// assert_eq!(q.value, 16384.0);
    /// assert_eq!(q.unit, "MiB");
    ///
    /// assert_eq!(Quantity::parse("lots MiB").unwrap().value, 0.0);
    /// assert!(Quantity::parse("N/A").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, SmiError> {
        let (number, unit) = text
            .split_once(' ')
            .ok_or_else(|| SmiError::MalformedUnitString(text.to_string()))?;

        Ok(Self {
            value: number.parse().unwrap_or(0.0),
            unit: unit.to_string(),
        })
    }

    /// Parse `text` and return only the number, degrading to `0.0`.
    ///
    /// `field` names the value in the log line emitted when the string is
    /// malformed.
    pub fn value_or_zero(field: &str, text: &str) -> f64 {
        match Self::parse(text) {
            Ok(q) => q.value,
            Err(err) => {
                if text.trim() == NOT_AVAILABLE {
                    debug!(field, "value not available, using 0");
                } else {
                    warn!(field, error = %err, "using 0 for unparseable field");
                }
                0.0
            }
        }
    }
}
