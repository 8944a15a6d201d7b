//! Human-readable durations for configuration values.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};

/// Accepted suffixes and their length in nanoseconds. `ms` must be tried
/// before `m` and `s`.
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1e3),
    ("us", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
];

/// Parse a config duration such as `"1s"`, `"250ms"` or `"5m"`.
///
/// Fractions are allowed (`"1.5s"`). Values too large for a `Duration`
/// saturate at its maximum.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let Some((number, nanos_per_unit)) = UNITS
        .iter()
        .find_map(|(suffix, nanos)| s.strip_suffix(suffix).map(|n| (n.trim(), *nanos)))
    else {
        bail!("duration {:?} needs a unit (ns, us, ms, s, m)", s);
    };

    let value: f64 = number
        .parse()
        .with_context(|| format!("invalid duration {:?}", s))?;
    if !value.is_finite() || value < 0.0 {
        bail!("duration {:?} must be a non-negative number", s);
    }

    // float-to-int casts saturate
    Ok(Duration::from_nanos((value * nanos_per_unit) as u64))
}

/// Short form used in log lines.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0s".to_string()
    } else if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1e3)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1e6)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// Serde adapter for `#[serde(deserialize_with = "...")]` on duration fields.
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
