//! Timestamp parsing and formatting.
//!
//! All timestamps are naive UTC. Inputs carrying an explicit offset are
//! converted to UTC before the offset is dropped.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::error::{IsobarError, Result};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO 8601 timestamp supplied by a caller.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    // A bare trailing "Z" without seconds is not RFC 3339 but is common.
    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(IsobarError::InvalidTimeFormat {
        value: value.to_string(),
    })
}

/// `YYYY-MM-DDTHH:MM:SS`
pub fn format_iso(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// `YYYY-MM-DDTHH:MM:SSZ`
pub fn format_iso_utc(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Decode a CF-convention time unit such as `hours since 2025-06-01 00:00:00`.
///
/// Returns the length of one unit and the reference epoch.
pub fn parse_cf_time_units(units: &str) -> Result<(Duration, NaiveDateTime)> {
    let invalid = || IsobarError::InvalidDataset {
        message: format!("Unsupported time units: '{}'", units),
    };

    let mut parts = units.trim().splitn(3, ' ');
    let unit = parts.next().ok_or_else(invalid)?.to_ascii_lowercase();
    if parts.next() != Some("since") {
        return Err(invalid());
    }
    let reference = parts.next().ok_or_else(invalid)?;

    let length = match unit.as_str() {
        "second" | "seconds" | "s" => Duration::seconds(1),
        "minute" | "minutes" | "min" => Duration::minutes(1),
        "hour" | "hours" | "h" => Duration::hours(1),
        "day" | "days" | "d" => Duration::days(1),
        _ => return Err(invalid()),
    };

    // Reference may carry a timezone suffix such as "UTC" or "+00:00".
    let reference = reference
        .trim()
        .trim_end_matches(" UTC")
        .trim_end_matches("+00:00");
    let epoch = parse_timestamp(reference).map_err(|_| invalid())?;

    Ok((length, epoch))
}

/// Convert one raw time coordinate, counted in `unit` since `epoch`.
///
/// Non-finite values and instants outside the representable range are
/// rejected rather than clamped.
pub fn decode_cf_time(value: f64, unit: Duration, epoch: NaiveDateTime) -> Result<NaiveDateTime> {
    let invalid = || IsobarError::InvalidDataset {
        message: format!("Time coordinate {} is not a representable instant", value),
    };

    let millis = (value * unit.num_milliseconds() as f64).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(invalid());
    }

    Duration::try_milliseconds(millis as i64)
        .and_then(|offset| epoch.checked_add_signed(offset))
        .ok_or_else(invalid)
}
