use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{GlucoseReading, HIGH_SENTINEL, LOW_SENTINEL};

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses the wall-clock timestamps found in CGM export cells.
///
/// Device exports record local time without an offset, so every result is a
/// [`NaiveDateTime`]. Strings carrying an offset keep their local reading and
/// drop the offset.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Parse a cell; `None` for blank or unrecognised input.
    pub fn parse_str(s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        // Offset-bearing ISO 8601 / RFC 3339.
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.naive_local());
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%m/%d/%Y %H:%M:%S",
            "%m/%d/%Y %H:%M",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }

        // Date-only cells read as midnight.
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

// ── ValueCoercer ──────────────────────────────────────────────────────────────

/// A cell that is present but cannot be coerced to its column's type.
///
/// Carries no context; callers attach line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uncoercible;

/// Typed coercion for the numeric value columns.
pub struct ValueCoercer;

impl ValueCoercer {
    /// Coerce a glucose cell to a reading, recognising the sentinels.
    ///
    /// Accepts integers and integral floats (`"120.0"`). Blank cells fail.
    pub fn glucose(cell: &str) -> Result<GlucoseReading, Uncoercible> {
        let cell = cell.trim();
        if cell == LOW_SENTINEL {
            return Ok(GlucoseReading::Low);
        }
        if cell == HIGH_SENTINEL {
            return Ok(GlucoseReading::High);
        }
        if let Ok(v) = cell.parse::<u32>() {
            return Ok(GlucoseReading::Value(v));
        }
        match cell.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
                Ok(GlucoseReading::Value(f as u32))
            }
            _ => Err(Uncoercible),
        }
    }

    /// Coerce an optional numeric cell. Blank cells are `Ok(None)`.
    pub fn optional_number(cell: &str) -> Result<Option<f64>, Uncoercible> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(None);
        }
        match cell.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Some(f)),
            _ => Err(Uncoercible),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
