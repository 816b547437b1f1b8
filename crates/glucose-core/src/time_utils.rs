use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReportError, Result};

/// Seconds in one wall-clock day.
pub const SECONDS_PER_DAY: u32 = 86_400;

// ── BucketSize ────────────────────────────────────────────────────────────────

/// Width of a time-of-day bucket, stored in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketSize {
    seconds: u32,
}

impl BucketSize {
    /// Zero and widths over a day are rejected.
    pub fn from_seconds(seconds: u32) -> Result<Self> {
        if seconds == 0 || seconds > SECONDS_PER_DAY {
            return Err(ReportError::InvalidBucketSize(format!("{}s", seconds)));
        }
        Ok(Self { seconds })
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Number of buckets starting within one day. A shorter final bucket
    /// counts when the width does not divide the day.
    pub fn buckets_per_day(&self) -> u32 {
        SECONDS_PER_DAY.div_ceil(self.seconds)
    }

    /// `true` when the width tiles a day with no remainder.
    pub fn divides_day(&self) -> bool {
        SECONDS_PER_DAY % self.seconds == 0
    }
}

impl FromStr for BucketSize {
    type Err = ReportError;

    /// Parse a frequency string such as `"30min"`, `"30T"`, `"1h"` or `"90s"`.
    ///
    /// A bare number is read as minutes.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);

        let amount: u32 = digits
            .parse()
            .map_err(|_| ReportError::InvalidBucketSize(value.to_string()))?;

        let multiplier = match unit {
            "" | "min" | "T" | "m" => 60,
            "h" | "H" => 3_600,
            "s" | "S" => 1,
            _ => return Err(ReportError::InvalidBucketSize(value.to_string())),
        };

        Self::from_seconds(amount.saturating_mul(multiplier))
            .map_err(|_| ReportError::InvalidBucketSize(value.to_string()))
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds % 3_600 == 0 {
            write!(f, "{}h", self.seconds / 3_600)
        } else if self.seconds % 60 == 0 {
            write!(f, "{}min", self.seconds / 60)
        } else {
            write!(f, "{}s", self.seconds)
        }
    }
}

impl TryFrom<String> for BucketSize {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BucketSize> for String {
    fn from(value: BucketSize) -> Self {
        value.to_string()
    }
}

// ── BucketSpec ────────────────────────────────────────────────────────────────

/// The time-of-day grid: `periods` buckets of `bucket_size` starting at 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub periods: u32,
    pub bucket_size: BucketSize,
}

impl BucketSpec {
    pub fn new(periods: u32, bucket_size: BucketSize) -> Self {
        Self {
            periods,
            bucket_size,
        }
    }

    /// A grid with a bucket for every time of day.
    pub fn full_day(bucket_size: BucketSize) -> Self {
        Self::new(bucket_size.buckets_per_day(), bucket_size)
    }

    /// `true` when every time of day falls on a grid bucket.
    pub fn covers_full_day(&self) -> bool {
        self.periods == self.bucket_size.buckets_per_day()
    }

    /// Reject grids that are empty or whose buckets start past midnight.
    ///
    /// A grid running past midnight would repeat keys and count each event
    /// more than once.
    pub fn validate(&self) -> Result<()> {
        let max = self.bucket_size.buckets_per_day();
        if self.periods == 0 || self.periods > max {
            return Err(ReportError::Config(format!(
                "{} buckets of {} do not fit in one day (1..={} allowed)",
                self.periods, self.bucket_size, max
            )));
        }
        Ok(())
    }

    /// Ascending grid `{00:00, B, 2B, …, (P-1)·B}`.
    ///
    /// Never wraps: grid points that would start at or after midnight are
    /// left out, so every key is distinct.
    pub fn grid(&self) -> Vec<NaiveTime> {
        let step = self.bucket_size.seconds();
        (0..self.periods.min(self.bucket_size.buckets_per_day()))
            .filter_map(|k| NaiveTime::from_num_seconds_from_midnight_opt(k * step, 0))
            .collect()
    }
}

// ── Flooring ──────────────────────────────────────────────────────────────────

/// Floor `dt` to its bucket and drop the date.
///
/// Buckets are anchored at local midnight, so the result is always a whole
/// multiple of `bucket_size` past 00:00.
pub fn floor_time_of_day(dt: NaiveDateTime, bucket_size: BucketSize) -> NaiveTime {
    let secs = dt.time().num_seconds_from_midnight();
    let floored = secs - secs % bucket_size.seconds();
    NaiveTime::from_num_seconds_from_midnight_opt(floored, 0).unwrap_or(NaiveTime::MIN)
}

/// Format a bucket key as `"HH:MM"`.
pub fn format_time_of_day(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // ── BucketSize parsing ───────────────────────────────────────────────────

    #[test]
    fn test_parse_minutes_forms() {
        assert_eq!("30min".parse::<BucketSize>().unwrap().seconds(), 1_800);
        assert_eq!("30T".parse::<BucketSize>().unwrap().seconds(), 1_800);
        assert_eq!("15m".parse::<BucketSize>().unwrap().seconds(), 900);
        assert_eq!("45".parse::<BucketSize>().unwrap().seconds(), 2_700);
    }

    #[test]
    fn test_parse_hour_and_second_forms() {
        assert_eq!("1h".parse::<BucketSize>().unwrap().seconds(), 3_600);
        assert_eq!("2H".parse::<BucketSize>().unwrap().seconds(), 7_200);
        assert_eq!("90s".parse::<BucketSize>().unwrap().seconds(), 90);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<BucketSize>().is_err());
        assert!("min".parse::<BucketSize>().is_err());
        assert!("30 minutes".parse::<BucketSize>().is_err());
        assert!("0min".parse::<BucketSize>().is_err());
        assert!("25h".parse::<BucketSize>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for s in ["30min", "1h", "90s"] {
            let size: BucketSize = s.parse().unwrap();
            assert_eq!(size.to_string(), s);
        }
    }

    #[test]
    fn test_buckets_per_day() {
        let size: BucketSize = "30min".parse().unwrap();
        assert_eq!(size.buckets_per_day(), 48);
        assert!(size.divides_day());

        let odd: BucketSize = "7min".parse().unwrap();
        assert!(!odd.divides_day());
        // 205 whole buckets plus a final 5-minute one from 23:55.
        assert_eq!(odd.buckets_per_day(), 206);
    }

    // ── BucketSpec ───────────────────────────────────────────────────────────

    #[test]
    fn test_grid_is_dense_and_ascending() {
        let spec = BucketSpec::new(48, "30min".parse().unwrap());
        let grid = spec.grid();
        assert_eq!(grid.len(), 48);
        assert_eq!(grid[0], hm(0, 0));
        assert_eq!(grid[1], hm(0, 30));
        assert_eq!(grid[47], hm(23, 30));
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_full_day_spec_covers_day() {
        let spec = BucketSpec::full_day("1h".parse().unwrap());
        assert_eq!(spec.periods, 24);
        assert!(spec.covers_full_day());
        assert!(!BucketSpec::new(12, "1h".parse().unwrap()).covers_full_day());
    }

    #[test]
    fn test_grid_never_repeats_past_midnight() {
        let spec = BucketSpec::new(3, "12h".parse().unwrap());
        assert_eq!(spec.grid(), vec![hm(0, 0), hm(12, 0)]);

        let huge = BucketSpec::new(u32::MAX, "1h".parse().unwrap());
        assert_eq!(huge.grid().len(), 24);
    }

    #[test]
    fn test_uneven_full_day_grid_reaches_last_minutes() {
        let size: BucketSize = "7min".parse().unwrap();
        let spec = BucketSpec::full_day(size);
        assert!(spec.covers_full_day());
        assert_eq!(spec.grid().last(), Some(&hm(23, 55)));

        assert!(spec.grid().contains(&floor_time_of_day(at(23, 59, 0), size)));
    }

    #[test]
    fn test_validate_rejects_grids_past_midnight() {
        let hour: BucketSize = "1h".parse().unwrap();
        assert!(BucketSpec::new(24, hour).validate().is_ok());
        assert!(BucketSpec::new(12, hour).validate().is_ok());
        assert!(BucketSpec::new(25, hour).validate().is_err());
        assert!(BucketSpec::new(0, hour).validate().is_err());
        assert!(BucketSpec::new(u32::MAX, hour).validate().is_err());
    }

    // ── floor_time_of_day ────────────────────────────────────────────────────

    #[test]
    fn test_floor_to_half_hour() {
        let size: BucketSize = "30min".parse().unwrap();
        assert_eq!(floor_time_of_day(at(8, 5, 0), size), hm(8, 0));
        assert_eq!(floor_time_of_day(at(8, 35, 59), size), hm(8, 30));
        assert_eq!(floor_time_of_day(at(8, 30, 0), size), hm(8, 30));
        assert_eq!(floor_time_of_day(at(23, 59, 59), size), hm(23, 30));
    }

    #[test]
    fn test_floor_discards_date() {
        let size: BucketSize = "1h".parse().unwrap();
        let other_day = NaiveDate::from_ymd_opt(2023, 7, 1)
            .unwrap()
            .and_hms_opt(14, 20, 0)
            .unwrap();
        assert_eq!(floor_time_of_day(other_day, size), hm(14, 0));
        assert_eq!(floor_time_of_day(at(14, 59, 0), size), hm(14, 0));
    }

    #[test]
    fn test_format_time_of_day() {
        assert_eq!(format_time_of_day(hm(8, 30)), "08:30");
        assert_eq!(format_time_of_day(hm(0, 0)), "00:00");
    }
}
