//! Per-calendar-day mean glucose.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use glucose_core::error::{ReportError, Result};
use glucose_core::models::{
    DailyMeanGlucose, GlucoseEvent, GlucoseReading, GlucoseSample, HIGH_SENTINEL, LOW_SENTINEL,
};
use glucose_core::policy::{PolicyConfig, RoundingMode, X_DOMAIN_PADDING_DAYS, Y_DOMAIN_PADDING};
use serde::Serialize;

/// Chart title handed to the renderer with the daily table.
pub const DAILY_GLUCOSE_TITLE: &str = "Average Blood Glucose";

// ── DailyStats ────────────────────────────────────────────────────────────────

/// Running sum and count for one calendar day.
#[derive(Debug, Clone, Copy, Default)]
struct DailyStats {
    sum: u64,
    count: u32,
}

impl DailyStats {
    fn add(&mut self, value: u32) {
        self.sum += u64::from(value);
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum as f64 / f64::from(self.count)
    }
}

// ── DailyGlucoseTable ─────────────────────────────────────────────────────────

/// Daily means plus the axis domains a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyGlucoseTable {
    pub title: String,
    pub rows: Vec<DailyMeanGlucose>,
    /// `[min(date) − 1 day, max(date) + 1 day]`; `None` when there are no rows.
    pub x_domain: Option<(NaiveDate, NaiveDate)>,
    /// `[min(mean) − 10, max(mean) + 10]`; `None` when there are no rows.
    pub y_domain: Option<(i64, i64)>,
}

impl DailyGlucoseTable {
    /// Wrap `rows`, deriving both domains from them alone.
    pub fn from_rows(rows: Vec<DailyMeanGlucose>) -> Self {
        let x_domain = x_domain(&rows);
        let y_domain = y_domain(&rows);
        Self {
            title: DAILY_GLUCOSE_TITLE.to_string(),
            rows,
            x_domain,
            y_domain,
        }
    }
}

// ── GlucoseAggregator ─────────────────────────────────────────────────────────

/// Stateless helper turning the glucose view into daily means.
pub struct GlucoseAggregator;

impl GlucoseAggregator {
    /// Truncate each reading to its date and replace sentinels by policy.
    ///
    /// Non-sentinel values pass through unaltered. A `"High"` reading with
    /// no configured substitute is fatal.
    pub fn substitute_sentinels(
        events: &[GlucoseEvent],
        policy: &PolicyConfig,
    ) -> Result<Vec<GlucoseSample>> {
        events
            .iter()
            .map(|event| {
                let glucose_value = event.reading.resolve(policy).ok_or_else(|| {
                    ReportError::UnmappedSentinel {
                        sentinel: sentinel_label(&event.reading).to_string(),
                        datetime: event.datetime.to_string(),
                    }
                })?;
                Ok(GlucoseSample {
                    date: event.datetime.date(),
                    glucose_value,
                })
            })
            .collect()
    }

    /// Group samples by date and round each day's arithmetic mean.
    ///
    /// Returns one row per distinct date, ascending.
    pub fn daily_means(samples: &[GlucoseSample], rounding: RoundingMode) -> Vec<DailyMeanGlucose> {
        let mut by_day: BTreeMap<NaiveDate, DailyStats> = BTreeMap::new();
        for sample in samples {
            by_day.entry(sample.date).or_default().add(sample.glucose_value);
        }

        by_day
            .into_iter()
            .map(|(date, stats)| DailyMeanGlucose {
                date,
                mean_glucose: rounding.round(stats.mean()),
            })
            .collect()
    }

    /// Full daily aggregation: sentinel substitution, grouping, domains.
    pub fn aggregate_daily(
        events: &[GlucoseEvent],
        policy: &PolicyConfig,
    ) -> Result<DailyGlucoseTable> {
        let samples = Self::substitute_sentinels(events, policy)?;
        let rows = Self::daily_means(&samples, policy.rounding);
        Ok(DailyGlucoseTable::from_rows(rows))
    }
}

// ── Axis domains ──────────────────────────────────────────────────────────────

/// Date range padded by one day on each side.
pub fn x_domain(rows: &[DailyMeanGlucose]) -> Option<(NaiveDate, NaiveDate)> {
    let min = rows.iter().map(|r| r.date).min()?;
    let max = rows.iter().map(|r| r.date).max()?;
    let pad = Duration::days(X_DOMAIN_PADDING_DAYS);
    Some((min - pad, max + pad))
}

/// Mean range padded by ten mg/dL on each side.
pub fn y_domain(rows: &[DailyMeanGlucose]) -> Option<(i64, i64)> {
    let min = rows.iter().map(|r| r.mean_glucose).min()?;
    let max = rows.iter().map(|r| r.mean_glucose).max()?;
    Some((min - Y_DOMAIN_PADDING, max + Y_DOMAIN_PADDING))
}

fn sentinel_label(reading: &GlucoseReading) -> &'static str {
    match reading {
        GlucoseReading::High => HIGH_SENTINEL,
        _ => LOW_SENTINEL,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
