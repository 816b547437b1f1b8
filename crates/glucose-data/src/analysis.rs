//! Main aggregation pipeline.
//!
//! Orchestrates loading, classification, daily aggregation and histogram
//! bucketing, returning an [`AggregateReport`] ready for the rendering layer.

use std::path::PathBuf;

use chrono::Utc;
use glucose_core::error::Result;
use glucose_core::policy::PolicyConfig;
use glucose_core::time_utils::BucketSpec;
use serde::Serialize;
use tracing::info;

use crate::aggregator::{DailyGlucoseTable, GlucoseAggregator};
use crate::classifier::classify;
use crate::histogram::{carb_histogram, insulin_histograms, Histogram};
use crate::reader::{load_event_file, load_event_log, EventLog};

// ── Public types ──────────────────────────────────────────────────────────────

/// Where to read the export from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A data directory, with the sample fallback.
    DataDir(PathBuf),
    /// One explicit file, no fallback.
    File(PathBuf),
}

/// Metadata produced alongside the aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// Path of the export actually read, or `<bundled sample>`.
    pub source: String,
    /// Whether the primary export was missing.
    pub used_fallback: bool,
    pub rows_read: usize,
    /// Rows without a timestamp (export metadata).
    pub rows_skipped: usize,
    pub glucose_events: usize,
    pub insulin_events: usize,
    pub carb_events: usize,
    /// Events of any other type.
    pub excluded_events: usize,
    pub bucket_spec: BucketSpec,
    pub policy: PolicyConfig,
    /// Wall-clock seconds spent loading the CSV.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent classifying and aggregating.
    pub transform_time_seconds: f64,
}

/// The four aggregate tables, exposed to the renderer unmodified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub daily_glucose: DailyGlucoseTable,
    pub long_acting: Histogram,
    pub fast_acting: Histogram,
    pub carbs: Histogram,
    pub metadata: AnalysisMetadata,
}

impl AggregateReport {
    /// The three histograms in display order.
    pub fn histograms(&self) -> [&Histogram; 3] {
        [&self.long_acting, &self.fast_acting, &self.carbs]
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline.
///
/// 1. Load and normalize the export from `input`.
/// 2. Classify events into glucose / insulin / carb views.
/// 3. Compute daily mean glucose.
/// 4. Bucket insulin doses by subtype and filtered carb entries.
/// 5. Return an [`AggregateReport`].
///
/// Any failure aborts before an aggregate is produced.
pub fn run_report(
    input: &InputSource,
    spec: &BucketSpec,
    policy: &PolicyConfig,
) -> Result<AggregateReport> {
    // ── Step 1: Load events ───────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let log = match input {
        InputSource::DataDir(dir) => load_event_log(dir)?,
        InputSource::File(path) => load_event_file(path)?,
    };
    let load_time = load_start.elapsed().as_secs_f64();

    let mut report = analyze_log(&log, spec, policy)?;
    report.metadata.load_time_seconds = load_time;
    Ok(report)
}

/// Steps 2–5 of [`run_report`] over an already-loaded log.
pub fn analyze_log(
    log: &EventLog,
    spec: &BucketSpec,
    policy: &PolicyConfig,
) -> Result<AggregateReport> {
    spec.validate()?;
    let transform_start = std::time::Instant::now();

    // ── Step 2: Classify ──────────────────────────────────────────────────────
    let views = classify(&log.events);

    // ── Step 3: Daily glucose ─────────────────────────────────────────────────
    let daily_glucose = GlucoseAggregator::aggregate_daily(&views.glucose, policy)?;

    // ── Step 4: Histograms ────────────────────────────────────────────────────
    let insulin = insulin_histograms(&views.insulin, spec, policy);
    let carbs = carb_histogram(&views.carbs, spec, policy);

    let transform_time = transform_start.elapsed().as_secs_f64();

    info!(
        "Aggregated {} days, {} long-acting, {} fast-acting, {} meal events",
        daily_glucose.rows.len(),
        insulin.long_acting.contributing,
        insulin.fast_acting.contributing,
        carbs.contributing
    );

    // ── Step 5: Build result ──────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        source: log.source.to_string(),
        used_fallback: log.used_fallback,
        rows_read: log.rows_read,
        rows_skipped: log.rows_skipped,
        glucose_events: views.glucose.len(),
        insulin_events: views.insulin.len(),
        carb_events: views.carbs.len(),
        excluded_events: views.excluded,
        bucket_spec: *spec,
        policy: policy.clone(),
        load_time_seconds: 0.0,
        transform_time_seconds: transform_time,
    };

    Ok(AggregateReport {
        daily_glucose,
        long_acting: insulin.long_acting,
        fast_acting: insulin.fast_acting,
        carbs,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
