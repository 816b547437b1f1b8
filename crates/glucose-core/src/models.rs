use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::policy::PolicyConfig;

/// Literal the CGM writes in place of a reading below its measurable range.
pub const LOW_SENTINEL: &str = "Low";

/// Literal the CGM writes in place of a reading above its measurable range.
pub const HIGH_SENTINEL: &str = "High";

/// Event-type label for estimated glucose values.
pub const EGV_LABEL: &str = "EGV";

/// Event-type label for insulin doses.
pub const INSULIN_LABEL: &str = "Insulin";

/// Event-type label for carbohydrate entries.
pub const CARBS_LABEL: &str = "Carbs";

// ── EventKind ─────────────────────────────────────────────────────────────────

/// The kind of a log row, decided by exact match on its event-type label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Glucose,
    Insulin,
    Carb,
    /// Alerts, calibrations, device metadata and anything else.
    Other,
}

impl EventKind {
    /// Classify an `event_type` cell. Matching is exact and case-sensitive.
    pub fn from_label(label: &str) -> Self {
        match label {
            EGV_LABEL => EventKind::Glucose,
            INSULIN_LABEL => EventKind::Insulin,
            CARBS_LABEL => EventKind::Carb,
            _ => EventKind::Other,
        }
    }
}

// ── InsulinSubtype ────────────────────────────────────────────────────────────

/// Acting-speed subtype of an insulin dose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsulinSubtype {
    #[serde(rename = "Long-Acting")]
    LongActing,
    #[serde(rename = "Fast-Acting")]
    FastActing,
    /// Any other (or blank) subtype; excluded from both dose histograms.
    Other(String),
}

impl InsulinSubtype {
    /// Classify an `event_subtype` cell by exact match.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Long-Acting" => InsulinSubtype::LongActing,
            "Fast-Acting" => InsulinSubtype::FastActing,
            other => InsulinSubtype::Other(other.to_string()),
        }
    }
}

// ── GlucoseReading ────────────────────────────────────────────────────────────

/// A glucose cell as recorded by the device: a measurement or a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlucoseReading {
    /// A measured value in mg/dL.
    Value(u32),
    /// Below the sensor's range (`"Low"`).
    Low,
    /// Above the sensor's range (`"High"`).
    High,
}

impl GlucoseReading {
    /// Numeric value after sentinel substitution.
    ///
    /// `Low` always maps to [`PolicyConfig::low_value`]. `High` maps to
    /// [`PolicyConfig::high_value`] and yields `None` when that is unset.
    pub fn resolve(&self, policy: &PolicyConfig) -> Option<u32> {
        match self {
            GlucoseReading::Value(v) => Some(*v),
            GlucoseReading::Low => Some(policy.low_value),
            GlucoseReading::High => policy.high_value,
        }
    }
}

// ── RawEvent ──────────────────────────────────────────────────────────────────

/// Kind-specific fields of a log row. Only the operative fields survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Glucose(GlucoseReading),
    Insulin {
        subtype: InsulinSubtype,
        units: Option<f64>,
    },
    Carb {
        /// `None` when the gram cell was blank.
        grams: Option<f64>,
    },
    Other {
        event_type: String,
    },
}

/// One normalized row of the CGM export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Wall-clock timestamp exactly as recorded by the device.
    pub datetime: NaiveDateTime,
    pub payload: EventPayload,
}

// ── Typed views ───────────────────────────────────────────────────────────────

/// A glucose reading from the classified glucose view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlucoseEvent {
    pub datetime: NaiveDateTime,
    pub reading: GlucoseReading,
}

/// An insulin dose from the classified insulin view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsulinEvent {
    pub datetime: NaiveDateTime,
    pub subtype: InsulinSubtype,
    pub units: Option<f64>,
}

/// A carbohydrate entry from the classified carb view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbEvent {
    pub datetime: NaiveDateTime,
    pub grams: Option<f64>,
}

/// Anything that happens at a wall-clock instant and can be bucketed.
pub trait Timestamped {
    fn datetime(&self) -> NaiveDateTime;
}

impl Timestamped for InsulinEvent {
    fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }
}

impl Timestamped for CarbEvent {
    fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }
}

// ── Aggregate rows ────────────────────────────────────────────────────────────

/// A sentinel-free glucose value truncated to its calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlucoseSample {
    pub date: NaiveDate,
    pub glucose_value: u32,
}

/// Mean glucose for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMeanGlucose {
    #[serde(rename = "datetime")]
    pub date: NaiveDate,
    #[serde(rename = "glucose_value")]
    pub mean_glucose: i64,
}

/// Number of events falling in one time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    #[serde(rename = "datetime")]
    pub time_of_day: NaiveTime,
    pub count: u32,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
