use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ── Shared constants ──────────────────────────────────────────────────────────

/// Clinical floor substituted for a `"Low"` reading, in mg/dL.
pub const DEFAULT_LOW_VALUE: u32 = 40;

/// Carb entries below this many grams are treated as snacks, not meals.
pub const DEFAULT_MIN_CARB_GRAMS: f64 = 5.0;

/// Padding applied on each side of the mean-glucose y-axis, in mg/dL.
pub const Y_DOMAIN_PADDING: i64 = 10;

/// Padding applied on each side of the mean-glucose x-axis, in days.
pub const X_DOMAIN_PADDING_DAYS: i64 = 1;

// ── RoundingMode ──────────────────────────────────────────────────────────────

/// How a fractional daily mean is rounded to an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Ties go to the even neighbour (`80.5 → 80`, `81.5 → 82`).
    #[default]
    HalfEven,
    /// Ties go away from zero (`80.5 → 81`).
    HalfAway,
}

impl RoundingMode {
    pub fn round(&self, value: f64) -> i64 {
        match self {
            RoundingMode::HalfEven => value.round_ties_even() as i64,
            RoundingMode::HalfAway => value.round() as i64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::HalfEven => "half-even",
            RoundingMode::HalfAway => "half-away",
        }
    }
}

impl FromStr for RoundingMode {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "half-even" | "even" | "bankers" => Ok(RoundingMode::HalfEven),
            "half-away" | "away" => Ok(RoundingMode::HalfAway),
            other => Err(ReportError::Config(format!(
                "unknown rounding mode \"{}\"",
                other
            ))),
        }
    }
}

// ── PolicyConfig ──────────────────────────────────────────────────────────────

/// Calibration constants applied by the aggregation pipeline.
///
/// None of these are algorithmic truths; they are carried as configuration so
/// a clinician can tune them without touching the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Value substituted for `"Low"` readings.
    pub low_value: u32,
    /// Value substituted for `"High"` readings. `None` makes them fatal.
    #[serde(default)]
    pub high_value: Option<u32>,
    /// Minimum carb grams for an entry to count as a meal.
    pub min_carb_grams: f64,
    /// Minimum units for a fast-acting dose to count. `None` keeps all doses.
    #[serde(default)]
    pub min_fast_acting_units: Option<f64>,
    /// Rounding applied to daily means.
    #[serde(default)]
    pub rounding: RoundingMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            low_value: DEFAULT_LOW_VALUE,
            high_value: None,
            min_carb_grams: DEFAULT_MIN_CARB_GRAMS,
            min_fast_acting_units: None,
            rounding: RoundingMode::HalfEven,
        }
    }
}

impl PolicyConfig {
    /// Reject values that would make the aggregates meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.min_carb_grams.is_finite() || self.min_carb_grams < 0.0 {
            return Err(ReportError::Config(format!(
                "min_carb_grams must be a non-negative number, got {}",
                self.min_carb_grams
            )));
        }
        if let Some(units) = self.min_fast_acting_units {
            if !units.is_finite() || units < 0.0 {
                return Err(ReportError::Config(format!(
                    "min_fast_acting_units must be a non-negative number, got {}",
                    units
                )));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
