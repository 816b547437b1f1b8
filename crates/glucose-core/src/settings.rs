use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::policy::{PolicyConfig, RoundingMode, DEFAULT_LOW_VALUE, DEFAULT_MIN_CARB_GRAMS};
use crate::time_utils::{BucketSize, BucketSpec, SECONDS_PER_DAY};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Daily glucose trend and dose/meal time-of-day histograms from a CGM export
#[derive(Parser, Debug, Clone)]
#[command(
    name = "glucose-report",
    about = "Daily glucose trend and dose/meal time-of-day histograms from a CGM export",
    version
)]
pub struct Settings {
    /// Explicit export file (disables the sample fallback)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory holding export.csv / sample.csv
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Time-of-day bucket width (e.g. 30min, 30T, 1h)
    #[arg(long, default_value = "30min")]
    pub bucket_size: BucketSize,

    /// Buckets per day (defaults to a full day of bucket-size buckets)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(SECONDS_PER_DAY)))]
    pub periods: Option<u32>,

    /// Glucose value substituted for "Low" readings (mg/dL)
    #[arg(long, default_value_t = DEFAULT_LOW_VALUE)]
    pub low_value: u32,

    /// Glucose value substituted for "High" readings (mg/dL); unset rejects them
    #[arg(long)]
    pub high_value: Option<u32>,

    /// Carb entries below this many grams are not counted as meals
    #[arg(long, default_value_t = DEFAULT_MIN_CARB_GRAMS)]
    pub min_carb_grams: f64,

    /// Fast-acting doses below this many units are not counted
    #[arg(long)]
    pub min_fast_acting_units: Option<f64>,

    /// Rounding rule for daily means
    #[arg(long, default_value = "half-even", value_parser = ["half-even", "half-away"])]
    pub rounding: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json", "csv"])]
    pub format: String,

    /// Directory to write output files into (stdout when absent)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Policy config file (defaults to ~/.glucose-report/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Persist the resolved policy to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Ignore the saved policy for this run (with --save-config, overwrite it)
    #[arg(long)]
    pub reset_config: bool,

    /// Logging level
    #[arg(
        long,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── SavedPolicy ────────────────────────────────────────────────────────────────

/// Policy defaults persisted to `~/.glucose-report/config.json`.
///
/// Only written on `--save-config`; a normal run reads it and leaves it alone.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct SavedPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periods: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_carb_grams: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_fast_acting_units: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounding: Option<String>,
}

impl SavedPolicy {
    /// Default path: `~/.glucose-report/config.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".glucose-report").join("config.json")
    }

    /// Load from `path`; `Default` when absent or unparseable.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Atomically write to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and fill unset policy flags from the config file.
    pub fn load() -> Result<Self> {
        Self::load_impl(std::env::args_os().collect(), None)
    }

    /// Same as [`Settings::load`] with explicit args and an optional config
    /// path override, so tests can point at a temporary directory.
    pub fn load_impl(
        args: Vec<std::ffi::OsString>,
        default_config_path: Option<&Path>,
    ) -> Result<Self> {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        let config_path = settings
            .config
            .clone()
            .or_else(|| default_config_path.map(Path::to_path_buf))
            .unwrap_or_else(SavedPolicy::config_path);

        let saved = if settings.reset_config {
            SavedPolicy::default()
        } else {
            SavedPolicy::load_from(&config_path)
        };

        // CLI always wins over the file.
        let mut bucket_size_from_file = false;
        if !is_arg_explicitly_set(&matches, "bucket_size") {
            if let Some(v) = saved.bucket_size.as_deref() {
                match v.parse() {
                    Ok(size) => {
                        settings.bucket_size = size;
                        bucket_size_from_file = true;
                    }
                    Err(e) => warn!("Ignoring saved bucket_size: {}", e),
                }
            }
        }
        // Saved periods were chosen for the saved bucket size; with any other
        // size they only apply if they still tile exactly one day.
        if settings.periods.is_none() {
            if let Some(periods) = saved.periods {
                let candidate = BucketSpec::new(periods, settings.bucket_size);
                if bucket_size_from_file || candidate.covers_full_day() {
                    settings.periods = Some(periods);
                } else {
                    warn!(
                        "Ignoring saved periods {} for bucket size {}",
                        periods, settings.bucket_size
                    );
                }
            }
        }
        if !is_arg_explicitly_set(&matches, "low_value") {
            if let Some(v) = saved.low_value {
                settings.low_value = v;
            }
        }
        if settings.high_value.is_none() {
            settings.high_value = saved.high_value;
        }
        if !is_arg_explicitly_set(&matches, "min_carb_grams") {
            if let Some(v) = saved.min_carb_grams {
                settings.min_carb_grams = v;
            }
        }
        if settings.min_fast_acting_units.is_none() {
            settings.min_fast_acting_units = saved.min_fast_acting_units;
        }
        if !is_arg_explicitly_set(&matches, "rounding") {
            if let Some(v) = saved.rounding {
                settings.rounding = v;
            }
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        // Validate before persisting so a bad value never reaches the file.
        settings.policy()?;
        settings.bucket_spec()?;

        if settings.save_config {
            SavedPolicy::from(&settings).save_to(&config_path)?;
        }

        Ok(settings)
    }

    /// The calibration constants for this run.
    pub fn policy(&self) -> Result<PolicyConfig> {
        let policy = PolicyConfig {
            low_value: self.low_value,
            high_value: self.high_value,
            min_carb_grams: self.min_carb_grams,
            min_fast_acting_units: self.min_fast_acting_units,
            rounding: self.rounding.parse::<RoundingMode>()?,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// The time-of-day grid for this run.
    ///
    /// A grid shorter than a day is honoured but logged. One that runs past
    /// midnight is rejected.
    pub fn bucket_spec(&self) -> Result<BucketSpec> {
        let spec = match self.periods {
            Some(periods) => BucketSpec::new(periods, self.bucket_size),
            None => BucketSpec::full_day(self.bucket_size),
        };
        spec.validate()?;
        if !spec.covers_full_day() {
            warn!(
                "{} buckets of {} stop short of midnight; later events are not counted",
                spec.periods, spec.bucket_size
            );
        } else if !spec.bucket_size.divides_day() {
            warn!(
                "{} does not divide the day; the last bucket is shorter",
                spec.bucket_size
            );
        }
        Ok(spec)
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for SavedPolicy {
    fn from(s: &Settings) -> Self {
        SavedPolicy {
            bucket_size: Some(s.bucket_size.to_string()),
            periods: s.periods,
            low_value: Some(s.low_value),
            high_value: s.high_value,
            min_carb_grams: Some(s.min_carb_grams),
            min_fast_acting_units: s.min_fast_acting_units,
            rounding: Some(s.rounding.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
