//! CSV export discovery and loading.
//!
//! Reads the CGM export from `data/export.csv` (falling back to the sample
//! dataset), canonicalizes its header, and converts every row into a typed
//! [`RawEvent`] sorted by timestamp.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use csv::StringRecord;
use glucose_core::data_processors::{TimestampProcessor, ValueCoercer};
use glucose_core::error::{ReportError, Result};
use glucose_core::models::{EventKind, EventPayload, InsulinSubtype, RawEvent};
use regex::Regex;
use tracing::{debug, info, warn};

/// File name of the primary export inside the data directory.
pub const PRIMARY_FILE: &str = "export.csv";

/// File name of the sample export inside the data directory.
pub const SAMPLE_FILE: &str = "sample.csv";

/// Sample export compiled into the binary, used when no file is on disk.
pub const BUNDLED_SAMPLE: &str = include_str!("../../../data/sample.csv");

/// Canonical name of the primary timestamp column.
pub const DATETIME_COLUMN: &str = "datetime";

/// Canonical names accepted for the primary timestamp column.
const TIMESTAMP_ALIASES: &[&str] = &["timestamp_(yyyy-mm-ddthh:mm:ss)", "timestamp", "datetime"];

const EVENT_TYPE_COLUMN: &str = "event_type";
const EVENT_SUBTYPE_COLUMN: &str = "event_subtype";
const GLUCOSE_ALIASES: &[&str] = &["glucose_value_(mg/dl)", "glucose_value"];
const INSULIN_ALIASES: &[&str] = &["insulin_value_(u)", "insulin_units"];
const CARB_ALIASES: &[&str] = &["carb_value_(grams)", "carb_grams"];

/// Columns with no bearing on aggregation. Absence is not an error.
pub const DROPPED_COLUMNS: &[&str] = &[
    "index",
    "patient_info",
    "device_info",
    "source_device_id",
    "glucose_rate_of_change_(mg/dl/min)",
    "transmitter_time_(long_integer)",
    "transmitter_id",
    "duration_(hh:mm:ss)",
];

// ── Public types ──────────────────────────────────────────────────────────────

/// Where the loaded rows came from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum DataSource {
    File(PathBuf),
    Bundled,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Bundled => write!(f, "<bundled sample>"),
        }
    }
}

/// Column positions resolved from a canonicalized header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub datetime: usize,
    pub event_type: usize,
    pub event_subtype: Option<usize>,
    pub glucose: Option<usize>,
    pub insulin: Option<usize>,
    pub carbs: Option<usize>,
    /// Known-irrelevant columns that were present and dropped.
    pub dropped: Vec<String>,
    /// Unrecognised columns, ignored.
    pub ignored: Vec<String>,
}

/// The normalized, chronologically sorted event collection.
#[derive(Debug, Clone)]
pub struct EventLog {
    pub events: Vec<RawEvent>,
    pub source: DataSource,
    /// `true` when the primary export was absent.
    pub used_fallback: bool,
    /// Data rows in the file (header excluded).
    pub rows_read: usize,
    /// Rows without a timestamp (export metadata), skipped.
    pub rows_skipped: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Lower-case a header and collapse whitespace runs to `_`.
///
/// A leading UTF-8 BOM is stripped first.
pub fn canonical_column_name(name: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("regex is valid"));
    let name = name.trim_start_matches('\u{feff}').trim().to_lowercase();
    re.replace_all(&name, "_").into_owned()
}

/// Resolve the operative columns of `headers`.
///
/// Fails with [`ReportError::MissingColumn`] when the timestamp or event-type
/// column is absent. Value columns are optional at this stage.
pub fn normalize_headers(headers: &StringRecord) -> Result<ColumnMap> {
    let canonical: Vec<String> = headers.iter().map(canonical_column_name).collect();
    let positions: HashMap<&str, usize> = canonical
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let find = |aliases: &[&str]| aliases.iter().find_map(|a| positions.get(a).copied());

    let datetime = find(TIMESTAMP_ALIASES)
        .ok_or_else(|| ReportError::MissingColumn(DATETIME_COLUMN.to_string()))?;
    let event_type = find(&[EVENT_TYPE_COLUMN])
        .ok_or_else(|| ReportError::MissingColumn(EVENT_TYPE_COLUMN.to_string()))?;

    let map = ColumnMap {
        datetime,
        event_type,
        event_subtype: find(&[EVENT_SUBTYPE_COLUMN]),
        glucose: find(GLUCOSE_ALIASES),
        insulin: find(INSULIN_ALIASES),
        carbs: find(CARB_ALIASES),
        dropped: Vec::new(),
        ignored: Vec::new(),
    };

    let used = [
        Some(map.datetime),
        Some(map.event_type),
        map.event_subtype,
        map.glucose,
        map.insulin,
        map.carbs,
    ];
    let (dropped, ignored): (Vec<String>, Vec<String>) = canonical
        .iter()
        .enumerate()
        .filter(|(idx, _)| !used.contains(&Some(*idx)))
        .map(|(_, name)| name.clone())
        .partition(|name| DROPPED_COLUMNS.contains(&name.as_str()));

    Ok(ColumnMap {
        dropped,
        ignored,
        ..map
    })
}

/// Load the export from `data_dir`, falling back to the sample dataset.
///
/// Order: `data_dir/export.csv`, then `data_dir/sample.csv`, then the sample
/// bundled into the binary. Only a missing file triggers the fallback; any
/// other read failure is fatal.
pub fn load_event_log(data_dir: &Path) -> Result<EventLog> {
    let primary = data_dir.join(PRIMARY_FILE);
    match open_if_exists(&primary)? {
        Some(file) => return parse_source(file, DataSource::File(primary), false),
        None => warn!(
            "Primary export {} not found; falling back to sample data",
            primary.display()
        ),
    }

    let sample = data_dir.join(SAMPLE_FILE);
    match open_if_exists(&sample)? {
        Some(file) => parse_source(file, DataSource::File(sample), true),
        None => {
            warn!(
                "Sample export {} not found; using bundled sample",
                sample.display()
            );
            parse_source(BUNDLED_SAMPLE.as_bytes(), DataSource::Bundled, true)
        }
    }
}

/// Load one explicit file. No fallback: a missing file is fatal.
pub fn load_event_file(path: &Path) -> Result<EventLog> {
    let file = std::fs::File::open(path).map_err(|source| ReportError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(file, DataSource::File(path.to_path_buf()), false)
}

/// Parse CSV text from any reader into a sorted [`EventLog`].
///
/// The whole input is rejected on the first malformed row.
pub fn parse_events<R: Read>(reader: R, source: DataSource) -> Result<EventLog> {
    parse_source(reader, source, false)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Open `path`, mapping `NotFound` to `Ok(None)`.
fn open_if_exists(path: &Path) -> Result<Option<std::fs::File>> {
    match std::fs::File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_source<R: Read>(reader: R, source: DataSource, used_fallback: bool) -> Result<EventLog> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = normalize_headers(&headers)?;

    if !columns.dropped.is_empty() {
        debug!("Dropped columns: {}", columns.dropped.join(", "));
    }
    if !columns.ignored.is_empty() {
        debug!("Ignored unrecognised columns: {}", columns.ignored.join(", "));
    }

    let mut events: Vec<RawEvent> = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_skipped = 0usize;

    for (idx, result) in csv_reader.records().enumerate() {
        // Records start on line 2, after the header.
        let line = idx + 2;
        rows_read += 1;

        let record = result?;
        match parse_row(&record, &columns, line)? {
            Some(event) => events.push(event),
            None => rows_skipped += 1,
        }
    }

    // Stable, so rows sharing a timestamp keep file order.
    events.sort_by_key(|e| e.datetime);

    info!(
        "Loaded {} events from {} ({} rows, {} metadata rows skipped)",
        events.len(),
        source,
        rows_read,
        rows_skipped
    );

    Ok(EventLog {
        events,
        source,
        used_fallback,
        rows_read,
        rows_skipped,
    })
}

fn cell<'a>(record: &'a StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

/// Convert one record into a [`RawEvent`].
///
/// Returns `Ok(None)` for metadata rows whose timestamp cell is blank.
fn parse_row(record: &StringRecord, columns: &ColumnMap, line: usize) -> Result<Option<RawEvent>> {
    let ts_cell = cell(record, Some(columns.datetime));
    if ts_cell.is_empty() {
        return Ok(None);
    }
    let datetime =
        TimestampProcessor::parse_str(ts_cell).ok_or_else(|| ReportError::TimestampParse {
            line,
            value: ts_cell.to_string(),
        })?;

    let event_type = cell(record, Some(columns.event_type));

    let payload = match EventKind::from_label(event_type) {
        EventKind::Glucose => {
            let idx = columns
                .glucose
                .ok_or_else(|| ReportError::MissingColumn(GLUCOSE_ALIASES[0].to_string()))?;
            let raw = cell(record, Some(idx));
            let reading = ValueCoercer::glucose(raw)
                .map_err(|_| malformed(line, "glucose_value", raw))?;
            EventPayload::Glucose(reading)
        }
        EventKind::Insulin => {
            let raw = cell(record, columns.insulin);
            let units = ValueCoercer::optional_number(raw)
                .map_err(|_| malformed(line, "insulin_units", raw))?;
            EventPayload::Insulin {
                subtype: InsulinSubtype::from_label(cell(record, columns.event_subtype)),
                units,
            }
        }
        EventKind::Carb => {
            let raw = cell(record, columns.carbs);
            let grams = ValueCoercer::optional_number(raw)
                .map_err(|_| malformed(line, "carb_grams", raw))?;
            EventPayload::Carb { grams }
        }
        EventKind::Other => EventPayload::Other {
            event_type: event_type.to_string(),
        },
    };

    Ok(Some(RawEvent { datetime, payload }))
}

fn malformed(line: usize, column: &str, value: &str) -> ReportError {
    ReportError::MalformedValue {
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
