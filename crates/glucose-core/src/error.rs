use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced while building a glucose report.
///
/// Recoverable conditions (missing primary export, unknown event types,
/// sentinel readings) are policy and never surface here.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the input (bad quoting, invalid UTF-8, ...).
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A column required by the pipeline is absent after normalization.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A non-blank timestamp cell did not match any recognised format.
    #[error("Invalid timestamp on line {line}: {value}")]
    TimestampParse { line: usize, value: String },

    /// A value cell could not be coerced to the type its event requires.
    #[error("Malformed {column} on line {line}: {value:?}")]
    MalformedValue {
        line: usize,
        column: String,
        value: String,
    },

    /// A sentinel reading was seen but no substitute value is configured.
    #[error("No substitute configured for {sentinel:?} reading at {datetime}")]
    UnmappedSentinel { sentinel: String, datetime: String },

    /// A bucket-size string is not one of the supported frequency forms.
    #[error("Invalid bucket size: {0}")]
    InvalidBucketSize(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed or written.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the report crates.
pub type Result<T> = std::result::Result<T, ReportError>;
