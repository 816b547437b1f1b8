use std::path::PathBuf;
use std::sync::Mutex;

use glucose_core::settings::Settings;
use glucose_data::analysis::InputSource;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map Python-style level names to `tracing` filter directives.
///
/// Unrecognised names are passed through so `EnvFilter` syntax still works.
pub fn normalise_level(log_level: &str) -> String {
    let upper = log_level.to_uppercase();
    match upper.as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        // tracing has no level above ERROR.
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to `log_file` when given, otherwise to stderr. Stdout is left
/// for report output.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(normalise_level(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

// ── Input discovery ────────────────────────────────────────────────────────────

/// Choose the export to read: an explicit `--input` file, else the data
/// directory with its sample fallback.
pub fn resolve_input(settings: &Settings) -> InputSource {
    match &settings.input {
        Some(path) => InputSource::File(path.clone()),
        None => InputSource::DataDir(settings.data_dir.clone()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
