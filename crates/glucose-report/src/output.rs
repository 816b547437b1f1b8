//! Output sinks handing the aggregate tables to the rendering boundary.

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use glucose_core::formatting::{format_glucose, heading, percentage, render_bar};
use glucose_core::time_utils::format_time_of_day;
use glucose_data::aggregator::DailyGlucoseTable;
use glucose_data::analysis::AggregateReport;
use glucose_data::histogram::Histogram;
use serde::Serialize;
use tracing::info;

pub const JSON_FILE: &str = "aggregates.json";
pub const MEAN_GLUCOSE_FILE: &str = "mean_glucose.csv";
pub const LONG_ACTING_FILE: &str = "long_acting_hist.csv";
pub const FAST_ACTING_FILE: &str = "fast_acting_hist.csv";
pub const MEAL_FILE: &str = "meal_hist.csv";
pub const TEXT_FILE: &str = "summary.txt";

const BAR_WIDTH: usize = 40;

// ── OutputFormat ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Text,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "text" => Ok(Self::Text),
            other => bail!("Unknown output format: {other}"),
        }
    }
}

// ── Dispatch ───────────────────────────────────────────────────────────────────

/// Write `report` in `format`, to files under `output` or to stdout.
///
/// Returns the files written (empty for stdout).
pub fn emit(
    report: &AggregateReport,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    match output {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
            let written = write_files(report, format, dir)?;
            for path in &written {
                info!("Wrote {}", path.display());
            }
            Ok(written)
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            write_stream(report, format, &mut out)?;
            out.flush()?;
            Ok(Vec::new())
        }
    }
}

fn write_files(report: &AggregateReport, format: OutputFormat, dir: &Path) -> Result<Vec<PathBuf>> {
    match format {
        OutputFormat::Json => {
            let path = dir.join(JSON_FILE);
            let mut file = fs::File::create(&path)?;
            write_json(report, &mut file)?;
            Ok(vec![path])
        }
        OutputFormat::Csv => {
            let mut written = Vec::with_capacity(4);
            for (name, table) in csv_tables(report) {
                let path = dir.join(name);
                let file = fs::File::create(&path)?;
                table.write_csv(file)?;
                written.push(path);
            }
            Ok(written)
        }
        OutputFormat::Text => {
            let path = dir.join(TEXT_FILE);
            fs::write(&path, render_text(report))?;
            Ok(vec![path])
        }
    }
}

fn write_stream<W: Write>(
    report: &AggregateReport,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(report, out)?,
        OutputFormat::Csv => {
            for (i, (name, table)) in csv_tables(report).into_iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "# {name}")?;
                table.write_csv(&mut *out)?;
            }
        }
        OutputFormat::Text => out.write_all(render_text(report).as_bytes())?,
    }
    Ok(())
}

// ── JSON ───────────────────────────────────────────────────────────────────────

/// Pretty-printed JSON document holding all four tables and the metadata.
pub fn write_json<W: Write>(report: &AggregateReport, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

// ── CSV ────────────────────────────────────────────────────────────────────────

/// One CSV-able table borrowed from the report.
enum CsvTable<'a> {
    Daily(&'a DailyGlucoseTable),
    Hist(&'a Histogram),
}

impl CsvTable<'_> {
    fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        match self {
            CsvTable::Daily(table) => serialize_rows(&mut writer, &table.rows)?,
            CsvTable::Hist(hist) => serialize_rows(&mut writer, &hist.buckets)?,
        }
        writer.flush()?;
        Ok(())
    }
}

fn serialize_rows<W: Write, T: Serialize>(writer: &mut csv::Writer<W>, rows: &[T]) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

fn csv_tables(report: &AggregateReport) -> [(&'static str, CsvTable<'_>); 4] {
    [
        (MEAN_GLUCOSE_FILE, CsvTable::Daily(&report.daily_glucose)),
        (LONG_ACTING_FILE, CsvTable::Hist(&report.long_acting)),
        (FAST_ACTING_FILE, CsvTable::Hist(&report.fast_acting)),
        (MEAL_FILE, CsvTable::Hist(&report.carbs)),
    ]
}

// ── Text ───────────────────────────────────────────────────────────────────────

/// Human-readable summary: the daily trend and each histogram as bars.
pub fn render_text(report: &AggregateReport) -> String {
    let mut out = String::new();
    let meta = &report.metadata;

    let _ = writeln!(out, "Source: {}", meta.source);
    if meta.used_fallback {
        let _ = writeln!(out, "(primary export not found; sample data shown)");
    }
    let _ = writeln!(out);

    render_daily(&mut out, &report.daily_glucose);
    for hist in report.histograms() {
        let _ = writeln!(out);
        render_histogram(&mut out, hist);
    }
    out
}

fn render_daily(out: &mut String, table: &DailyGlucoseTable) {
    let _ = writeln!(out, "{}", heading(&table.title));
    if table.rows.is_empty() {
        let _ = writeln!(out, "No glucose readings.");
        return;
    }
    let max = table
        .rows
        .iter()
        .map(|r| r.mean_glucose)
        .max()
        .unwrap_or(0)
        .max(0);
    for row in &table.rows {
        let mean = row.mean_glucose.max(0);
        let bar = render_bar(
            u32::try_from(mean).unwrap_or(u32::MAX),
            u32::try_from(max).unwrap_or(u32::MAX),
            BAR_WIDTH,
        );
        let _ = writeln!(
            out,
            "{}  {:>11}  {}",
            row.date,
            format_glucose(row.mean_glucose),
            bar
        );
    }
}

fn render_histogram(out: &mut String, hist: &Histogram) {
    let _ = writeln!(out, "{}", heading(&hist.title));
    let total = hist.total();
    let _ = writeln!(
        out,
        "{} events in {} buckets of {}",
        total,
        hist.buckets.len(),
        hist.bucket_size
    );
    let max = hist.max_count();
    for bucket in &hist.buckets {
        let share = percentage(f64::from(bucket.count), total as f64, 1);
        let _ = writeln!(
            out,
            "{}  {:>4}  {:>5.1}%  {}",
            format_time_of_day(bucket.time_of_day),
            bucket.count,
            share,
            render_bar(bucket.count, max, BAR_WIDTH)
        );
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use glucose_core::policy::PolicyConfig;
    use glucose_core::time_utils::BucketSpec;
    use glucose_data::analysis::analyze_log;
    use glucose_data::reader::{parse_events, DataSource};
    use tempfile::TempDir;

    const LOG: &str = "\
Timestamp (YYYY-MM-DDThh:mm:ss),Event Type,Event Subtype,Glucose Value (mg/dL),Insulin Value (u),Carb Value (grams)
2024-01-01T07:00:00,EGV,,120,,
2024-01-01T08:05:00,Insulin,Fast-Acting,,4,
2024-01-01T08:10:00,Carbs,,,,45
2024-01-01T19:00:00,EGV,,Low,,
2024-01-01T22:00:00,Insulin,Long-Acting,,20,
2024-01-02T07:00:00,EGV,,150,,
";

    fn report() -> AggregateReport {
        let log = parse_events(LOG.as_bytes(), DataSource::Bundled).unwrap();
        let spec = BucketSpec::new(48, "30min".parse().unwrap());
        analyze_log(&log, &spec, &PolicyConfig::default()).unwrap()
    }

    // ── OutputFormat ─────────────────────────────────────────────────────────

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    // ── JSON ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_json_file_written() {
        let tmp = TempDir::new().unwrap();
        let written = emit(&report(), OutputFormat::Json, Some(tmp.path())).unwrap();

        assert_eq!(written, vec![tmp.path().join(JSON_FILE)]);
        let content = fs::read_to_string(&written[0]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["daily_glucose"]["rows"][0]["glucose_value"], 80);
        assert_eq!(json["long_acting"]["buckets"].as_array().unwrap().len(), 48);
    }

    // ── CSV ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_csv_writes_four_files() {
        let tmp = TempDir::new().unwrap();
        let written = emit(&report(), OutputFormat::Csv, Some(tmp.path())).unwrap();
        assert_eq!(written.len(), 4);

        let mean = fs::read_to_string(tmp.path().join(MEAN_GLUCOSE_FILE)).unwrap();
        assert_eq!(
            mean,
            "datetime,glucose_value\n2024-01-01,80\n2024-01-02,150\n"
        );

        let meals = fs::read_to_string(tmp.path().join(MEAL_FILE)).unwrap();
        let lines: Vec<&str> = meals.lines().collect();
        assert_eq!(lines[0], "datetime,count");
        assert_eq!(lines.len(), 49);
        assert_eq!(lines[1], "00:00:00,0");
        assert_eq!(lines[17], "08:00:00,1");
    }

    #[test]
    fn test_csv_stream_labels_each_table() {
        let mut buf = Vec::new();
        write_stream(&report(), OutputFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        for name in [MEAN_GLUCOSE_FILE, LONG_ACTING_FILE, FAST_ACTING_FILE, MEAL_FILE] {
            assert!(text.contains(&format!("# {name}")), "missing {name}");
        }
    }

    // ── Text ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_text_summary_contents() {
        let text = render_text(&report());

        assert!(text.contains("Average Blood Glucose"));
        assert!(text.contains("2024-01-01"));
        assert!(text.contains("80 mg/dL"));
        assert!(text.contains("Frequency of Meal or Snack Time"));
        assert!(text.contains("1 events in 48 buckets of 30min"));
        assert!(text.contains("22:00     1  100.0%"));
    }

    #[test]
    fn test_text_file_written() {
        let tmp = TempDir::new().unwrap();
        let written = emit(&report(), OutputFormat::Text, Some(tmp.path())).unwrap();
        assert_eq!(written, vec![tmp.path().join(TEXT_FILE)]);
        assert!(fs::read_to_string(&written[0])
            .unwrap()
            .contains("Frequency of Long Acting Insulin Dose Time"));
    }
}
