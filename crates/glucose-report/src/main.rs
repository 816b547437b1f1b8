mod bootstrap;
mod output;

use anyhow::Result;
use glucose_core::settings::Settings;
use glucose_data::analysis::run_report;
use output::OutputFormat;

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Glucose Report v{} starting", env!("CARGO_PKG_VERSION"));

    let policy = settings.policy()?;
    let spec = settings.bucket_spec()?;
    let format: OutputFormat = settings.format.parse()?;
    let input = bootstrap::resolve_input(&settings);

    tracing::info!(
        "Buckets: {} x {}, Low -> {}, min carbs {} g, format: {}",
        spec.periods,
        spec.bucket_size,
        policy.low_value,
        policy.min_carb_grams,
        settings.format
    );

    // Any pipeline failure aborts here, before a single byte of output.
    let report = run_report(&input, &spec, &policy)?;

    output::emit(&report, format, settings.output.as_deref())?;

    Ok(())
}
