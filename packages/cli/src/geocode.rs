//! The `geocode` subcommand.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use enrich_cli_utils::IndicatifProgress;
use enrich_geocoder::ReverseGeocoder;
use enrich_geocoder::service_registry::{self, DEFAULT_SERVICE, GeocodingService};
use enrich_pipeline::{DelayRange, Pipeline, PipelineConfig, PipelinePaths, TokioSleeper};

#[derive(Args, Debug)]
pub struct GeocodeArgs {
    /// Input CSV with coordinate columns
    #[arg(long, default_value = "data/data_fnb_karawang_comprehensive.csv")]
    pub input: PathBuf,
    /// Where the completed table is written
    #[arg(long, default_value = "data/data_fnb_karawang_fixed_full.csv")]
    pub output: PathBuf,
    /// Progress file for resuming interrupted runs
    #[arg(long, default_value = "data/data_fnb_backup_progress.csv")]
    pub checkpoint: PathBuf,
    /// Directory for the timestamped log and report files
    #[arg(long, default_value = "data")]
    pub log_dir: PathBuf,
    /// Log file (default: `<log-dir>/geocoding_log_<timestamp>.txt`)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// Report file (default: `<log-dir>/summary_report_<timestamp>.txt`)
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Identity columns, latitude first
    #[arg(long, value_delimiter = ',', default_value = "Latitude,Longitude")]
    pub identity: Vec<String>,
    /// Column filled with the street name
    #[arg(long, default_value = "Alamat_Jalan")]
    pub street_column: String,
    /// Column filled with the city name
    #[arg(long, default_value = "Kota")]
    pub city_column: String,
    /// Column the per-row outcome is written to
    #[arg(long, default_value = "Geocoding_Status")]
    pub status_column: String,
    /// Column whose changes mark group boundaries in the report
    #[arg(long)]
    pub group_column: Option<String>,
    /// Attempts per row before recording an error
    #[arg(long, default_value = "3")]
    pub max_attempts: u32,
    /// Wait between attempts, in milliseconds
    #[arg(long, default_value = "2000")]
    pub retry_backoff_ms: u64,
    /// Minimum wait between calls, in milliseconds (default: the service
    /// rate limit)
    #[arg(long)]
    pub min_delay_ms: Option<u64>,
    /// Maximum wait between calls, in milliseconds (default: the minimum)
    #[arg(long)]
    pub max_delay_ms: Option<u64>,
    /// Save the checkpoint every N rows
    #[arg(long, default_value = "10")]
    pub checkpoint_every: usize,
    /// Stop after N rows this run, keeping the checkpoint
    #[arg(long)]
    pub max_records: Option<usize>,
    /// Geocoding service id (see `services`)
    #[arg(long, default_value = DEFAULT_SERVICE)]
    pub service: String,
    /// Override the service endpoint (e.g., a self-hosted Nominatim)
    #[arg(long)]
    pub base_url: Option<String>,
    /// Language for returned names
    #[arg(long)]
    pub language: Option<String>,
}

/// Log and report paths for a run started at `timestamp`.
fn run_files(args: &GeocodeArgs, timestamp: &str) -> (PathBuf, PathBuf) {
    let log = args
        .log_file
        .clone()
        .unwrap_or_else(|| args.log_dir.join(format!("geocoding_log_{timestamp}.txt")));
    let report = args
        .report
        .clone()
        .unwrap_or_else(|| args.log_dir.join(format!("summary_report_{timestamp}.txt")));
    (log, report)
}

/// Builds the pipeline configuration from the arguments and the selected
/// service.
pub fn build_config(
    args: &GeocodeArgs,
    service: &GeocodingService,
    log: PathBuf,
    report: PathBuf,
) -> PipelineConfig {
    let mut config = PipelineConfig::new(PipelinePaths {
        input: args.input.clone(),
        output: args.output.clone(),
        checkpoint: args.checkpoint.clone(),
        report,
        log: Some(log),
    });

    let min_ms = args.min_delay_ms.unwrap_or_else(|| service.rate_limit_ms());
    config.identity_columns.clone_from(&args.identity);
    config.fields = vec![args.street_column.clone(), args.city_column.clone()];
    config.status_column.clone_from(&args.status_column);
    config.group_column.clone_from(&args.group_column);
    config.retry.max_attempts = args.max_attempts;
    config.retry.backoff_ms = args.retry_backoff_ms;
    config.delay = DelayRange {
        min_ms,
        max_ms: args.max_delay_ms.unwrap_or(min_ms),
    };
    config.checkpoint_every = args.checkpoint_every;
    config.max_records_per_run = args.max_records;
    config
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Runs the `geocode` subcommand.
///
/// # Errors
///
/// Returns an error if the service is unknown, the log file cannot be
/// created, or the pipeline run fails.
pub async fn run(args: GeocodeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let (log_file, report) = run_files(&args, &timestamp);
    ensure_dir(&log_file)?;

    let multi = enrich_cli_utils::init_logger(Some(&log_file))?;

    let service = service_registry::service(&args.service)
        .ok_or_else(|| format!("Unknown or disabled service: {}", args.service))?;

    let mut geocoder = ReverseGeocoder::new(&service)?
        .with_fields(args.street_column.clone(), args.city_column.clone());
    if let Some(url) = &args.base_url {
        geocoder = geocoder.with_base_url(url.clone());
    }
    if let Some(language) = &args.language {
        geocoder = geocoder.with_language(language.clone());
    }

    let config = build_config(&args, &service, log_file, report);
    log::info!(
        "Geocoding {} via {} ({}ms-{}ms between calls)",
        config.paths.input.display(),
        geocoder.base_url(),
        config.delay.min_ms,
        config.delay.max_ms
    );

    let start = Instant::now();
    let progress = IndicatifProgress::records_bar(&multi, "Loading input...");
    let summary = Pipeline::new(&config, &geocoder, &TokioSleeper)
        .with_progress(progress)
        .run()
        .await?;

    if summary.completed {
        log::info!(
            "Geocoding complete in {:.1}s; output written to {}",
            start.elapsed().as_secs_f64(),
            config.paths.output.display()
        );
    } else {
        log::info!(
            "Run paused after {:.1}s; rerun to continue from {}",
            start.elapsed().as_secs_f64(),
            config.paths.checkpoint.display()
        );
    }
    log::info!("Report: {}", config.paths.report.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: GeocodeArgs,
    }

    fn parse(extra: &[&str]) -> GeocodeArgs {
        let argv = std::iter::once("geocode").chain(extra.iter().copied());
        Wrapper::try_parse_from(argv).unwrap().args
    }

    fn nominatim() -> GeocodingService {
        service_registry::service(DEFAULT_SERVICE).unwrap()
    }

    #[test]
    fn defaults_follow_the_service() {
        let args = parse(&[]);
        let config = build_config(&args, &nominatim(), "log.txt".into(), "report.txt".into());
        assert_eq!(config.identity_columns, vec!["Latitude", "Longitude"]);
        assert_eq!(config.fields, vec!["Alamat_Jalan", "Kota"]);
        assert_eq!(config.status_column, "Geocoding_Status");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.delay, DelayRange::fixed(2000));
        assert_eq!(config.checkpoint_every, 10);
        assert_eq!(config.max_records_per_run, None);
        assert_eq!(config.paths.log, Some(PathBuf::from("log.txt")));
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--identity",
            "lat,lon",
            "--street-column",
            "street",
            "--min-delay-ms",
            "1000",
            "--max-delay-ms",
            "3000",
            "--max-records",
            "50",
            "--group-column",
            "Keyword",
        ]);
        let config = build_config(&args, &nominatim(), "log.txt".into(), "report.txt".into());
        assert_eq!(config.identity_columns, vec!["lat", "lon"]);
        assert_eq!(config.fields, vec!["street", "Kota"]);
        assert_eq!(config.delay.min_ms, 1000);
        assert_eq!(config.delay.max_ms, 3000);
        assert_eq!(config.max_records_per_run, Some(50));
        assert_eq!(config.group_column.as_deref(), Some("Keyword"));
    }

    #[test]
    fn run_files_are_timestamped() {
        let args = parse(&["--log-dir", "runs"]);
        let (log, report) = run_files(&args, "20250101_120000");
        assert_eq!(log, PathBuf::from("runs/geocoding_log_20250101_120000.txt"));
        assert_eq!(report, PathBuf::from("runs/summary_report_20250101_120000.txt"));

        let args = parse(&["--report", "custom.txt"]);
        let (_, report) = run_files(&args, "x");
        assert_eq!(report, PathBuf::from("custom.txt"));
    }
}
