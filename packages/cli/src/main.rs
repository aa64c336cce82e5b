#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the enrichment toolchain.
//!
//! Uses `indicatif-log-bridge` (via [`enrich_cli_utils::init_logger`]) to
//! route `log` output through `indicatif::MultiProgress` so that log lines
//! and progress bars never fight for the terminal.

mod geocode;
mod status;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use enrich_poi::PoiFilterConfig;

#[derive(Parser)]
#[command(name = "enrich", about = "Resumable batch enrichment of tabular place data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill missing street and city columns by reverse geocoding each
    /// row's coordinates. Resumes from the checkpoint of an interrupted
    /// run.
    Geocode(geocode::GeocodeArgs),
    /// Show how far an interrupted run got
    Status(status::StatusArgs),
    /// Drop unnamed, out-of-area, off-topic, and duplicate places from a
    /// scraped table
    FilterPoi {
        /// Raw scraped CSV
        #[arg(long)]
        input: PathBuf,
        /// Where to write the filtered CSV
        #[arg(long)]
        output: PathBuf,
        /// Filter configuration TOML. Defaults to the built-in Karawang
        /// food & beverage preset.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the configured geocoding services
    Services,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Geocode(args) => geocode::run(args).await?,
        Commands::Status(args) => {
            enrich_cli_utils::init_logger(None)?;
            status::run(&args)?;
        }
        Commands::FilterPoi {
            input,
            output,
            config,
        } => {
            enrich_cli_utils::init_logger(None)?;
            let config = match config {
                Some(path) => PoiFilterConfig::load(&path)?,
                None => PoiFilterConfig::karawang(),
            };

            let start = Instant::now();
            let report = enrich_poi::filter_file(&input, &output, &config)?;
            print!("{}", report.render());
            log::info!(
                "Filtering complete in {:.1}s",
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Services => {
            let services = enrich_geocoder::service_registry::all_services();
            println!("{:<12} {:<8} {:<10} URL", "ID", "ENABLED", "DELAY");
            println!("{}", "-".repeat(70));
            for svc in &services {
                let delay = format!("{}ms", svc.rate_limit_ms());
                println!(
                    "{:<12} {:<8} {delay:<10} {}",
                    svc.id,
                    svc.enabled,
                    svc.base_url()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filter_poi() {
        let cli = Cli::try_parse_from([
            "enrich",
            "filter-poi",
            "--input",
            "osm.csv",
            "--output",
            "clean.csv",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::FilterPoi { config: None, .. }
        ));
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["enrich"]).is_err());
    }
}
