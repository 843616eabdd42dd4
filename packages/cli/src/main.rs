#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for scoring energy-storage candidate sites.
//!
//! Uses `indicatif-log-bridge` (via
//! [`storage_siting_cli_utils::init_logger`]) so that log lines and the
//! scoring progress bar never fight for the terminal.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use geo::Point;
use storage_siting_cli_utils::IndicatifProgress;
use storage_siting_layers::writer::{write_records, write_summary};
use storage_siting_layers::{OutputGeometry, OutputOptions, load_run};
use storage_siting_routing::{DistanceOutcome, DistanceProvider, RoutingConfig};
use storage_siting_scoring::{ModelRunner, SitingModel};
use storage_siting_scoring_models::DistanceMode;

#[derive(Parser)]
#[command(name = "storage_siting", about = "Energy-storage site scoring tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every candidate of a run configuration and write `GeoJSON`
    Evaluate {
        /// Run configuration (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Output `GeoJSON` file
        #[arg(long)]
        output: PathBuf,
        /// Also write the run summary as JSON to this file
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Emit candidates excluded by the mobile coverage area
        #[arg(long)]
        include_excluded: bool,
        /// Output geometry: `candidate` or `service-area` (static model)
        #[arg(long, value_parser = parse_geometry, default_value = "candidate")]
        geometry: OutputGeometry,
    },
    /// Load and validate a run configuration without scoring
    Validate {
        /// Run configuration (TOML)
        #[arg(long)]
        config: PathBuf,
    },
    /// Measure the distance between two points (probes the routing oracle)
    Distance {
        /// Origin as `lon,lat`
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: Point<f64>,
        /// Destination as `lon,lat`
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: Point<f64>,
        /// `straight-line` or `road-network`
        #[arg(long, value_parser = parse_mode, default_value = "road-network")]
        mode: DistanceMode,
        /// Routing oracle base URL
        #[arg(long)]
        base_url: Option<String>,
        /// Routing request timeout in milliseconds
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },
}

fn parse_point(s: &str) -> Result<Point<f64>, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat, got '{s}'"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude '{lon}': {e}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude '{lat}': {e}"))?;
    Ok(Point::new(lon, lat))
}

fn parse_mode(s: &str) -> Result<DistanceMode, String> {
    s.replace('-', "_")
        .parse()
        .map_err(|_| format!("expected straight-line or road-network, got '{s}'"))
}

fn parse_geometry(s: &str) -> Result<OutputGeometry, String> {
    s.parse()
        .map_err(|_| format!("expected candidate or service-area, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = storage_siting_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            config,
            output,
            summary,
            include_excluded,
            geometry,
        } => {
            let start = Instant::now();
            let run = load_run(&config)?;
            let distances = DistanceProvider::from_config(&run.config.routing)?;

            let buffer = match &run.model {
                SitingModel::Static(params) => Some((params.buffer_m, params.buffer_segments)),
                SitingModel::Mobile { .. } => {
                    if geometry == OutputGeometry::ServiceArea {
                        log::warn!("--geometry service-area only applies to the static model");
                    }
                    None
                }
            };

            let progress = IndicatifProgress::candidates_bar(&multi, "Validating");
            let mut runner =
                ModelRunner::new(run.model, run.inputs, distances).with_progress(progress);
            let report = runner.run(&run.candidates).await?;

            let options = OutputOptions {
                geometry,
                include_excluded,
                buffer,
            };
            write_records(&output, &report, &run.candidates, &options)?;
            if let Some(path) = summary {
                write_summary(&path, &report)?;
            }

            let s = &report.summary;
            println!(
                "Scored {} of {} candidates in {:.1}s ({} excluded, {} failed)",
                s.scored,
                s.candidates,
                start.elapsed().as_secs_f64(),
                s.excluded,
                s.partial_failures,
            );
            println!(
                "Distance queries: {} routed, {} straight-line fallback",
                s.network_queries, s.fallback_queries
            );
            if s.invalid_features > 0 {
                println!("Dropped {} layer features with invalid geometry", s.invalid_features);
            }
        }
        Commands::Validate { config } => {
            let run = load_run(&config)?;
            let runner = ModelRunner::new(
                run.model,
                run.inputs,
                DistanceProvider::straight_line_only(),
            );
            let report = runner.validate()?;

            println!("Configuration is valid ({} model)", report.model);
            println!("{} candidates", run.candidates.len());
            for (name, weight) in &report.infrastructure_weights {
                println!("  infrastructure {name:<24} weight {weight:.4}");
            }
            for (name, weight) in &report.census_weights {
                println!("  census         {name:<24} weight {weight:.4}");
            }
            for (name, modifier) in &report.zone_modifiers {
                println!("  zone           {name:<24} modifier {modifier:+}");
            }
            if report.invalid_features > 0 {
                println!(
                    "{} layer features have invalid geometry and will be dropped",
                    report.invalid_features
                );
            }
        }
        Commands::Distance {
            from,
            to,
            mode,
            base_url,
            timeout_ms,
        } => {
            let mut routing = RoutingConfig {
                timeout_ms,
                ..RoutingConfig::default()
            };
            if let Some(base_url) = base_url {
                routing.base_url = base_url;
            }
            let provider = DistanceProvider::from_config(&routing)?;

            match provider.distance(from, to, mode).await {
                DistanceOutcome::Ok(distance) => {
                    println!("{:.1} m via {:?}", distance.meters, distance.method_used);
                    if let Some(seconds) = distance.seconds {
                        println!("{seconds:.1} s travel time");
                    }
                }
                DistanceOutcome::Fallback { distance, cause } => {
                    println!("{:.1} m straight-line fallback", distance.meters);
                    println!("routing failed: {cause}");
                }
                DistanceOutcome::Error(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
