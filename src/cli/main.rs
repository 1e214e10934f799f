//! Command line reverse geocoder.
//!
//! Looks up a coordinate, an H3 cell, or a CSV of coordinates against the
//! local lookup tables and prints JSON.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lakhua::{GeocodeOptions, GeocodeResult, ReverseGeocoder, StoreConfig};

#[derive(Parser, Debug)]
#[command(name = "lakhua")]
#[command(about = "Offline reverse geocoding")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// H3 resolution for coordinate lookups (clamped to the supported range)
    #[arg(short, long, global = true)]
    resolution: Option<u8>,

    /// Only match at the starting resolution
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Log load and lookup timings
    #[arg(long, global = true)]
    debug: bool,

    /// Directory holding reverse_geo_<resolution>.json files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML store config (data_dir, file_prefix, resolutions)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a latitude/longitude pair
    Point {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Look up an H3 cell string
    Cell { cell: String },
    /// Look up every row of a CSV file with `lat` and `lon` columns
    Batch { file: PathBuf },
}

#[derive(Debug, Deserialize)]
struct PointRow {
    lat: f64,
    lon: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => StoreConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }

    let mut options = GeocodeOptions::new().with_debug(args.debug);
    if let Some(resolution) = args.resolution {
        options = options.with_resolution(resolution);
    }
    if args.no_fallback {
        options = options.with_fallback(false);
    }

    info!("Data directory: {}", config.data_dir.display());
    let geocoder = ReverseGeocoder::from_config(config);

    match args.command {
        Command::Point { lat, lon } => print_result(geocoder.geocode(lat, lon, &options).as_ref()),
        Command::Cell { cell } => print_result(geocoder.geocode_cell(&cell, &options).as_ref()),
        Command::Batch { file } => {
            let mut reader = csv::Reader::from_path(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let points = reader
                .deserialize::<PointRow>()
                .map(|row| row.map(|r| (r.lat, r.lon)))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to parse point rows")?;

            geocoder.cache().warm(args.debug);
            info!("Geocoding {} points", points.len());

            let results = geocoder.geocode_batch(&points, &options);
            let matched = results.iter().filter(|r| r.is_some()).count();

            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for result in &results {
                serde_json::to_writer(&mut out, result)?;
                writeln!(out)?;
            }
            out.flush()?;

            info!("Matched {} of {} points", matched, points.len());
            Ok(())
        }
    }
}

fn print_result(result: Option<&GeocodeResult>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
