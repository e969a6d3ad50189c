//! nav-feeder: Position fix generator and fix-file checker.
//!
//! Supports:
//! - Synthesizing a drive along a polyline into a fix file
//! - Validating recorded fix files

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nav_core::types::parse_path;
use nav_feeder::capture::{self, FixReader, FIX_FILE_HEADER};
use nav_feeder::{SourceEvent, SynthDrive};

#[derive(Parser)]
#[command(name = "nav-feeder", version, about = "Position fix sources for nav-guide")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate fixes along a path and print them as a fix file
    Synth {
        /// Path as "lon,lat;lon,lat;..."
        #[arg(long)]
        path: String,

        /// Travel speed in m/s
        #[arg(long, default_value = "13.9")]
        speed: f64,

        /// Fixes per second
        #[arg(long, default_value = "1.0")]
        rate: f64,

        /// Start drifting off the path after this many meters
        #[arg(long, requires = "drift")]
        drift_after: Option<f64>,

        /// Sideways drift in meters
        #[arg(long, default_value = "0.0")]
        drift: f64,

        /// Timestamp of the first fix, in seconds
        #[arg(long, default_value = "0.0")]
        start: f64,
    },
    /// Parse a fix file and report what it contains
    Check {
        /// Path to a fix file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,nav_core=info", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            path,
            speed,
            rate,
            drift_after,
            drift,
            start,
        } => cmd_synth(&path, speed, rate, drift_after, drift, start),
        Commands::Check { file } => cmd_check(file),
    }
}

fn cmd_synth(
    path: &str,
    speed: f64,
    rate: f64,
    drift_after: Option<f64>,
    drift: f64,
    start: f64,
) {
    let Some(vertices) = parse_path(path) else {
        eprintln!("Error: invalid path {path:?}, expected \"lon,lat;lon,lat;...\"");
        std::process::exit(1);
    };

    let mut drive = SynthDrive::new(vertices, speed, rate);
    drive.start_ts = start;
    if let Some(after) = drift_after {
        drive = drive.with_drift(after, drift);
    }

    let fixes = match drive.generate() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    info!(fixes = fixes.len(), speed, rate, "synthetic drive generated");

    println!("{FIX_FILE_HEADER}");
    for fix in &fixes {
        println!("{}", capture::format_fix_line(fix));
    }
}

fn cmd_check(file: PathBuf) {
    let (events, errors) = match FixReader::new(&file).read_lenient() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let fixes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SourceEvent::Fix(f) => Some(f),
            SourceEvent::Error(_) => None,
        })
        .collect();
    let source_errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SourceEvent::Error(err) => Some(err),
            SourceEvent::Fix(_) => None,
        })
        .collect();

    println!("{}", file.display());
    println!("  fixes:          {}", fixes.len());
    if let (Some(first), Some(last)) = (fixes.first(), fixes.last()) {
        let span = last.timestamp - first.timestamp;
        println!("  span:           {span:.1}s");
        let out_of_order = fixes
            .windows(2)
            .filter(|w| w[1].timestamp < w[0].timestamp)
            .count();
        if out_of_order > 0 {
            println!("  out of order:   {out_of_order}");
        }
        let with_heading = fixes.iter().filter(|f| f.valid_heading().is_some()).count();
        println!("  with heading:   {with_heading}");
    }
    for err in &source_errors {
        println!("  source error:   {} ({err})", err.class());
    }
    for err in &errors {
        println!("  malformed:      {err}");
    }

    if !errors.is_empty() {
        std::process::exit(1);
    }
}
