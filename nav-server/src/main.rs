//! nav: CLI for turn-by-turn route guidance.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nav_core::config::{self, Config};
use nav_core::{Language, LonLat, Route, TurnInstructionEngine};
use nav_feeder::{FixReader, PositionSource, ReplaySource};

mod navigator;
mod notification;
mod osrm;
mod provider;
mod sinks;

use navigator::{Control, NavigationSummary, Navigator, StopReason};
use notification::WebhookAnnouncer;
use provider::{OfflineProvider, RouteProvider};
use sinks::{AnnouncementSink, ConsoleAnnouncer, FanoutAnnouncer, Sinks};

#[derive(Parser)]
#[command(name = "nav", version, about = "Turn-by-turn route guidance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a route and print its steps
    Route {
        /// Origin as "lon,lat"
        #[arg(long)]
        from: String,

        /// Destination as "lon,lat"
        #[arg(long)]
        to: String,

        /// Print the route as JSON (loadable by `simulate --route`)
        #[arg(long)]
        json: bool,

        /// Routing service base URL
        #[arg(long, env = "NAV_ROUTING_URL")]
        url: Option<String>,

        /// Routing profile (driving, foot, bike)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Replay a fix file against a route and print the guidance
    Simulate {
        /// Route file: saved OSRM response or `route --json` output
        #[arg(long)]
        route: PathBuf,

        /// Fix file (see `nav-feeder synth`)
        #[arg(long)]
        fixes: PathBuf,

        /// Replay speed factor. Fixes arriving less than 50 ms apart are
        /// throttled, so 0 (no pacing) keeps only the first of a burst
        #[arg(long, default_value = "10.0")]
        speed: f64,

        /// Do not contact the routing service when rerouting
        #[arg(long)]
        offline: bool,

        /// Language for instructions and announcements (en, ko)
        #[arg(long)]
        language: Option<String>,

        /// Print every rendered position
        #[arg(long)]
        positions: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,nav_core=info,nav_feeder=info", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = config::load_config();

    match cli.command {
        Commands::Route {
            from,
            to,
            json,
            url,
            profile,
        } => cmd_route(&config, &from, &to, json, url, profile).await,
        Commands::Simulate {
            route,
            fixes,
            speed,
            offline,
            language,
            positions,
        } => {
            cmd_simulate(config, route, fixes, speed, offline, language, positions).await
        }
        Commands::Config { init } => cmd_config(&config, init),
    }
}

fn parse_point(text: &str, what: &str) -> LonLat {
    LonLat::parse(text).unwrap_or_else(|| {
        eprintln!("Error: invalid {what} {text:?}, expected \"lon,lat\"");
        std::process::exit(1);
    })
}

async fn cmd_route(
    config: &Config,
    from: &str,
    to: &str,
    json: bool,
    url: Option<String>,
    profile: Option<String>,
) {
    let origin = parse_point(from, "origin");
    let destination = parse_point(to, "destination");
    let url = url.unwrap_or_else(|| config.routing.url.clone());
    let profile = profile.unwrap_or_else(|| config.routing.profile.clone());

    let provider = osrm::OsrmProvider::new(&url, &profile).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let route = match provider.request_route(origin, destination).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&route) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    print_route(&route, config.guidance.language);
}

fn print_route(route: &Route, language: Language) {
    println!();
    println!("Route: {}", route.summary());
    println!(
        "  {} vertices, {} steps",
        route.geometry.len(),
        route.steps.len()
    );
    println!();

    if route.steps.is_empty() {
        return;
    }

    let engine = TurnInstructionEngine::new(language);
    let mut table = Table::new();
    table.set_header(vec!["#", "Instruction", "Road", "Distance", "Maneuver point"]);
    for (i, step) in route.steps.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(engine.instruction_label(step)),
            Cell::new(step.name.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.0}m", step.distance_m)),
            Cell::new(
                step.maneuver_point()
                    .map(|p| p.to_string())
                    .unwrap_or("-".into()),
            ),
        ]);
    }
    println!("{table}");
}

async fn cmd_simulate(
    mut config: Config,
    route_path: PathBuf,
    fixes_path: PathBuf,
    speed: f64,
    offline: bool,
    language: Option<String>,
    positions: bool,
) {
    if let Some(lang) = language {
        match lang.parse::<Language>() {
            Ok(l) => config.guidance.language = l,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }

    let route = osrm::load_route_file(&route_path).unwrap_or_else(|e| {
        eprintln!("Error loading {}: {e}", route_path.display());
        std::process::exit(1);
    });
    let events = FixReader::new(&fixes_path).read_all().unwrap_or_else(|e| {
        eprintln!("Error loading {}: {e}", fixes_path.display());
        std::process::exit(1);
    });

    let provider: Arc<dyn RouteProvider> = if offline {
        Arc::new(OfflineProvider)
    } else {
        match osrm::OsrmProvider::new(&config.routing.url, &config.routing.profile) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                warn!(error = %e, "routing service unavailable, rerouting disabled");
                Arc::new(OfflineProvider)
            }
        }
    };

    let mut sinks = Sinks::console(positions);
    if let Some(url) = &config.webhook {
        let announcers: Vec<Arc<dyn AnnouncementSink>> = vec![
            Arc::new(ConsoleAnnouncer),
            Arc::new(WebhookAnnouncer::new(url, config.guidance.language)),
        ];
        sinks = sinks.with_announcer(Arc::new(FanoutAnnouncer(announcers)));
    }

    println!();
    println!("Route: {} ({} steps)", route.summary(), route.steps.len());
    println!(
        "Fixes: {} events from {}",
        events.len(),
        fixes_path.display()
    );
    println!();

    let total_steps = route.steps.len();
    let navigator = Navigator::from_config(route, None, &config, provider, sinks);
    info!(
        language = %navigator.tracker().engine.language,
        min_interval_s = navigator.tracker().min_interval,
        "simulation starting"
    );

    let (control_tx, control_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = control_tx.send(Control::Stop).await;
        }
    });

    let subscription = ReplaySource::new(events, speed).subscribe();
    let summary = match navigator.run(subscription, control_rx).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    print_summary(&summary, total_steps);
}

fn print_summary(summary: &NavigationSummary, total_steps: usize) {
    println!();
    let ended = match &summary.reason {
        StopReason::Stopped => "stopped".to_string(),
        StopReason::SourceEnded => "fix stream ended".to_string(),
        StopReason::SourceError(e) => format!("position source error ({})", e.class()),
    };
    println!("Simulation complete: {ended}");
    println!(
        "  Fixes: {} total, {} accepted, {} throttled",
        summary.total_fixes, summary.accepted_fixes, summary.throttled_fixes
    );
    println!(
        "  Renders: {} drawn, {} coalesced",
        summary.renders, summary.frames_coalesced
    );
    println!(
        "  Deviation: {} checks, {} off-route",
        summary.deviation_checks, summary.deviations
    );
    println!(
        "  Reroutes: {} requested, {} failed",
        summary.reroutes_requested, summary.reroutes_failed
    );
    println!("  Announcements: {}", summary.announcements.len());
    println!(
        "  Steps: {} completed, {} skipped, {} in initial route",
        summary.completed.len(),
        summary.steps_skipped,
        total_steps
    );
    println!("  Arrived: {}", if summary.arrived { "yes" } else { "no" });

    if summary.completed.is_empty() {
        return;
    }

    println!();
    let mut table = Table::new();
    table.set_header(vec!["Step", "Instruction", "Announced", "Completed at"]);
    for step in &summary.completed {
        table.add_row(vec![
            Cell::new(step.step),
            Cell::new(&step.label),
            Cell::new(if step.announced { "yes" } else { "no" }),
            Cell::new(format!("{:.1}s", step.timestamp)),
        ]);
    }
    println!("{table}");
}

fn cmd_config(config: &Config, init: bool) {
    if init {
        let defaults = Config::default();
        match config::save_config(&defaults) {
            Ok(path) => println!("Wrote {}", path.display()),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("# {}", config::config_file().display());
    print!("{}", config::serialize_config(config));
}
