//! CLI entry point for the bus route tracker.
//!
//! Provides subcommands for building route graphs from a ping log, querying
//! paths and ETAs, writing CSV reports, and periodically rebuilding from a
//! remote entry store.

use anyhow::{Context, Result};
use bus_tracker::analyzers::Period;
use bus_tracker::fetch::{BasicClient, BearerAuth};
use bus_tracker::output::{append_report, edge_reports, print_json, stop_reports};
use bus_tracker::source::{CsvSource, EntrySource, HttpSource};
use bus_tracker::{RouteId, RouteTracker, TrackerConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_tracker")]
#[command(about = "Builds bus route graphs and ETA averages from stop pings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build route graphs from a CSV ping log and print edge reports
    Build {
        /// Tracker config JSON
        #[arg(short, long, default_value = "tracker.json")]
        config: String,

        /// CSV ping log
        #[arg(short, long)]
        entries: String,

        /// Only build this route
        #[arg(short, long)]
        route: Option<String>,
    },
    /// Resolve the path between two stops and its ETA
    Path {
        #[arg(short, long, default_value = "tracker.json")]
        config: String,

        #[arg(short, long)]
        entries: String,

        #[arg(short, long)]
        route: String,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Averaging period: hour, day, week, month or year
        #[arg(short, long, default_value = "hour")]
        period: Period,
    },
    /// Build every route and append edge and stop reports as CSV
    Report {
        #[arg(short, long, default_value = "tracker.json")]
        config: String,

        #[arg(short, long)]
        entries: String,

        /// Directory receiving edges.csv and stops.csv
        #[arg(short, long, default_value = "reports")]
        output_dir: String,
    },
    /// Rebuild every route from a remote entry store at a fixed interval
    Watch {
        #[arg(short, long, default_value = "tracker.json")]
        config: String,

        /// Base URL of the entry store
        #[arg(short, long)]
        base_url: String,

        /// Seconds between rebuilds
        #[arg(short, long, default_value_t = 300)]
        interval: u64,

        /// Number of rebuilds to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        iterations: usize,

        #[arg(short, long, default_value = "reports")]
        output_dir: String,
    },
}

#[derive(Serialize)]
struct PathOutput<'a> {
    route_id: &'a str,
    from: &'a str,
    to: &'a str,
    period: Period,
    has_path: bool,
    path: Vec<bus_tracker::StopId>,
    eta: bus_tracker::PathEta,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            entries,
            route,
        } => {
            let tracker = tracker_from_log(&config, &entries)?;
            let routes: Vec<RouteId> = match route {
                Some(route) => vec![RouteId::from(route)],
                None => tracker.routes().cloned().collect(),
            };

            for route in &routes {
                let report = tracker.rebuild(route).await?;
                info!(
                    route_id = %route,
                    pings = report.populate.pings,
                    classified = report.classified_blocks,
                    discarded = report.discarded_blocks,
                    eta_samples = report.eta_samples,
                    "Route built"
                );
                if let Some(graph) = tracker.snapshot(route).await {
                    print_json(&edge_reports(&graph, tracker.config()))?;
                    print_json(&stop_reports(&graph, tracker.config()))?;
                }
            }
        }
        Commands::Path {
            config,
            entries,
            route,
            from,
            to,
            period,
        } => {
            let tracker = tracker_from_log(&config, &entries)?;
            let route_id = RouteId::from(route.as_str());
            tracker.rebuild(&route_id).await?;

            let has_path = tracker.has_path(&route_id, &from, &to);
            let path = tracker.get_path(&route_id, &from, &to).await?;
            let eta = tracker.get_path_eta(&route_id, &from, &to, period).await?;
            if !eta.is_complete() {
                warn!(route_id = %route_id, %period, "Some edges have no ETA for this period");
            }

            print_json(&PathOutput {
                route_id: &route,
                from: &from,
                to: &to,
                period,
                has_path,
                path,
                eta,
            })?;
        }
        Commands::Report {
            config,
            entries,
            output_dir,
        } => {
            let tracker = tracker_from_log(&config, &entries)?;
            write_reports(&tracker, &output_dir).await?;
        }
        Commands::Watch {
            config,
            base_url,
            interval,
            iterations,
            output_dir,
        } => {
            let config = TrackerConfig::load(&config)?;
            let client = BasicClient::with_timeout(config.fetch_timeout())?;
            let source: Arc<dyn EntrySource> = match std::env::var("ENTRY_STORE_TOKEN") {
                Ok(token) => Arc::new(HttpSource::new(&base_url, BearerAuth::new(client, &token)?)?),
                Err(_) => Arc::new(HttpSource::new(&base_url, client)?),
            };
            let tracker = RouteTracker::new(config, source);
            watch(&tracker, &output_dir, interval, iterations).await?;
        }
    }

    Ok(())
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Loads the config and the CSV ping log behind it.
fn tracker_from_log(config: &str, entries: &str) -> Result<RouteTracker> {
    let config = TrackerConfig::load(config)?;
    let source = CsvSource::load(entries)?;
    for route in source.routes() {
        if !config.routes.contains_key(route) {
            warn!(route_id = %route, "Ping log has entries for an unconfigured route");
        }
    }
    Ok(RouteTracker::new(config, Arc::new(source)))
}

/// Rebuilds all routes and appends their rows to `edges.csv` and `stops.csv`.
#[tracing::instrument(skip(tracker))]
async fn write_reports(tracker: &RouteTracker, output_dir: &str) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create report directory '{output_dir}'"))?;
    let edges_path = format!("{output_dir}/edges.csv");
    let stops_path = format!("{output_dir}/stops.csv");

    for (route, result) in tracker.rebuild_all().await {
        if result.is_err() {
            continue;
        }
        let Some(graph) = tracker.snapshot(&route).await else {
            continue;
        };
        append_report(&edges_path, &edge_reports(&graph, tracker.config()))?;
        append_report(&stops_path, &stop_reports(&graph, tracker.config()))?;
        info!(route_id = %route, "Reports written");
    }
    Ok(())
}

/// Rebuilds and reports at a fixed interval until the iteration limit is
/// reached.
#[tracing::instrument(skip(tracker))]
async fn watch(
    tracker: &RouteTracker,
    output_dir: &str,
    interval: u64,
    iterations: usize,
) -> Result<()> {
    if iterations == 0 {
        info!(interval, "Rebuilding indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(iterations, interval, "Starting rebuild loop");
    }

    let mut count = 0;
    loop {
        if iterations > 0 && count >= iterations {
            break;
        }
        count += 1;

        info!(iteration = count, "Starting rebuild round");
        if let Err(e) = write_reports(tracker, output_dir).await {
            error!(error = %e, "Rebuild round failed");
        }

        if iterations == 0 || count < iterations {
            info!(interval, "Waiting before next rebuild");
            tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
        }
    }

    info!(output_dir, "Finished rebuilding");
    Ok(())
}
