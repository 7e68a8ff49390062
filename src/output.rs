//! Report rows for built route graphs.
//!
//! Supports JSON logging and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::rolling::{RollingAverages, sample_stddev};
use crate::analyzers::Period;
use crate::config::TrackerConfig;
use crate::model::{RouteGraph, RouteId, StopId};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One row per edge: ETA counts, latest sample and period averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeReport {
    pub as_of: Option<DateTime<Utc>>,
    pub route_id: RouteId,
    pub source: StopId,
    pub source_name: Option<String>,
    pub destination: StopId,
    pub destination_name: Option<String>,
    pub sample_count: usize,
    pub current_departed_at: Option<DateTime<Utc>>,
    pub current_eta_secs: Option<f64>,
    pub avg_hour_secs: Option<f64>,
    pub avg_day_secs: Option<f64>,
    pub avg_week_secs: Option<f64>,
    pub avg_month_secs: Option<f64>,
    pub avg_year_secs: Option<f64>,
    pub stddev_secs: Option<f64>,
}

/// One row per stop: ping and event counts plus dwell statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopReport {
    pub as_of: Option<DateTime<Utc>>,
    pub route_id: RouteId,
    pub stop_id: StopId,
    pub stop_name: Option<String>,
    pub pings: usize,
    pub malformed_pings: usize,
    pub arrivals: usize,
    pub departures: usize,
    pub dwell_count: usize,
    pub current_dwell_secs: Option<f64>,
    pub avg_hour_secs: Option<f64>,
    pub avg_day_secs: Option<f64>,
    pub avg_week_secs: Option<f64>,
    pub avg_month_secs: Option<f64>,
    pub avg_year_secs: Option<f64>,
    pub stddev_secs: Option<f64>,
}

struct PeriodColumns([Option<f64>; 5]);

impl PeriodColumns {
    fn from_averages(averages: &RollingAverages) -> Self {
        Self([
            averages.get(Period::Hour),
            averages.get(Period::Day),
            averages.get(Period::Week),
            averages.get(Period::Month),
            averages.get(Period::Year),
        ])
    }
}

fn name(config: &TrackerConfig, stop: &StopId) -> Option<String> {
    config.stop_name(stop).map(str::to_string)
}

/// Builds one [`EdgeReport`] per edge, in route order.
pub fn edge_reports(graph: &RouteGraph, config: &TrackerConfig) -> Vec<EdgeReport> {
    graph
        .edges()
        .iter()
        .map(|edge| {
            let PeriodColumns([hour, day, week, month, year]) =
                PeriodColumns::from_averages(edge.averages());
            let current = edge.current();
            EdgeReport {
                as_of: graph.as_of(),
                route_id: graph.route_id().clone(),
                source: edge.source().clone(),
                source_name: name(config, edge.source()),
                destination: edge.destination().clone(),
                destination_name: name(config, edge.destination()),
                sample_count: edge.samples().len(),
                current_departed_at: current.map(|s| s.departed_at),
                current_eta_secs: current.map(|s| s.value_secs),
                avg_hour_secs: hour,
                avg_day_secs: day,
                avg_week_secs: week,
                avg_month_secs: month,
                avg_year_secs: year,
                stddev_secs: sample_stddev(edge.samples()),
            }
        })
        .collect()
}

/// Builds one [`StopReport`] per distinct stop, in first-visit order.
pub fn stop_reports(graph: &RouteGraph, config: &TrackerConfig) -> Vec<StopReport> {
    graph
        .nodes()
        .map(|node| {
            let PeriodColumns([hour, day, week, month, year]) =
                PeriodColumns::from_averages(node.dwell_averages());
            StopReport {
                as_of: graph.as_of(),
                route_id: graph.route_id().clone(),
                stop_id: node.stop_id().clone(),
                stop_name: name(config, node.stop_id()),
                pings: node.received_count(),
                malformed_pings: node.malformed_count(),
                arrivals: node.arrivals().all().len(),
                departures: node.departures().all().len(),
                dwell_count: node.dwell_samples().len(),
                current_dwell_secs: node.dwell_samples().last().map(|s| s.duration_secs),
                avg_hour_secs: hour,
                avg_day_secs: day,
                avg_week_secs: week,
                avg_month_secs: month,
                avg_year_secs: year,
                stddev_secs: sample_stddev(node.dwell_samples()),
            }
        })
        .collect()
}

/// Logs any report as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends report rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_report<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PopulateOptions, RawPing};
    use crate::source::MemorySource;
    use chrono::{TimeDelta, TimeZone};
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn config() -> TrackerConfig {
        let mut config = TrackerConfig::new(30).with_route("3", &["S1", "S2"], false);
        config
            .stop_names
            .insert(StopId::new("S1"), "Europort".to_string());
        config
    }

    async fn graph(config: &TrackerConfig) -> RouteGraph {
        let topology = config.topology(&RouteId::new("3")).unwrap();
        let mut graph = RouteGraph::new(topology, config.model_settings());
        let base = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let at = |secs: i64| base + TimeDelta::seconds(secs);
        let as_of = at(1800);

        // S1 closed visit 10:00:00 -> 10:01:00, S2 closed visit 10:05:00.
        let pings = vec![
            RawPing::new("3", "S1", at(-600), true),
            RawPing::new("3", "S1", at(0), true),
            RawPing::new("3", "S1", at(30), true),
            RawPing::new("3", "S1", at(60), false),
            RawPing::new("3", "S1", at(900), true),
            RawPing::new("3", "S2", at(-600), true),
            RawPing::new("3", "S2", at(300), true),
            RawPing::new("3", "S2", at(330), false),
            RawPing::new("3", "S2", at(900), true),
        ];
        let source = MemorySource::from_pings(pings);
        graph.populate(&source, PopulateOptions::default()).await;
        graph.classify(as_of);
        graph.match_edges(as_of);
        graph
    }

    #[tokio::test]
    async fn test_edge_report_rows() {
        let config = config();
        let rows = edge_reports(&graph(&config).await, &config);

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.source_name.as_deref(), Some("Europort"));
        assert_eq!(row.destination_name, None);
        assert_eq!(row.sample_count, 1);
        assert_eq!(row.current_eta_secs, Some(240.0));
        assert_eq!(row.avg_hour_secs, Some(240.0));
        // A single sample has no spread.
        assert_eq!(row.stddev_secs, Some(0.0));
    }

    #[tokio::test]
    async fn test_stop_report_rows() {
        let config = config();
        let rows = stop_reports(&graph(&config).await, &config);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stop_id.as_str(), "S1");
        assert_eq!(rows[0].pings, 5);
        assert_eq!(rows[0].dwell_count, 1);
        assert_eq!(rows[0].current_dwell_secs, Some(60.0));
    }

    #[tokio::test]
    async fn test_print_json_does_not_panic() {
        let config = config();
        print_json(&edge_reports(&graph(&config).await, &config)).unwrap();
    }

    #[tokio::test]
    async fn test_append_report_writes_header_once() {
        let path = temp_path("bus_tracker_test_header.csv");
        let _ = fs::remove_file(&path);

        let config = config();
        let rows = stop_reports(&graph(&config).await, &config);
        append_report(&path, &rows).unwrap();
        append_report(&path, &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.starts_with("as_of")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 rows per append
        assert_eq!(content.lines().count(), 5);

        fs::remove_file(&path).unwrap();
    }
}
