//! Route graph construction and the populate → classify → match pipeline.

use crate::config::ModelSettings;
use crate::model::edge::{RouteEdge, pair_events};
use crate::model::node::{ClassifyReport, StopNode};
use crate::model::{RouteId, RouteTopology, StopId};
use crate::source::EntrySource;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Nodes and edges exist but hold no data.
    Constructed,
    Populated,
    Classified,
    /// Edges matched and averages computed; safe to publish.
    Ready,
}

/// Fetch limits for the populate stage.
#[derive(Debug, Clone, Copy)]
pub struct PopulateOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    pub pings: usize,
    /// Stops whose fetch failed or timed out.
    pub degraded: Vec<StopId>,
}

/// Summary of a full pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub populate: PopulateReport,
    pub classified_blocks: usize,
    pub discarded_blocks: usize,
    pub eta_samples: usize,
}

/// Stop nodes and edges of one route.
///
/// Nodes are keyed by stop ID and refer to their neighbors by ID only. A graph
/// is built once and then treated as read-only; recomputing means building a
/// new graph.
#[derive(Debug, Clone)]
pub struct RouteGraph {
    topology: RouteTopology,
    settings: ModelSettings,
    nodes: HashMap<StopId, StopNode>,
    edges: Vec<RouteEdge>,
    edge_index: HashMap<(StopId, StopId), usize>,
    status: BuildStatus,
    as_of: Option<DateTime<Utc>>,
}

impl RouteGraph {
    /// Creates one node per distinct stop and one edge per adjacent pair, and
    /// registers every sequence position as a neighbor link on its node.
    pub fn new(topology: RouteTopology, settings: ModelSettings) -> Self {
        let mut nodes: HashMap<StopId, StopNode> = HashMap::new();
        for stop in topology.stops() {
            nodes
                .entry(stop.clone())
                .or_insert_with(|| StopNode::new(stop.clone(), &settings));
        }

        for (i, stop) in topology.stops().iter().enumerate() {
            if let Some(node) = nodes.get_mut(stop) {
                node.link(
                    topology.predecessor_at(i).cloned(),
                    topology.successor_at(i).cloned(),
                );
            }
        }

        let mut edges = Vec::new();
        let mut edge_index = HashMap::new();
        for (from, to) in topology.adjacent_pairs() {
            let key = (from.clone(), to.clone());
            if edge_index.contains_key(&key) {
                continue;
            }
            edge_index.insert(key, edges.len());
            edges.push(RouteEdge::new(from.clone(), to.clone(), &settings));
        }

        debug!(
            route_id = %topology.route_id(),
            nodes = nodes.len(),
            edges = edges.len(),
            "Constructed route graph"
        );

        Self {
            topology,
            settings,
            nodes,
            edges,
            edge_index,
            status: BuildStatus::Constructed,
            as_of: None,
        }
    }

    /// Runs the whole pipeline and returns a graph ready for queries.
    #[tracing::instrument(skip_all, fields(route_id = %topology.route_id()))]
    pub async fn build(
        topology: RouteTopology,
        settings: ModelSettings,
        source: &dyn EntrySource,
        options: PopulateOptions,
        as_of: DateTime<Utc>,
    ) -> (Self, BuildReport) {
        let mut graph = Self::new(topology, settings);
        let populate = graph.populate(source, options).await;
        let classify = graph.classify(as_of);
        let eta_samples = graph.match_edges(as_of);

        let report = BuildReport {
            populate,
            classified_blocks: classify.classified,
            discarded_blocks: classify.discarded,
            eta_samples,
        };
        info!(
            pings = report.populate.pings,
            degraded = report.populate.degraded.len(),
            classified = report.classified_blocks,
            eta_samples = report.eta_samples,
            "Route graph ready"
        );
        (graph, report)
    }

    /// Pulls every stop's ping history from `source`, a bounded number of stops
    /// at a time. A failed or timed-out fetch leaves that stop with whatever it
    /// already had.
    #[tracing::instrument(skip_all, fields(route_id = %self.topology.route_id()))]
    pub async fn populate(
        &mut self,
        source: &dyn EntrySource,
        options: PopulateOptions,
    ) -> PopulateReport {
        let route = self.topology.route_id().clone();
        let stops: Vec<StopId> = self.stop_ids().cloned().collect();

        let results: Vec<_> = stream::iter(stops)
            .map(|stop| {
                let route = &route;
                async move {
                    let fetched =
                        tokio::time::timeout(options.timeout, source.fetch_entries(route, &stop))
                            .await;
                    (stop, fetched)
                }
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        let mut report = PopulateReport::default();
        for (stop, fetched) in results {
            let entries = match fetched {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    warn!(stop_id = %stop, error = %e, "Entry fetch failed, stop degraded");
                    report.degraded.push(stop);
                    continue;
                }
                Err(_) => {
                    warn!(stop_id = %stop, timeout_secs = options.timeout.as_secs(), "Entry fetch timed out, stop degraded");
                    report.degraded.push(stop);
                    continue;
                }
            };

            report.pings += entries.len();
            if let Some(node) = self.nodes.get_mut(&stop) {
                node.add_entries(entries);
            }
        }

        report.degraded.sort();
        self.status = BuildStatus::Populated;
        report
    }

    /// Classifies every node in parallel and recomputes dwell averages.
    pub fn classify(&mut self, as_of: DateTime<Utc>) -> ClassifyReport {
        let reports: Vec<ClassifyReport> = self
            .nodes
            .par_iter_mut()
            .map(|(_, node)| node.process(as_of))
            .collect();

        self.status = BuildStatus::Classified;
        reports
            .into_iter()
            .fold(ClassifyReport::default(), |acc, r| ClassifyReport {
                classified: acc.classified + r.classified,
                discarded: acc.discarded + r.discarded,
            })
    }

    /// Matches departures to arrivals along every edge, in sequence order, and
    /// recomputes ETA averages. Must run after [`RouteGraph::classify`].
    pub fn match_edges(&mut self, as_of: DateTime<Utc>) -> usize {
        let mut total = 0;

        for edge in &mut self.edges {
            let (Some(source), Some(destination)) = (
                self.nodes.get(edge.source()),
                self.nodes.get(edge.destination()),
            ) else {
                continue;
            };

            let pairs = pair_events(source.departures().cursor(), destination.arrivals().cursor());
            edge.record(&pairs);
            edge.recompute_averages(as_of);
            total += pairs.len();

            let departures: Vec<usize> = pairs.iter().map(|p| p.departure_position).collect();
            let arrivals: Vec<usize> = pairs.iter().map(|p| p.arrival_position).collect();
            if let Some(node) = self.nodes.get_mut(edge.source()) {
                node.departures_mut().consume(&departures);
            }
            if let Some(node) = self.nodes.get_mut(edge.destination()) {
                node.arrivals_mut().consume(&arrivals);
            }

            debug!(
                source = %edge.source(),
                destination = %edge.destination(),
                matched = pairs.len(),
                "Matched edge events"
            );
        }

        self.status = BuildStatus::Ready;
        self.as_of = Some(as_of);
        total
    }

    pub fn route_id(&self) -> &RouteId {
        self.topology.route_id()
    }

    pub fn topology(&self) -> &RouteTopology {
        &self.topology
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == BuildStatus::Ready
    }

    /// Reference instant the averages were computed for.
    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.as_of
    }

    pub fn node(&self, stop: &str) -> Option<&StopNode> {
        self.nodes.get(stop)
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&RouteEdge> {
        self.edge_index
            .get(&(StopId::new(from), StopId::new(to)))
            .map(|&i| &self.edges[i])
    }

    /// Distinct stops in first-occurrence order.
    pub fn stop_ids(&self) -> impl Iterator<Item = &StopId> {
        let stops = self.topology.stops();
        stops
            .iter()
            .enumerate()
            .filter(move |(i, s)| !stops[..*i].contains(s))
            .map(|(_, s)| s)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StopNode> {
        self.stop_ids().filter_map(|s| self.nodes.get(s))
    }

    pub fn edges(&self) -> &[RouteEdge] {
        &self.edges
    }
}
