//! Path queries over a built route graph.

use crate::analyzers::Period;
use crate::error::{Result, TrackerError};
use crate::model::graph::RouteGraph;
use crate::model::StopId;
use serde::Serialize;
use std::collections::HashMap;

/// Travel time along a path for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PathEta {
    Complete { seconds: f64 },
    /// At least one edge has no average for the period. `partial_seconds` sums
    /// the edges that do.
    Incomplete {
        partial_seconds: f64,
        missing: Vec<(StopId, StopId)>,
    },
}

impl PathEta {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            PathEta::Complete { seconds } => Some(*seconds),
            PathEta::Incomplete { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, PathEta::Complete { .. })
    }
}

/// Stateless query layer over one graph snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'g> {
    graph: &'g RouteGraph,
}

impl<'g> PathResolver<'g> {
    pub fn new(graph: &'g RouteGraph) -> Self {
        Self { graph }
    }

    /// Topology-level reachability; says nothing about ETA data.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        self.graph.topology().has_path(from, to)
    }

    /// Walks neighbor links from `from` until `to` is reached.
    ///
    /// Each stop may be left at most once per neighbor link it has; exceeding
    /// that, or reaching a stop with no continuation, returns
    /// [`TrackerError::TraversalLimitExceeded`] with the path walked so far.
    pub fn get_path(&self, from: &str, to: &str) -> Result<Vec<StopId>> {
        let start = self.require_stop(from)?;
        self.require_stop(to)?;

        if !self.has_path(from, to) {
            return Err(TrackerError::NoPath {
                route: self.graph.route_id().clone(),
                from: start.clone(),
                to: StopId::new(to),
            });
        }

        let mut path = vec![start.clone()];
        let mut traversals: HashMap<&StopId, usize> = HashMap::new();
        let mut previous: Option<&StopId> = None;
        let mut current = start;

        while current.as_str() != to {
            let node = self
                .graph
                .node(current.as_str())
                .ok_or_else(|| self.not_found(current.as_str()))?;

            let count = traversals.entry(current).or_insert(0);
            *count += 1;
            if *count > node.links().len() {
                return Err(TrackerError::TraversalLimitExceeded { partial: path });
            }

            let Some(next) = node.next_node(previous.map(StopId::as_str)) else {
                return Err(TrackerError::TraversalLimitExceeded { partial: path });
            };

            previous = Some(current);
            current = next;
            path.push(next.clone());
        }

        Ok(path)
    }

    /// Sums the `period` average of every consecutive edge of `path`.
    ///
    /// Edges without an average make the result [`PathEta::Incomplete`]; they are
    /// never counted as zero. A pair of stops with no edge between them is
    /// [`TrackerError::NoPath`].
    pub fn path_eta(&self, path: &[StopId], period: Period) -> Result<PathEta> {
        let mut total = 0.0;
        let mut missing = Vec::new();

        for pair in path.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let edge = self
                .graph
                .edge(from.as_str(), to.as_str())
                .ok_or_else(|| TrackerError::NoPath {
                    route: self.graph.route_id().clone(),
                    from: from.clone(),
                    to: to.clone(),
                })?;

            match edge.average(period) {
                Some(avg) => total += avg,
                None => missing.push((from.clone(), to.clone())),
            }
        }

        if missing.is_empty() {
            Ok(PathEta::Complete { seconds: total })
        } else {
            Ok(PathEta::Incomplete {
                partial_seconds: total,
                missing,
            })
        }
    }

    fn require_stop(&self, stop: &str) -> Result<&'g StopId> {
        self.graph
            .node(stop)
            .map(|n| n.stop_id())
            .ok_or_else(|| self.not_found(stop))
    }

    fn not_found(&self, stop: &str) -> TrackerError {
        TrackerError::StopNotFound {
            route: self.graph.route_id().clone(),
            stop: StopId::new(stop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::model::RouteTopology;

    fn graph(stops: &[&str], circular: bool) -> RouteGraph {
        let topo =
            RouteTopology::new("3", stops.iter().map(|s| StopId::new(s)).collect(), circular)
                .unwrap();
        RouteGraph::new(topo, TrackerConfig::new(30).model_settings())
    }

    fn ids(path: &[StopId]) -> Vec<&str> {
        path.iter().map(StopId::as_str).collect()
    }

    #[test]
    fn test_path_on_circular_route() {
        let g = graph(&["S1", "S2", "S3"], true);
        let resolver = PathResolver::new(&g);

        assert_eq!(ids(&resolver.get_path("S1", "S3").unwrap()), vec!["S1", "S2", "S3"]);
        assert_eq!(ids(&resolver.get_path("S3", "S2").unwrap()), vec!["S3", "S1", "S2"]);
        assert_eq!(ids(&resolver.get_path("S2", "S2").unwrap()), vec!["S2"]);
    }

    #[test]
    fn test_one_way_route_is_directed() {
        let g = graph(&["S1", "S2", "S3"], false);
        let resolver = PathResolver::new(&g);

        assert!(resolver.has_path("S1", "S3"));
        assert!(!resolver.has_path("S3", "S1"));
        assert_eq!(ids(&resolver.get_path("S1", "S3").unwrap()), vec!["S1", "S2", "S3"]);
        assert!(matches!(
            resolver.get_path("S3", "S1"),
            Err(TrackerError::NoPath { .. })
        ));
    }

    #[test]
    fn test_unknown_stop() {
        let g = graph(&["S1", "S2", "S3"], true);
        let resolver = PathResolver::new(&g);

        assert!(!resolver.has_path("S1", "SX"));
        assert!(resolver.get_path("S1", "SX").unwrap_err().is_not_found());
        assert!(resolver.get_path("SX", "S1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_branching_route_uses_preceding_stop() {
        let g = graph(&["A", "B", "C", "B", "D"], true);
        let resolver = PathResolver::new(&g);

        assert_eq!(
            ids(&resolver.get_path("A", "D").unwrap()),
            vec!["A", "B", "C", "B", "D"]
        );
        assert_eq!(ids(&resolver.get_path("C", "A").unwrap()), vec!["C", "B", "D", "A"]);
    }

    #[test]
    fn test_looping_walk_hits_traversal_limit() {
        // A's route-start link leads B -> C -> A -> B -> C again; C has one link.
        let g = graph(&["A", "B", "C", "A", "B", "D"], false);
        let resolver = PathResolver::new(&g);

        assert!(resolver.has_path("A", "D"));
        match resolver.get_path("A", "D") {
            Err(TrackerError::TraversalLimitExceeded { partial }) => {
                assert_eq!(ids(&partial), vec!["A", "B", "C", "A", "B", "C"]);
            }
            other => panic!("expected traversal limit, got {other:?}"),
        }
    }

    #[test]
    fn test_get_path_is_repeatable() {
        let g = graph(&["A", "B", "C", "B", "D"], true);
        let resolver = PathResolver::new(&g);
        let first = resolver.get_path("D", "C").unwrap();
        for _ in 0..5 {
            assert_eq!(resolver.get_path("D", "C").unwrap(), first);
        }
    }

    #[test]
    fn test_path_eta_without_data_is_incomplete() {
        let g = graph(&["S1", "S2", "S3"], true);
        let resolver = PathResolver::new(&g);
        let path = resolver.get_path("S1", "S3").unwrap();

        match resolver.path_eta(&path, Period::Hour).unwrap() {
            PathEta::Incomplete {
                partial_seconds,
                missing,
            } => {
                assert_eq!(partial_seconds, 0.0);
                assert_eq!(missing.len(), 2);
            }
            other => panic!("expected incomplete, got {other:?}"),
        }

        assert_eq!(
            resolver.path_eta(&path[..1], Period::Hour).unwrap(),
            PathEta::Complete { seconds: 0.0 }
        );
    }

    #[test]
    fn test_path_eta_rejects_non_adjacent_stops() {
        let g = graph(&["S1", "S2", "S3"], false);
        let resolver = PathResolver::new(&g);
        let path = vec![StopId::new("S1"), StopId::new("S3")];
        assert!(matches!(
            resolver.path_eta(&path, Period::Day),
            Err(TrackerError::NoPath { .. })
        ));
    }
}
