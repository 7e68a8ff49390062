//! Published route graphs.
//!
//! Each rebuild constructs a fresh [`RouteGraph`] away from readers and then
//! swaps it in, so queries always see a complete graph: either the previous
//! one or the new one.

use crate::analyzers::Period;
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::model::{
    BuildReport, PathEta, PathResolver, PopulateOptions, RouteGraph, RouteId, StopId,
};
use crate::source::EntrySource;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

pub struct RouteTracker {
    config: TrackerConfig,
    source: Arc<dyn EntrySource>,
    published: RwLock<HashMap<RouteId, Arc<RouteGraph>>>,
}

impl RouteTracker {
    pub fn new(config: TrackerConfig, source: Arc<dyn EntrySource>) -> Self {
        Self {
            config,
            source,
            published: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteId> {
        self.config.routes.keys()
    }

    fn populate_options(&self) -> PopulateOptions {
        PopulateOptions {
            concurrency: self.config.fetch_concurrency,
            timeout: self.config.fetch_timeout(),
        }
    }

    pub async fn rebuild(&self, route: &RouteId) -> Result<BuildReport> {
        self.rebuild_at(route, Utc::now()).await
    }

    /// Builds `route` with averages anchored at `as_of` and publishes it.
    #[tracing::instrument(skip_all, fields(route_id = %route))]
    pub async fn rebuild_at(&self, route: &RouteId, as_of: DateTime<Utc>) -> Result<BuildReport> {
        let topology = self.config.topology(route)?;
        let (graph, report) = RouteGraph::build(
            topology,
            self.config.model_settings(),
            self.source.as_ref(),
            self.populate_options(),
            as_of,
        )
        .await;

        self.published
            .write()
            .await
            .insert(route.clone(), Arc::new(graph));
        info!(as_of = %as_of, "Published route graph");
        Ok(report)
    }

    pub async fn rebuild_all(&self) -> Vec<(RouteId, Result<BuildReport>)> {
        self.rebuild_all_at(Utc::now()).await
    }

    /// Rebuilds every configured route concurrently. A route that fails keeps
    /// serving its previous graph.
    pub async fn rebuild_all_at(&self, as_of: DateTime<Utc>) -> Vec<(RouteId, Result<BuildReport>)> {
        let builds = self.config.routes.keys().map(|route| async move {
            let result = self.rebuild_at(route, as_of).await;
            if let Err(e) = &result {
                error!(route_id = %route, error = %e, "Route rebuild failed");
            }
            (route.clone(), result)
        });
        join_all(builds).await
    }

    /// The graph currently served for `route`, if one has been built.
    pub async fn snapshot(&self, route: &RouteId) -> Option<Arc<RouteGraph>> {
        self.published.read().await.get(route).cloned()
    }

    async fn require_snapshot(&self, route: &RouteId) -> Result<Arc<RouteGraph>> {
        self.snapshot(route)
            .await
            .ok_or_else(|| TrackerError::RouteNotFound(route.clone()))
    }

    /// Answers from the configured topology; no graph needs to be built.
    pub fn has_path(&self, route: &RouteId, from: &str, to: &str) -> bool {
        self.config
            .topology(route)
            .is_ok_and(|topology| topology.has_path(from, to))
    }

    pub async fn get_path(&self, route: &RouteId, from: &str, to: &str) -> Result<Vec<StopId>> {
        let graph = self.require_snapshot(route).await?;
        PathResolver::new(&graph).get_path(from, to)
    }

    pub async fn get_path_eta(
        &self,
        route: &RouteId,
        from: &str,
        to: &str,
        period: Period,
    ) -> Result<PathEta> {
        let graph = self.require_snapshot(route).await?;
        let resolver = PathResolver::new(&graph);
        let path = resolver.get_path(from, to)?;
        resolver.path_eta(&path, period)
    }

    /// ETA of a path the caller already resolved, read from one snapshot.
    pub async fn path_eta(
        &self,
        route: &RouteId,
        path: &[StopId],
        period: Period,
    ) -> Result<PathEta> {
        let graph = self.require_snapshot(route).await?;
        PathResolver::new(&graph).path_eta(path, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawPing;
    use crate::source::MemorySource;
    use chrono::{TimeDelta, TimeZone};

    fn tracker(source: Arc<MemorySource>) -> RouteTracker {
        let config = TrackerConfig::new(30).with_route("3", &["S1", "S2", "S3"], true);
        RouteTracker::new(config, source)
    }

    #[tokio::test]
    async fn test_queries_before_first_build() {
        let tracker = tracker(Arc::new(MemorySource::new()));
        let route = RouteId::new("3");

        assert!(tracker.has_path(&route, "S1", "S3"));
        assert!(!tracker.has_path(&route, "S1", "S9"));
        assert!(!tracker.has_path(&RouteId::new("9"), "S1", "S3"));
        assert!(tracker.snapshot(&route).await.is_none());
        assert_eq!(
            tracker.get_path(&route, "S1", "S3").await,
            Err(TrackerError::RouteNotFound(route.clone()))
        );
    }

    #[tokio::test]
    async fn test_path_eta_for_given_path() {
        let tracker = tracker(Arc::new(MemorySource::new()));
        let route = RouteId::new("3");
        let path = vec![StopId::new("S3"), StopId::new("S1")];

        assert_eq!(
            tracker.path_eta(&route, &path, Period::Hour).await,
            Err(TrackerError::RouteNotFound(route.clone()))
        );

        tracker.rebuild(&route).await.unwrap();
        match tracker.path_eta(&route, &path, Period::Hour).await.unwrap() {
            PathEta::Incomplete { missing, .. } => {
                assert_eq!(missing, vec![(StopId::new("S3"), StopId::new("S1"))]);
            }
            other => panic!("expected incomplete, got {other:?}"),
        }

        let skipping = vec![StopId::new("S1"), StopId::new("S3")];
        assert!(matches!(
            tracker.path_eta(&route, &skipping, Period::Hour).await,
            Err(TrackerError::NoPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_route_rebuild_fails() {
        let tracker = tracker(Arc::new(MemorySource::new()));
        let err = tracker.rebuild(&RouteId::new("9")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rebuild_replaces_snapshot() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 4, 10, 30, 0).unwrap();
        let source = Arc::new(MemorySource::new());
        let tracker = tracker(source.clone());
        let route = RouteId::new("3");

        let results = tracker.rebuild_all_at(as_of).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
        let first = tracker.snapshot(&route).await.unwrap();
        assert!(first.is_ready());
        assert!(
            !tracker
                .get_path_eta(&route, "S1", "S2", Period::Hour)
                .await
                .unwrap()
                .is_complete()
        );

        let base = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let at = |secs: i64| base + TimeDelta::seconds(secs);
        source.append(vec![
            RawPing::new("3", "S1", at(0), true),
            RawPing::new("3", "S1", at(30), false),
            RawPing::new("3", "S1", at(600), true),
        ]);
        tracker.rebuild_at(&route, as_of).await.unwrap();

        let second = tracker.snapshot(&route).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.node("S1").unwrap().received_count(), 0);
        assert_eq!(second.node("S1").unwrap().received_count(), 3);
    }
}
