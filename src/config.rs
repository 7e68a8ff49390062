//! Tracker configuration.
//!
//! Stored as a JSON file on disk:
//! ```json
//! {
//!   "crawl_interval_seconds": 30,
//!   "enabled_periods": ["hour", "day", "week", "month", "year"],
//!   "primary_weight_period": "hour",
//!   "routes": {
//!     "3": { "stops": ["EB8", "MHE", "SJS"], "circular": true }
//!   },
//!   "stop_names": { "EB8": "Europort" }
//! }
//! ```

use crate::analyzers::Period;
use crate::error::TrackerError;
use crate::model::{RouteId, RouteTopology, StopId};
use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub stops: Vec<StopId>,
    #[serde(default)]
    pub circular: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub crawl_interval_seconds: u64,
    #[serde(default = "default_periods")]
    pub enabled_periods: Vec<Period>,
    #[serde(default = "default_primary_period")]
    pub primary_weight_period: Period,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default)]
    pub routes: BTreeMap<RouteId, RouteConfig>,
    #[serde(default)]
    pub stop_names: BTreeMap<StopId, String>,
}

fn default_periods() -> Vec<Period> {
    Period::ALL.to_vec()
}

fn default_primary_period() -> Period {
    Period::Hour
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_fetch_concurrency() -> usize {
    8
}

impl TrackerConfig {
    /// A config with default periods and no routes.
    pub fn new(crawl_interval_seconds: u64) -> Self {
        Self {
            crawl_interval_seconds,
            enabled_periods: default_periods(),
            primary_weight_period: default_primary_period(),
            fetch_timeout_seconds: default_fetch_timeout(),
            fetch_concurrency: default_fetch_concurrency(),
            routes: BTreeMap::new(),
            stop_names: BTreeMap::new(),
        }
    }

    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: TrackerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_route(mut self, route_id: &str, stops: &[&str], circular: bool) -> Self {
        self.routes.insert(
            RouteId::new(route_id),
            RouteConfig {
                stops: stops.iter().map(|s| StopId::new(s)).collect(),
                circular,
            },
        );
        self
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.crawl_interval_seconds == 0 {
            return Err(TrackerError::Configuration(
                "crawl_interval_seconds must be positive".into(),
            ));
        }
        if !self.enabled_periods.contains(&self.primary_weight_period) {
            return Err(TrackerError::Configuration(format!(
                "primary_weight_period '{}' is not an enabled period",
                self.primary_weight_period
            )));
        }
        if self.fetch_concurrency == 0 {
            return Err(TrackerError::Configuration(
                "fetch_concurrency must be at least 1".into(),
            ));
        }
        for route_id in self.routes.keys() {
            self.topology(route_id)?;
        }
        Ok(())
    }

    /// Builds the topology of a configured route.
    pub fn topology(&self, route_id: &RouteId) -> Result<RouteTopology, TrackerError> {
        let route = self
            .routes
            .get(route_id)
            .ok_or_else(|| TrackerError::RouteNotFound(route_id.clone()))?;
        RouteTopology::new(route_id.clone(), route.stops.clone(), route.circular)
    }

    pub fn stop_name(&self, stop: &StopId) -> Option<&str> {
        self.stop_names.get(stop).map(String::as_str)
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            segmentation_gap: TimeDelta::seconds(
                i64::try_from(self.crawl_interval_seconds.saturating_mul(2)).unwrap_or(i64::MAX),
            ),
            enabled_periods: self.enabled_periods.clone(),
            primary_period: self.primary_weight_period,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// The parts of the config a route graph is built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Gaps longer than this split a stop's pings into separate visits
    /// (twice the crawl interval).
    pub segmentation_gap: TimeDelta,
    pub enabled_periods: Vec<Period>,
    pub primary_period: Period,
}

impl Default for ModelSettings {
    fn default() -> Self {
        TrackerConfig::new(30).model_settings()
    }
}
