//! Raw stop pings as supplied by the entry store.

use crate::error::TrackerError;
use crate::model::{RouteId, StopId};
use crate::parser::{parse_last_stop, parse_time_since};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One scraped observation of a bus relative to a stop.
///
/// Pings are append-only; the classifier never mutates them. Fields are optional
/// because the scraper can fail to read any of them. A value that does not parse
/// loads as missing, so the classifier counts the ping as malformed instead of
/// the whole log failing to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPing {
    pub route_id: RouteId,
    pub stop_id: StopId,
    /// Page timestamp minus the reported "time since" interval.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub observed_at: Option<DateTime<Utc>>,
    /// `true` while the bus is reported at the stop, `false` once "Leaving".
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub at_stop: Option<bool>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub raw_text: Option<String>,
}

impl RawPing {
    pub fn new(
        route_id: impl Into<RouteId>,
        stop_id: impl Into<StopId>,
        observed_at: DateTime<Utc>,
        at_stop: bool,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            stop_id: stop_id.into(),
            observed_at: Some(observed_at),
            at_stop: Some(at_stop),
            scraped_at: None,
            raw_text: None,
        }
    }

    /// Builds a ping from the text scraped off a route page.
    ///
    /// `time_since` is the "2 minutes 10 seconds" style interval and `last_stop`
    /// the stop label, optionally prefixed with `Leaving`. When the interval cannot
    /// be read the ping is kept without an observation time.
    pub fn from_scrape(
        route_id: impl Into<RouteId>,
        stop_id: impl Into<StopId>,
        page_timestamp: DateTime<Utc>,
        time_since: &str,
        last_stop: &str,
    ) -> Self {
        let observed_at = parse_time_since(time_since)
            .map(|secs| page_timestamp - TimeDelta::seconds(i64::from(secs)));
        let (_, at_stop) = parse_last_stop(last_stop);

        Self {
            route_id: route_id.into(),
            stop_id: stop_id.into(),
            observed_at,
            at_stop: Some(at_stop),
            scraped_at: Some(page_timestamp),
            raw_text: Some(format!("{last_stop} | {time_since}")),
        }
    }

    /// Checks that the fields the classifier needs are present.
    pub fn validate(&self) -> Result<Ping, TrackerError> {
        let malformed = |reason: &str| TrackerError::MalformedEntry {
            stop: self.stop_id.clone(),
            reason: reason.to_string(),
        };

        let timestamp = self
            .observed_at
            .ok_or_else(|| malformed("missing observation timestamp"))?;
        let at_stop = self.at_stop.ok_or_else(|| malformed("missing at-stop flag"))?;

        Ok(Ping { timestamp, at_stop })
    }
}

/// A validated ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub timestamp: DateTime<Utc>,
    pub at_stop: bool,
}
