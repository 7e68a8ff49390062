//! Travel-time samples between two adjacent stops.

use crate::analyzers::{Period, RollingAverages, TimedSample};
use crate::config::ModelSettings;
use crate::model::events::EventCursor;
use crate::model::node::seconds;
use crate::model::StopId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Observed travel time from a departure at `source` to the matched arrival at
/// `destination`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtaSample {
    pub source: StopId,
    pub destination: StopId,
    pub departed_at: DateTime<Utc>,
    pub arrived_at: DateTime<Utc>,
    pub value_secs: f64,
    /// Midpoint of departure and arrival.
    pub representative_at: DateTime<Utc>,
}

impl TimedSample for EtaSample {
    fn representative_at(&self) -> DateTime<Utc> {
        self.representative_at
    }

    fn seconds(&self) -> f64 {
        self.value_secs
    }
}

/// A departure/arrival pair chosen by [`pair_events`], by position in the
/// unprocessed queues the cursors were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    pub departure_position: usize,
    pub arrival_position: usize,
    pub departed_at: DateTime<Utc>,
    pub arrived_at: DateTime<Utc>,
}

/// Pairs departures at the source stop with arrivals at the destination stop.
///
/// Both cursors walk oldest-first. A departure strictly before the current
/// arrival pairs with it and both advance; otherwise the arrival happened before
/// this departure, so no later departure can claim it, and only the arrival
/// cursor advances. Matching stops when either side runs out, so every event is
/// used at most once and trailing events stay unmatched.
pub fn pair_events(departures: EventCursor<'_>, arrivals: EventCursor<'_>) -> Vec<MatchedPair> {
    let mut pairs = Vec::with_capacity(departures.remaining().min(arrivals.remaining()));
    let mut departures = departures;
    let mut arrivals = arrivals;

    while let (Some(departure), Some(arrival)) = (departures.peek(), arrivals.peek()) {
        if departure.timestamp < arrival.timestamp {
            pairs.push(MatchedPair {
                departure_position: departures.position(),
                arrival_position: arrivals.position(),
                departed_at: departure.timestamp,
                arrived_at: arrival.timestamp,
            });
            departures = departures.advance();
        }
        arrivals = arrivals.advance();
    }

    pairs
}

#[derive(Debug, Clone)]
pub struct RouteEdge {
    source: StopId,
    destination: StopId,
    primary_period: Period,
    samples: Vec<EtaSample>,
    averages: RollingAverages,
}

impl RouteEdge {
    pub fn new(source: StopId, destination: StopId, settings: &ModelSettings) -> Self {
        Self {
            source,
            destination,
            primary_period: settings.primary_period,
            samples: Vec::new(),
            averages: RollingAverages::new(&settings.enabled_periods),
        }
    }

    pub fn source(&self) -> &StopId {
        &self.source
    }

    pub fn destination(&self) -> &StopId {
        &self.destination
    }

    /// Records one sample per matched pair. Averages are not recomputed.
    pub fn record(&mut self, pairs: &[MatchedPair]) {
        for pair in pairs {
            let value = pair.arrived_at - pair.departed_at;
            self.samples.push(EtaSample {
                source: self.source.clone(),
                destination: self.destination.clone(),
                departed_at: pair.departed_at,
                arrived_at: pair.arrived_at,
                value_secs: seconds(value),
                representative_at: pair.departed_at + value / 2,
            });
        }
    }

    pub fn recompute_averages(&mut self, as_of: DateTime<Utc>) {
        self.averages.recompute(&self.samples, as_of);
    }

    pub fn samples(&self) -> &[EtaSample] {
        &self.samples
    }

    /// The most recently recorded sample.
    pub fn current(&self) -> Option<&EtaSample> {
        self.samples.last()
    }

    pub fn average(&self, period: Period) -> Option<f64> {
        self.averages.get(period)
    }

    pub fn averages(&self) -> &RollingAverages {
        &self.averages
    }

    pub fn primary_period(&self) -> Period {
        self.primary_period
    }

    /// Traversal cost: the primary period's average, `None` while unknown.
    pub fn weight(&self) -> Option<f64> {
        self.average(self.primary_period)
    }
}
