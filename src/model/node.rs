//! Per-stop event classification and dwell-time aggregation.
//!
//! Pings for one stop are segmented into visit blocks: a new block starts
//! whenever the gap to the previous ping exceeds the segmentation gap (twice the
//! crawl interval). Only blocks with a ping on both sides are classified; the
//! first ping of a closed block is the arrival, and the departure is the first
//! later ping reporting "not at stop", falling back to the block's last ping.

use crate::analyzers::{Period, RollingAverages, TimedSample};
use crate::config::ModelSettings;
use crate::model::events::{EventKind, EventQueue, VisitEvent};
use crate::model::ping::{Ping, RawPing};
use crate::model::StopId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// Position of a stop occurrence in the route: the stop it is reached from and
/// the stop it continues to. `None` marks either end of a one-way route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborLink {
    pub preceding: Option<StopId>,
    pub succeeding: Option<StopId>,
}

/// Time spent at a stop during one visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellSample {
    pub stop_id: StopId,
    pub arrived_at: DateTime<Utc>,
    pub departed_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Midpoint of arrival and departure.
    pub representative_at: DateTime<Utc>,
}

impl DwellSample {
    fn new(stop_id: StopId, arrived_at: DateTime<Utc>, departed_at: DateTime<Utc>) -> Self {
        let duration = departed_at - arrived_at;
        Self {
            stop_id,
            arrived_at,
            departed_at,
            duration_secs: seconds(duration),
            representative_at: arrived_at + duration / 2,
        }
    }
}

impl TimedSample for DwellSample {
    fn representative_at(&self) -> DateTime<Utc> {
        self.representative_at
    }

    fn seconds(&self) -> f64 {
        self.duration_secs
    }
}

pub(crate) fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

/// Outcome of one classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyReport {
    /// Closed blocks turned into an arrival/departure pair.
    pub classified: usize,
    /// Closed blocks with fewer than two valid pings.
    pub discarded: usize,
}

#[derive(Debug, Clone)]
pub struct StopNode {
    stop_id: StopId,
    links: Vec<NeighborLink>,
    segmentation_gap: TimeDelta,
    pending: Vec<Ping>,
    received: usize,
    malformed: usize,
    arrivals: EventQueue,
    departures: EventQueue,
    dwell_samples: Vec<DwellSample>,
    dwell_averages: RollingAverages,
}

impl StopNode {
    pub fn new(stop_id: StopId, settings: &ModelSettings) -> Self {
        Self {
            stop_id,
            links: Vec::new(),
            segmentation_gap: settings.segmentation_gap,
            pending: Vec::new(),
            received: 0,
            malformed: 0,
            arrivals: EventQueue::new(),
            departures: EventQueue::new(),
            dwell_samples: Vec::new(),
            dwell_averages: RollingAverages::new(&settings.enabled_periods),
        }
    }

    pub fn stop_id(&self) -> &StopId {
        &self.stop_id
    }

    pub fn links(&self) -> &[NeighborLink] {
        &self.links
    }

    /// Registers a neighbor link. Returns `false` if it was already present.
    pub fn link(&mut self, preceding: Option<StopId>, succeeding: Option<StopId>) -> bool {
        let link = NeighborLink {
            preceding,
            succeeding,
        };
        if self.links.contains(&link) {
            debug!(stop_id = %self.stop_id, "Link already exists");
            return false;
        }
        self.links.push(link);
        true
    }

    /// The stop that follows this one when arriving from `preceding`.
    ///
    /// `preceding` may be omitted when the stop has a single link. Without it,
    /// a stop with several links continues along its route-start link, or its
    /// first link otherwise.
    pub fn next_node(&self, preceding: Option<&str>) -> Option<&StopId> {
        let link = match preceding {
            _ if self.links.len() == 1 => self.links.first(),
            Some(prev) => self
                .links
                .iter()
                .find(|l| l.preceding.as_ref().is_some_and(|p| p.as_str() == prev)),
            None => self
                .links
                .iter()
                .find(|l| l.preceding.is_none())
                .or_else(|| self.links.first()),
        };
        link.and_then(|l| l.succeeding.as_ref())
    }

    /// The stop this one is reached from when continuing to `succeeding`.
    pub fn previous_node(&self, succeeding: Option<&str>) -> Option<&StopId> {
        let link = match succeeding {
            _ if self.links.len() == 1 => self.links.first(),
            Some(next) => self
                .links
                .iter()
                .find(|l| l.succeeding.as_ref().is_some_and(|s| s.as_str() == next)),
            None => self
                .links
                .iter()
                .find(|l| l.succeeding.is_none())
                .or_else(|| self.links.first()),
        };
        link.and_then(|l| l.preceding.as_ref())
    }

    /// Appends raw pings. Pings missing a timestamp or flag are counted and
    /// dropped.
    pub fn add_entries(&mut self, entries: impl IntoIterator<Item = RawPing>) {
        let mut skipped = 0;
        for entry in entries {
            self.received += 1;
            match entry.validate() {
                Ok(ping) => self.pending.push(ping),
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "Skipping malformed ping");
                }
            }
        }

        if skipped > 0 {
            self.malformed += skipped;
            warn!(stop_id = %self.stop_id, skipped, "Skipped malformed pings");
        }
    }

    pub fn received_count(&self) -> usize {
        self.received
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Classifies pending pings into events, then recomputes dwell averages.
    pub fn process(&mut self, as_of: DateTime<Utc>) -> ClassifyReport {
        let report = self.classify();
        self.recompute_averages(as_of);
        report
    }

    /// Segments pending pings into visit blocks and classifies every closed one.
    ///
    /// The trailing unclosed block stays pending, together with the ping before
    /// it, so that later pings can close it. A pass with no new pings yields no
    /// events.
    pub fn classify(&mut self) -> ClassifyReport {
        let mut report = ClassifyReport::default();
        if self.pending.len() < 2 {
            return report;
        }

        self.pending.sort_by_key(|p| p.timestamp);

        let starts: Vec<usize> = (1..self.pending.len())
            .filter(|&i| {
                self.pending[i].timestamp - self.pending[i - 1].timestamp > self.segmentation_gap
            })
            .collect();

        let Some(&last_start) = starts.last() else {
            return report;
        };

        for window in starts.windows(2) {
            let block = &self.pending[window[0]..window[1]];
            match classify_block(block) {
                Some((arrival, departure)) => {
                    self.record_visit(arrival, departure);
                    report.classified += 1;
                }
                None => report.discarded += 1,
            }
        }

        self.pending.drain(..last_start - 1);

        debug!(
            stop_id = %self.stop_id,
            classified = report.classified,
            discarded = report.discarded,
            pending = self.pending.len(),
            "Classified visit blocks"
        );
        report
    }

    fn record_visit(&mut self, arrival: Ping, departure: Ping) {
        self.arrivals.push(VisitEvent {
            stop_id: self.stop_id.clone(),
            kind: EventKind::Arrival,
            timestamp: arrival.timestamp,
        });
        self.departures.push(VisitEvent {
            stop_id: self.stop_id.clone(),
            kind: EventKind::Departure,
            timestamp: departure.timestamp,
        });
        self.dwell_samples.push(DwellSample::new(
            self.stop_id.clone(),
            arrival.timestamp,
            departure.timestamp,
        ));
    }

    pub fn recompute_averages(&mut self, as_of: DateTime<Utc>) {
        self.dwell_averages.recompute(&self.dwell_samples, as_of);
    }

    pub fn arrivals(&self) -> &EventQueue {
        &self.arrivals
    }

    pub fn departures(&self) -> &EventQueue {
        &self.departures
    }

    pub(crate) fn arrivals_mut(&mut self) -> &mut EventQueue {
        &mut self.arrivals
    }

    pub(crate) fn departures_mut(&mut self) -> &mut EventQueue {
        &mut self.departures
    }

    pub fn pop_most_recent_arrival(&mut self) -> Option<VisitEvent> {
        self.arrivals.pop_most_recent()
    }

    pub fn pop_most_recent_departure(&mut self) -> Option<VisitEvent> {
        self.departures.pop_most_recent()
    }

    pub fn dwell_samples(&self) -> &[DwellSample] {
        &self.dwell_samples
    }

    pub fn dwell_average(&self, period: Period) -> Option<f64> {
        self.dwell_averages.get(period)
    }

    pub fn dwell_averages(&self) -> &RollingAverages {
        &self.dwell_averages
    }
}

/// Picks the arrival and departure pings of a closed block.
fn classify_block(block: &[Ping]) -> Option<(Ping, Ping)> {
    let (arrival, rest) = block.split_first()?;
    let last = rest.last()?;
    let departure = rest.iter().find(|p| !p.at_stop).unwrap_or(last);
    Some((*arrival, *departure))
}
