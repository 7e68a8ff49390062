//! Ordered stop sequence of a route.

use crate::error::{Result, TrackerError};
use crate::model::{RouteId, StopId};

/// The fixed, possibly circular, stop sequence of one route.
///
/// A stop may appear more than once (express or variant patterns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTopology {
    route_id: RouteId,
    stops: Vec<StopId>,
    circular: bool,
}

impl RouteTopology {
    pub fn new(route_id: impl Into<RouteId>, stops: Vec<StopId>, circular: bool) -> Result<Self> {
        let route_id = route_id.into();
        if stops.len() < 2 {
            return Err(TrackerError::Configuration(format!(
                "route {route_id} needs at least 2 stops, got {}",
                stops.len()
            )));
        }

        Ok(Self {
            route_id,
            stops,
            circular,
        })
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    pub fn stops(&self) -> &[StopId] {
        &self.stops
    }

    pub fn is_circular(&self) -> bool {
        self.circular
    }

    pub fn contains(&self, stop: &str) -> bool {
        self.stops.iter().any(|s| s.as_str() == stop)
    }

    /// Sequence positions at which `stop` occurs.
    pub fn positions<'a>(&'a self, stop: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.stops
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.as_str() == stop)
            .map(|(i, _)| i)
    }

    pub fn successor_at(&self, index: usize) -> Option<&StopId> {
        if index + 1 < self.stops.len() {
            self.stops.get(index + 1)
        } else if self.circular && index < self.stops.len() {
            self.stops.first()
        } else {
            None
        }
    }

    pub fn predecessor_at(&self, index: usize) -> Option<&StopId> {
        if index > 0 {
            self.stops.get(index - 1)
        } else if self.circular {
            self.stops.last()
        } else {
            None
        }
    }

    /// Successor of the first occurrence of `stop`.
    ///
    /// `Ok(None)` is the end of a non-circular route.
    pub fn next_stop(&self, stop: &str) -> Result<Option<&StopId>> {
        let index = self.first_position(stop)?;
        Ok(self.successor_at(index))
    }

    /// Predecessor of the first occurrence of `stop`.
    pub fn previous_stop(&self, stop: &str) -> Result<Option<&StopId>> {
        let index = self.first_position(stop)?;
        Ok(self.predecessor_at(index))
    }

    /// Every `(from, to)` pair of adjacent stops, including the wraparound pair
    /// on circular routes, in sequence order.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (&StopId, &StopId)> + '_ {
        (0..self.stops.len()).filter_map(move |i| {
            self.successor_at(i).map(|next| (&self.stops[i], next))
        })
    }

    /// Whether the route can carry a passenger from `from` to `to`.
    ///
    /// On circular routes any two member stops are connected. On one-way routes
    /// some occurrence of `from` must come before some occurrence of `to`.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        let Some(first_from) = self.positions(from).next() else {
            return false;
        };
        let Some(last_to) = self.positions(to).last() else {
            return false;
        };

        self.circular || first_from <= last_to
    }

    fn first_position(&self, stop: &str) -> Result<usize> {
        self.positions(stop)
            .next()
            .ok_or_else(|| TrackerError::StopNotFound {
                route: self.route_id.clone(),
                stop: StopId::new(stop),
            })
    }
}
