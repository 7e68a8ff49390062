//! Error taxonomy for route graph construction and queries.

use crate::model::{RouteId, StopId};

/// Failures raised by the route model.
///
/// Query-time "no data yet" conditions are not errors; see
/// [`PathEta::Incomplete`](crate::model::path::PathEta::Incomplete).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Unknown route: {0}")]
    RouteNotFound(RouteId),
    #[error("Stop {stop} is not part of route {route}")]
    StopNotFound { route: RouteId, stop: StopId },
    #[error("No path from {from} to {to} on route {route}")]
    NoPath {
        route: RouteId,
        from: StopId,
        to: StopId,
    },
    #[error("Malformed entry for stop {stop}: {reason}")]
    MalformedEntry { stop: StopId, reason: String },
    #[error("Traversal limit exceeded after visiting {} stops", partial.len())]
    TraversalLimitExceeded { partial: Vec<StopId> },
}

impl TrackerError {
    /// `true` for the unknown route / unknown stop cases.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TrackerError::RouteNotFound(_) | TrackerError::StopNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
