//! Route model: stops, pings, visit events and the graph built from them.

pub mod edge;
pub mod events;
pub mod graph;
mod ids;
pub mod node;
pub mod path;
pub mod ping;
pub mod topology;

pub use edge::{EtaSample, MatchedPair, RouteEdge, pair_events};
pub use events::{EventCursor, EventKind, EventQueue, VisitEvent};
pub use graph::{BuildReport, BuildStatus, PopulateOptions, PopulateReport, RouteGraph};
pub use ids::{RouteId, StopId};
pub use node::{ClassifyReport, DwellSample, NeighborLink, StopNode};
pub use path::{PathEta, PathResolver};
pub use ping::{Ping, RawPing};
pub use topology::RouteTopology;
