pub mod analyzers;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod output;
pub mod parser;
pub mod source;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::TrackerError;
pub use model::{PathEta, PathResolver, RouteGraph, RouteId, RouteTopology, StopId};
pub use tracker::RouteTracker;
