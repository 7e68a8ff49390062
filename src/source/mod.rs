//! Suppliers of raw stop pings.
//!
//! [`EntrySource`] is the async trait a route graph pulls its history through.
//! [`MemorySource`] keeps pings in process, [`CsvSource`] reads an append-only
//! CSV log, and [`HttpSource`] queries a remote entry store.

mod csv_log;
mod http;
mod memory;

pub use csv_log::{CsvSource, append_pings};
pub use http::HttpSource;
pub use memory::MemorySource;

use crate::model::{RawPing, RouteId, StopId};
use anyhow::Result;

/// Returns the pings recorded for one stop of one route, oldest first.
#[async_trait::async_trait]
pub trait EntrySource: Send + Sync {
    async fn fetch_entries(&self, route: &RouteId, stop: &StopId) -> Result<Vec<RawPing>>;
}
