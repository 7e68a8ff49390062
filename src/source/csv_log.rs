use super::EntrySource;
use crate::model::{RawPing, RouteId, StopId};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info, warn};

/// Ping log read from a CSV file with the columns of [`RawPing`]:
/// `route_id,stop_id,observed_at,at_stop,scraped_at,raw_text`.
///
/// Empty or unparseable cells load as missing values, so unreadable scrapes
/// survive the round trip and are rejected later by the classifier. Rows that
/// cannot be read at all (no route or stop, wrong column count) are skipped.
#[derive(Debug, Default)]
pub struct CsvSource {
    entries: HashMap<(RouteId, StopId), Vec<RawPing>>,
    skipped: usize,
}

impl CsvSource {
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open ping log '{path}'"))?;
        let mut rdr = csv::Reader::from_reader(file);
        let mut entries: HashMap<(RouteId, StopId), Vec<RawPing>> = HashMap::new();
        let mut rows = 0;
        let mut skipped = 0;

        for result in rdr.deserialize() {
            let record: RawPing = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => {
                    return Err(e).with_context(|| format!("Failed to read ping log '{path}'"));
                }
                Err(e) => {
                    warn!(path, error = %e, "Skipping unreadable ping log row");
                    skipped += 1;
                    continue;
                }
            };
            rows += 1;
            entries
                .entry((record.route_id.clone(), record.stop_id.clone()))
                .or_default()
                .push(record);
        }

        info!(path, rows, skipped, series = entries.len(), "Loaded ping log");
        Ok(Self { entries, skipped })
    }

    /// Rows dropped at load time because they could not be read.
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteId> {
        let mut routes: Vec<&RouteId> = self.entries.keys().map(|(r, _)| r).collect();
        routes.sort();
        routes.dedup();
        routes.into_iter()
    }
}

/// Appends pings to a CSV log, writing the header only when the file is new.
pub fn append_pings(path: &str, pings: &[RawPing]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, count = pings.len(), "Appending pings");

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for ping in pings {
        writer.serialize(ping)?;
    }
    writer.flush()?;

    Ok(())
}

#[async_trait::async_trait]
impl EntrySource for CsvSource {
    async fn fetch_entries(&self, route: &RouteId, stop: &StopId) -> Result<Vec<RawPing>> {
        Ok(self
            .entries
            .get(&(route.clone(), stop.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
