use super::EntrySource;
use crate::model::{RawPing, RouteId, StopId};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process ping store keyed by `(route, stop)`.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<HashMap<(RouteId, StopId), Vec<RawPing>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups pings by route and stop, keeping their relative order.
    pub fn from_pings(pings: impl IntoIterator<Item = RawPing>) -> Self {
        let source = Self::new();
        source.append(pings);
        source
    }

    pub fn append(&self, pings: impl IntoIterator<Item = RawPing>) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for ping in pings {
            entries
                .entry((ping.route_id.clone(), ping.stop_id.clone()))
                .or_default()
                .push(ping);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl EntrySource for MemorySource {
    async fn fetch_entries(&self, route: &RouteId, stop: &StopId) -> Result<Vec<RawPing>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("Entry store lock poisoned"))?;
        Ok(entries
            .get(&(route.clone(), stop.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_groups_by_route_and_stop() {
        let now = Utc::now();
        let source = MemorySource::from_pings(vec![
            RawPing::new("3", "A", now, true),
            RawPing::new("3", "B", now, true),
            RawPing::new("4", "A", now, false),
            RawPing::new("3", "A", now, false),
        ]);

        assert_eq!(source.len(), 4);
        let a = source
            .fetch_entries(&RouteId::new("3"), &StopId::new("A"))
            .await
            .unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].at_stop, Some(false));

        let none = source
            .fetch_entries(&RouteId::new("9"), &StopId::new("A"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
