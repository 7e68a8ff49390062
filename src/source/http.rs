use super::EntrySource;
use crate::fetch::{HttpClient, fetch_json};
use crate::model::{RawPing, RouteId, StopId};
use anyhow::{Result, anyhow};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

/// Entry store reached over HTTP.
///
/// Pings for a stop are read from
/// `{base_url}/routes/{route}/stops/{stop}/entries`, which must return a JSON
/// array of [`RawPing`] objects, oldest first. Elements that are not ping objects
/// are skipped; fields that fail to parse load as missing.
pub struct HttpSource {
    base_url: Url,
    client: Box<dyn HttpClient>,
}

impl HttpSource {
    pub fn new(base_url: &str, client: impl HttpClient + 'static) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Entry store URL '{base_url}' cannot be used as a base"));
        }
        Ok(Self {
            base_url,
            client: Box::new(client),
        })
    }

    pub fn entries_url(&self, route: &RouteId, stop: &StopId) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Entry store URL cannot be used as a base"))?
            .pop_if_empty()
            .extend(["routes", route.as_str(), "stops", stop.as_str(), "entries"]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl EntrySource for HttpSource {
    async fn fetch_entries(&self, route: &RouteId, stop: &StopId) -> Result<Vec<RawPing>> {
        let url = self.entries_url(route, stop)?;
        debug!(%url, "Fetching entries");
        let values: Vec<Value> = fetch_json(self.client.as_ref(), url.as_str()).await?;
        Ok(decode_entries(stop, values))
    }
}

fn decode_entries(stop: &StopId, values: Vec<Value>) -> Vec<RawPing> {
    let total = values.len();
    let pings: Vec<RawPing> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(ping) => Some(ping),
            Err(e) => {
                debug!(stop_id = %stop, error = %e, "Skipping undecodable entry");
                None
            }
        })
        .collect();

    let skipped = total - pings.len();
    if skipped > 0 {
        warn!(stop_id = %stop, skipped, "Skipped undecodable entries");
    }
    pings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    #[test]
    fn test_entries_url_escapes_ids() {
        let source = HttpSource::new("http://store.local/api/", BasicClient::new()).unwrap();
        let url = source
            .entries_url(&RouteId::new("3"), &StopId::new("Market Place"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://store.local/api/routes/3/stops/Market%20Place/entries"
        );
    }

    #[test]
    fn test_bad_entries_do_not_drop_the_stop() {
        let values: Vec<Value> = serde_json::from_str(
            r#"[
                {"route_id": "3", "stop_id": "S1", "observed_at": "2024-01-01T10:00:00Z", "at_stop": true},
                {"route_id": "3", "stop_id": "S1", "observed_at": "not-a-time", "at_stop": true},
                {"route_id": "3", "stop_id": "S1", "observed_at": 1700000000, "at_stop": [false]},
                "garbage",
                {"stop_id": "S1"},
                {"route_id": "3", "stop_id": "S1", "observed_at": "2024-01-01T10:01:00Z", "at_stop": false}
            ]"#,
        )
        .unwrap();

        let pings = decode_entries(&StopId::new("S1"), values);
        assert_eq!(pings.len(), 4);
        assert_eq!(pings[1].observed_at, None);
        assert_eq!(pings[2].observed_at, None);
        assert_eq!(pings[2].at_stop, None);
        assert!(pings[0].validate().is_ok());
        assert!(pings[3].validate().is_ok());
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(HttpSource::new("mailto:someone@example.com", BasicClient::new()).is_err());
        assert!(HttpSource::new("not a url", BasicClient::new()).is_err());
    }
}
