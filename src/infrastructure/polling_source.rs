// HTTP polling transport - one independent fetch per tick
use crate::application::telemetry_source::{SourceEvent, TelemetryFeed, TelemetrySource};
use crate::domain::collar::RawCollarStatus;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Fixed poll cadence. A slow fetch never delays the next tick.
const POLL_INTERVAL: Duration = Duration::from_millis(2000);

pub struct PollingSource {
    client: reqwest::Client,
    base_url: String,
}

impl PollingSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn status_url(&self, collar_id: &str) -> String {
        format!(
            "{}/collars/{}/status",
            self.base_url,
            urlencoding::encode(collar_id)
        )
    }
}

#[async_trait]
impl TelemetrySource for PollingSource {
    async fn subscribe(&self, collar_id: &str) -> TelemetryFeed {
        let (tx, rx) = mpsc::channel(32);
        let client = self.client.clone();
        let url = self.status_url(collar_id);

        // One driver task; each fetch runs in a JoinSet so aborting the
        // driver also aborts anything in flight.
        let task = tokio::spawn(async move {
            let mut fetches = JoinSet::new();
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        fetches.spawn(fetch_once(client.clone(), url.clone(), tx.clone()));
                    }
                    Some(_) = fetches.join_next() => {}
                }
            }
        });

        TelemetryFeed::new(rx, vec![task])
    }
}

/// A failed fetch degrades to an `Unreachable` event; polling continues
/// on the next tick regardless.
async fn fetch_once(client: reqwest::Client, url: String, tx: mpsc::Sender<SourceEvent>) {
    let event = match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => match response.json::<RawCollarStatus>().await {
            Ok(raw) => SourceEvent::Status(raw),
            Err(err) => {
                tracing::warn!(error = %err, %url, "failed to parse collar status body");
                SourceEvent::ParseError(err.to_string())
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, %url, "collar status fetch failed");
            SourceEvent::Unreachable
        }
    };

    let _ = tx.send(event).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url_encodes_collar_id() {
        let source = PollingSource::new("http://localhost:8080/api/v1/".to_string());
        assert_eq!(
            source.status_url("dog-001"),
            "http://localhost:8080/api/v1/collars/dog-001/status"
        );
        assert_eq!(
            source.status_url("dog 1/b"),
            "http://localhost:8080/api/v1/collars/dog%201%2Fb/status"
        );
    }
}
