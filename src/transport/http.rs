use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FlushRequest, HandshakeRequest, HandshakeResponse, TelemetryTransport};
use crate::error::TransportError;

const ANALYTICS_PATH: &str = "checkoutanalytics/v3/analytics";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub client_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_key: client_key.into(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// `reqwest` backed collector client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    client_key: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_key: config.client_key,
        })
    }

    fn handshake_url(&self) -> String {
        format!("{}/{}", self.base_url, ANALYTICS_PATH)
    }

    fn batch_url(&self, attempt_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, ANALYTICS_PATH, attempt_id)
    }
}

#[async_trait]
impl TelemetryTransport for HttpTransport {
    async fn open_attempt(&self, request: HandshakeRequest) -> Result<HandshakeResponse, TransportError> {
        let response = self
            .client
            .post(self.handshake_url())
            .query(&[("clientKey", self.client_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn send_batch(&self, request: FlushRequest) -> Result<(), TransportError> {
        debug!(attempt_id = %request.attempt_id, events = request.event_count(), "posting telemetry batch");

        let response = self
            .client
            .post(self.batch_url(&request.attempt_id))
            .query(&[("clientKey", self.client_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_strip_trailing_slash() {
        let transport = HttpTransport::new(HttpTransportConfig::new("https://collector.test/", "test_key")).unwrap();
        assert_eq!(transport.handshake_url(), "https://collector.test/checkoutanalytics/v3/analytics");
        assert_eq!(
            transport.batch_url("abc123"),
            "https://collector.test/checkoutanalytics/v3/analytics/abc123"
        );
    }

    #[test]
    fn handshake_response_reads_attempt_id_field() {
        let parsed: HandshakeResponse = serde_json::from_str(r#"{"checkoutAttemptId":"abc123"}"#).unwrap();
        assert_eq!(parsed.identifier, "abc123");
    }
}
