//! Collector transport seam.
//!
//! The provider only speaks to the collector through [`TelemetryTransport`].
//! Retry policy and timeouts belong to the implementation, not to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::telemetry::buffer::FlushBatch;
use crate::telemetry::config::TelemetryContext;
use crate::telemetry::event::{ErrorEvent, InfoEvent, LogEvent};
use crate::telemetry::flavor::{AdditionalFields, TelemetryFlavor};

pub mod http;
pub mod mock;

pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub flavor: TelemetryFlavor,
    #[serde(default)]
    pub additional_fields: AdditionalFields,
    pub context: TelemetryContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(rename = "checkoutAttemptId")]
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushRequest {
    /// Carried in the request path, not the body.
    #[serde(skip)]
    pub attempt_id: String,
    pub channel: String,
    pub platform: String,
    pub version: String,
    pub info: Vec<InfoEvent>,
    pub logs: Vec<LogEvent>,
    pub errors: Vec<ErrorEvent>,
}

impl FlushRequest {
    pub fn from_batch(batch: FlushBatch, context: &TelemetryContext) -> Self {
        let (attempt_id, events) = batch.into_parts();
        Self {
            attempt_id,
            channel: "sdk".to_string(),
            platform: context.platform.clone(),
            version: context.version.clone(),
            info: events.infos,
            logs: events.logs,
            errors: events.errors,
        }
    }

    pub fn event_count(&self) -> usize {
        self.info.len() + self.logs.len() + self.errors.len()
    }
}

#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    /// Asks the collector for a new attempt identifier.
    async fn open_attempt(&self, request: HandshakeRequest) -> Result<HandshakeResponse, TransportError>;

    /// Delivers one batch. The acknowledgement body is not inspected.
    async fn send_batch(&self, request: FlushRequest) -> Result<(), TransportError>;
}
