use thiserror::Error;

/// Failures of the collector transport. Never surfaced to `report_*` callers;
/// the provider logs them and moves on.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector returned status {0}")]
    Status(u16),

    #[error("Failed to decode collector response: {0}")]
    Decode(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry provider must be created inside a tokio runtime")]
    NoRuntime,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
