use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Payloads describe component behaviour only.
// Shopper input (card numbers, names, addresses) must never be placed in a payload.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Log,
    Error,
}

/// One diagnostic event. Closed set of three severities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "severity", rename_all = "lowercase")]
pub enum TelemetryEvent {
    Info(InfoEvent),
    Log(LogEvent),
    Error(ErrorEvent),
}

impl TelemetryEvent {
    pub fn severity(&self) -> Severity {
        match self {
            TelemetryEvent::Info(_) => Severity::Info,
            TelemetryEvent::Log(_) => Severity::Log,
            TelemetryEvent::Error(_) => Severity::Error,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            TelemetryEvent::Info(e) => e.id,
            TelemetryEvent::Log(e) => e.id,
            TelemetryEvent::Error(e) => e.id,
        }
    }
}

impl From<InfoEvent> for TelemetryEvent {
    fn from(event: InfoEvent) -> Self {
        TelemetryEvent::Info(event)
    }
}

impl From<LogEvent> for TelemetryEvent {
    fn from(event: LogEvent) -> Self {
        TelemetryEvent::Log(event)
    }
}

impl From<ErrorEvent> for TelemetryEvent {
    fn from(event: ErrorEvent) -> Self {
        TelemetryEvent::Error(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InfoKind {
    Rendered,
    Focus,
    Unfocus,
    ValidationError,
    Selected,
    Input,
    Displayed,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogKind {
    Action,
    Submit,
    ThreeDS2,
    Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Network,
    Implementation,
    Internal,
    Api,
    Sdk,
    ThirdParty,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoEvent {
    pub id: Uuid,
    pub timestamp: u64,
    pub component: String,
    #[serde(rename = "type")]
    pub kind: InfoKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error_code: Option<String>,
}

impl InfoEvent {
    pub fn new(component: impl Into<String>, kind: InfoKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_millis(),
            component: component.into(),
            kind,
            target: None,
            validation_error_code: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_validation_error(mut self, code: impl Into<String>) -> Self {
        self.validation_error_code = Some(code.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub id: Uuid,
    pub timestamp: u64,
    pub component: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LogEvent {
    pub fn new(component: impl Into<String>, kind: LogKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_millis(),
            component: component.into(),
            kind,
            subtype: None,
            message: None,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub id: Uuid,
    pub timestamp: u64,
    pub component: String,
    #[serde(rename = "errorType")]
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorEvent {
    pub fn new(component: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_millis(),
            component: component.into(),
            kind,
            code: None,
            message: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
