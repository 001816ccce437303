use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};

pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_FLUSH_TOLERANCE_MS: u64 = 1_000;

const ENV_ENABLED: &str = "CHECKOUT_TELEMETRY_ENABLED";
const ENV_TELEMETRY_ENABLED: &str = "CHECKOUT_TELEMETRY_TELEMETRY_ENABLED";
const ENV_FLUSH_INTERVAL_MS: &str = "CHECKOUT_TELEMETRY_FLUSH_INTERVAL_MS";
const ENV_FLUSH_TOLERANCE_MS: &str = "CHECKOUT_TELEMETRY_FLUSH_TOLERANCE_MS";

/// Session blob forwarded with the handshake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryContext {
    pub version: String,
    pub platform: String,
}

impl Default for TelemetryContext {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: "rust".to_string(),
        }
    }
}

/// Timing of the periodic flush trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushSchedule {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Accepted lateness of a tick before it is reported as late.
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: u64,
}

impl FlushSchedule {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_millis(self.tolerance_ms)
    }
}

impl Default for FlushSchedule {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            tolerance_ms: DEFAULT_FLUSH_TOLERANCE_MS,
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_tolerance_ms() -> u64 {
    DEFAULT_FLUSH_TOLERANCE_MS
}

fn default_true() -> bool {
    true
}

/// Enablement flags and session context. Immutable once handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfiguration {
    /// Master switch. When false nothing is ever sent.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub telemetry_enabled: bool,
    #[serde(default)]
    pub context: TelemetryContext,
    #[serde(default)]
    pub flush: FlushSchedule,
}

impl Default for TelemetryConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            telemetry_enabled: true,
            context: TelemetryContext::default(),
            flush: FlushSchedule::default(),
        }
    }
}

impl TelemetryConfiguration {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Both flags must be on for a handshake to be attempted.
    pub fn tracking_allowed(&self) -> bool {
        self.enabled && self.telemetry_enabled
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Defaults overridden by `CHECKOUT_TELEMETRY_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_ENABLED) {
            config.enabled = parse_flag(ENV_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TELEMETRY_ENABLED) {
            config.telemetry_enabled = parse_flag(ENV_TELEMETRY_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FLUSH_INTERVAL_MS) {
            config.flush.interval_ms = parse_millis(ENV_FLUSH_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FLUSH_TOLERANCE_MS) {
            config.flush.tolerance_ms = parse_millis(ENV_FLUSH_TOLERANCE_MS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects schedules the timer cannot run. Providers call this on
    /// construction, so hand-built configurations are checked too.
    pub fn validate(&self) -> Result<()> {
        if self.flush.interval_ms == 0 {
            return Err(TelemetryError::Config(
                "flush interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(TelemetryError::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| TelemetryError::Config(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_enable_tracking() {
        let config = TelemetryConfiguration::default();
        assert!(config.tracking_allowed());
        assert_eq!(config.flush.interval(), Duration::from_secs(10));
        assert_eq!(config.flush.tolerance(), Duration::from_secs(1));
    }

    #[test]
    fn either_flag_disables_tracking() {
        let mut config = TelemetryConfiguration::default();
        config.telemetry_enabled = false;
        assert!(!config.tracking_allowed());
        assert!(!TelemetryConfiguration::disabled().tracking_allowed());
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = TelemetryConfiguration::from_json_str(r#"{"telemetryEnabled": false}"#).unwrap();
        assert!(config.enabled);
        assert!(!config.telemetry_enabled);
        assert_eq!(config.flush, FlushSchedule::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = TelemetryConfiguration::from_json_str(r#"{"flush": {"intervalMs": 0}}"#);
        assert!(matches!(err, Err(TelemetryError::Config(_))));
    }

    #[test]
    fn env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            (ENV_ENABLED, "false"),
            (ENV_FLUSH_INTERVAL_MS, "2500"),
        ]
        .into_iter()
        .collect();

        let config = TelemetryConfiguration::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert!(!config.enabled);
        assert!(config.telemetry_enabled);
        assert_eq!(config.flush.interval_ms, 2500);
    }

    #[test]
    fn env_rejects_garbage_flag() {
        let result = TelemetryConfiguration::from_lookup(|k| {
            (k == ENV_TELEMETRY_ENABLED).then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(TelemetryError::Config(_))));
    }
}
