use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use checkout_telemetry::telemetry::{
    AdditionalFields, Amount, ErrorEvent, ErrorKind, InfoEvent, InfoKind, LogEvent, LogKind,
    TelemetryConfiguration, TelemetryFlavor, TelemetryProvider,
};
use checkout_telemetry::transport::{HttpTransport, HttpTransportConfig, MockTransport, TelemetryTransport};

const ENV_BASE_URL: &str = "CHECKOUT_TELEMETRY_BASE_URL";
const ENV_CLIENT_KEY: &str = "CHECKOUT_TELEMETRY_CLIENT_KEY";

// Drives one card component session against the collector, or against the
// in-process mock when no collector is configured.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = TelemetryConfiguration::from_env().context("loading telemetry configuration")?;

    let transport: Arc<dyn TelemetryTransport> = match (std::env::var(ENV_BASE_URL), std::env::var(ENV_CLIENT_KEY)) {
        (Ok(base_url), Ok(client_key)) => {
            tracing::info!(%base_url, "using HTTP collector");
            Arc::new(HttpTransport::new(HttpTransportConfig::new(base_url, client_key))?)
        }
        _ => {
            tracing::info!("no collector configured; using offline mock");
            Arc::new(MockTransport::resolving("offline-attempt"))
        }
    };

    let provider = TelemetryProvider::new(config, transport)?;

    provider.begin_session(
        TelemetryFlavor::components("scheme"),
        Some(AdditionalFields {
            amount: Some(Amount::new(1_000, "EUR")),
            session_id: None,
        }),
    );

    let attempt = provider.wait_for_attempt().await;
    tracing::info!(?attempt, "session correlated");

    provider.report_info(InfoEvent::new("scheme", InfoKind::Rendered));
    provider.report_info(InfoEvent::new("scheme", InfoKind::Focus).with_target("card_number"));
    provider.report_log(LogEvent::new("scheme", LogKind::Submit));

    let mut cadence = tokio::time::interval(Duration::from_millis(500));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    for _ in 0..4 {
        cadence.tick().await;
        provider.report_info(InfoEvent::new("scheme", InfoKind::Input).with_target("expiry_date"));
    }

    provider.report_error(
        ErrorEvent::new("scheme", ErrorKind::Network)
            .with_code("600")
            .with_message("payments call timed out"),
    );

    let outcome = provider.flush().await;
    tracing::info!(?outcome, "final flush");

    provider.end_session();
    Ok(())
}
