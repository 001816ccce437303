use std::sync::Arc;
use std::time::Duration;

use checkout_telemetry::telemetry::{
    AttemptIdentifier, ErrorEvent, ErrorKind, FlushOutcome, InfoEvent, InfoKind, LogEvent, LogKind,
    SessionState, SkipReason, TelemetryConfiguration, TelemetryFlavor, TelemetryProvider,
};
use checkout_telemetry::transport::MockTransport;

#[tokio::test]
async fn test_disabled_config_yields_sentinel_without_pending_work() {
    let transport = Arc::new(MockTransport::resolving("abc123"));
    let telemetry = TelemetryProvider::new(TelemetryConfiguration::disabled(), transport.clone()).unwrap();

    telemetry.begin_session(TelemetryFlavor::components("scheme"), None);

    assert_eq!(telemetry.current_attempt_identifier(), Some(AttemptIdentifier::Suppressed));
    assert!(!telemetry.session_state().is_pending(), "No async work may be left behind");
    tokio::task::yield_now().await;
    assert_eq!(transport.handshake_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tick_sends_one_batch_tagged_with_attempt_id() {
    let transport = Arc::new(MockTransport::resolving("abc123"));
    let telemetry = TelemetryProvider::new(TelemetryConfiguration::default(), transport.clone()).unwrap();

    telemetry.begin_session(TelemetryFlavor::components("scheme"), None);
    telemetry.wait_for_attempt().await;

    let e1 = InfoEvent::new("scheme", InfoKind::Rendered);
    let e2 = LogEvent::new("scheme", LogKind::Submit);
    telemetry.report_info(e1.clone());
    telemetry.report_log(e2.clone());

    tokio::time::sleep(Duration::from_secs(11)).await;
    transport.wait_for_batches(1).await;

    let batches = transport.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].attempt_id, "abc123");
    assert_eq!(batches[0].info, vec![e1]);
    assert_eq!(batches[0].logs, vec![e2]);
    assert!(batches[0].errors.is_empty());
    assert_eq!(telemetry.buffered_len(), 0);
}

#[tokio::test]
async fn test_error_while_handshake_pending_stays_buffered() {
    let transport = Arc::new(MockTransport::resolving("abc123"));
    transport.hold_handshakes();
    let telemetry = TelemetryProvider::new(TelemetryConfiguration::default(), transport.clone()).unwrap();

    telemetry.begin_session(TelemetryFlavor::components("scheme"), None);
    transport.wait_for_handshakes(1).await;
    assert_eq!(telemetry.session_state(), SessionState::HandshakePending);

    let e1 = ErrorEvent::new("scheme", ErrorKind::Network);
    telemetry.report_error(e1.clone());

    assert_eq!(telemetry.buffered_events().errors, vec![e1]);
    assert_eq!(telemetry.flush().await, FlushOutcome::Skipped(SkipReason::NoAttemptIdentifier));
    assert_eq!(transport.batch_count(), 0);
}

// Flags the optimistic drain: events drained for a failed send are gone.
#[tokio::test(start_paused = true)]
async fn test_failed_batch_leaves_buffer_empty_and_schedules_nothing() {
    let transport = Arc::new(MockTransport::resolving("abc123"));
    transport.set_fail_batches(true);
    let telemetry = TelemetryProvider::new(TelemetryConfiguration::default(), transport.clone()).unwrap();
    telemetry.begin_session(TelemetryFlavor::components("scheme"), None);
    telemetry.wait_for_attempt().await;

    telemetry.report_error(ErrorEvent::new("scheme", ErrorKind::Api));
    transport.wait_for_batches(1).await;
    assert_eq!(telemetry.buffered_len(), 0);

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(transport.batch_count(), 1, "The failed batch is never retried");
}
