use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::attempt::{AttemptIdentifier, SessionState};
use super::buffer::{EventBuffer, EventSnapshot, FlushBatch};
use super::config::TelemetryConfiguration;
use super::event::{ErrorEvent, InfoEvent, LogEvent, TelemetryEvent};
use super::flavor::{AdditionalFields, TelemetryFlavor};
use super::handshake::{CorrelationHandshake, HandshakeStart};
use super::scheduler::FlushScheduler;
use crate::error::{Result, TelemetryError};
use crate::transport::{FlushRequest, TelemetryTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Periodic,
    Error,
    Manual,
    /// Follow-up for triggers that arrived while a send was in flight.
    Coalesced,
}

impl FlushTrigger {
    fn label(self) -> &'static str {
        match self {
            FlushTrigger::Periodic => "periodic",
            FlushTrigger::Error => "error",
            FlushTrigger::Manual => "manual",
            FlushTrigger::Coalesced => "coalesced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Master enable flag is off.
    Disabled,
    SessionEnded,
    /// Attempt id unresolved or suppressed.
    NoAttemptIdentifier,
    /// Another flush is sending; this trigger was folded into a follow-up.
    InFlight,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Skipped(SkipReason),
    Sent { attempt_id: String, events: usize },
    /// The batch is gone either way: drained events are not re-buffered.
    Failed { attempt_id: String, events: usize, error: String },
}

/// Clears the in-flight flag when the send finishes or the flush is abandoned.
struct InFlightPermit(Arc<AtomicBool>);

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct PreparedFlush {
    batch: FlushBatch,
    trigger: FlushTrigger,
    permit: InFlightPermit,
}

/// Entry point for UI components. Cheap to clone; clones share one session.
///
/// `report_*` never fails and never waits on the network. Events are held
/// until a flush finds a resolved attempt id, then drained in one batch.
///
/// A flush drains the buffer *before* the send completes. A failed send
/// therefore loses that batch; delivery is at most once.
#[derive(Clone)]
pub struct TelemetryProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    config: Arc<TelemetryConfiguration>,
    transport: Arc<dyn TelemetryTransport>,
    buffer: EventBuffer,
    handshake: Arc<CorrelationHandshake>,
    scheduler: FlushScheduler,
    flush_in_flight: Arc<AtomicBool>,
    rerun_requested: AtomicBool,
    session: CancellationToken,
    runtime: Handle,
}

impl TelemetryProvider {
    /// Must be called from within a tokio runtime.
    pub fn new(config: TelemetryConfiguration, transport: Arc<dyn TelemetryTransport>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| TelemetryError::NoRuntime)?;
        Self::with_runtime(config, transport, runtime)
    }

    pub fn with_runtime(
        config: TelemetryConfiguration,
        transport: Arc<dyn TelemetryTransport>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let session = CancellationToken::new();

        let handshake = Arc::new(CorrelationHandshake::new(
            config.clone(),
            transport.clone(),
            runtime.clone(),
        ));
        let scheduler = FlushScheduler::new(config.flush, runtime.clone(), session.child_token());

        Ok(Self {
            inner: Arc::new(ProviderInner {
                config,
                transport,
                buffer: EventBuffer::new(),
                handshake,
                scheduler,
                flush_in_flight: Arc::new(AtomicBool::new(false)),
                rerun_requested: AtomicBool::new(false),
                session,
                runtime,
            }),
        })
    }

    pub fn report_info(&self, event: InfoEvent) {
        self.inner.record(event.into());
    }

    pub fn report_log(&self, event: LogEvent) {
        self.inner.record(event.into());
    }

    /// Errors skip the timer and attempt a flush right away.
    pub fn report_error(&self, event: ErrorEvent) {
        self.inner.record(event.into());
        self.inner.trigger(FlushTrigger::Error);
    }

    /// Routes any event by its severity.
    pub fn report(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::Info(e) => self.report_info(e),
            TelemetryEvent::Log(e) => self.report_log(e),
            TelemetryEvent::Error(e) => self.report_error(e),
        }
    }

    /// Starts the attempt-id handshake, or sets the suppressed sentinel when
    /// tracking is off. The network request runs in the background.
    pub fn begin_session(
        &self,
        flavor: TelemetryFlavor,
        additional_fields: Option<AdditionalFields>,
    ) -> HandshakeStart {
        if self.inner.session.is_cancelled() {
            debug!("session ended; begin_session ignored");
            return HandshakeStart::SessionEnded;
        }
        let started = self.inner.handshake.begin(flavor, additional_fields);
        trace!(?started, "begin_session");
        started
    }

    /// `None` until a handshake resolves or tracking is suppressed.
    pub fn current_attempt_identifier(&self) -> Option<AttemptIdentifier> {
        self.inner.handshake.attempt_identifier()
    }

    /// Waits out a pending handshake, then returns the identifier.
    pub async fn wait_for_attempt(&self) -> Option<AttemptIdentifier> {
        self.inner.handshake.wait_for_attempt().await
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.handshake.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.handshake.subscribe()
    }

    /// Runs the flush routine now and waits for the send to finish.
    pub async fn flush(&self) -> FlushOutcome {
        match self.inner.prepare(FlushTrigger::Manual) {
            Ok(prepared) => self.inner.deliver(prepared).await,
            Err(reason) => FlushOutcome::Skipped(reason),
        }
    }

    /// Stops the timer and refuses later flushes. A send already in flight is
    /// left to finish; its result is ignored.
    pub fn end_session(&self) {
        if self.inner.session.is_cancelled() {
            return;
        }
        self.inner.session.cancel();
        self.inner.scheduler.stop();
        info!(
            buffered = self.inner.buffer.len(),
            "telemetry session ended"
        );
    }

    pub fn is_session_ended(&self) -> bool {
        self.inner.session.is_cancelled()
    }

    pub fn buffered_events(&self) -> EventSnapshot {
        self.inner.buffer.peek()
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.buffer.len()
    }

    pub fn is_timer_running(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    pub fn configuration(&self) -> &TelemetryConfiguration {
        &self.inner.config
    }
}

impl ProviderInner {
    fn record(self: &Arc<Self>, event: TelemetryEvent) {
        trace!(severity = ?event.severity(), id = %event.id(), "event buffered");
        self.buffer.append(event);
        self.start_timer();
    }

    fn start_timer(self: &Arc<Self>) {
        let weak: Weak<ProviderInner> = Arc::downgrade(self);
        self.scheduler.ensure_started(move || match weak.upgrade() {
            Some(inner) => {
                inner.trigger(FlushTrigger::Periodic);
                true
            }
            None => false,
        });
    }

    /// Synchronous part of a flush; the send runs on the runtime.
    fn trigger(self: &Arc<Self>, trigger: FlushTrigger) {
        match self.prepare(trigger) {
            Ok(prepared) => {
                let this = Arc::clone(self);
                self.runtime.spawn(async move {
                    this.deliver(prepared).await;
                });
            }
            Err(reason) => trace!(trigger = trigger.label(), ?reason, "flush skipped"),
        }
    }

    /// Gate check, reentrancy guard and drain. The buffer is untouched unless
    /// a batch is returned.
    fn prepare(&self, trigger: FlushTrigger) -> std::result::Result<PreparedFlush, SkipReason> {
        if self.session.is_cancelled() {
            return Err(SkipReason::SessionEnded);
        }
        if !self.config.enabled {
            return Err(SkipReason::Disabled);
        }
        let attempt_id = self.handshake.flush_target().ok_or(SkipReason::NoAttemptIdentifier)?;

        if self.buffer.is_empty() {
            return Err(SkipReason::Empty);
        }

        loop {
            let permit = self.acquire_permit(trigger)?;

            let events = self.buffer.drain_all();
            if !events.is_empty() {
                return Ok(PreparedFlush {
                    batch: FlushBatch::new(attempt_id, events),
                    trigger,
                    permit,
                });
            }

            // Lost a race with another drain between the check and the permit.
            // A trigger coalesced while we held the permit is owed a retry.
            drop(permit);
            if !self.rerun_requested.swap(false, Ordering::SeqCst) {
                return Err(SkipReason::Empty);
            }
        }
    }

    /// Takes the in-flight permit, or records that a follow-up is owed.
    ///
    /// The rerun flag is set before the permit is re-read, and `deliver`
    /// releases the permit before it reads the flag. One side always sees the
    /// other, so a request is never left behind by a send that just finished.
    fn acquire_permit(&self, trigger: FlushTrigger) -> std::result::Result<InFlightPermit, SkipReason> {
        loop {
            if self
                .flush_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(InFlightPermit(self.flush_in_flight.clone()));
            }
            self.rerun_requested.store(true, Ordering::SeqCst);
            if self.flush_in_flight.load(Ordering::SeqCst) {
                debug!(trigger = trigger.label(), "flush in flight; trigger coalesced");
                return Err(SkipReason::InFlight);
            }
        }
    }

    async fn deliver(self: &Arc<Self>, prepared: PreparedFlush) -> FlushOutcome {
        let PreparedFlush { batch, trigger, permit } = prepared;
        let request = FlushRequest::from_batch(batch, &self.config.context);
        let attempt_id = request.attempt_id.clone();
        let counts = (request.info.len(), request.logs.len(), request.errors.len());
        let events = request.event_count();

        debug!(
            trigger = trigger.label(),
            attempt_id = %attempt_id,
            infos = counts.0,
            logs = counts.1,
            errors = counts.2,
            "flushing telemetry batch"
        );

        let result = self.transport.send_batch(request).await;
        drop(permit);

        let ended = self.session.is_cancelled();
        if ended {
            debug!(attempt_id = %attempt_id, "session ended during send; result ignored");
        }

        let outcome = match result {
            Ok(()) => {
                if !ended {
                    debug!(attempt_id = %attempt_id, events, "telemetry batch sent");
                }
                FlushOutcome::Sent { attempt_id, events }
            }
            Err(e) => {
                if !ended {
                    warn!(attempt_id = %attempt_id, events, error = %e, "telemetry batch dropped");
                }
                FlushOutcome::Failed {
                    attempt_id,
                    events,
                    error: e.to_string(),
                }
            }
        };

        if self.rerun_requested.swap(false, Ordering::SeqCst) && !ended {
            self.trigger(FlushTrigger::Coalesced);
        }

        outcome
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        self.session.cancel();
    }
}
