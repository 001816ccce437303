use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::attempt::{AttemptIdentifier, SessionGraph, SessionRequest, SessionState};
use super::config::TelemetryConfiguration;
use super::flavor::{AdditionalFields, TelemetryFlavor};
use crate::transport::{HandshakeRequest, TelemetryTransport};

/// What a call to `begin_session` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStart {
    /// Configuration disables tracking; the sentinel was set synchronously.
    Suppressed,
    /// Composite flavor; nothing changed.
    SkippedComposite,
    /// Joined the request already in flight.
    AlreadyPending,
    /// State does not accept a new handshake (tracking or suppressed).
    Ignored,
    Started,
    /// The session was already ended.
    SessionEnded,
}

/// Obtains the attempt identifier. At most one request is in flight; its
/// result is published on a watch channel that flushes and collaborators read.
pub struct CorrelationHandshake {
    config: Arc<TelemetryConfiguration>,
    transport: Arc<dyn TelemetryTransport>,
    state: watch::Sender<SessionState>,
    runtime: Handle,
}

impl CorrelationHandshake {
    pub fn new(
        config: Arc<TelemetryConfiguration>,
        transport: Arc<dyn TelemetryTransport>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            transport,
            state: watch::channel(SessionState::Uninitialized).0,
            runtime,
        }
    }

    /// Fire-and-forget. Never blocks on the network.
    pub fn begin(self: &Arc<Self>, flavor: TelemetryFlavor, additional_fields: Option<AdditionalFields>) -> HandshakeStart {
        if !self.config.tracking_allowed() {
            self.apply(SessionRequest::Suppress);
            debug!(flavor = flavor.label(), "tracking disabled; attempt id suppressed");
            return HandshakeStart::Suppressed;
        }

        if flavor.is_composite() {
            debug!("composite flavor; handshake left to the container");
            return HandshakeStart::SkippedComposite;
        }

        if !self.apply(SessionRequest::BeginHandshake) {
            let current = self.state();
            if current.is_pending() {
                debug!("handshake already in flight; joining it");
                return HandshakeStart::AlreadyPending;
            }
            debug!(state = current.label(), "handshake not started");
            return HandshakeStart::Ignored;
        }

        let request = HandshakeRequest {
            flavor,
            additional_fields: additional_fields.unwrap_or_default(),
            context: self.config.context.clone(),
        };

        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let flavor = request.flavor.label();
            match this.transport.open_attempt(request).await {
                Ok(response) => {
                    info!(attempt_id = %response.identifier, flavor, "attempt id resolved");
                    this.apply(SessionRequest::HandshakeSucceeded(response.identifier));
                }
                Err(e) => {
                    warn!(flavor, error = %e, "attempt id request failed");
                    this.apply(SessionRequest::HandshakeFailed);
                }
            }
        });

        HandshakeStart::Started
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn attempt_identifier(&self) -> Option<AttemptIdentifier> {
        self.state.borrow().attempt_identifier()
    }

    /// Identifier to tag a batch with, when flushing is allowed.
    pub fn flush_target(&self) -> Option<String> {
        self.state.borrow().flush_target().map(str::to_string)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves once no handshake is pending.
    pub async fn wait_for_attempt(&self) -> Option<AttemptIdentifier> {
        let mut rx = self.state.subscribe();
        let attempt = match rx.wait_for(|s| !s.is_pending()).await {
            Ok(state) => state.attempt_identifier(),
            Err(_) => None,
        };
        attempt
    }

    fn apply(&self, request: SessionRequest) -> bool {
        self.state.send_if_modified(|current| match SessionGraph::transition(current, request) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        })
    }
}
