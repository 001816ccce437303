use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{FlushRequest, HandshakeRequest, HandshakeResponse, TelemetryTransport};
use crate::error::TransportError;

/// In-process collector for tests and offline runs. Records every request,
/// answers from a script, and can hold replies until released.
pub struct MockTransport {
    attempt_reply: Mutex<Option<String>>,
    fail_batches: Mutex<bool>,
    handshakes: Mutex<Vec<HandshakeRequest>>,
    batches: Mutex<Vec<FlushRequest>>,
    handshake_hold: watch::Sender<bool>,
    batch_hold: watch::Sender<bool>,
    batch_count: watch::Sender<usize>,
    handshake_count: watch::Sender<usize>,
}

impl MockTransport {
    /// Answers every handshake with `attempt_id`.
    pub fn resolving(attempt_id: impl Into<String>) -> Self {
        Self::with_reply(Some(attempt_id.into()))
    }

    /// Fails every handshake.
    pub fn failing_handshake() -> Self {
        Self::with_reply(None)
    }

    fn with_reply(attempt_reply: Option<String>) -> Self {
        Self {
            attempt_reply: Mutex::new(attempt_reply),
            fail_batches: Mutex::new(false),
            handshakes: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            handshake_hold: watch::channel(false).0,
            batch_hold: watch::channel(false).0,
            batch_count: watch::channel(0).0,
            handshake_count: watch::channel(0).0,
        }
    }

    pub fn set_attempt_reply(&self, attempt_id: Option<&str>) {
        *lock(&self.attempt_reply) = attempt_id.map(str::to_string);
    }

    pub fn set_fail_batches(&self, fail: bool) {
        *lock(&self.fail_batches) = fail;
    }

    pub fn hold_handshakes(&self) {
        self.handshake_hold.send_replace(true);
    }

    pub fn release_handshakes(&self) {
        self.handshake_hold.send_replace(false);
    }

    pub fn hold_batches(&self) {
        self.batch_hold.send_replace(true);
    }

    pub fn release_batches(&self) {
        self.batch_hold.send_replace(false);
    }

    pub fn handshakes(&self) -> Vec<HandshakeRequest> {
        lock(&self.handshakes).clone()
    }

    /// Every batch received, including ones answered with a failure.
    pub fn batches(&self) -> Vec<FlushRequest> {
        lock(&self.batches).clone()
    }

    pub fn batch_count(&self) -> usize {
        *self.batch_count.borrow()
    }

    pub fn handshake_count(&self) -> usize {
        *self.handshake_count.borrow()
    }

    pub async fn wait_for_batches(&self, count: usize) {
        let mut rx = self.batch_count.subscribe();
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }

    pub async fn wait_for_handshakes(&self, count: usize) {
        let mut rx = self.handshake_count.subscribe();
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }
}

#[async_trait]
impl TelemetryTransport for MockTransport {
    async fn open_attempt(&self, request: HandshakeRequest) -> Result<HandshakeResponse, TransportError> {
        lock(&self.handshakes).push(request);
        self.handshake_count.send_modify(|n| *n += 1);
        wait_released(&self.handshake_hold).await;

        match lock(&self.attempt_reply).clone() {
            Some(identifier) => Ok(HandshakeResponse { identifier }),
            None => Err(TransportError::Unavailable("scripted handshake failure".to_string())),
        }
    }

    async fn send_batch(&self, request: FlushRequest) -> Result<(), TransportError> {
        lock(&self.batches).push(request);
        self.batch_count.send_modify(|n| *n += 1);
        wait_released(&self.batch_hold).await;

        if *lock(&self.fail_batches) {
            return Err(TransportError::Status(503));
        }
        Ok(())
    }
}

async fn wait_released(hold: &watch::Sender<bool>) {
    let mut rx = hold.subscribe();
    let _ = rx.wait_for(|held| !*held).await;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
