use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::event::{ErrorEvent, InfoEvent, LogEvent, TelemetryEvent};

/// Contents of the buffer taken in one atomic drain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub infos: Vec<InfoEvent>,
    pub logs: Vec<LogEvent>,
    pub errors: Vec<ErrorEvent>,
}

impl EventSnapshot {
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty() && self.logs.is_empty() && self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.infos.len() + self.logs.len() + self.errors.len()
    }
}

/// Immutable unit handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushBatch {
    attempt_id: String,
    events: EventSnapshot,
}

impl FlushBatch {
    pub fn new(attempt_id: impl Into<String>, events: EventSnapshot) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            events,
        }
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn events(&self) -> &EventSnapshot {
        &self.events
    }

    pub fn into_parts(self) -> (String, EventSnapshot) {
        (self.attempt_id, self.events)
    }
}

/// Three per-severity FIFO queues behind one lock, so a drain never observes
/// a half-applied append and all three queues empty together.
///
/// Unbounded. Appends always succeed, and only a flush drains the queues, so
/// while the gate stays closed (tracking suppressed, master flag off, or a
/// failed handshake never retried) the buffer grows for the whole session.
#[derive(Debug, Default)]
pub struct EventBuffer {
    queues: Mutex<EventSnapshot>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: TelemetryEvent) {
        let mut queues = self.lock();
        match event {
            TelemetryEvent::Info(e) => queues.infos.push(e),
            TelemetryEvent::Log(e) => queues.logs.push(e),
            TelemetryEvent::Error(e) => queues.errors.push(e),
        }
    }

    /// Takes everything buffered so far and leaves the buffer empty.
    pub fn drain_all(&self) -> EventSnapshot {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Copy of the current contents, leaving them in place.
    pub fn peek(&self) -> EventSnapshot {
        self.lock().clone()
    }

    // A panic while holding the lock cannot leave the queues half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, EventSnapshot> {
        self.queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
