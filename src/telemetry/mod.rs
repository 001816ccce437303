//! Checkout telemetry: attempt correlation, event buffering and batch flushing.
//!
//! # DELIVERY INVARIANT
//! Telemetry is a best-effort side channel. It must **NEVER** block, fail or
//! delay a payment call. `report_*` always returns immediately; network work
//! runs on the runtime.
//!
//! # GATE INVARIANT
//! Nothing is sent unless the master flag is on **and** the session holds a
//! resolved attempt id. Events buffered while the gate is closed stay buffered.
//!
//! # PRIVACY INVARIANT
//! Events carry component names, kinds and codes only, never shopper input.

pub mod attempt;
pub mod buffer;
pub mod config;
pub mod event;
pub mod flavor;
pub mod handshake;
pub mod provider;
pub mod scheduler;

pub use attempt::{AttemptIdentifier, SessionState, DO_NOT_TRACK};
pub use buffer::{EventBuffer, EventSnapshot, FlushBatch};
pub use config::{FlushSchedule, TelemetryConfiguration, TelemetryContext};
pub use event::{ErrorEvent, ErrorKind, InfoEvent, InfoKind, LogEvent, LogKind, Severity, TelemetryEvent};
pub use flavor::{AdditionalFields, Amount, TelemetryFlavor};
pub use handshake::HandshakeStart;
pub use provider::{FlushOutcome, FlushTrigger, SkipReason, TelemetryProvider};
