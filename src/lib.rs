pub mod error;
pub mod telemetry;
pub mod transport;

pub use error::{TelemetryError, TransportError};
pub use telemetry::TelemetryProvider;
