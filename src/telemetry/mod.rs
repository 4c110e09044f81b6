pub mod client;
pub mod connection;
pub mod protocol;

use crate::models::{Channel, Value};

pub use client::TelemetryClient;
pub use connection::spawn_connection;

/// Boundary between the station and the cloud dashboard
pub trait Telemetry {
    /// Fire-and-forget write of a value to a channel
    fn publish(&mut self, channel: Channel, value: Value);

    /// Drain the pull requests received since the last call
    fn pending_reads(&mut self) -> Vec<Channel>;
}
