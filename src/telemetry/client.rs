/// Station-side handle to the connection task
use log::debug;
use tokio::sync::mpsc;

use crate::models::{Channel, Value};
use crate::telemetry::protocol::Frame;
use crate::telemetry::Telemetry;

/// Queues outbound writes and collects pull requests without blocking
///
/// The connection task owns the socket; this handle only talks to it over
/// bounded channels, so publishing never waits on the network.
#[derive(Debug)]
pub struct TelemetryClient {
    outbound: mpsc::Sender<Frame>,
    requests: mpsc::Receiver<Channel>,
}

impl TelemetryClient {
    pub fn new(outbound: mpsc::Sender<Frame>, requests: mpsc::Receiver<Channel>) -> Self {
        Self { outbound, requests }
    }
}

impl Telemetry for TelemetryClient {
    fn publish(&mut self, channel: Channel, value: Value) {
        if let Err(e) = self.outbound.try_send(Frame::Write(channel, value)) {
            debug!("Dropping update for {}: {}", channel, e);
        }
    }

    fn pending_reads(&mut self) -> Vec<Channel> {
        let mut reads = Vec::new();
        while let Ok(channel) = self.requests.try_recv() {
            reads.push(channel);
        }
        reads
    }
}
