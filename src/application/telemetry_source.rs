// Telemetry source port - polling and streaming transports behind one trait
use crate::domain::collar::RawCollarStatus;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events a transport delivers for one collar. Failures surface as
/// events, never as errors: the session downgrades to a disconnected
/// visual state and the transport keeps retrying.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Streaming connection established.
    Connected,
    /// Connection closed or errored; the transport will reconnect.
    Disconnected,
    /// A poll attempt could not reach the backend.
    Unreachable,
    /// Inbound payload failed to deserialize; the connection stays up.
    ParseError(String),
    Status(RawCollarStatus),
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Start delivering events for the given collar. The feed emits
    /// until stopped or dropped.
    async fn subscribe(&self, collar_id: &str) -> TelemetryFeed;
}

/// A running subscription: an event receiver plus the transport tasks
/// driving it. Stopping aborts the tasks, so no event is delivered
/// after `stop` returns.
pub struct TelemetryFeed {
    pub events: mpsc::Receiver<SourceEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl TelemetryFeed {
    pub fn new(events: mpsc::Receiver<SourceEvent>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { events, tasks }
    }

    /// Idempotent; aborting an already-finished task is a no-op.
    pub fn stop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
