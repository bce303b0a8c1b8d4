//! Broadcast [`StatusSink`] for callers that watch a run from other tasks.
//!
//! Every subscriber sees every event of the run in emission order. Once the
//! executor and all handler snapshots holding the bus are dropped, receivers
//! get `RecvError::Closed`, which is how a watcher knows the run is over.

use flowgraph_types::event::StatusEvent;
use tokio::sync::broadcast;

use super::sink::StatusSink;

/// Status sink backed by a `tokio::sync::broadcast` channel.
///
/// Events emitted while nobody is subscribed are dropped. A subscriber that
/// falls more than `capacity` events behind receives `Lagged` and resumes
/// from the oldest retained event.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl StatusSink for EventBus {
    fn emit(&self, event: StatusEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("status event dropped: no subscribers");
        }
    }
}
