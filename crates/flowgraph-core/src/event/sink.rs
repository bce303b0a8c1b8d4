//! The status sink seam between the executor and its callers.

use std::sync::Mutex;

use flowgraph_types::event::{NodeStatus, StatusEvent};

/// Receives status events from a run.
///
/// Called from the executor's control task; implementations must not block.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// Adapts a closure into a [`StatusSink`].
pub struct FnSink<F>(pub F);

impl<F> StatusSink for FnSink<F>
where
    F: Fn(StatusEvent) + Send + Sync,
{
    fn emit(&self, event: StatusEvent) {
        (self.0)(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&self, _event: StatusEvent) {}
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StatusEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Statuses reported for one current-level node, in order.
    pub fn statuses_for(&self, node_id: &str) -> Vec<NodeStatus> {
        self.events()
            .iter()
            .filter_map(StatusEvent::as_node_update)
            .filter(|update| update.node_id == node_id)
            .map(|update| update.status)
            .collect()
    }

    /// Current-level node IDs in the order they reported `status`.
    pub fn nodes_with_status(&self, status: NodeStatus) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(StatusEvent::as_node_update)
            .filter(|update| update.status == status)
            .map(|update| update.node_id.clone())
            .collect()
    }
}

impl StatusSink for MemorySink {
    fn emit(&self, event: StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
