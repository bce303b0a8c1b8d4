//! Status events emitted during a graph run.
//!
//! Every admitted node emits `Running` followed by exactly one terminal
//! status. Nested subflow runs re-tag their inner events as
//! [`StatusEvent::SubflowNode`] and [`StatusEvent::SubflowAssistantContent`]
//! and add wrapper-level progress counters.
//!
//! For subflows nested inside subflows, `wrapper_id` is the `/`-joined path of
//! wrapper IDs from the outermost graph down, e.g. `outer/inner`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeValue;

/// Per-node status in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Running,
    Completed,
    Error,
    Interrupted,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeStatus::Running)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Error => "error",
            NodeStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// A status update for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatusUpdate {
    pub node_id: String,
    pub status: NodeStatus,
    /// Output on `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NodeValue>,
    /// Message on `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeStatusUpdate {
    pub fn running(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Running,
            result: None,
            error: None,
        }
    }

    pub fn completed(node_id: impl Into<String>, result: NodeValue) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Error,
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn interrupted(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Interrupted,
            result: None,
            error: None,
        }
    }
}

/// Everything a run reports to its status sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A top-level (or current-level) node changed status.
    Node(NodeStatusUpdate),

    /// A node inside a subflow changed status.
    SubflowNode {
        /// Path of wrapper node IDs, starting in the outer graph.
        wrapper_id: String,
        /// ID of the subflow definition.
        subflow_id: String,
        update: NodeStatusUpdate,
    },

    /// Aggregate progress of a subflow wrapper.
    SubflowProgress {
        wrapper_id: String,
        completed: usize,
        total: usize,
    },

    /// Streamed assistant content from an LLM node.
    AssistantContent { node_id: String, content: String },

    /// Streamed assistant content from an LLM node inside a subflow.
    SubflowAssistantContent {
        wrapper_id: String,
        subflow_id: String,
        node_id: String,
        content: String,
    },
}

impl StatusEvent {
    /// The `"completed/total"` label for progress events.
    pub fn progress_label(&self) -> Option<String> {
        match self {
            StatusEvent::SubflowProgress {
                completed, total, ..
            } => Some(format!("{completed}/{total}")),
            _ => None,
        }
    }

    /// The node update carried by this event, for current-level node events.
    pub fn as_node_update(&self) -> Option<&NodeStatusUpdate> {
        match self {
            StatusEvent::Node(update) => Some(update),
            _ => None,
        }
    }
}
