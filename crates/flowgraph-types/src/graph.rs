//! Graph domain types for flowgraph.
//!
//! Defines the canonical in-memory shape of a graph: nodes (with their closed
//! set of kinds and kind-specific data), edges with their port handles, and
//! the values nodes produce. The visual editor, graph files on disk and the
//! subflow store all convert to and from these structs.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node ID within its graph.
    pub id: String,
    /// The kind of work this node performs.
    pub kind: NodeKind,
    /// Kind-specific payload (templates, variable names, subflow reference).
    #[serde(default)]
    pub data: NodeData,
    /// Inactive nodes are never scheduled; edges leaving them count as satisfied.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Canvas position, used as a deterministic tie-breaker when ordering.
    #[serde(default)]
    pub position: Position,
    /// Reuse the last cached output instead of re-running (subflow inner nodes only).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bypass: bool,
}

fn default_active() -> bool {
    true
}

impl Node {
    /// Build an active node at the origin with empty data.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: NodeData::default(),
            active: true,
            position: Position::default(),
            bypass: false,
        }
    }

    /// Set the node's content template.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.data.content = content.into();
        self
    }

    /// Set the canvas position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    /// Display label: the title when set, otherwise the ID.
    pub fn label(&self) -> &str {
        self.data.title.as_deref().unwrap_or(&self.id)
    }
}

/// The kind of a node. Closed set: every dispatch is a match over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Cli,
    Llm,
    Preview,
    Input,
    Accumulator,
    Variable,
    IfElse,
    LoopStart,
    LoopEnd,
    Subflow,
    SubflowInput,
    SubflowOutput,
}

impl NodeKind {
    /// All kinds, in declaration order.
    pub const ALL: [NodeKind; 12] = [
        NodeKind::Cli,
        NodeKind::Llm,
        NodeKind::Preview,
        NodeKind::Input,
        NodeKind::Accumulator,
        NodeKind::Variable,
        NodeKind::IfElse,
        NodeKind::LoopStart,
        NodeKind::LoopEnd,
        NodeKind::Subflow,
        NodeKind::SubflowInput,
        NodeKind::SubflowOutput,
    ];

    /// Stable snake_case name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Cli => "cli",
            NodeKind::Llm => "llm",
            NodeKind::Preview => "preview",
            NodeKind::Input => "input",
            NodeKind::Accumulator => "accumulator",
            NodeKind::Variable => "variable",
            NodeKind::IfElse => "if_else",
            NodeKind::LoopStart => "loop_start",
            NodeKind::LoopEnd => "loop_end",
            NodeKind::Subflow => "subflow",
            NodeKind::SubflowInput => "subflow_input",
            NodeKind::SubflowOutput => "subflow_output",
        }
    }

    /// Loop markers are not supported by the parallel executor.
    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::LoopStart | NodeKind::LoopEnd)
    }

    /// Boundary nodes that connect a subflow to its wrapper.
    pub fn is_subflow_boundary(&self) -> bool {
        matches!(self, NodeKind::SubflowInput | NodeKind::SubflowOutput)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific node payload.
///
/// Flat rather than tagged so that a node can change kind in the editor
/// without losing its content. Fields irrelevant to a kind are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Template: shell command (CLI), prompt (LLM), condition (IfElse), text (others).
    #[serde(default)]
    pub content: String,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Target variable name (Variable, Accumulator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    /// Subflow definition ID (Subflow wrappers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_id: Option<String>,
    /// Port ID (SubflowInput, SubflowOutput).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    /// Model key (LLM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Per-node timeout in seconds (LLM; 0 disables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Working directory (CLI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// Canvas position coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A directed dependency from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// `"true"`/`"false"` on IfElse sources, `"out-N"` on multi-output sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// `"in-N"` orders fan-in on the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    /// Plain edge without handles; the ID is derived from the endpoints.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        let handle = handle.into();
        self.id = format!("{}:{}", self.id, handle);
        self.source_handle = Some(handle);
        self
    }

    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        let handle = handle.into();
        self.id = format!("{}@{}", self.id, handle);
        self.target_handle = Some(handle);
        self
    }

    /// `N` of an `in-N` target handle.
    pub fn input_index(&self) -> Option<usize> {
        parse_handle_index(self.target_handle.as_deref()?, "in-")
    }

    /// `N` of an `out-N` source handle.
    pub fn output_index(&self) -> Option<usize> {
        parse_handle_index(self.source_handle.as_deref()?, "out-")
    }

    /// Branch encoded on an IfElse source handle. Anything but `"false"` is the true branch.
    pub fn branch(&self) -> bool {
        self.source_handle.as_deref() != Some("false")
    }
}

fn parse_handle_index(handle: &str, prefix: &str) -> Option<usize> {
    handle.strip_prefix(prefix)?.parse().ok()
}

// ---------------------------------------------------------------------------
// Node values
// ---------------------------------------------------------------------------

/// What a node produces: a single string, or one string per output port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Text(String),
    List(Vec<String>),
}

impl NodeValue {
    /// Newline-joined text view.
    pub fn to_text(&self) -> String {
        match self {
            NodeValue::Text(s) => s.clone(),
            NodeValue::List(items) => items.join("\n"),
        }
    }

    /// Text view for the edge leaving through `out-N`. Out-of-range falls back to the joined text.
    pub fn select(&self, output_index: Option<usize>) -> String {
        match (self, output_index) {
            (NodeValue::List(items), Some(i)) => match items.get(i) {
                Some(item) => item.clone(),
                None => items.join("\n"),
            },
            _ => self.to_text(),
        }
    }
}

impl Default for NodeValue {
    fn default() -> Self {
        NodeValue::Text(String::new())
    }
}

impl From<String> for NodeValue {
    fn from(s: String) -> Self {
        NodeValue::Text(s)
    }
}

impl From<&str> for NodeValue {
    fn from(s: &str) -> Self {
        NodeValue::Text(s.to_string())
    }
}

impl From<Vec<String>> for NodeValue {
    fn from(items: Vec<String>) -> Self {
        NodeValue::List(items)
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A complete graph: nodes plus edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}
