//! Node dispatch: a per-run table of handlers keyed by node kind.
//!
//! The same executor serves full workflow runs, isolated single-node runs and
//! nested subflow runs. Each caller wires only the handlers it supports; a
//! node whose kind has no handler fails with [`NodeError::UnsupportedNodeKind`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flowgraph_types::event::StatusEvent;
use flowgraph_types::graph::{Node, NodeKind, NodeValue};
use flowgraph_types::run::RunMode;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::StatusSink;

use super::condition::ExpressionError;
use super::context::TemplateScope;
use super::resolve::replace_indexed_inputs;

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

/// What a handler returns on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOutput {
    pub value: NodeValue,
    /// Process exit code, recorded into the run's CLI metadata.
    pub exit_code: Option<i32>,
}

impl NodeOutput {
    pub fn with_exit_code(value: impl Into<NodeValue>, exit_code: i32) -> Self {
        Self {
            value: value.into(),
            exit_code: Some(exit_code),
        }
    }
}

impl From<NodeValue> for NodeOutput {
    fn from(value: NodeValue) -> Self {
        Self {
            value,
            exit_code: None,
        }
    }
}

impl From<String> for NodeOutput {
    fn from(s: String) -> Self {
        NodeValue::from(s).into()
    }
}

impl From<&str> for NodeOutput {
    fn from(s: &str) -> Self {
        NodeValue::from(s).into()
    }
}

impl From<Vec<String>> for NodeOutput {
    fn from(items: Vec<String>) -> Self {
        NodeValue::from(items).into()
    }
}

/// Errors a node handler can complete with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Cancellation was observed mid-handler. Not a failure.
    #[error("interrupted")]
    Interrupted,

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0}s")]
    TimedOut(u64),

    #[error("unsupported run mode '{mode}' for node kind '{kind}'")]
    UnsupportedNodeKind { mode: RunMode, kind: NodeKind },

    #[error("subflow nesting exceeds maximum depth {0}")]
    SubflowDepthExceeded(usize),
}

impl From<ExpressionError> for NodeError {
    fn from(e: ExpressionError) -> Self {
        NodeError::Failed(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Everything a handler receives: owned snapshots, never the run's context.
#[derive(Clone)]
pub struct Invocation {
    pub node: Node,
    /// Ordered, resolved parent values.
    pub inputs: Vec<String>,
    /// Named template values at admission time.
    pub scope: TemplateScope,
    pub mode: RunMode,
    /// The run's cancellation token.
    pub cancel: CancellationToken,
    pub sink: Arc<dyn StatusSink>,
    /// The table this node was dispatched from, for recursive runs.
    pub handlers: Arc<HandlerTable>,
    /// Subflow nesting depth; 0 for the top-level run.
    pub depth: usize,
    pub run_id: Uuid,
    /// LLM timeout used when the node does not set its own.
    pub llm_timeout_secs: u64,
}

impl Invocation {
    /// Substitute this node's inputs and scope into `template`.
    pub fn render(&self, template: &str) -> String {
        replace_indexed_inputs(template, &self.inputs, &self.scope)
    }

    /// The node's content template, rendered.
    pub fn rendered_content(&self) -> String {
        self.render(&self.node.data.content)
    }

    /// Parent values joined with newlines.
    pub fn joined_inputs(&self) -> String {
        self.inputs.join("\n")
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn emit(&self, event: StatusEvent) {
        self.sink.emit(event);
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("node_id", &self.node.id)
            .field("kind", &self.node.kind)
            .field("inputs", &self.inputs)
            .field("mode", &self.mode)
            .field("depth", &self.depth)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Handler table
// ---------------------------------------------------------------------------

pub type HandlerFuture = BoxFuture<'static, Result<NodeOutput, NodeError>>;

/// A type-erased node handler.
pub type NodeHandler = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

/// Handlers keyed by node kind.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<NodeKind, NodeHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler for `kind`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, kind: NodeKind, handler: F)
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
    {
        self.handlers
            .insert(kind, Arc::new(move |inv: Invocation| Box::pin(handler(inv)) as HandlerFuture));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F, Fut>(mut self, kind: NodeKind, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
    {
        self.register(kind, handler);
        self
    }

    /// Register an already type-erased handler.
    pub fn insert(&mut self, kind: NodeKind, handler: NodeHandler) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: NodeKind) -> Option<&NodeHandler> {
        self.handlers.get(&kind)
    }

    pub fn supports(&self, kind: NodeKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Add every handler of `other`, overriding existing entries.
    pub fn merge(&mut self, other: HandlerTable) {
        self.handlers.extend(other.handlers);
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Run the handler registered for the node's kind.
///
/// LLM nodes run under a timeout: `data.timeout_secs` when set, otherwise the
/// invocation default. Zero disables it.
pub async fn route_node_execution(invocation: Invocation) -> Result<NodeOutput, NodeError> {
    let kind = invocation.node.kind;
    let Some(handler) = invocation.handlers.get(kind).cloned() else {
        return Err(NodeError::UnsupportedNodeKind {
            mode: invocation.mode,
            kind,
        });
    };

    if kind == NodeKind::Llm {
        let secs = invocation
            .node
            .data
            .timeout_secs
            .unwrap_or(invocation.llm_timeout_secs);
        if secs > 0 {
            return match tokio::time::timeout(Duration::from_secs(secs), handler(invocation)).await
            {
                Ok(result) => result,
                Err(_) => Err(NodeError::TimedOut(secs)),
            };
        }
    }

    handler(invocation).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::event::NullSink;

    /// Minimal invocation for handler tests.
    pub(crate) fn invocation(node: Node, inputs: &[&str], handlers: HandlerTable) -> Invocation {
        Invocation {
            node,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            scope: TemplateScope::default(),
            mode: RunMode::Workflow,
            cancel: CancellationToken::new(),
            sink: Arc::new(NullSink),
            handlers: Arc::new(handlers),
            depth: 0,
            run_id: Uuid::now_v7(),
            llm_timeout_secs: 300,
        }
    }

    #[tokio::test]
    async fn test_routes_to_registered_handler() {
        let table = HandlerTable::new().with(NodeKind::Cli, |inv: Invocation| async move {
            Ok(NodeOutput::with_exit_code(inv.rendered_content(), 0))
        });
        let node = Node::new("c", NodeKind::Cli).with_content("echo ${1}");
        let out = route_node_execution(invocation(node, &["hi"], table))
            .await
            .unwrap();
        assert_eq!(out.value, NodeValue::from("echo hi"));
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_missing_handler_names_mode_and_kind() {
        let mut inv = invocation(Node::new("l", NodeKind::Llm), &[], HandlerTable::new());
        inv.mode = RunMode::SingleNode;
        let err = route_node_execution(inv).await.unwrap_err();
        assert_eq!(
            err,
            NodeError::UnsupportedNodeKind {
                mode: RunMode::SingleNode,
                kind: NodeKind::Llm
            }
        );
        assert_eq!(
            err.to_string(),
            "unsupported run mode 'single-node' for node kind 'llm'"
        );
    }

    #[tokio::test]
    async fn test_llm_timeout() {
        let table = HandlerTable::new().with(NodeKind::Llm, |_inv| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(NodeOutput::from("late"))
        });
        let mut node = Node::new("l", NodeKind::Llm);
        node.data.timeout_secs = Some(1);
        let err = route_node_execution(invocation(node, &[], table))
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::TimedOut(1));
    }

    #[tokio::test]
    async fn test_llm_timeout_zero_disables() {
        let table = HandlerTable::new().with(NodeKind::Llm, |_inv| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(NodeOutput::from("done"))
        });
        let mut node = Node::new("l", NodeKind::Llm);
        node.data.timeout_secs = Some(0);
        let mut inv = invocation(node, &[], table);
        inv.llm_timeout_secs = 1;
        let out = route_node_execution(inv).await.unwrap();
        assert_eq!(out.value, NodeValue::from("done"));
    }

    #[test]
    fn test_handler_table_merge_overrides() {
        let mut base = HandlerTable::new()
            .with(NodeKind::Preview, |_inv| async { Ok(NodeOutput::from("base")) })
            .with(NodeKind::Cli, |_inv| async { Ok(NodeOutput::from("cli")) });
        let overlay =
            HandlerTable::new().with(NodeKind::Preview, |_inv| async { Ok(NodeOutput::from("new")) });
        base.merge(overlay);
        assert_eq!(base.kinds(), vec![NodeKind::Cli, NodeKind::Preview]);
        assert!(base.supports(NodeKind::Preview));
        assert!(!base.supports(NodeKind::Llm));
        assert_eq!(format!("{base:?}"), "HandlerTable { kinds: [Cli, Preview] }");
    }
}
