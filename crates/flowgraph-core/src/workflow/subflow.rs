//! Subflow runner: executes a nested graph on behalf of a Subflow wrapper node.
//!
//! The wrapper's ordered parent values seed the inner `SubflowInput` nodes by
//! port index. Inner `SubflowOutput` values come back as a list, one entry
//! per declared output port. Inner status events are re-tagged with the
//! wrapper and subflow IDs, and a `completed/total` progress counter is
//! published alongside them.
//!
//! Outputs of every completed inner run are cached per subflow ID for the
//! session. Inner nodes flagged `bypass` reuse their cached output instead of
//! running again.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use flowgraph_types::event::{NodeStatus, StatusEvent};
use flowgraph_types::graph::{GraphDefinition, NodeKind, NodeValue};
use flowgraph_types::run::{RunOptions, RunStatus, Seeds};

use crate::event::StatusSink;
use crate::repository::subflow::SubflowRepository;

use super::dispatch::{HandlerFuture, HandlerTable, Invocation, NodeError, NodeHandler, NodeOutput};
use super::executor::{GraphExecutor, RunControl};

/// Maximum subflow nesting depth.
pub const MAX_SUBFLOW_DEPTH: usize = 5;

// ---------------------------------------------------------------------------
// SubflowRunner
// ---------------------------------------------------------------------------

/// Runs Subflow nodes. Generic over `R: SubflowRepository` for storage flexibility.
pub struct SubflowRunner<R: SubflowRepository> {
    repo: R,
    /// Last completed inner outputs, keyed by subflow ID.
    cache: DashMap<String, HashMap<String, NodeValue>>,
    /// Caps and policies for inner runs. Seeds are ignored.
    inner_options: RunOptions,
}

impl<R: SubflowRepository + 'static> SubflowRunner<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            cache: DashMap::new(),
            inner_options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.inner_options = options;
        self
    }

    /// Cached inner outputs of the last completed run of `subflow_id`.
    pub fn cached_outputs(&self, subflow_id: &str) -> Option<HashMap<String, NodeValue>> {
        self.cache.get(subflow_id).map(|entry| entry.value().clone())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Type-erased handler for the Subflow kind.
    pub fn into_handler(self: Arc<Self>) -> NodeHandler {
        Arc::new(move |inv: Invocation| {
            let runner = Arc::clone(&self);
            Box::pin(async move { runner.run(inv).await }) as HandlerFuture
        })
    }

    /// Register this runner as the Subflow handler of `table`.
    pub fn register(self: Arc<Self>, table: &mut HandlerTable) {
        table.insert(NodeKind::Subflow, self.into_handler());
    }

    /// Run the subflow referenced by the wrapper node of `inv`.
    pub async fn run(&self, inv: Invocation) -> Result<NodeOutput, NodeError> {
        if inv.depth >= MAX_SUBFLOW_DEPTH {
            return Err(NodeError::SubflowDepthExceeded(MAX_SUBFLOW_DEPTH));
        }
        let subflow_id = inv
            .node
            .data
            .subflow_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                NodeError::Failed(format!("subflow node '{}' has no subflow_id", inv.node.id))
            })?;

        let definition = self
            .repo
            .load_subflow_definition(&subflow_id)
            .await
            .map_err(|e| NodeError::Failed(format!("failed to load subflow '{subflow_id}': {e}")))?;

        // Inputs by port index.
        let mut seeds = Seeds::default();
        for (index, port) in definition.inputs.iter().enumerate() {
            if let Some(node) = definition.boundary_node(NodeKind::SubflowInput, &port.id) {
                let value = inv.inputs.get(index).cloned().unwrap_or_default();
                seeds.outputs.insert(node.id.clone(), NodeValue::from(value));
            }
        }

        let cached = self.cached_outputs(&subflow_id);
        if let Some(cached) = cached {
            let seeded: HashSet<String> = seeds.outputs.keys().cloned().collect();
            let bypassed = bypass_seeds(&definition.graph, &cached, &seeded);
            tracing::debug!(
                subflow_id = %subflow_id,
                bypassed = bypassed.len(),
                "seeding bypass nodes from cache"
            );
            seeds.outputs.extend(bypassed);
        }

        let counted: HashSet<String> = definition
            .graph
            .nodes
            .iter()
            .filter(|n| n.active && !n.kind.is_subflow_boundary())
            .map(|n| n.id.clone())
            .collect();
        let already_done = counted
            .iter()
            .filter(|id| seeds.outputs.contains_key(*id))
            .count();
        let proxy = Arc::new(SubflowSink {
            parent: Arc::clone(&inv.sink),
            wrapper_id: inv.node.id.clone(),
            subflow_id: subflow_id.clone(),
            total: definition.progress_total(),
            completed: AtomicUsize::new(already_done),
            counted,
        });
        proxy.publish_progress(already_done);

        let executor = GraphExecutor::from_shared(Arc::clone(&inv.handlers), proxy)
            .with_depth(inv.depth + 1)
            .with_llm_timeout(inv.llm_timeout_secs);
        let options = RunOptions {
            seeds,
            ..self.inner_options.clone()
        };
        let control = RunControl::new().with_cancel(inv.cancel.clone());

        let report = executor
            .execute(&definition.graph.nodes, &definition.graph.edges, &options, control)
            .await
            .map_err(|e| NodeError::Failed(format!("subflow '{subflow_id}': {e}")))?;

        match report.status {
            RunStatus::Completed => {}
            RunStatus::Cancelled | RunStatus::Paused => return Err(NodeError::Interrupted),
            RunStatus::Failed => {
                let reasons: Vec<String> = report
                    .failed
                    .iter()
                    .map(|(id, message)| format!("{id}: {message}"))
                    .collect();
                return Err(NodeError::Failed(format!(
                    "subflow '{subflow_id}' failed: {}",
                    reasons.join("; ")
                )));
            }
        }

        let values: Vec<String> = definition
            .outputs
            .iter()
            .map(|port| {
                definition
                    .boundary_node(NodeKind::SubflowOutput, &port.id)
                    .and_then(|node| report.output(&node.id))
                    .map(NodeValue::to_text)
                    .unwrap_or_default()
            })
            .collect();

        self.cache
            .insert(subflow_id, report.context.node_outputs.clone());
        Ok(NodeOutput::from(NodeValue::List(values)))
    }
}

/// Cached outputs for bypass nodes whose bypass parents are also seeded.
///
/// A candidate is an active bypass node with a cached output. Candidates with
/// an active bypass parent that is neither a candidate nor already seeded are
/// dropped, repeatedly, until nothing changes.
pub fn bypass_seeds(
    graph: &GraphDefinition,
    cached: &HashMap<String, NodeValue>,
    seeded: &HashSet<String>,
) -> HashMap<String, NodeValue> {
    let bypass: HashSet<&str> = graph
        .nodes
        .iter()
        .filter(|n| n.active && n.bypass)
        .map(|n| n.id.as_str())
        .collect();
    let mut candidates: HashSet<&str> = bypass
        .iter()
        .copied()
        .filter(|id| cached.contains_key(*id))
        .collect();

    for _ in 0..=graph.nodes.len() {
        let dropped: Vec<&str> = candidates
            .iter()
            .copied()
            .filter(|id| {
                graph.edges.iter().any(|edge| {
                    edge.target == *id
                        && bypass.contains(edge.source.as_str())
                        && !candidates.contains(edge.source.as_str())
                        && !seeded.contains(&edge.source)
                })
            })
            .collect();
        if dropped.is_empty() {
            break;
        }
        for id in dropped {
            candidates.remove(id);
        }
    }

    candidates
        .into_iter()
        .filter_map(|id| cached.get(id).map(|value| (id.to_string(), value.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Proxy sink
// ---------------------------------------------------------------------------

/// Re-tags every inner event for the wrapper's sink and tracks progress.
struct SubflowSink {
    parent: Arc<dyn StatusSink>,
    wrapper_id: String,
    subflow_id: String,
    /// Inner nodes counted towards progress.
    counted: HashSet<String>,
    total: usize,
    completed: AtomicUsize,
}

impl SubflowSink {
    fn publish_progress(&self, completed: usize) {
        self.parent.emit(StatusEvent::SubflowProgress {
            wrapper_id: self.wrapper_id.clone(),
            completed,
            total: self.total,
        });
    }

    /// Wrapper path for an event that already passed a nested proxy.
    fn nested_path(&self, inner_wrapper: &str) -> String {
        format!("{}/{inner_wrapper}", self.wrapper_id)
    }
}

impl StatusSink for SubflowSink {
    fn emit(&self, event: StatusEvent) {
        match event {
            StatusEvent::Node(update) => {
                let counts = update.status == NodeStatus::Completed
                    && self.counted.contains(&update.node_id);
                self.parent.emit(StatusEvent::SubflowNode {
                    wrapper_id: self.wrapper_id.clone(),
                    subflow_id: self.subflow_id.clone(),
                    update,
                });
                if counts {
                    let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.publish_progress(completed);
                }
            }
            StatusEvent::AssistantContent { node_id, content } => {
                self.parent.emit(StatusEvent::SubflowAssistantContent {
                    wrapper_id: self.wrapper_id.clone(),
                    subflow_id: self.subflow_id.clone(),
                    node_id,
                    content,
                });
            }
            StatusEvent::SubflowNode {
                wrapper_id,
                subflow_id,
                update,
            } => self.parent.emit(StatusEvent::SubflowNode {
                wrapper_id: self.nested_path(&wrapper_id),
                subflow_id,
                update,
            }),
            StatusEvent::SubflowProgress {
                wrapper_id,
                completed,
                total,
            } => self.parent.emit(StatusEvent::SubflowProgress {
                wrapper_id: self.nested_path(&wrapper_id),
                completed,
                total,
            }),
            StatusEvent::SubflowAssistantContent {
                wrapper_id,
                subflow_id,
                node_id,
                content,
            } => self.parent.emit(StatusEvent::SubflowAssistantContent {
                wrapper_id: self.nested_path(&wrapper_id),
                subflow_id,
                node_id,
                content,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
