//! Graph executor: dependency-driven parallel execution of a node graph.
//!
//! The `GraphExecutor` admits ready nodes under a global cap and per-kind
//! caps, runs their handlers concurrently on a `tokio::JoinSet`, and unlocks
//! dependents as each one completes. IfElse nodes gate their targets until
//! their decision is known; the losing branch is pruned.
//!
//! # Execution flow
//!
//! 1. Build a fresh `ExecutionContext` and apply seeds.
//! 2. Compute in-degrees and IfElse placeholders; replay seeded decisions.
//! 3. Admit ready nodes (`try_start`), each as one task on the join set.
//! 4. On each completion: store the output, apply side effects, materialize
//!    branches or release children, then admit again.
//! 5. Stop when nothing remains, the run is cancelled or paused, or nothing
//!    is in flight while nodes remain (structural deadlock).
//!
//! The context is mutated only from the control task. Handlers receive owned
//! snapshots through [`Invocation`].

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use flowgraph_types::event::{NodeStatusUpdate, StatusEvent};
use flowgraph_types::graph::{Edge, Node, NodeKind, NodeValue};
use flowgraph_types::run::{AdmissionPolicy, ErrorPolicy, RunMode, RunOptions, RunStatus, Seeds};
use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::StatusSink;

use super::context::{CliMetadata, ExecutionContext};
use super::dispatch::{
    route_node_execution, HandlerTable, Invocation, NodeError, NodeOutput,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default LLM node timeout (5 minutes).
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A node that could not be scheduled, with what it was still waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNode {
    pub node_id: String,
    pub waiting_on: Vec<String>,
}

impl fmt::Display for PendingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (waiting on {})", self.node_id, self.waiting_on.join(", "))
    }
}

fn describe_pending(pending: &[PendingNode]) -> String {
    pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run-level errors. Node failures are reported through the status sink instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("structural deadlock: {} node(s) have unmet dependencies: {}", .pending.len(), describe_pending(.pending))]
    StructuralDeadlock { pending: Vec<PendingNode> },

    #[error("loop node '{node_id}' is not supported by the parallel executor")]
    LoopUnsupported { node_id: String },

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("node task failed to join: {0}")]
    TaskJoin(String),
}

// ---------------------------------------------------------------------------
// RunControl / RunReport
// ---------------------------------------------------------------------------

/// Signals a caller holds over a run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    /// Parent of the run's own token. Cancelling it interrupts the run.
    pub cancel: CancellationToken,
    /// When tripped, admission stops and the run returns `Paused` once
    /// in-flight nodes finish.
    pub pause: Option<CancellationToken>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_pause(mut self, pause: CancellationToken) -> Self {
        self.pause = Some(pause);
        self
    }

    fn is_paused(&self) -> bool {
        self.pause.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Final context, including seeded values.
    pub context: ExecutionContext,
    /// Completed node IDs, in completion order.
    pub completed: Vec<String>,
    /// Failed node IDs with their error messages.
    pub failed: Vec<(String, String)>,
    pub interrupted: Vec<String>,
    /// Descendants of failed or interrupted nodes that were never started.
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn output(&self, node_id: &str) -> Option<&NodeValue> {
        self.context.output(node_id)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Seeds that resume this run without recomputing finished work.
    pub fn resume_seeds(&self) -> Seeds {
        Seeds {
            outputs: self.context.node_outputs.clone(),
            decisions: self.context.if_else_decisions.clone(),
            variables: self.context.variable_values.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphExecutor
// ---------------------------------------------------------------------------

/// Parallel graph executor.
///
/// Reusable across runs; every run gets its own context and token.
#[derive(Clone)]
pub struct GraphExecutor {
    handlers: Arc<HandlerTable>,
    sink: Arc<dyn StatusSink>,
    llm_timeout_secs: u64,
    depth: usize,
}

impl GraphExecutor {
    pub fn new(handlers: HandlerTable, sink: Arc<dyn StatusSink>) -> Self {
        Self::from_shared(Arc::new(handlers), sink)
    }

    /// Build from an already shared table, as nested runs do.
    pub fn from_shared(handlers: Arc<HandlerTable>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            handlers,
            sink,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            depth: 0,
        }
    }

    pub fn with_llm_timeout(mut self, secs: u64) -> Self {
        self.llm_timeout_secs = secs;
        self
    }

    /// Subflow nesting depth handed to every invocation.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn handlers(&self) -> &Arc<HandlerTable> {
        &self.handlers
    }

    /// Run every active node of the graph.
    pub async fn execute(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        options: &RunOptions,
        control: RunControl,
    ) -> Result<RunReport, EngineError> {
        if let Some(node) = nodes.iter().find(|n| n.active && n.kind.is_loop()) {
            return Err(EngineError::LoopUnsupported {
                node_id: node.id.clone(),
            });
        }

        let seeds = &options.seeds;
        let schedulable: Vec<String> = nodes
            .iter()
            .filter(|n| n.active && !is_seeded(n, seeds))
            .map(|n| n.id.clone())
            .collect();

        let mut run = Run::new(self, nodes, edges, options, control, RunMode::Workflow);
        run.setup(schedulable, true);
        run.drive().await
    }

    /// Run one node in isolation. The whole graph is indexed so that the
    /// node's inputs resolve from seeded outputs; its `active` flag is ignored.
    pub async fn run_single_node(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        node_id: &str,
        options: &RunOptions,
        control: RunControl,
    ) -> Result<RunReport, EngineError> {
        let node = nodes
            .iter()
            .find(|n| n.id == node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_string()))?;
        if node.kind.is_loop() {
            return Err(EngineError::LoopUnsupported {
                node_id: node.id.clone(),
            });
        }

        let mut run = Run::new(self, nodes, edges, options, control, RunMode::SingleNode);
        run.setup(vec![node_id.to_string()], false);
        run.drive().await
    }
}

impl fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("handlers", &self.handlers)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

fn is_seeded(node: &Node, seeds: &Seeds) -> bool {
    seeds.outputs.contains_key(&node.id)
        || (node.kind == NodeKind::IfElse && seeds.decisions.contains_key(&node.id))
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

type TaskResult = (String, NodeKind, Result<NodeOutput, NodeError>);

/// State of one run, owned by the control task.
struct Run<'a> {
    executor: &'a GraphExecutor,
    options: &'a RunOptions,
    control: RunControl,
    mode: RunMode,
    run_id: Uuid,
    token: CancellationToken,

    ctx: ExecutionContext,
    /// Nodes still to complete; shrinks on completion, pruning and skipping.
    remaining: HashSet<String>,
    in_degree: HashMap<String, usize>,
    started: HashSet<String>,
    ready: Vec<String>,
    running_by_kind: HashMap<NodeKind, usize>,
    tasks: JoinSet<TaskResult>,

    completed: Vec<String>,
    failed: Vec<(String, String)>,
    interrupted: Vec<String>,
    skipped: Vec<String>,
    fail_fast_tripped: bool,
}

impl<'a> Run<'a> {
    fn new(
        executor: &'a GraphExecutor,
        nodes: &[Node],
        edges: &[Edge],
        options: &'a RunOptions,
        control: RunControl,
        mode: RunMode,
    ) -> Self {
        let mut ctx = ExecutionContext::new(nodes, edges);
        ctx.apply_seeds(&options.seeds);
        let token = control.cancel.child_token();

        Self {
            executor,
            options,
            control,
            mode,
            run_id: Uuid::now_v7(),
            token,
            ctx,
            remaining: HashSet::new(),
            in_degree: HashMap::new(),
            started: HashSet::new(),
            ready: Vec::new(),
            running_by_kind: HashMap::new(),
            tasks: JoinSet::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            interrupted: Vec::new(),
            skipped: Vec::new(),
            fail_fast_tripped: false,
        }
    }

    /// Compute in-degrees and placeholders, replay seeded decisions, fill the queue.
    fn setup(&mut self, schedulable: Vec<String>, gate_branches: bool) {
        self.remaining = schedulable.into_iter().collect();

        let degrees: Vec<(String, usize)> = self
            .remaining
            .iter()
            .map(|id| {
                let count = self
                    .ctx
                    .edge_index
                    .incoming(id)
                    .filter(|edge| self.counts_towards_in_degree(edge))
                    .count();
                (id.clone(), count)
            })
            .collect();
        self.in_degree.extend(degrees);

        if gate_branches {
            self.build_placeholders();
            self.replay_seeded_decisions();
        }

        let initial: Vec<String> = self.remaining.iter().cloned().collect();
        for id in initial {
            self.maybe_enqueue(&id);
        }
    }

    /// Edges from IfElse nodes gate through placeholders, not in-degree.
    fn counts_towards_in_degree(&self, edge: &Edge) -> bool {
        self.remaining.contains(&edge.source)
            && self
                .ctx
                .node(&edge.source)
                .is_some_and(|n| n.kind != NodeKind::IfElse)
    }

    fn build_placeholders(&mut self) {
        let gates: Vec<(String, Vec<String>)> = self
            .ctx
            .conditional_out_edges
            .iter()
            .filter(|(id, _)| {
                self.remaining.contains(*id) || self.ctx.if_else_decisions.contains_key(*id)
            })
            .map(|(id, branches)| {
                let targets = branches
                    .true_targets
                    .iter()
                    .chain(&branches.false_targets)
                    .cloned()
                    .collect();
                (id.clone(), targets)
            })
            .collect();

        for (if_else, targets) in gates {
            for target in targets {
                if self.remaining.contains(&target) {
                    self.ctx
                        .conditional_in_placeholders
                        .entry(target)
                        .or_default()
                        .insert(if_else.clone());
                }
            }
        }
    }

    fn replay_seeded_decisions(&mut self) {
        let mut decided: Vec<(String, bool)> = Vec::new();
        for id in self.ctx.conditional_out_edges.keys() {
            if self.remaining.contains(id) {
                continue;
            }
            let decision = match self.ctx.if_else_decisions.get(id) {
                Some(d) => Some(*d),
                None => self.ctx.output(id).map(decision_from_output),
            };
            if let Some(decision) = decision {
                decided.push((id.clone(), decision));
            }
        }
        decided.sort();

        for (id, decision) in decided {
            if self.ctx.disabled_nodes.contains(&id) {
                continue;
            }
            self.ctx
                .node_outputs
                .entry(id.clone())
                .or_insert_with(|| NodeValue::from(decision.to_string()));
            tracing::debug!(run_id = %self.run_id, node_id = %id, decision, "replaying seeded decision");
            self.materialize(&id, decision);
        }
    }

    // -- Queue --------------------------------------------------------------

    fn maybe_enqueue(&mut self, id: &str) {
        let ready = self.remaining.contains(id)
            && !self.started.contains(id)
            && !self.ctx.disabled_nodes.contains(id)
            && self.in_degree.get(id).copied().unwrap_or(0) == 0
            && self
                .ctx
                .conditional_in_placeholders
                .get(id)
                .is_none_or(HashSet::is_empty)
            && !self.ready.iter().any(|r| r == id);
        if !ready {
            return;
        }

        self.ready.push(id.to_string());
        let ctx = &self.ctx;
        self.ready.sort_by(|a, b| {
            let (na, nb) = (ctx.node(a), ctx.node(b));
            let (pa, pb) = (
                na.map(|n| n.position).unwrap_or_default(),
                nb.map(|n| n.position).unwrap_or_default(),
            );
            ctx.edge_index
                .priority(a)
                .cmp(&ctx.edge_index.priority(b))
                .then(pa.x.total_cmp(&pb.x))
                .then(pa.y.total_cmp(&pb.y))
                .then_with(|| a.cmp(b))
        });
    }

    fn kind_limit(&self, kind: NodeKind) -> usize {
        self.options
            .kind_limits
            .get(kind)
            .map_or(usize::MAX, |limit| limit.max(1))
    }

    fn can_admit(&self, id: &str) -> bool {
        let Some(node) = self.ctx.node(id) else {
            return false;
        };
        let running = self.running_by_kind.get(&node.kind).copied().unwrap_or(0);
        running < self.kind_limit(node.kind)
    }

    /// Admit ready nodes while the caps allow.
    fn try_start(&mut self) {
        let global = self
            .options
            .max_concurrency
            .map_or(usize::MAX, |limit| limit.max(1));

        while self.tasks.len() < global {
            let pick = match self.options.admission {
                AdmissionPolicy::HeadOfQueue => self
                    .ready
                    .first()
                    .filter(|id| self.can_admit(id))
                    .map(|_| 0),
                AdmissionPolicy::ScanReady => self.ready.iter().position(|id| self.can_admit(id)),
            };
            let Some(index) = pick else {
                break;
            };
            let id = self.ready.remove(index);
            self.admit(id);
        }
    }

    fn admit(&mut self, id: String) {
        let Some(node) = self.ctx.node(&id).cloned() else {
            return;
        };
        self.started.insert(id.clone());
        *self.running_by_kind.entry(node.kind).or_insert(0) += 1;

        tracing::debug!(run_id = %self.run_id, node_id = %id, kind = %node.kind, "admitting node");
        self.emit(NodeStatusUpdate::running(&id));

        let invocation = Invocation {
            inputs: self.ctx.combine_parent_outputs(&id),
            scope: self.ctx.template_scope(),
            node,
            mode: self.mode,
            cancel: self.token.clone(),
            sink: Arc::clone(&self.executor.sink),
            handlers: Arc::clone(&self.executor.handlers),
            depth: self.executor.depth,
            run_id: self.run_id,
            llm_timeout_secs: self.executor.llm_timeout_secs,
        };
        let kind = invocation.node.kind;

        self.tasks.spawn(async move {
            let result = AssertUnwindSafe(route_node_execution(invocation))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(NodeError::Failed(format!(
                        "handler panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
            (id, kind, result)
        });
    }

    // -- Completion ---------------------------------------------------------

    fn on_complete(&mut self, id: String, kind: NodeKind, result: Result<NodeOutput, NodeError>) {
        if let Some(running) = self.running_by_kind.get_mut(&kind) {
            *running = running.saturating_sub(1);
        }
        self.remaining.remove(&id);

        match result {
            Ok(_) if self.token.is_cancelled() => {
                // Finished after cancellation: the result is discarded.
                self.mark_interrupted(id);
            }
            Ok(output) => self.mark_completed(id, kind, output),
            Err(NodeError::Interrupted) => {
                let cancelled = self.token.is_cancelled();
                self.mark_interrupted(id.clone());
                if !cancelled {
                    self.skip_descendants(&id);
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(run_id = %self.run_id, node_id = %id, error = %message, "node failed");
                self.emit(NodeStatusUpdate::error(&id, &message));
                self.failed.push((id.clone(), message));
                match self.options.error_policy {
                    ErrorPolicy::FailFast => {
                        self.fail_fast_tripped = true;
                        self.token.cancel();
                    }
                    ErrorPolicy::ContinueSubgraph => self.skip_descendants(&id),
                }
            }
        }
    }

    fn mark_interrupted(&mut self, id: String) {
        self.emit(NodeStatusUpdate::interrupted(&id));
        self.interrupted.push(id);
    }

    fn mark_completed(&mut self, id: String, kind: NodeKind, output: NodeOutput) {
        if let Some(exit_code) = output.exit_code {
            self.ctx
                .cli_metadata
                .insert(id.clone(), CliMetadata { exit_code });
        }

        let variable_name = self
            .ctx
            .node(&id)
            .and_then(|n| n.data.variable_name.clone());
        if let Some(name) = variable_name {
            let text = output.value.to_text();
            match kind {
                NodeKind::Variable => {
                    self.ctx.variable_values.insert(name, text);
                }
                NodeKind::Accumulator => self.ctx.accumulate(&name, &text),
                _ => {}
            }
        }

        self.ctx.node_outputs.insert(id.clone(), output.value.clone());
        self.emit(NodeStatusUpdate::completed(&id, output.value.clone()));
        self.completed.push(id.clone());

        if kind == NodeKind::IfElse {
            self.materialize(&id, decision_from_output(&output.value));
        } else {
            self.release(&id);
        }
    }

    /// Unblock a finished (or pruned) node's dependents.
    fn release(&mut self, id: &str) {
        let is_if_else = self
            .ctx
            .node(id)
            .is_some_and(|n| n.kind == NodeKind::IfElse);

        let targets: Vec<String> = if is_if_else {
            let branches = self.ctx.conditional_out_edges.get(id);
            let targets: Vec<String> = branches
                .map(|b| b.true_targets.iter().chain(&b.false_targets).cloned().collect())
                .unwrap_or_default();
            for target in &targets {
                if let Some(gates) = self.ctx.conditional_in_placeholders.get_mut(target) {
                    gates.remove(id);
                }
            }
            targets
        } else {
            let targets: Vec<String> = self
                .ctx
                .edge_index
                .outgoing(id)
                .map(|e| e.target.clone())
                .collect();
            for target in &targets {
                if let Some(degree) = self.in_degree.get_mut(target) {
                    *degree = degree.saturating_sub(1);
                }
            }
            targets
        };

        for target in targets {
            self.maybe_enqueue(&target);
        }
    }

    /// Record an IfElse decision, open the chosen branch and prune the other.
    fn materialize(&mut self, id: &str, decision: bool) {
        self.ctx.if_else_decisions.insert(id.to_string(), decision);
        let Some(branches) = self.ctx.conditional_out_edges.get(id).cloned() else {
            return;
        };

        let chosen: HashSet<String> = branches.targets(decision).iter().cloned().collect();
        for target in &chosen {
            if let Some(gates) = self.ctx.conditional_in_placeholders.get_mut(target) {
                gates.remove(id);
            }
        }

        // Everything reachable from the other branch, except the chosen
        // branch's direct targets and nodes already started.
        let mut queue: VecDeque<String> = branches.targets(!decision).iter().cloned().collect();
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(node_id) = queue.pop_front() {
            if chosen.contains(&node_id) || self.started.contains(&node_id) {
                continue;
            }
            if !seen.insert(node_id.clone()) {
                continue;
            }
            queue.extend(self.ctx.edge_index.outgoing(&node_id).map(|e| e.target.clone()));
            self.disable(&node_id);
        }
        if !seen.is_empty() {
            tracing::debug!(
                run_id = %self.run_id,
                node_id = %id,
                decision,
                pruned = seen.len(),
                "branch materialized"
            );
        }

        for target in chosen {
            self.maybe_enqueue(&target);
        }
    }

    fn disable(&mut self, id: &str) {
        if !self.ctx.disabled_nodes.insert(id.to_string()) {
            return;
        }
        self.ready.retain(|r| r != id);
        if self.remaining.remove(id) {
            self.release(id);
        }
    }

    /// Drop every not-yet-started descendant of `id` from the run.
    fn skip_descendants(&mut self, id: &str) {
        let mut queue: VecDeque<String> =
            self.ctx.edge_index.outgoing(id).map(|e| e.target.clone()).collect();
        let mut count = 0;
        while let Some(node_id) = queue.pop_front() {
            if self.started.contains(&node_id) || !self.remaining.remove(&node_id) {
                continue;
            }
            self.ready.retain(|r| r != &node_id);
            queue.extend(self.ctx.edge_index.outgoing(&node_id).map(|e| e.target.clone()));
            self.skipped.push(node_id);
            count += 1;
        }
        if count > 0 {
            tracing::warn!(
                run_id = %self.run_id,
                node_id = %id,
                skipped = count,
                "descendants skipped"
            );
        }
    }

    // -- Main loop ----------------------------------------------------------

    fn halted(&self) -> bool {
        self.token.is_cancelled() || self.control.is_paused()
    }

    async fn drive(mut self) -> Result<RunReport, EngineError> {
        tracing::info!(
            run_id = %self.run_id,
            mode = %self.mode,
            depth = self.executor.depth,
            nodes = self.remaining.len(),
            "graph run started"
        );

        loop {
            if !self.halted() {
                self.try_start();
            }

            if self.tasks.is_empty() {
                if self.remaining.is_empty() || self.halted() {
                    break;
                }
                let pending = self.pending_nodes();
                tracing::warn!(run_id = %self.run_id, pending = pending.len(), "structural deadlock");
                return Err(EngineError::StructuralDeadlock { pending });
            }

            match self.tasks.join_next().await {
                Some(Ok((id, kind, result))) => self.on_complete(id, kind, result),
                Some(Err(e)) => {
                    self.token.cancel();
                    while self.tasks.join_next().await.is_some() {}
                    return Err(EngineError::TaskJoin(e.to_string()));
                }
                None => {}
            }
        }

        let status = self.final_status();
        tracing::info!(
            run_id = %self.run_id,
            status = ?status,
            completed = self.completed.len(),
            failed = self.failed.len(),
            interrupted = self.interrupted.len(),
            "graph run finished"
        );

        Ok(RunReport {
            run_id: self.run_id,
            status,
            context: self.ctx,
            completed: self.completed,
            failed: self.failed,
            interrupted: self.interrupted,
            skipped: self.skipped,
        })
    }

    fn final_status(&self) -> RunStatus {
        if self.fail_fast_tripped {
            RunStatus::Failed
        } else if self.token.is_cancelled() {
            RunStatus::Cancelled
        } else if self.control.is_paused() && !self.remaining.is_empty() {
            RunStatus::Paused
        } else if !self.failed.is_empty() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    fn pending_nodes(&self) -> Vec<PendingNode> {
        let mut ids: Vec<&String> = self.remaining.iter().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| {
                let mut waiting_on: Vec<String> = self
                    .ctx
                    .edge_index
                    .incoming(id)
                    .filter(|edge| self.counts_towards_in_degree(edge))
                    .map(|edge| edge.source.clone())
                    .collect();
                if let Some(gates) = self.ctx.conditional_in_placeholders.get(id) {
                    waiting_on.extend(gates.iter().cloned());
                }
                waiting_on.sort();
                waiting_on.dedup();
                PendingNode {
                    node_id: id.clone(),
                    waiting_on,
                }
            })
            .collect()
    }

    fn emit(&self, update: NodeStatusUpdate) {
        self.executor.sink.emit(StatusEvent::Node(update));
    }
}

fn decision_from_output(value: &NodeValue) -> bool {
    value.to_text().trim() == "true"
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
