//! Execution context: the mutable state threaded through one graph run.
//!
//! `ExecutionContext` is created fresh per top-level run and per subflow
//! invocation, owned by the executor's control task, and discarded when the
//! run returns. Handlers never see it; they receive owned snapshots
//! (resolved inputs and a [`TemplateScope`]).

use std::collections::{BTreeMap, HashMap, HashSet};

use flowgraph_types::graph::{Edge, Node, NodeKind, NodeValue};
use flowgraph_types::run::Seeds;
use serde::Serialize;
use serde_json::{json, Value};

use super::resolve;

// ---------------------------------------------------------------------------
// Edge index
// ---------------------------------------------------------------------------

/// Edges indexed by ID, source and target, preserving declaration order.
#[derive(Debug, Clone, Default)]
pub struct EdgeIndex {
    edges: Vec<Edge>,
    by_id: HashMap<String, usize>,
    by_source: HashMap<String, Vec<usize>>,
    by_target: HashMap<String, Vec<usize>>,
    /// Position of each edge within the sorted list of edges sharing its target.
    stable_order: Vec<usize>,
}

impl EdgeIndex {
    pub fn new(edges: &[Edge]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_source: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_target: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            by_id.insert(edge.id.clone(), i);
            by_source.entry(edge.source.clone()).or_default().push(i);
            by_target.entry(edge.target.clone()).or_default().push(i);
        }

        let mut stable_order = vec![0; edges.len()];
        for positions in by_target.values() {
            let mut sorted = positions.clone();
            sorted.sort_by(|&a, &b| {
                let (ea, eb) = (&edges[a], &edges[b]);
                (&ea.source, &ea.target, &ea.source_handle, &ea.target_handle).cmp(&(
                    &eb.source,
                    &eb.target,
                    &eb.source_handle,
                    &eb.target_handle,
                ))
            });
            for (order, edge_pos) in sorted.into_iter().enumerate() {
                stable_order[edge_pos] = order;
            }
        }

        Self {
            edges: edges.to_vec(),
            by_id,
            by_source,
            by_target,
            stable_order,
        }
    }

    pub fn all(&self) -> &[Edge] {
        &self.edges
    }

    pub fn get(&self, edge_id: &str) -> Option<&Edge> {
        self.by_id.get(edge_id).map(|&i| &self.edges[i])
    }

    /// Edges leaving `node_id`, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.positions(&self.by_source, node_id)
            .map(move |i| &self.edges[i])
    }

    /// Edges entering `node_id`, in declaration order.
    pub fn incoming<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.positions(&self.by_target, node_id)
            .map(move |i| &self.edges[i])
    }

    /// Smallest stable-order index among the node's outgoing edges.
    ///
    /// `usize::MAX` for sinks, so that nodes feeding something sort first.
    pub fn priority(&self, node_id: &str) -> usize {
        self.positions(&self.by_source, node_id)
            .map(|i| self.stable_order[i])
            .min()
            .unwrap_or(usize::MAX)
    }

    fn positions<'a>(
        &'a self,
        map: &'a HashMap<String, Vec<usize>>,
        node_id: &str,
    ) -> impl Iterator<Item = usize> + 'a {
        map.get(node_id).into_iter().flatten().copied()
    }
}

// ---------------------------------------------------------------------------
// Per-IfElse bookkeeping
// ---------------------------------------------------------------------------

/// Direct targets of each branch of one IfElse node, deduplicated in edge order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalEdges {
    pub true_targets: Vec<String>,
    pub false_targets: Vec<String>,
}

impl ConditionalEdges {
    pub fn targets(&self, branch: bool) -> &[String] {
        if branch {
            &self.true_targets
        } else {
            &self.false_targets
        }
    }
}

/// Iteration state of a loop, keyed by loop name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopState {
    pub iteration: u32,
    pub max_iterations: Option<u32>,
}

/// Process metadata recorded for CLI nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CliMetadata {
    pub exit_code: i32,
}

// ---------------------------------------------------------------------------
// Template scope
// ---------------------------------------------------------------------------

/// Named values visible to `${name}` substitution, snapshotted at node admission.
///
/// Ordered maps keep substitution deterministic when values themselves
/// contain `${...}` references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateScope {
    pub loop_iterations: BTreeMap<String, u32>,
    pub accumulators: BTreeMap<String, String>,
    pub variables: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Mutable state of one run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Outputs of completed (or seeded) nodes keyed by node ID.
    pub node_outputs: HashMap<String, NodeValue>,
    /// Every node of the graph, active or not.
    pub node_index: HashMap<String, Node>,
    pub edge_index: EdgeIndex,
    pub if_else_decisions: HashMap<String, bool>,
    /// Nodes pruned by branch materialization.
    pub disabled_nodes: HashSet<String>,
    /// Branch targets per active IfElse node.
    pub conditional_out_edges: HashMap<String, ConditionalEdges>,
    /// For each gated target, the IfElse nodes whose decision it still awaits.
    pub conditional_in_placeholders: HashMap<String, HashSet<String>>,
    pub loop_states: HashMap<String, LoopState>,
    /// Keyed by variable name.
    pub accumulator_values: HashMap<String, String>,
    /// Keyed by variable name.
    pub variable_values: HashMap<String, String>,
    pub cli_metadata: HashMap<String, CliMetadata>,
}

impl ExecutionContext {
    /// Index a graph. Conditional out-edges are computed for active IfElse nodes.
    pub fn new(nodes: &[Node], edges: &[Edge]) -> Self {
        let node_index: HashMap<String, Node> =
            nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
        let edge_index = EdgeIndex::new(edges);

        let mut conditional_out_edges = HashMap::new();
        for node in nodes
            .iter()
            .filter(|n| n.active && n.kind == NodeKind::IfElse)
        {
            let mut branches = ConditionalEdges::default();
            for edge in edge_index.outgoing(&node.id) {
                let targets = if edge.branch() {
                    &mut branches.true_targets
                } else {
                    &mut branches.false_targets
                };
                if !targets.contains(&edge.target) {
                    targets.push(edge.target.clone());
                }
            }
            conditional_out_edges.insert(node.id.clone(), branches);
        }

        Self {
            node_index,
            edge_index,
            conditional_out_edges,
            ..Self::default()
        }
    }

    /// Inject results from a previous run. Only valid before scheduling starts.
    pub fn apply_seeds(&mut self, seeds: &Seeds) {
        for (id, value) in &seeds.outputs {
            self.node_outputs.insert(id.clone(), value.clone());
        }
        for (id, decision) in &seeds.decisions {
            self.if_else_decisions.insert(id.clone(), *decision);
        }
        for (name, value) in &seeds.variables {
            self.variable_values.insert(name.clone(), value.clone());
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.node_index.get(node_id)
    }

    pub fn output(&self, node_id: &str) -> Option<&NodeValue> {
        self.node_outputs.get(node_id)
    }

    /// The ordered, resolved parent values of `node_id`.
    pub fn combine_parent_outputs(&self, node_id: &str) -> Vec<String> {
        resolve::combine_parent_outputs_by_connection_order(self, node_id)
    }

    /// Snapshot of the values visible to `${name}` substitution.
    pub fn template_scope(&self) -> TemplateScope {
        TemplateScope {
            loop_iterations: self
                .loop_states
                .iter()
                .map(|(name, state)| (name.clone(), state.iteration))
                .collect(),
            accumulators: self
                .accumulator_values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            variables: self
                .variable_values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Append to an accumulator, newline separated.
    pub fn accumulate(&mut self, name: &str, value: &str) {
        let entry = self.accumulator_values.entry(name.to_string()).or_default();
        if !entry.is_empty() {
            entry.push('\n');
        }
        entry.push_str(value);
    }

    /// Serialize the observable state for reports and resume files.
    pub fn to_json(&self) -> Value {
        json!({
            "outputs": self.node_outputs,
            "decisions": self.if_else_decisions,
            "variables": self.variable_values,
            "accumulators": self.accumulator_values,
            "cli": self.cli_metadata,
            "disabled": sorted(&self.disabled_nodes),
        })
    }
}

fn sorted(set: &HashSet<String>) -> Vec<&String> {
    let mut items: Vec<&String> = set.iter().collect();
    items.sort();
    items
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::new(id, kind)
    }

    #[test]
    fn test_edge_index_lookups() {
        let edges = vec![Edge::new("a", "b"), Edge::new("a", "c"), Edge::new("b", "c")];
        let index = EdgeIndex::new(&edges);

        let out: Vec<&str> = index.outgoing("a").map(|e| e.target.as_str()).collect();
        assert_eq!(out, vec!["b", "c"]);
        let inc: Vec<&str> = index.incoming("c").map(|e| e.source.as_str()).collect();
        assert_eq!(inc, vec!["a", "b"]);
        assert_eq!(index.get("b->c").unwrap().source, "b");
        assert!(index.outgoing("zzz").next().is_none());
    }

    #[test]
    fn test_priority_uses_stable_order_within_target() {
        // Both feed d; sorted by source id, "b" < "c" regardless of declaration order.
        let edges = vec![Edge::new("c", "d"), Edge::new("b", "d")];
        let index = EdgeIndex::new(&edges);
        assert_eq!(index.priority("b"), 0);
        assert_eq!(index.priority("c"), 1);
        assert_eq!(index.priority("d"), usize::MAX);
    }

    #[test]
    fn test_conditional_out_edges_for_active_if_else() {
        let nodes = vec![
            node("x", NodeKind::IfElse),
            node("t", NodeKind::Preview),
            node("f", NodeKind::Preview),
        ];
        let edges = vec![
            Edge::new("x", "t").with_source_handle("true"),
            Edge::new("x", "f").with_source_handle("false"),
            Edge::new("x", "t").with_source_handle("true"),
        ];
        let ctx = ExecutionContext::new(&nodes, &edges);
        let branches = &ctx.conditional_out_edges["x"];
        assert_eq!(branches.true_targets, vec!["t"]);
        assert_eq!(branches.false_targets, vec!["f"]);
    }

    #[test]
    fn test_inactive_if_else_has_no_conditional_edges() {
        let mut x = node("x", NodeKind::IfElse);
        x.active = false;
        let ctx = ExecutionContext::new(&[x, node("t", NodeKind::Preview)], &[Edge::new("x", "t")]);
        assert!(ctx.conditional_out_edges.is_empty());
    }

    #[test]
    fn test_apply_seeds() {
        let mut ctx = ExecutionContext::new(&[node("a", NodeKind::Cli)], &[]);
        let mut seeds = Seeds::default();
        seeds.outputs.insert("a".into(), NodeValue::from("out"));
        seeds.decisions.insert("x".into(), false);
        seeds.variables.insert("name".into(), "v".into());
        ctx.apply_seeds(&seeds);

        assert_eq!(ctx.output("a"), Some(&NodeValue::from("out")));
        assert_eq!(ctx.if_else_decisions.get("x"), Some(&false));
        assert_eq!(ctx.template_scope().variables["name"], "v");
    }

    #[test]
    fn test_accumulate_appends_with_newlines() {
        let mut ctx = ExecutionContext::default();
        ctx.accumulate("log", "one");
        ctx.accumulate("log", "two");
        assert_eq!(ctx.accumulator_values["log"], "one\ntwo");
    }

    #[test]
    fn test_to_json_shape() {
        let mut ctx = ExecutionContext::default();
        ctx.node_outputs.insert("a".into(), NodeValue::from("x"));
        ctx.cli_metadata.insert("a".into(), CliMetadata { exit_code: 2 });
        ctx.disabled_nodes.insert("f".into());
        let json = ctx.to_json();
        assert_eq!(json["outputs"]["a"], "x");
        assert_eq!(json["cli"]["a"]["exit_code"], 2);
        assert_eq!(json["disabled"][0], "f");
    }
}
