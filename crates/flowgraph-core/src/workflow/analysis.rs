//! Pure graph analysis: wave computation and IfElse branch reachability.
//!
//! Nothing here runs nodes. Waves describe which nodes could run together if
//! every node took the same time; the scheduler itself admits nodes as soon
//! as their inputs are ready and does not consult the wave plan.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use flowgraph_types::graph::{Edge, Node, NodeKind};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef, NodeFiltered};

/// Flow graph with edge weights holding each edge's position in the edge list.
type FlowGraph<'a> = DiGraph<&'a Node, usize>;

/// Build a `DiGraph` over the nodes accepted by `keep`. Edges touching any
/// other node, or an unknown ID, are left out. Duplicate IDs keep the first node.
fn build_graph<'a>(
    nodes: &'a [Node],
    edges: &[Edge],
    keep: impl Fn(&Node) -> bool,
) -> FlowGraph<'a> {
    let mut graph = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes.iter().filter(|n| keep(n)) {
        index
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node));
    }
    for (position, edge) in edges.iter().enumerate() {
        if let (Some(&source), Some(&target)) =
            (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
        {
            graph.add_edge(source, target, position);
        }
    }
    graph
}

// ---------------------------------------------------------------------------
// Wave plan
// ---------------------------------------------------------------------------

/// Wave assignment of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Index(usize),
    /// Loop nodes are not scheduled by the parallel engine.
    Unsupported,
}

/// Result of [`compute_waves`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WavePlan {
    /// Node IDs in the order the topological pass visited them.
    pub order: Vec<String>,
    /// `waves[i]` lists the nodes of wave `i`, in visit order.
    pub waves: Vec<Vec<String>>,
    pub assignments: HashMap<String, Wave>,
    /// Nodes that could only be placed through the minimum-indegree fallback.
    pub cyclic: Vec<String>,
    /// Members of each cycle (strongly connected component), in visit order.
    pub cycles: Vec<Vec<String>>,
    pub unsupported: Vec<String>,
}

impl WavePlan {
    pub fn wave_of(&self, node_id: &str) -> Option<Wave> {
        self.assignments.get(node_id).copied()
    }

    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Sort key used when several nodes are ready at once.
struct Priority<'a> {
    first_edge: usize,
    x: f64,
    y: f64,
    id: &'a str,
}

impl<'a> Priority<'a> {
    fn of(graph: &FlowGraph<'a>, idx: NodeIndex) -> Self {
        let node: &'a Node = graph[idx];
        Priority {
            first_edge: graph
                .edges_directed(idx, Outgoing)
                .map(|e| *e.weight())
                .min()
                .unwrap_or(usize::MAX),
            x: node.position.x,
            y: node.position.y,
            id: node.id.as_str(),
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        self.first_edge
            .cmp(&other.first_edge)
            .then_with(|| self.x.total_cmp(&other.x))
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.id.cmp(other.id))
    }
}

/// Assign every non-loop node a wave index with a priority-ordered Kahn pass.
///
/// A node's wave is one past the highest wave among its already placed
/// parents. Ready ties break on the node's first position as an edge source,
/// then `x`, `y` and ID. When only cyclic nodes remain, the one with the
/// fewest unmet dependencies is placed next and reported in `cyclic`.
pub fn compute_waves(nodes: &[Node], edges: &[Edge]) -> WavePlan {
    let mut plan = WavePlan::default();
    for node in nodes.iter().filter(|n| n.kind.is_loop()) {
        plan.assignments.insert(node.id.clone(), Wave::Unsupported);
        plan.unsupported.push(node.id.clone());
    }

    let graph = build_graph(nodes, edges, |n| !n.kind.is_loop());
    let priorities: Vec<Priority<'_>> = graph
        .node_indices()
        .map(|idx| Priority::of(&graph, idx))
        .collect();
    let by_priority = |a: &NodeIndex, b: &NodeIndex| priorities[a.index()].cmp(&priorities[b.index()]);

    let mut indegree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.neighbors_directed(idx, Incoming).count())
        .collect();
    let mut placed: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut ready: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|idx| indegree[idx.index()] == 0)
        .collect();

    while plan.order.len() < graph.node_count() {
        let next = if ready.is_empty() {
            // Cycle: fall back to the remaining node with the fewest unmet edges.
            let fallback = graph
                .node_indices()
                .filter(|idx| placed[idx.index()].is_none())
                .min_by(|a, b| {
                    indegree[a.index()]
                        .cmp(&indegree[b.index()])
                        .then_with(|| by_priority(a, b))
                });
            let Some(idx) = fallback else { break };
            plan.cyclic.push(graph[idx].id.clone());
            idx
        } else {
            ready.sort_by(by_priority);
            ready.remove(0)
        };

        let wave = graph
            .neighbors_directed(next, Incoming)
            .filter_map(|parent| placed[parent.index()])
            .map(|w| w + 1)
            .max()
            .unwrap_or(0);
        placed[next.index()] = Some(wave);
        plan.order.push(graph[next].id.clone());

        for child in graph.neighbors_directed(next, Outgoing) {
            let i = child.index();
            if placed[i].is_some() || indegree[i] == 0 {
                continue;
            }
            indegree[i] -= 1;
            if indegree[i] == 0 && !ready.contains(&child) {
                ready.push(child);
            }
        }
        ready.retain(|idx| placed[idx.index()].is_none());
    }

    for idx in graph.node_indices() {
        let Some(wave) = placed[idx.index()] else { continue };
        if plan.waves.len() <= wave {
            plan.waves.resize_with(wave + 1, Vec::new);
        }
        plan.assignments
            .insert(graph[idx].id.clone(), Wave::Index(wave));
    }
    for id in &plan.order {
        if let Some(Wave::Index(wave)) = plan.assignments.get(id) {
            plan.waves[*wave].push(id.clone());
        }
    }

    if is_cyclic_directed(&graph) {
        plan.cycles = strongly_connected_cycles(&graph, &plan.order);
        tracing::warn!(cycles = ?plan.cycles, "graph contains a cycle");
    }
    plan
}

/// Components of more than one node, or a node with an edge to itself.
fn strongly_connected_cycles(graph: &FlowGraph<'_>, order: &[String]) -> Vec<Vec<String>> {
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let rank = |id: &str| position.get(id).copied().unwrap_or(usize::MAX);

    let mut cycles: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| match scc.as_slice() {
            [single] => graph.contains_edge(*single, *single),
            members => !members.is_empty(),
        })
        .map(|scc| {
            let mut ids: Vec<String> = scc.iter().map(|&idx| graph[idx].id.clone()).collect();
            ids.sort_by_key(|id| rank(id.as_str()));
            ids
        })
        .collect();
    cycles.sort_by_key(|ids| ids.first().map_or(usize::MAX, |id| rank(id.as_str())));
    cycles
}

// ---------------------------------------------------------------------------
// Branch reachability
// ---------------------------------------------------------------------------

/// Nodes downstream of one IfElse node, split by branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSets {
    pub true_only: BTreeSet<String>,
    pub false_only: BTreeSet<String>,
    /// Reached from both branches.
    pub merge: BTreeSet<String>,
}

/// For each IfElse node, the nodes reachable only through its true branch,
/// only through its false branch, and through both.
pub fn branch_reachability(nodes: &[Node], edges: &[Edge]) -> BTreeMap<String, BranchSets> {
    let graph = build_graph(nodes, edges, |_| true);

    let mut result = BTreeMap::new();
    for origin in graph.node_indices() {
        let node: &Node = graph[origin];
        if node.kind != NodeKind::IfElse {
            continue;
        }
        let starts = |branch: bool| -> Vec<NodeIndex> {
            graph
                .edges_directed(origin, Outgoing)
                .filter(|e| edges[*e.weight()].branch() == branch)
                .map(|e| e.target())
                .collect()
        };
        let reached_true = reachable(&graph, origin, &starts(true));
        let reached_false = reachable(&graph, origin, &starts(false));

        let mut sets = BranchSets::default();
        for id in &reached_true {
            if reached_false.contains(id) {
                sets.merge.insert(id.to_string());
            } else {
                sets.true_only.insert(id.to_string());
            }
        }
        sets.false_only = reached_false
            .iter()
            .filter(|id| !reached_true.contains(*id))
            .map(|id| id.to_string())
            .collect();
        result.insert(node.id.clone(), sets);
    }
    result
}

/// BFS from `starts` over the graph with `origin` removed.
fn reachable<'a>(
    graph: &FlowGraph<'a>,
    origin: NodeIndex,
    starts: &[NodeIndex],
) -> HashSet<&'a str> {
    let without_origin = NodeFiltered::from_fn(graph, |idx| idx != origin);
    let mut seen = HashSet::new();
    for &start in starts.iter().filter(|&&s| s != origin) {
        let mut bfs = Bfs::new(&without_origin, start);
        while let Some(idx) = bfs.next(&without_origin) {
            let node: &'a Node = graph[idx];
            seen.insert(node.id.as_str());
        }
    }
    seen
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
