//! Subflow definitions: reusable graphs with declared input and output ports.

use serde::{Deserialize, Serialize};

use crate::graph::{GraphDefinition, NodeKind};

/// A named port on a subflow boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubflowPort {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A nested graph invoked through a Subflow wrapper node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubflowDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Input ports; port `i` is fed by the wrapper's `i`-th ordered parent.
    #[serde(default)]
    pub inputs: Vec<SubflowPort>,
    /// Output ports; the wrapper's result lists one value per port, in this order.
    #[serde(default)]
    pub outputs: Vec<SubflowPort>,
    pub graph: GraphDefinition,
}

impl SubflowDefinition {
    /// Inner nodes that count towards wrapper progress: active, non-boundary.
    pub fn progress_total(&self) -> usize {
        self.graph
            .nodes
            .iter()
            .filter(|n| n.active && !n.kind.is_subflow_boundary())
            .count()
    }

    /// The inner boundary node bound to `port_id` of the given kind.
    pub fn boundary_node(&self, kind: NodeKind, port_id: &str) -> Option<&crate::graph::Node> {
        self.graph
            .nodes
            .iter()
            .find(|n| n.kind == kind && n.data.port_id.as_deref() == Some(port_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn sample() -> SubflowDefinition {
        let mut input = Node::new("si", NodeKind::SubflowInput);
        input.data.port_id = Some("p-in".into());
        let mut output = Node::new("so", NodeKind::SubflowOutput);
        output.data.port_id = Some("p-out".into());
        let mut off = Node::new("off", NodeKind::Preview);
        off.active = false;
        SubflowDefinition {
            id: "sf".into(),
            name: "Sample".into(),
            inputs: vec![SubflowPort { id: "p-in".into(), name: "in".into() }],
            outputs: vec![SubflowPort { id: "p-out".into(), name: "out".into() }],
            graph: GraphDefinition {
                nodes: vec![input, Node::new("work", NodeKind::Cli), output, off],
                edges: vec![],
            },
        }
    }

    #[test]
    fn test_progress_total_excludes_boundary_and_inactive() {
        assert_eq!(sample().progress_total(), 1);
    }

    #[test]
    fn test_boundary_node_lookup() {
        let def = sample();
        assert_eq!(def.boundary_node(NodeKind::SubflowOutput, "p-out").unwrap().id, "so");
        assert!(def.boundary_node(NodeKind::SubflowInput, "p-out").is_none());
    }
}
