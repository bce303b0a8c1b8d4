//! Handlers for the kinds that need no external collaborator.
//!
//! Side effects of Variable and Accumulator nodes are applied by the
//! executor when the node completes; the handlers here only compute values.

use flowgraph_types::graph::NodeKind;

use super::condition::evaluate_condition;
use super::dispatch::{HandlerTable, Invocation, NodeError, NodeOutput};

/// Handlers for Preview, Input, Variable, Accumulator, IfElse and the
/// subflow boundary kinds.
pub fn builtin_handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    for kind in [
        NodeKind::Preview,
        NodeKind::Variable,
        NodeKind::Accumulator,
        NodeKind::SubflowOutput,
    ] {
        table.register(kind, |inv: Invocation| async move { Ok(passthrough(&inv)) });
    }
    table.register(NodeKind::Input, |inv: Invocation| async move {
        Ok(NodeOutput::from(inv.rendered_content()))
    });
    table.register(NodeKind::SubflowInput, |inv: Invocation| async move {
        Ok(NodeOutput::from(inv.joined_inputs()))
    });
    table.register(NodeKind::IfElse, |inv: Invocation| async move { run_if_else(&inv) });
    table
}

/// Rendered content, or the joined inputs when the node has no content.
fn passthrough(inv: &Invocation) -> NodeOutput {
    if inv.node.data.content.trim().is_empty() {
        NodeOutput::from(inv.joined_inputs())
    } else {
        NodeOutput::from(inv.rendered_content())
    }
}

fn run_if_else(inv: &Invocation) -> Result<NodeOutput, NodeError> {
    let decision = evaluate_condition(&inv.rendered_content())?;
    tracing::debug!(node_id = %inv.node.id, decision, "if/else evaluated");
    Ok(NodeOutput::from(if decision { "true" } else { "false" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::dispatch::route_node_execution;
    use crate::workflow::dispatch::tests::invocation;
    use flowgraph_types::graph::{Node, NodeValue};

    async fn run(node: Node, inputs: &[&str]) -> Result<NodeValue, NodeError> {
        route_node_execution(invocation(node, inputs, builtin_handlers()))
            .await
            .map(|out| out.value)
    }

    #[tokio::test]
    async fn test_preview_passes_inputs_through() {
        let value = run(Node::new("p", NodeKind::Preview), &["a", "b"]).await.unwrap();
        assert_eq!(value, NodeValue::from("a\nb"));
    }

    #[tokio::test]
    async fn test_variable_renders_content() {
        let node = Node::new("v", NodeKind::Variable).with_content("<${1}>");
        assert_eq!(run(node, &["x"]).await.unwrap(), NodeValue::from("<x>"));
    }

    #[tokio::test]
    async fn test_if_else_decisions() {
        let node = Node::new("x", NodeKind::IfElse).with_content("a === a");
        assert_eq!(run(node, &[]).await.unwrap(), NodeValue::from("true"));

        let node = Node::new("x", NodeKind::IfElse).with_content("${1} == yes");
        assert_eq!(run(node, &["no"]).await.unwrap(), NodeValue::from("false"));
    }

    #[tokio::test]
    async fn test_if_else_empty_condition_fails() {
        let err = run(Node::new("x", NodeKind::IfElse), &[]).await.unwrap_err();
        assert_eq!(err, NodeError::Failed("Condition is empty".into()));
    }

    #[tokio::test]
    async fn test_cli_and_llm_are_not_builtin() {
        let table = builtin_handlers();
        assert!(!table.supports(NodeKind::Cli));
        assert!(!table.supports(NodeKind::Llm));
        assert!(!table.supports(NodeKind::Subflow));
        assert!(!table.supports(NodeKind::LoopStart));
    }
}
