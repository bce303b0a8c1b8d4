//! Data-flow resolution: ordering a node's parent values and substituting
//! them into templates.
//!
//! Active Input nodes are scheduled like any other node, but consumers never
//! read their stored output: the value is recomputed at consumption time from
//! the Input's own parents. Resolution recurses through chains of Input nodes
//! with a path-local visited set guarding against cycles.

use std::collections::HashSet;

use flowgraph_types::graph::{Edge, NodeKind};

use super::context::{ExecutionContext, TemplateScope};

/// Ordered, resolved values of every parent of `node_id`.
///
/// Edges carrying an `in-N` target handle come first, sorted by `N`; the
/// rest follow in declaration order.
pub fn combine_parent_outputs_by_connection_order(
    ctx: &ExecutionContext,
    node_id: &str,
) -> Vec<String> {
    let scope = ctx.template_scope();
    let mut visited = HashSet::new();
    resolve_parents(ctx, node_id, &scope, &mut visited)
}

fn resolve_parents(
    ctx: &ExecutionContext,
    node_id: &str,
    scope: &TemplateScope,
    visited: &mut HashSet<String>,
) -> Vec<String> {
    if !visited.insert(node_id.to_string()) {
        return Vec::new();
    }
    let values = ordered_incoming(ctx, node_id)
        .into_iter()
        .map(|edge| resolve_edge(ctx, edge, scope, visited))
        .collect();
    visited.remove(node_id);
    values
}

fn resolve_edge(
    ctx: &ExecutionContext,
    edge: &Edge,
    scope: &TemplateScope,
    visited: &mut HashSet<String>,
) -> String {
    let value = match ctx.node(&edge.source) {
        Some(parent) if parent.kind == NodeKind::Input && parent.active => {
            let inputs = resolve_parents(ctx, &parent.id, scope, visited);
            replace_indexed_inputs(&parent.data.content, &inputs, scope)
        }
        _ => ctx
            .output(&edge.source)
            .map(|value| value.select(edge.output_index()))
            .unwrap_or_default(),
    };
    normalize_newlines(value)
}

fn ordered_incoming<'a>(ctx: &'a ExecutionContext, node_id: &str) -> Vec<&'a Edge> {
    let (mut indexed, plain): (Vec<&Edge>, Vec<&Edge>) = ctx
        .edge_index
        .incoming(node_id)
        .partition(|edge| edge.input_index().is_some());
    // sort_by_key is stable: equal indices keep declaration order.
    indexed.sort_by_key(|edge| edge.input_index());
    indexed.extend(plain);
    indexed
}

fn normalize_newlines(value: String) -> String {
    if value.contains("\r\n") {
        value.replace("\r\n", "\n")
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Template substitution
// ---------------------------------------------------------------------------

/// Substitute `${1..N}` with 1-indexed `inputs`, then `${name}` from the scope.
///
/// Named passes run in order: loop iterations, accumulators, variables.
/// Out-of-range positions become empty; unknown names are left verbatim.
/// Values are inserted as-is, without shell escaping.
pub fn replace_indexed_inputs(template: &str, inputs: &[String], scope: &TemplateScope) -> String {
    let mut result = replace_positional(template, inputs);

    for (name, iteration) in &scope.loop_iterations {
        result = replace_named(&result, name, &iteration.to_string());
    }
    for (name, value) in &scope.accumulators {
        result = replace_named(&result, name, value);
    }
    for (name, value) in &scope.variables {
        result = replace_named(&result, name, value);
    }
    result
}

fn replace_positional(template: &str, inputs: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        if digits > 0 && after[digits..].starts_with('}') {
            let value = after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| inputs.get(i));
            if let Some(value) = value {
                out.push_str(value);
            }
            rest = &after[digits + 1..];
        } else {
            out.push_str("${");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

fn replace_named(text: &str, name: &str, value: &str) -> String {
    let pattern = format!("${{{name}}}");
    if text.contains(&pattern) {
        text.replace(&pattern, value)
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::LoopState;
    use flowgraph_types::graph::{Node, NodeValue};

    fn inputs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_substitution() {
        let scope = TemplateScope::default();
        assert_eq!(replace_indexed_inputs("${1}-${2}", &inputs(&["x", "y"]), &scope), "x-y");
        assert_eq!(replace_indexed_inputs("${1}-${2}", &inputs(&["x"]), &scope), "x-");
        assert_eq!(replace_indexed_inputs("${0}|${10}", &inputs(&["x"]), &scope), "|");
    }

    #[test]
    fn test_positional_values_are_not_rescanned() {
        let scope = TemplateScope::default();
        let result = replace_indexed_inputs("${1} ${2}", &inputs(&["${2}", "b"]), &scope);
        assert_eq!(result, "${2} b");
    }

    #[test]
    fn test_unknown_names_left_verbatim() {
        let scope = TemplateScope::default();
        assert_eq!(
            replace_indexed_inputs("echo ${HOME} ${ $x", &[], &scope),
            "echo ${HOME} ${ $x"
        );
    }

    #[test]
    fn test_named_substitution_precedence() {
        let mut scope = TemplateScope::default();
        scope.loop_iterations.insert("i".into(), 3);
        scope.accumulators.insert("log".into(), "a\nb".into());
        scope.variables.insert("i".into(), "shadowed".into());
        scope.variables.insert("name".into(), "world".into());

        let result = replace_indexed_inputs("${i}:${log}:hello ${name}", &[], &scope);
        assert_eq!(result, "3:a\nb:hello world");
    }

    fn preview(id: &str) -> Node {
        Node::new(id, NodeKind::Preview)
    }

    #[test]
    fn test_diamond_inputs_follow_declaration_order() {
        let nodes = vec![preview("a"), preview("b"), preview("c"), preview("d")];
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];
        let mut ctx = ExecutionContext::new(&nodes, &edges);
        ctx.node_outputs.insert("b".into(), NodeValue::from("from-b"));
        ctx.node_outputs.insert("c".into(), NodeValue::from("from-c"));

        assert_eq!(ctx.combine_parent_outputs("d"), vec!["from-b", "from-c"]);
    }

    #[test]
    fn test_indexed_handles_sort_before_plain_edges() {
        let nodes = vec![preview("p"), preview("q"), preview("r"), preview("t")];
        let edges = vec![
            Edge::new("r", "t"),
            Edge::new("q", "t").with_target_handle("in-2"),
            Edge::new("p", "t").with_target_handle("in-1"),
        ];
        let mut ctx = ExecutionContext::new(&nodes, &edges);
        for id in ["p", "q", "r"] {
            ctx.node_outputs.insert(id.into(), NodeValue::from(id));
        }
        assert_eq!(ctx.combine_parent_outputs("t"), vec!["p", "q", "r"]);
    }

    #[test]
    fn test_indexed_handles_sort_numerically() {
        let nodes = vec![preview("ten"), preview("two"), preview("nine"), preview("t")];
        let edges = vec![
            Edge::new("ten", "t").with_target_handle("in-10"),
            Edge::new("two", "t").with_target_handle("in-2"),
            Edge::new("nine", "t").with_target_handle("in-9"),
        ];
        let mut ctx = ExecutionContext::new(&nodes, &edges);
        for id in ["ten", "two", "nine"] {
            ctx.node_outputs.insert(id.into(), NodeValue::from(id));
        }
        assert_eq!(ctx.combine_parent_outputs("t"), vec!["two", "nine", "ten"]);
    }

    #[test]
    fn test_list_outputs_select_by_source_handle() {
        let nodes = vec![Node::new("s", NodeKind::Subflow), preview("t")];
        let edges = vec![
            Edge::new("s", "t").with_source_handle("out-1"),
            Edge::new("s", "t").with_source_handle("out-9"),
            Edge::new("s", "t"),
        ];
        let mut ctx = ExecutionContext::new(&nodes, &edges);
        ctx.node_outputs
            .insert("s".into(), NodeValue::List(vec!["zero".into(), "one".into()]));

        assert_eq!(
            ctx.combine_parent_outputs("t"),
            vec!["one", "zero\none", "zero\none"]
        );
    }

    #[test]
    fn test_missing_output_and_crlf() {
        let nodes = vec![preview("a"), preview("b"), preview("t")];
        let edges = vec![Edge::new("a", "t"), Edge::new("b", "t")];
        let mut ctx = ExecutionContext::new(&nodes, &edges);
        ctx.node_outputs.insert("b".into(), NodeValue::from("x\r\ny"));
        assert_eq!(ctx.combine_parent_outputs("t"), vec!["", "x\ny"]);
    }

    #[test]
    fn test_input_nodes_resolve_lazily_through_chain() {
        let nodes = vec![
            preview("src"),
            Node::new("in1", NodeKind::Input).with_content("[${1}]"),
            Node::new("in2", NodeKind::Input).with_content("<${1}> ${name}"),
            preview("t"),
        ];
        let edges = vec![
            Edge::new("src", "in1"),
            Edge::new("in1", "in2"),
            Edge::new("in2", "t"),
        ];
        let mut ctx = ExecutionContext::new(&nodes, &edges);
        ctx.node_outputs.insert("src".into(), NodeValue::from("v"));
        ctx.variable_values.insert("name".into(), "n".into());

        assert_eq!(ctx.combine_parent_outputs("t"), vec!["<[v]> n"]);
    }

    #[test]
    fn test_inactive_input_reads_outputs() {
        let mut input = Node::new("in", NodeKind::Input).with_content("ignored");
        input.active = false;
        let ctx = ExecutionContext::new(&[input, preview("t")], &[Edge::new("in", "t")]);
        assert_eq!(ctx.combine_parent_outputs("t"), vec![""]);
    }

    #[test]
    fn test_input_cycle_terminates() {
        let nodes = vec![
            Node::new("i1", NodeKind::Input).with_content("a${1}"),
            Node::new("i2", NodeKind::Input).with_content("b${1}"),
            preview("t"),
        ];
        let edges = vec![
            Edge::new("i2", "i1"),
            Edge::new("i1", "i2"),
            Edge::new("i1", "t"),
        ];
        let ctx = ExecutionContext::new(&nodes, &edges);
        // t <- i1 <- i2 <- i1 (revisited: no parents)
        assert_eq!(ctx.combine_parent_outputs("t"), vec!["aba"]);
    }

    #[test]
    fn test_loop_state_in_scope() {
        let mut ctx = ExecutionContext::default();
        ctx.loop_states.insert(
            "outer".into(),
            LoopState {
                iteration: 2,
                max_iterations: Some(5),
            },
        );
        let scope = ctx.template_scope();
        assert_eq!(replace_indexed_inputs("#${outer}", &[], &scope), "#2");
    }
}
