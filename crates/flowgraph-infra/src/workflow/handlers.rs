//! Handler wiring for real runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowgraph_core::workflow::builtin::builtin_handlers;
use flowgraph_core::workflow::dispatch::{
    HandlerFuture, HandlerTable, Invocation, NodeError, NodeHandler, NodeOutput,
};
use flowgraph_core::workflow::subflow::SubflowRunner;
use flowgraph_types::config::EngineConfig;
use flowgraph_types::graph::NodeKind;

use super::command::{CommandError, ShellCommandRunner};
use crate::config::resolve_subflow_dir;
use crate::filesystem::subflow::FileSubflowRepository;

/// Handler for CLI nodes: the rendered content is the shell command.
///
/// A non-zero exit status still completes the node; the code is carried on
/// the output so that it lands in the run's CLI metadata.
pub fn cli_handler(runner: Arc<ShellCommandRunner>) -> NodeHandler {
    Arc::new(move |inv: Invocation| {
        let runner = Arc::clone(&runner);
        Box::pin(run_cli(inv, runner)) as HandlerFuture
    })
}

async fn run_cli(inv: Invocation, runner: Arc<ShellCommandRunner>) -> Result<NodeOutput, NodeError> {
    let command = inv.rendered_content();
    if command.trim().is_empty() {
        return Err(NodeError::Failed(format!(
            "CLI node '{}' has no command",
            inv.node.id
        )));
    }
    let cwd = inv.node.data.cwd.as_deref().map(PathBuf::from);

    match runner.run(&command, &inv.cancel, cwd.as_deref()).await {
        Ok(out) => {
            if out.exit_code != 0 {
                tracing::debug!(node_id = %inv.node.id, exit_code = out.exit_code, "command exited non-zero");
            }
            Ok(NodeOutput::with_exit_code(out.output, out.exit_code))
        }
        Err(CommandError::Cancelled) => Err(NodeError::Interrupted),
        Err(e) => Err(NodeError::Failed(e.to_string())),
    }
}

/// Built-in handlers plus CLI and Subflow, configured from `config`.
///
/// Subflow definitions are read from the configured subflow directory under
/// `data_dir`. LLM nodes stay unsupported until a prompt runner is added.
pub fn live_handlers(config: &EngineConfig, data_dir: &Path) -> HandlerTable {
    let mut table = builtin_handlers();
    table.insert(
        NodeKind::Cli,
        cli_handler(Arc::new(ShellCommandRunner::new(config.cli_output_limit))),
    );

    let repo = FileSubflowRepository::new(resolve_subflow_dir(config, data_dir));
    Arc::new(SubflowRunner::new(repo).with_options(config.run_options())).register(&mut table);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::event::MemorySink;
    use flowgraph_core::workflow::executor::{GraphExecutor, RunControl};
    use flowgraph_types::event::NodeStatus;
    use flowgraph_types::graph::{Edge, Node, NodeValue};
    use flowgraph_types::run::RunStatus;
    use tempfile::tempdir;

    #[test]
    fn test_live_handlers_cover_all_but_llm_and_loops() {
        let table = live_handlers(&EngineConfig::default(), Path::new("/tmp"));
        for kind in NodeKind::ALL {
            let expected = !matches!(kind, NodeKind::Llm | NodeKind::LoopStart | NodeKind::LoopEnd);
            assert_eq!(table.supports(kind), expected, "{kind}");
        }
    }

    #[tokio::test]
    async fn test_cli_pipeline_with_exit_codes() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::default();
        let sink = Arc::new(MemorySink::new());
        let executor = GraphExecutor::new(live_handlers(&config, dir.path()), sink.clone());

        let nodes = vec![
            Node::new("name", NodeKind::Input).with_content("world"),
            Node::new("greet", NodeKind::Cli).with_content("printf 'hello %s' '${1}'"),
            Node::new("fail", NodeKind::Cli).with_content("exit 4"),
            Node::new("show", NodeKind::Preview),
        ];
        let edges = vec![Edge::new("name", "greet"), Edge::new("greet", "show")];

        let report = executor
            .execute(&nodes, &edges, &config.run_options(), RunControl::new())
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.output("show"), Some(&NodeValue::from("hello world")));
        assert_eq!(report.context.cli_metadata["greet"].exit_code, 0);
        assert_eq!(report.context.cli_metadata["fail"].exit_code, 4);
        assert!(sink.nodes_with_status(NodeStatus::Completed).contains(&"fail".to_string()));
    }

    #[tokio::test]
    async fn test_subflow_loaded_from_data_dir() {
        let dir = tempdir().unwrap();
        let subflows = dir.path().join("subflows");
        tokio::fs::create_dir_all(&subflows).await.unwrap();
        tokio::fs::write(
            subflows.join("upper.json"),
            r#"{
  "id": "upper",
  "inputs": [{"id": "in"}],
  "outputs": [{"id": "out"}],
  "graph": {
    "nodes": [
      {"id": "si", "kind": "subflow_input", "data": {"port_id": "in"}},
      {"id": "tr", "kind": "cli", "data": {"content": "printf %s '${1}' | tr a-z A-Z"}},
      {"id": "so", "kind": "subflow_output", "data": {"port_id": "out"}}
    ],
    "edges": [
      {"id": "e1", "source": "si", "target": "tr"},
      {"id": "e2", "source": "tr", "target": "so"}
    ]
  }
}"#,
        )
        .await
        .unwrap();

        let config = EngineConfig::default();
        let executor = GraphExecutor::new(
            live_handlers(&config, dir.path()),
            Arc::new(MemorySink::new()),
        );
        let mut wrapper = Node::new("wrap", NodeKind::Subflow);
        wrapper.data.subflow_id = Some("upper".into());
        let nodes = vec![Node::new("src", NodeKind::Input).with_content("shout"), wrapper];
        let edges = vec![Edge::new("src", "wrap")];

        let report = executor
            .execute(&nodes, &edges, &config.run_options(), RunControl::new())
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Completed, "{:?}", report.failed);
        assert_eq!(
            report.output("wrap"),
            Some(&NodeValue::List(vec!["SHOUT".into()]))
        );
    }

    #[tokio::test]
    async fn test_blank_cli_command_fails() {
        let handler = cli_handler(Arc::new(ShellCommandRunner::default()));
        let executor = GraphExecutor::new(
            HandlerTable::new().with(NodeKind::Cli, move |inv| handler(inv)),
            Arc::new(MemorySink::new()),
        );
        let report = executor
            .execute(
                &[Node::new("c", NodeKind::Cli)],
                &[],
                &Default::default(),
                RunControl::new(),
            )
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(
            report.failed,
            vec![("c".to_string(), "CLI node 'c' has no command".to_string())]
        );
    }
}
