//! LLM node handler: streams a prompt through a [`PromptRunner`].
//!
//! Content chunks are forwarded to the status sink as they arrive and
//! concatenated into the node's output. Tool approval requests go through the
//! [`ApprovalGate`]; an aborted approval interrupts the node.

use std::sync::Arc;

use flowgraph_types::event::StatusEvent;
use futures_util::StreamExt;

use crate::workflow::dispatch::{HandlerFuture, Invocation, NodeError, NodeHandler, NodeOutput};

use super::prompt::{ApprovalDecision, ApprovalGate, AssistantEvent, PromptRunner, PromptSettings};

/// Build the handler for the LLM kind.
pub fn llm_handler(
    runner: Arc<dyn PromptRunner>,
    approvals: Arc<dyn ApprovalGate>,
    settings: PromptSettings,
) -> NodeHandler {
    Arc::new(move |inv: Invocation| {
        let runner = Arc::clone(&runner);
        let approvals = Arc::clone(&approvals);
        let settings = settings.clone();
        Box::pin(run_llm(inv, runner, approvals, settings)) as HandlerFuture
    })
}

async fn run_llm(
    inv: Invocation,
    runner: Arc<dyn PromptRunner>,
    approvals: Arc<dyn ApprovalGate>,
    settings: PromptSettings,
) -> Result<NodeOutput, NodeError> {
    let prompt = if inv.node.data.content.trim().is_empty() {
        inv.joined_inputs()
    } else {
        inv.rendered_content()
    };
    let mut stream = runner.run_prompt(
        prompt,
        inv.node.data.model.clone(),
        settings,
        inv.cancel.clone(),
    );

    let mut reply = String::new();
    loop {
        let event = tokio::select! {
            biased;
            _ = inv.cancel.cancelled() => return Err(NodeError::Interrupted),
            event = stream.next() => event,
        };

        match event {
            None | Some(AssistantEvent::Done) => break,
            Some(AssistantEvent::Content(chunk)) => {
                inv.emit(StatusEvent::AssistantContent {
                    node_id: inv.node.id.clone(),
                    content: chunk.clone(),
                });
                reply.push_str(&chunk);
            }
            Some(AssistantEvent::ToolApproval { tool }) => {
                let decision = tokio::select! {
                    biased;
                    _ = inv.cancel.cancelled() => return Err(NodeError::Interrupted),
                    decision = approvals.request_approval(&inv.node.id, &tool) => decision,
                };
                if decision == ApprovalDecision::Aborted {
                    tracing::info!(node_id = %inv.node.id, tool = %tool, "tool approval aborted");
                    return Err(NodeError::Interrupted);
                }
            }
            Some(AssistantEvent::Error(message)) => return Err(NodeError::Failed(message)),
        }
    }

    Ok(NodeOutput::from(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;
    use crate::llm::prompt::{AssistantStream, AutoApprove};
    use crate::workflow::dispatch::tests::invocation;
    use crate::workflow::dispatch::HandlerTable;
    use flowgraph_types::graph::{Node, NodeKind, NodeValue};
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Replays a fixed script and records what it was asked.
    struct ScriptedRunner {
        script: Vec<AssistantEvent>,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedRunner {
        fn new(script: Vec<AssistantEvent>) -> Arc<Self> {
            Arc::new(Self {
                script,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl PromptRunner for ScriptedRunner {
        fn run_prompt(
            &self,
            prompt: String,
            model: Option<String>,
            _settings: PromptSettings,
            _cancel: CancellationToken,
        ) -> AssistantStream {
            self.seen.lock().unwrap().push((prompt, model));
            futures_util::stream::iter(self.script.clone()).boxed()
        }
    }

    /// Never produces an event.
    struct SilentRunner;

    impl PromptRunner for SilentRunner {
        fn run_prompt(
            &self,
            _prompt: String,
            _model: Option<String>,
            _settings: PromptSettings,
            _cancel: CancellationToken,
        ) -> AssistantStream {
            futures_util::stream::pending::<AssistantEvent>().boxed()
        }
    }

    struct Deny;

    impl ApprovalGate for Deny {
        fn request_approval(&self, _node_id: &str, _tool: &str) -> BoxFuture<'static, ApprovalDecision> {
            Box::pin(async { ApprovalDecision::Aborted })
        }
    }

    fn llm_node() -> Node {
        let mut node = Node::new("ask", NodeKind::Llm).with_content("Summarize: ${1}");
        node.data.model = Some("small".into());
        node
    }

    async fn run_with(
        runner: Arc<dyn PromptRunner>,
        approvals: Arc<dyn ApprovalGate>,
        sink: Arc<MemorySink>,
    ) -> Result<NodeOutput, NodeError> {
        let handler = llm_handler(runner, approvals, PromptSettings::default());
        let mut inv = invocation(llm_node(), &["the text"], HandlerTable::new());
        inv.sink = sink;
        handler(inv).await
    }

    #[tokio::test]
    async fn test_streams_content_into_output() {
        let runner = ScriptedRunner::new(vec![
            AssistantEvent::Content("Short ".into()),
            AssistantEvent::ToolApproval { tool: "search".into() },
            AssistantEvent::Content("summary.".into()),
            AssistantEvent::Done,
            AssistantEvent::Content("ignored".into()),
        ]);
        let sink = Arc::new(MemorySink::new());

        let out = run_with(runner.clone(), Arc::new(AutoApprove), sink.clone())
            .await
            .unwrap();

        assert_eq!(out.value, NodeValue::from("Short summary."));
        assert_eq!(
            runner.seen.lock().unwrap()[0],
            ("Summarize: the text".to_string(), Some("small".to_string()))
        );
        let chunks: Vec<String> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::AssistantContent { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec!["Short ", "summary."]);
    }

    #[tokio::test]
    async fn test_aborted_approval_interrupts() {
        let runner = ScriptedRunner::new(vec![AssistantEvent::ToolApproval { tool: "rm".into() }]);
        let err = run_with(runner, Arc::new(Deny), Arc::new(MemorySink::new()))
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Interrupted);
    }

    #[tokio::test]
    async fn test_stream_error_fails_node() {
        let runner = ScriptedRunner::new(vec![AssistantEvent::Error("rate limited".into())]);
        let err = run_with(runner, Arc::new(AutoApprove), Arc::new(MemorySink::new()))
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Failed("rate limited".into()));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_stream() {
        let handler = llm_handler(Arc::new(SilentRunner), Arc::new(AutoApprove), PromptSettings::default());
        let inv = invocation(llm_node(), &[], HandlerTable::new());
        let cancel = inv.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel.cancel();
        });
        assert_eq!(handler(inv).await.unwrap_err(), NodeError::Interrupted);
    }
}
