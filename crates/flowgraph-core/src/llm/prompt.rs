//! PromptRunner and ApprovalGate trait definitions.
//!
//! `run_prompt` returns a boxed stream (not RPITIT) so that runners can be
//! held as `Arc<dyn PromptRunner>` inside a handler table.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// One event of a streamed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    /// A chunk of reply text.
    Content(String),
    /// The assistant wants to call a tool that needs user consent.
    ToolApproval { tool: String },
    Done,
    Error(String),
}

/// Provider-independent generation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

pub type AssistantStream = Pin<Box<dyn Stream<Item = AssistantEvent> + Send + 'static>>;

/// Runs one prompt against a model and streams the reply.
///
/// Implementations must stop producing events promptly once `cancel` trips.
pub trait PromptRunner: Send + Sync {
    fn run_prompt(
        &self,
        prompt: String,
        model: Option<String>,
        settings: PromptSettings,
        cancel: CancellationToken,
    ) -> AssistantStream;
}

/// Answer to a tool approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Aborted,
}

/// Asks the user whether an LLM node may call a tool.
pub trait ApprovalGate: Send + Sync {
    fn request_approval(&self, node_id: &str, tool: &str) -> BoxFuture<'static, ApprovalDecision>;
}

/// Approves every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn request_approval(&self, _node_id: &str, _tool: &str) -> BoxFuture<'static, ApprovalDecision> {
        Box::pin(async { ApprovalDecision::Approved })
    }
}
