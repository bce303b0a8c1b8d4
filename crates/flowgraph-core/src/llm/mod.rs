//! LLM collaborator seams.
//!
//! - `prompt`: the `PromptRunner` and `ApprovalGate` traits a provider implements
//! - `handler`: adapter turning a `PromptRunner` into an LLM node handler
//!
//! No provider ships with the engine; callers inject one.

pub mod handler;
pub mod prompt;
