//! Run configuration and run-level status types.
//!
//! `RunOptions` is plain data (serializable, cloneable); cancellation and
//! pause signals live next to the executor in `flowgraph-core` because they
//! need an async runtime.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{NodeKind, NodeValue};

/// Default concurrency cap for LLM nodes.
pub const DEFAULT_LLM_LIMIT: usize = 8;

/// Default concurrency cap for CLI nodes.
pub const DEFAULT_CLI_LIMIT: usize = 8;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for one graph run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Maximum nodes in flight across all kinds (None = unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Per-kind caps.
    #[serde(default)]
    pub kind_limits: KindLimits,
    /// What a node failure does to the rest of the run.
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    /// How the ready queue is scanned on admission.
    #[serde(default)]
    pub admission: AdmissionPolicy,
    /// Results from a previous run, injected before scheduling starts.
    #[serde(default)]
    pub seeds: Seeds,
}

impl RunOptions {
    /// Options carrying the given seeds and otherwise default settings.
    pub fn with_seeds(seeds: Seeds) -> Self {
        Self {
            seeds,
            ..Self::default()
        }
    }
}

/// Per-kind concurrency caps. Kinds without an entry are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindLimits(pub HashMap<NodeKind, usize>);

impl KindLimits {
    /// No per-kind caps at all.
    pub fn unbounded() -> Self {
        Self(HashMap::new())
    }

    /// Cap for `kind`, if any.
    pub fn get(&self, kind: NodeKind) -> Option<usize> {
        self.0.get(&kind).copied()
    }

    /// Override the cap for one kind.
    pub fn set(&mut self, kind: NodeKind, limit: usize) {
        self.0.insert(kind, limit);
    }
}

impl Default for KindLimits {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(NodeKind::Llm, DEFAULT_LLM_LIMIT);
        limits.insert(NodeKind::Cli, DEFAULT_CLI_LIMIT);
        Self(limits)
    }
}

/// What happens to the run when a node fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Trip the run's cancellation signal; everything in flight is interrupted.
    #[default]
    FailFast,
    /// Prune the failed node's descendants and keep running independent branches.
    ContinueSubgraph,
}

/// How admission walks the ready queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Only the head of the queue is considered; a capped head blocks the rest.
    #[default]
    HeadOfQueue,
    /// Admit the first ready node whose kind is under its cap.
    ScanReady,
}

/// Pre-supplied results for resume-from-node semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seeds {
    /// Node outputs presumed already computed.
    #[serde(default)]
    pub outputs: HashMap<String, NodeValue>,
    /// IfElse decisions presumed already taken.
    #[serde(default)]
    pub decisions: HashMap<String, bool>,
    /// Variable values keyed by variable name.
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Seeds {
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.decisions.is_empty() && self.variables.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Mode & status
// ---------------------------------------------------------------------------

/// Which caller drives the dispatcher. Only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Workflow,
    SingleNode,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Workflow => f.write_str("workflow"),
            RunMode::SingleNode => f.write_str("single-node"),
        }
    }
}

/// Terminal status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kind_limits() {
        let limits = KindLimits::default();
        assert_eq!(limits.get(NodeKind::Llm), Some(8));
        assert_eq!(limits.get(NodeKind::Cli), Some(8));
        assert_eq!(limits.get(NodeKind::Preview), None);
    }

    #[test]
    fn test_run_options_defaults() {
        let opts: RunOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.max_concurrency, None);
        assert_eq!(opts.error_policy, ErrorPolicy::FailFast);
        assert_eq!(opts.admission, AdmissionPolicy::HeadOfQueue);
        assert!(opts.seeds.is_empty());
        assert_eq!(opts.kind_limits, KindLimits::default());
    }

    #[test]
    fn test_seeds_deserialize() {
        let seeds: Seeds = serde_json::from_str(
            r#"{"outputs":{"a":"x","b":["1","2"]},"decisions":{"if":true}}"#,
        )
        .unwrap();
        assert_eq!(seeds.outputs["a"], NodeValue::Text("x".into()));
        assert_eq!(seeds.decisions["if"], true);
        assert!(seeds.variables.is_empty());
    }

    #[test]
    fn test_run_mode_display() {
        assert_eq!(RunMode::Workflow.to_string(), "workflow");
        assert_eq!(RunMode::SingleNode.to_string(), "single-node");
    }
}
