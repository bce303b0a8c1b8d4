//! Engine configuration types for flowgraph.
//!
//! `EngineConfig` represents the top-level `config.toml` that controls
//! concurrency caps, error policy and collaborator limits. All fields have
//! sensible defaults.

use serde::{Deserialize, Serialize};

use crate::graph::NodeKind;
use crate::run::{
    AdmissionPolicy, DEFAULT_CLI_LIMIT, DEFAULT_LLM_LIMIT, ErrorPolicy, KindLimits, RunOptions,
};

/// Top-level configuration for the engine.
///
/// Loaded from `~/.flowgraph/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global cap on nodes in flight (None = unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Per-kind caps.
    #[serde(default)]
    pub kind_limits: KindLimitConfig,

    #[serde(default)]
    pub error_policy: ErrorPolicy,

    #[serde(default)]
    pub admission: AdmissionPolicy,

    /// Default LLM node timeout in seconds (0 disables).
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Maximum captured bytes of CLI output before truncation.
    #[serde(default = "default_cli_output_limit")]
    pub cli_output_limit: usize,

    /// Directory holding subflow definitions, relative to the data dir when not absolute.
    #[serde(default = "default_subflow_dir")]
    pub subflow_dir: String,
}

/// Per-kind caps as they appear in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindLimitConfig {
    #[serde(default = "default_llm_limit")]
    pub llm: usize,
    #[serde(default = "default_cli_limit")]
    pub cli: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow: Option<usize>,
}

fn default_llm_timeout_secs() -> u64 {
    300
}

fn default_cli_output_limit() -> usize {
    100_000
}

fn default_subflow_dir() -> String {
    "subflows".to_string()
}

fn default_llm_limit() -> usize {
    DEFAULT_LLM_LIMIT
}

fn default_cli_limit() -> usize {
    DEFAULT_CLI_LIMIT
}

impl Default for KindLimitConfig {
    fn default() -> Self {
        Self {
            llm: default_llm_limit(),
            cli: default_cli_limit(),
            subflow: None,
        }
    }
}

impl From<&KindLimitConfig> for KindLimits {
    fn from(config: &KindLimitConfig) -> Self {
        let mut limits = KindLimits::unbounded();
        limits.set(NodeKind::Llm, config.llm);
        limits.set(NodeKind::Cli, config.cli);
        if let Some(subflow) = config.subflow {
            limits.set(NodeKind::Subflow, subflow);
        }
        limits
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            kind_limits: KindLimitConfig::default(),
            error_policy: ErrorPolicy::default(),
            admission: AdmissionPolicy::default(),
            llm_timeout_secs: default_llm_timeout_secs(),
            cli_output_limit: default_cli_output_limit(),
            subflow_dir: default_subflow_dir(),
        }
    }
}

impl EngineConfig {
    /// Run options derived from this configuration, without seeds.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_concurrency: self.max_concurrency,
            kind_limits: KindLimits::from(&self.kind_limits),
            error_policy: self.error_policy,
            admission: self.admission,
            seeds: Default::default(),
        }
    }
}
