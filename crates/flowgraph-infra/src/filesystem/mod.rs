//! Filesystem adapters for flowgraph.
//!
//! Graphs and subflow definitions are stored as JSON or YAML documents; the
//! format follows the file extension.

pub mod subflow;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flowgraph_types::graph::GraphDefinition;
use serde::de::DeserializeOwned;

/// Document formats accepted for graph and subflow files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Format implied by a file extension, if recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        match self {
            Self::Json => serde_json::from_str(content).context("invalid JSON document"),
            Self::Yaml => serde_yaml_ng::from_str(content).context("invalid YAML document"),
        }
    }
}

/// Load a top-level graph from a `.json`, `.yaml` or `.yml` file.
pub async fn load_graph_file(path: &Path) -> Result<GraphDefinition> {
    let Some(format) = DocumentFormat::from_path(path) else {
        bail!(
            "unsupported graph file '{}': expected .json, .yaml or .yml",
            path.display()
        );
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read graph file '{}'", path.display()))?;
    let graph: GraphDefinition = format
        .parse(&content)
        .with_context(|| format!("failed to parse graph file '{}'", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "graph loaded"
    );
    Ok(graph)
}

/// Resolve the data directory from an explicit override or platform defaults.
///
/// Priority:
/// 1. The explicit path (`--data-dir` / `FLOWGRAPH_DATA_DIR`)
/// 2. `~/.flowgraph`
/// 3. `.flowgraph` in the current directory
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".flowgraph");
    }

    PathBuf::from(".flowgraph")
}
