//! CLI command definitions for the `flowgraph` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod render;
pub mod run;
pub mod waves;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Run dependency graphs of shell, LLM and data-transform nodes.
#[derive(Parser)]
#[command(name = "flowgraph", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed logs (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory holding config.toml and subflows (default: ~/.flowgraph).
    #[arg(long, global = true, env = "FLOWGRAPH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a whole graph.
    Run(RunArgs),

    /// Execute a single node, resolving its inputs from seeds.
    Node(NodeArgs),

    /// Print the wave plan and IfElse branch sets of a graph.
    Waves {
        /// Graph file (.json, .yaml or .yml).
        file: PathBuf,
    },
}

/// Options shared by `run` and `node`.
#[derive(Args, Debug, Clone, Default)]
pub struct ExecArgs {
    /// Graph file (.json, .yaml or .yml).
    pub file: PathBuf,

    /// JSON seeds file (`outputs`, `decisions`, `variables`).
    #[arg(long)]
    pub seeds: Option<PathBuf>,

    /// Write resume seeds built from the run report to this file.
    #[arg(long)]
    pub save_seeds: Option<PathBuf>,

    /// Global cap on nodes in flight.
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Per-kind cap as KIND=N (e.g. cli=2); repeatable.
    #[arg(long = "limit", value_name = "KIND=N")]
    pub limits: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub exec: ExecArgs,

    /// Keep running independent branches after a node fails.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Admit any ready node that fits, not only the head of the queue.
    #[arg(long)]
    pub scan_ready: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    #[command(flatten)]
    pub exec: ExecArgs,

    /// ID of the node to execute.
    pub node_id: String,
}
