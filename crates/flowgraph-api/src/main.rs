//! flowgraph CLI entry point.
//!
//! Binary name: `flowgraph`
//!
//! Parses CLI arguments, sets up tracing, loads `config.toml` from the data
//! directory and dispatches to the command handler.

mod cli;

use clap::Parser;
use flowgraph_infra::config::load_engine_config;
use flowgraph_infra::filesystem::resolve_data_dir;
use flowgraph_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        ..TracingOptions::default()
    }
    .with_verbosity(cli.verbose);
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let data_dir = resolve_data_dir(cli.data_dir.as_deref());
    let config = load_engine_config(&data_dir).await;
    tracing::debug!(data_dir = %data_dir.display(), "configuration loaded");

    let result = match cli.command {
        Commands::Run(args) => cli::run::handle_run(args, &config, &data_dir, cli.json).await,
        Commands::Node(args) => cli::run::handle_node(args, &config, &data_dir, cli.json).await,
        Commands::Waves { file } => cli::waves::handle_waves(&file, cli.json).await,
    };

    shutdown_tracing();
    result
}
