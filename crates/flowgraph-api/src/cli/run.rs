//! `flowgraph run` and `flowgraph node`.
//!
//! Status events are printed as they arrive; Ctrl-C cancels the run and
//! in-flight nodes report `interrupted`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use flowgraph_core::event::{EventBus, StatusSink};
use flowgraph_core::workflow::executor::{EngineError, GraphExecutor, RunControl, RunReport};
use flowgraph_infra::filesystem::load_graph_file;
use flowgraph_infra::workflow::live_handlers;
use flowgraph_types::config::EngineConfig;
use flowgraph_types::graph::NodeKind;
use flowgraph_types::run::{AdmissionPolicy, ErrorPolicy, RunOptions, RunStatus, Seeds};
use tokio_util::sync::CancellationToken;

use super::render::{print_report, report_json, status_line, status_name};
use super::{ExecArgs, NodeArgs, RunArgs};

const EVENT_BUS_CAPACITY: usize = 256;

pub async fn handle_run(
    args: RunArgs,
    config: &EngineConfig,
    data_dir: &Path,
    json: bool,
) -> Result<()> {
    let mut options = build_options(&args.exec, config).await?;
    if args.continue_on_error {
        options.error_policy = ErrorPolicy::ContinueSubgraph;
    }
    if args.scan_ready {
        options.admission = AdmissionPolicy::ScanReady;
    }

    let graph = load_graph_file(&args.exec.file).await?;
    let report = with_live_run(config, data_dir, json, |executor, control| async move {
        executor
            .execute(&graph.nodes, &graph.edges, &options, control)
            .await
    })
    .await?;

    finish(report, &args.exec, json).await
}

pub async fn handle_node(
    args: NodeArgs,
    config: &EngineConfig,
    data_dir: &Path,
    json: bool,
) -> Result<()> {
    let options = build_options(&args.exec, config).await?;
    let graph = load_graph_file(&args.exec.file).await?;
    let node_id = args.node_id.clone();

    let report = with_live_run(config, data_dir, json, |executor, control| async move {
        executor
            .run_single_node(&graph.nodes, &graph.edges, &node_id, &options, control)
            .await
    })
    .await?;

    finish(report, &args.exec, json).await
}

/// Run options from config, flags and the optional seeds file.
async fn build_options(exec: &ExecArgs, config: &EngineConfig) -> Result<RunOptions> {
    let mut options = config.run_options();
    if let Some(max) = exec.max_concurrency {
        options.max_concurrency = Some(max);
    }
    for spec in &exec.limits {
        let (kind, limit) = parse_kind_limit(spec)?;
        options.kind_limits.set(kind, limit);
    }
    if let Some(path) = &exec.seeds {
        options.seeds = load_seeds(path).await?;
    }
    Ok(options)
}

/// Parse `KIND=N`, with KIND in its serialized form (`cli`, `llm`, `if_else`...).
pub fn parse_kind_limit(spec: &str) -> Result<(NodeKind, usize)> {
    let Some((kind, limit)) = spec.split_once('=') else {
        bail!("invalid limit '{spec}': expected KIND=N");
    };
    let kind: NodeKind = serde_json::from_value(serde_json::Value::String(kind.trim().to_string()))
        .with_context(|| format!("unknown node kind '{}'", kind.trim()))?;
    let limit: usize = limit
        .trim()
        .parse()
        .with_context(|| format!("invalid limit value in '{spec}'"))?;
    Ok((kind, limit))
}

async fn load_seeds(path: &Path) -> Result<Seeds> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seeds file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse seeds file '{}'", path.display()))
}

/// Wire live handlers, the event printer and Ctrl-C, then drive `run`.
async fn with_live_run<F, Fut>(
    config: &EngineConfig,
    data_dir: &Path,
    json: bool,
    run: F,
) -> Result<RunReport>
where
    F: FnOnce(GraphExecutor, RunControl) -> Fut,
    Fut: std::future::Future<Output = Result<RunReport, EngineError>>,
{
    let bus = EventBus::new(EVENT_BUS_CAPACITY);
    let mut events = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if !json {
                        if let Some(line) = status_line(&event) {
                            println!("{line}");
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "status printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling run...");
            on_ctrl_c.cancel();
        }
    });

    let sink: Arc<dyn StatusSink> = Arc::new(bus);
    let executor = GraphExecutor::new(live_handlers(config, data_dir), sink)
        .with_llm_timeout(config.llm_timeout_secs);
    let result = run(executor, RunControl::new().with_cancel(cancel)).await;

    ctrl_c.abort();
    // The executor and every sender clone are gone; the printer drains and exits.
    if let Err(e) = printer.await {
        tracing::debug!("status printer ended abnormally: {e}");
    }

    result.map_err(|e| anyhow::anyhow!("run aborted: {e}"))
}

async fn finish(report: RunReport, exec: &ExecArgs, json: bool) -> Result<()> {
    if let Some(path) = &exec.save_seeds {
        let seeds = serde_json::to_string_pretty(&report.resume_seeds())?;
        tokio::fs::write(path, seeds)
            .await
            .with_context(|| format!("failed to write seeds file '{}'", path.display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Paused | RunStatus::Cancelled if exec.save_seeds.is_some() => Ok(()),
        status => bail!("run finished with status {}", status_name(status)),
    }
}
