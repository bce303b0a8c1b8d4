//! Styled rendering of status events and run reports.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use flowgraph_core::workflow::executor::RunReport;
use flowgraph_types::event::{NodeStatus, NodeStatusUpdate, StatusEvent};
use flowgraph_types::run::RunStatus;
use serde_json::json;

/// Longest output preview shown in the summary table.
const PREVIEW_CHARS: usize = 60;

pub fn status_name(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Paused => "paused",
    }
}

fn node_status_name(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Running => "running",
        NodeStatus::Completed => "completed",
        NodeStatus::Error => "error",
        NodeStatus::Interrupted => "interrupted",
    }
}

fn styled_status(status: NodeStatus) -> String {
    let name = node_status_name(status);
    match status {
        NodeStatus::Running => format!("{}", style(name).cyan()),
        NodeStatus::Completed => format!("{}", style(name).green()),
        NodeStatus::Error => format!("{}", style(name).red()),
        NodeStatus::Interrupted => format!("{}", style(name).yellow()),
    }
}

fn update_line(prefix: &str, update: &NodeStatusUpdate) -> String {
    let mut line = format!(
        "  {prefix}{} {}",
        style(&update.node_id).bold(),
        styled_status(update.status)
    );
    if let Some(error) = &update.error {
        line.push_str(&format!(": {error}"));
    }
    line
}

/// One console line per event; streamed LLM content is not echoed.
pub fn status_line(event: &StatusEvent) -> Option<String> {
    match event {
        StatusEvent::Node(update) => Some(update_line("", update)),
        StatusEvent::SubflowNode {
            wrapper_id, update, ..
        } => Some(update_line(&format!("{wrapper_id} > "), update)),
        StatusEvent::SubflowProgress { wrapper_id, .. } => Some(format!(
            "  {} {}",
            style(wrapper_id).bold(),
            style(event.progress_label().unwrap_or_default()).dim()
        )),
        StatusEvent::AssistantContent { .. } | StatusEvent::SubflowAssistantContent { .. } => None,
    }
}

/// First line of `text`, cut to the preview length.
pub fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
    if first.chars().count() > PREVIEW_CHARS || text.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}

pub fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Output"),
        ]);

    for id in &report.completed {
        let output = report.output(id).map(|v| v.to_text()).unwrap_or_default();
        table.add_row(vec![
            Cell::new(id),
            Cell::new("completed").fg(Color::Green),
            Cell::new(preview(&output)),
        ]);
    }
    for (id, message) in &report.failed {
        table.add_row(vec![
            Cell::new(id),
            Cell::new("error").fg(Color::Red),
            Cell::new(preview(message)),
        ]);
    }
    for id in &report.interrupted {
        table.add_row(vec![
            Cell::new(id),
            Cell::new("interrupted").fg(Color::Yellow),
            Cell::new(""),
        ]);
    }
    for id in &report.skipped {
        table.add_row(vec![Cell::new(id), Cell::new("skipped"), Cell::new("")]);
    }

    println!();
    println!("{table}");
    let status = status_name(report.status);
    let styled = match report.status {
        RunStatus::Completed => style(status).green().bold(),
        RunStatus::Failed => style(status).red().bold(),
        RunStatus::Cancelled | RunStatus::Paused => style(status).yellow().bold(),
    };
    println!("  Run {} {}", style(report.run_id).dim(), styled);
    println!();
}

pub fn report_json(report: &RunReport) -> serde_json::Value {
    let failed: Vec<_> = report
        .failed
        .iter()
        .map(|(id, message)| json!({ "node_id": id, "error": message }))
        .collect();
    json!({
        "run_id": report.run_id.to_string(),
        "status": status_name(report.status),
        "completed": report.completed,
        "failed": failed,
        "interrupted": report.interrupted,
        "skipped": report.skipped,
        "context": report.context.to_json(),
    })
}
