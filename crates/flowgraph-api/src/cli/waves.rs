//! `flowgraph waves`: static analysis of a graph file.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use flowgraph_core::workflow::analysis::{BranchSets, WavePlan, branch_reachability, compute_waves};
use flowgraph_infra::filesystem::load_graph_file;
use serde_json::json;

pub async fn handle_waves(file: &Path, json: bool) -> Result<()> {
    let graph = load_graph_file(file).await?;
    let plan = compute_waves(&graph.nodes, &graph.edges);
    let branches = branch_reachability(&graph.nodes, &graph.edges);

    if json {
        let branches: serde_json::Map<_, _> = branches
            .iter()
            .map(|(id, sets)| (id.clone(), branch_json(sets)))
            .collect();
        let out = json!({
            "waves": plan.waves,
            "cyclic": plan.cyclic,
            "cycles": plan.cycles,
            "unsupported": plan.unsupported,
            "branches": branches,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", wave_table(&plan));
    for cycle in &plan.cycles {
        println!(
            "  {} cycle through: {}",
            style("!").red().bold(),
            cycle.join(", ")
        );
    }
    if !plan.unsupported.is_empty() {
        println!(
            "  {} loop nodes not supported: {}",
            style("!").yellow().bold(),
            plan.unsupported.join(", ")
        );
    }

    for (id, sets) in &branches {
        println!();
        println!("  {} {}", style("if/else").cyan(), style(id).bold());
        println!("    true:  {}", join_or_dash(&sets.true_only));
        println!("    false: {}", join_or_dash(&sets.false_only));
        println!("    merge: {}", join_or_dash(&sets.merge));
    }
    println!();
    Ok(())
}

fn wave_table(plan: &WavePlan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Wave").fg(Color::Cyan), Cell::new("Nodes")]);
    for (i, nodes) in plan.waves.iter().enumerate() {
        table.add_row(vec![Cell::new(i), Cell::new(nodes.join(", "))]);
    }
    table
}

fn branch_json(sets: &BranchSets) -> serde_json::Value {
    json!({
        "true_only": sets.true_only,
        "false_only": sets.false_only,
        "merge": sets.merge,
    })
}

fn join_or_dash<'a>(ids: impl IntoIterator<Item = &'a String>) -> String {
    let joined = ids.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() { "-".to_string() } else { joined }
}
