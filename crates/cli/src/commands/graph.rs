use std::path::Path;

use anyhow::Result;
use colored::*;
use parathread_core::colors::node_color;
use parathread_core::thread_manager::ThreadManager;

use super::SelectionArgs;

pub fn execute(file: &Path, selection: &SelectionArgs, dot: bool) -> Result<()> {
    let manager = ThreadManager::load(file)
        .map_err(|e| anyhow::anyhow!("Failed to load thread file: {}", e))?;

    let graph = manager
        .build_graph()
        .map_err(|e| anyhow::anyhow!("Failed to build graph: {}", e))?;
    let mut graph = manager
        .select(graph, &selection.to_selection())
        .map_err(|e| anyhow::anyhow!("Failed to select nodes: {}", e))?;
    graph.freeze();

    if dot {
        println!("{}", graph.to_dot());
        return Ok(());
    }

    println!(
        "{}",
        format!("Dependency graph of {}:", manager.name()).bold().underline()
    );

    if graph.is_empty() {
        println!("  {}", "No nodes selected".dimmed());
        return Ok(());
    }

    for key in graph.keys() {
        println!("{}", key.color(node_color(key)).bold());

        let Some(node) = graph.get(key) else {
            continue;
        };
        let mut deps: Vec<&str> = node.dependencies().iter().map(|d| d.key.as_str()).collect();
        deps.sort_unstable();

        if !deps.is_empty() {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        } else {
            println!("  {}", "no dependencies".dimmed());
        }

        let mut ignored: Vec<&str> = node
            .raw_dependency_keys()
            .iter()
            .map(String::as_str)
            .filter(|k| !node.has_dependency(k))
            .collect();
        ignored.sort_unstable();
        ignored.dedup();
        if !ignored.is_empty() {
            println!("  {} {}", "ignored:".yellow(), ignored.join(", ").yellow());
        }

        let dangling: Vec<&str> = deps
            .iter()
            .copied()
            .filter(|k| !graph.contains_key(k))
            .collect();
        if !dangling.is_empty() {
            println!(
                "  {} {}",
                "waits on excluded:".red(),
                dangling.join(", ").red()
            );
        }
        println!();
    }

    Ok(())
}
