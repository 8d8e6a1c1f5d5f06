//! Status command - list the statuses of a node.

use colored::Colorize;
use std::path::PathBuf;

use dataspec::{ManagerConfig, NodeId, State};

pub fn run(store: PathBuf, node: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let node: NodeId = node.parse()?;
    let manager = super::open_manager(&store, ManagerConfig::default())?;
    let statuses = manager.statuses(&node)?;

    if json {
        let output = serde_json::json!({
            "node": node,
            "statuses": statuses,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("{} No statuses recorded for {}", "!".yellow().bold(), node);
        return Ok(());
    }

    println!("{} {}", "Node:".cyan().bold(), node);
    for status in &statuses {
        let state = match status.state {
            State::Ready => status.state.as_str().green(),
            State::Pending => status.state.as_str().yellow(),
            State::Error => status.state.as_str().red(),
        };
        println!(
            "  {:<10} {:<8} v{} by {} at {}",
            status.task,
            state,
            status.version,
            status.manager,
            status.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
        for (key, value) in &status.properties {
            println!("    {} = {}", key.dimmed(), value);
        }
    }

    Ok(())
}
