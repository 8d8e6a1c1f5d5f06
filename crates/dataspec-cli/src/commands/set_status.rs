//! Set-status command - write a status as an external task would.

use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use dataspec::status::StatusUpdate;
use dataspec::{ManagerConfig, NodeId, SqliteStore, State, StatusStore, WritePolicy};

pub fn run(
    store: PathBuf,
    node: String,
    task: String,
    state: String,
    properties: Vec<String>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let node: NodeId = node.parse()?;
    let state: State = state.parse()?;
    let properties = parse_properties(&properties)?;

    let store = SqliteStore::open(&store)?;
    let update = StatusUpdate::new(&node, task, state)
        .with_properties(properties)
        .by(ManagerConfig::default().resolve_manager_id());
    let policy = if force {
        WritePolicy::Overwrite
    } else {
        WritePolicy::Transition
    };
    let status = store.set(update, policy)?;

    println!(
        "{} {} {} is {} (version {})",
        "✓".green().bold(),
        status.node,
        status.task,
        status.state,
        status.version
    );
    Ok(())
}

/// Parse `KEY=VALUE` pairs.
fn parse_properties(pairs: &[String]) -> Result<BTreeMap<String, String>, String> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(format!("Invalid property '{}': expected KEY=VALUE", pair)),
        })
        .collect()
}
