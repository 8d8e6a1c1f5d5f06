//! Inspect command - decode an exported artifact.

use colored::Colorize;
use std::path::PathBuf;

use dataspec::AnyArtifact;
use dataspec::node::NodeSpec;

pub fn run(file: PathBuf, json: bool, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(&file)?;
    let artifact = AnyArtifact::decode(&bytes)?;

    if json {
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", "Type:".cyan().bold(), artifact.type_url());
    match &artifact {
        AnyArtifact::Dataset(node) => {
            println!("{} {}", "Node:".cyan().bold(), node.uuid());
            println!("{} {}", "Kind:".cyan().bold(), node.kind());
            match node.spec() {
                NodeSpec::Source(source) => {
                    println!("{} {}", "URI:".cyan().bold(), source.uri);
                }
                NodeSpec::Scalar(_) => {}
                NodeSpec::Transformed(_) => {
                    if let Some(transform) = node.transform() {
                        println!("{} {}", "Transform:".cyan().bold(), transform.name);
                    }
                    let parents = node.parents();
                    println!("{} {}", "Parents:".cyan().bold(), parents.len());
                    for parent in parents {
                        println!("  {}", parent);
                    }
                }
            }
        }
        AnyArtifact::Schema(schema) => {
            println!("{} {}", "Dataset:".cyan().bold(), schema.dataset());
            let columns = schema.columns();
            println!("{} {}", "Columns:".cyan().bold(), columns.len());
            if verbose {
                for column in &columns {
                    println!("  {}", column.join("."));
                }
            }
            match schema.protected() {
                Some(_) => println!("{} yes", "Protected:".cyan().bold()),
                None => println!("{} no", "Protected:".cyan().bold()),
            }
            if let Some(budget) = schema.budget() {
                println!(
                    "{} epsilon {:.4}, delta {:.2e} over {} attributes",
                    "Budget:".cyan().bold(),
                    budget.total.epsilon,
                    budget.total.delta,
                    budget.allocations.len()
                );
            }
        }
        AnyArtifact::Size(size) => {
            println!("{} {}", "Dataset:".cyan().bold(), size.dataset());
            println!("{} {}", "Rows:".cyan().bold(), size.statistics().size());
        }
    }

    Ok(())
}
