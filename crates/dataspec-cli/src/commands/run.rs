//! Run command - protect, adjust and budget tables, then export the result.

use colored::Colorize;
use std::path::PathBuf;

use dataspec::source::{Catalog, TableName};
use dataspec::{ManagerConfig, Pipeline};

/// URI used when neither the command line nor the catalog names one.
const DEFAULT_URI: &str = "catalog://local";

pub struct RunArgs {
    pub catalog: PathBuf,
    pub uri: Option<String>,
    pub tables: Vec<String>,
    pub store: PathBuf,
    pub out: PathBuf,
    pub config: Option<PathBuf>,
    pub big_data: Option<bool>,
}

pub fn run(args: RunArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::default(),
    };
    let manager = super::open_manager(&args.store, config)?;

    let catalog = Catalog::load(&args.catalog)?;
    let tables = args
        .tables
        .iter()
        .map(|name| name.parse::<TableName>())
        .collect::<dataspec::Result<Vec<_>>>()?;
    let uri = args
        .uri
        .or_else(|| catalog.uri.clone())
        .unwrap_or_else(|| DEFAULT_URI.to_string());

    println!("{} {}", "Manager:".cyan().bold(), manager.id());
    println!("{} {}", "Source:".cyan().bold(), uri);

    let source = manager.source(&catalog, &uri, &tables)?;
    if let Some(is_big_data) = args.big_data {
        manager.set_big_data(source.uuid(), is_big_data)?;
    }

    let output = Pipeline::new(&manager).run(&source)?;

    println!();
    println!("{}", "Nodes:".cyan().bold());
    for node in output.nodes() {
        println!("  {} {}", node.uuid().to_string().dimmed(), node.kind());
    }

    let schema = manager.schema(output.result())?;
    println!();
    println!("{} {}", "Columns:".cyan().bold(), schema.columns().len());
    if verbose {
        for column in schema.columns() {
            println!("  {}", column.join("."));
        }
    }
    if let Some(budget) = schema.budget() {
        let spent = budget.sum();
        println!(
            "{} epsilon {:.4} of {:.4}, delta {:.2e} of {:.2e}",
            "Budget:".cyan().bold(),
            spent.epsilon,
            budget.total.epsilon,
            spent.delta,
            budget.total.delta
        );
    }

    manager.export(output.result())?.write_to(&args.out)?;
    println!();
    println!(
        "{} Wrote artifacts to {}",
        "✓".green().bold(),
        args.out.display()
    );
    Ok(())
}
