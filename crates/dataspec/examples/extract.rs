//! Example: Protect and budget tables described by a JSON catalog.
//!
//! Usage:
//!   cargo run --example extract -- <catalog.json> <out_dir> <schema.table>...
//!
//! Example:
//!   cargo run --example extract -- catalog.json out extract.census extract.cities

use std::env;

use dataspec::source::{Catalog, TableName};
use dataspec::{Manager, Pipeline};

fn main() -> dataspec::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("Usage: cargo run --example extract -- <catalog.json> <out_dir> <schema.table>...");
        std::process::exit(1);
    }

    let catalog = Catalog::load(&args[1])?;
    let tables = args[3..]
        .iter()
        .map(|name| name.parse::<TableName>())
        .collect::<dataspec::Result<Vec<_>>>()?;
    let uri = catalog.uri.clone().unwrap_or_else(|| "catalog://local".to_string());

    let manager = Manager::in_memory()?;
    let source = manager.source(&catalog, &uri, &tables)?;
    // No external classifier here: treat every extract as small.
    manager.set_big_data(source.uuid(), false)?;

    let output = Pipeline::new(&manager).run(&source)?;
    for node in output.nodes() {
        println!("{}", node);
    }

    let schema = manager.schema(output.result())?;
    println!("\nColumns: {}", schema.columns().len());
    if let Some(budget) = schema.budget() {
        let spent = budget.sum();
        println!(
            "Budget: epsilon {:.4} of {:.4}, delta {:.2e} of {:.2e}",
            spent.epsilon, budget.total.epsilon, spent.delta, budget.total.delta
        );
    }

    manager.export(output.result())?.write_to(&args[2])?;
    println!("Wrote artifacts to {}", args[2]);
    Ok(())
}
