//! Dataspec CLI - build, coordinate and inspect dataset lineage.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            catalog,
            uri,
            tables,
            store,
            out,
            config,
            big_data,
        } => commands::run::run(
            commands::run::RunArgs {
                catalog,
                uri,
                tables,
                store,
                out,
                config,
                big_data,
            },
            cli.verbose,
        ),

        Commands::Status { store, node, json } => commands::status::run(store, node, json),

        Commands::SetStatus {
            store,
            node,
            task,
            state,
            properties,
            force,
        } => commands::set_status::run(store, node, task, state, properties, force),

        Commands::Inspect { file, json } => commands::inspect::run(file, json, cli.verbose),

        Commands::Transforms => commands::transforms::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "dataspec=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
