//! Transforms command - list the registered transforms.

use colored::Colorize;

use dataspec::transform::registry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry();
    println!(
        "{} {} registered",
        "Transforms:".cyan().bold(),
        registry.len()
    );

    for spec in registry.iter() {
        println!();
        println!(
            "{} v{} -> {}",
            spec.name().bold(),
            spec.version,
            spec.output
        );
        println!("  {}", spec.description.dimmed());
        if spec.arity > 0 {
            let accepts: Vec<&str> = spec.accepts.iter().map(|kind| kind.as_str()).collect();
            println!("  inputs: {} of [{}]", spec.arity, accepts.join(", "));
        }
        for parameter in spec.parameters {
            let default = match parameter.default {
                Some(kind) => format!(" (default: {})", kind.as_str()),
                None if parameter.required => " (required)".to_string(),
                None => String::new(),
            };
            println!("  {}: {}{}", parameter.name, parameter.kind, default);
        }
        for property in spec.properties {
            println!("  property {}: {:?}", property.name, property.ty);
        }
    }

    Ok(())
}
