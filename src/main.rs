//! DocDrift - Structural documentation drift detection
//!
//! Snapshots the structure of a code base, detects API changes since the last
//! snapshot, and proposes edits to the documentation sections they affect.

use anyhow::Result;
use clap::Parser;
use docdrift::cli::{
    apply, callgraph, detect, extract, ignore, init, print_detection, print_structure_text,
    snapshot, status, watch, Cli, Commands, OutputFormat,
};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let project_path = Path::new(&cli.path);

    match cli.command {
        Commands::Init(args) => {
            init(project_path, args.force)?;
        }

        Commands::Snapshot => {
            let (saved, snapshot) = snapshot(project_path)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                OutputFormat::Text => println!(
                    "✓ Saved snapshot {:?} ({} source files, {} documentation files)",
                    saved,
                    snapshot.files.len(),
                    snapshot.docs.len()
                ),
            }
        }

        Commands::Detect(args) => {
            let detection = detect(project_path, args.save, args.with_llm)?;
            print_detection(&detection, cli.format)?;
        }

        Commands::Callgraph(args) => {
            let graph = callgraph(project_path, &args)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
                OutputFormat::Text => {
                    print!("{}", graph.render_tree());
                    println!(
                        "\n{} node(s), depth {}, {} file(s) analyzed",
                        graph.node_count(),
                        graph.max_depth_reached,
                        graph.analyzed_files.len()
                    );
                    for circular in &graph.circular_references {
                        println!("↻ {} -> {}", circular.from, circular.to);
                    }
                    for unresolved in &graph.unresolved_calls {
                        println!(
                            "? {} ({}:{})",
                            unresolved.name, unresolved.file_path, unresolved.line
                        );
                    }
                }
            }
        }

        Commands::Extract(args) => {
            let structure = extract(project_path, &args.file)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&structure)?),
                OutputFormat::Text => print_structure_text(&structure),
            }
        }

        Commands::Status => {
            status(project_path, cli.format)?;
        }

        Commands::Apply(args) => {
            apply(project_path, &args.suggestion_id, args.dry_run)?;
        }

        Commands::Ignore(args) => {
            ignore(project_path, &args.suggestion_id)?;
        }

        Commands::Watch(args) => {
            watch(project_path, args.debounce, cli.format)?;
        }
    }

    Ok(())
}
