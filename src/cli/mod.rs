//! CLI interface using clap
//!
//! Provides the command-line interface for DocDrift

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// DocDrift - Structural documentation drift detection
#[derive(Parser, Debug)]
#[command(name = "docdrift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the project (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize DocDrift in a project and capture a baseline snapshot
    Init(InitArgs),

    /// Capture and persist a snapshot of the current state
    Snapshot,

    /// Compare the current state against the latest snapshot
    Detect(DetectArgs),

    /// Build the call graph of a symbol
    Callgraph(CallgraphArgs),

    /// Print the structural model of one source file
    Extract(ExtractArgs),

    /// Show pending suggestions
    Status,

    /// Apply a suggested documentation edit
    Apply(ApplyArgs),

    /// Ignore a suggestion
    Ignore(IgnoreArgs),

    /// Watch for changes and re-run detection
    Watch(WatchArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Persist the current state as the next baseline
    #[arg(short, long)]
    pub save: bool,

    /// Review suggestions with the configured LLM
    #[arg(long)]
    pub with_llm: bool,
}

/// Arguments for callgraph command
#[derive(Parser, Debug)]
pub struct CallgraphArgs {
    /// Entry symbol (`name`, `Class.method` or `Type::method`)
    pub symbol: String,

    /// Maximum expansion depth (defaults to the configured value)
    #[arg(short, long)]
    pub max_depth: Option<usize>,

    /// Do not follow imports into other files
    #[arg(long)]
    pub no_imports: bool,

    /// Do not record conditional branches
    #[arg(long)]
    pub no_conditionals: bool,

    /// Do not record throw statements
    #[arg(long)]
    pub no_exceptions: bool,
}

/// Arguments for extract command
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Source file, absolute or relative to the project
    pub file: String,
}

/// Arguments for apply command
#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Suggestion ID (a unique prefix is enough)
    pub suggestion_id: String,

    /// Show the edit without writing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for ignore command
#[derive(Parser, Debug)]
pub struct IgnoreArgs {
    /// Suggestion ID (a unique prefix is enough)
    pub suggestion_id: String,
}

/// Arguments for watch command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Debounce interval in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub debounce: u64,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["docdrift", "detect", "--save"]);
        assert!(matches!(cli.command, Commands::Detect(_)));

        if let Commands::Detect(args) = cli.command {
            assert!(args.save);
            assert!(!args.with_llm);
        }
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::parse_from(["docdrift", "init", "--force"]);
        if let Commands::Init(args) = cli.command {
            assert!(args.force);
        }
    }

    #[test]
    fn test_callgraph_command() {
        let cli = Cli::parse_from([
            "docdrift",
            "-o",
            "json",
            "callgraph",
            "Service.run",
            "--max-depth",
            "5",
            "--no-imports",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Callgraph(args) => {
                assert_eq!(args.symbol, "Service.run");
                assert_eq!(args.max_depth, Some(5));
                assert!(args.no_imports);
                assert!(!args.no_conditionals);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
