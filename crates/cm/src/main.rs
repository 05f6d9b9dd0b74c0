//! clausemark CLI - contract markdown engine.
//!
//! Provides commands for:
//! - `parse`: Show the document tree of a markdown file
//! - `format`: Rewrite a markdown file in canonical form
//! - `resolve`: Fill clauses from their templates
//! - `import`: Convert an HTML fragment to markdown
//! - `schema`: Print the composed schema

mod commands;
mod error;
mod output;
mod session;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{FormatArgs, ImportArgs, ParseArgs, ResolveArgs, SchemaArgs};
use output::{Level, Output};

/// clausemark - markdown engine for contract documents.
#[derive(Parser)]
#[command(name = "cm", version, about)]
struct Cli {
    /// Enable info-level logging (otherwise `RUST_LOG` applies).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the document tree of a markdown file.
    Parse(ParseArgs),
    /// Parse and re-serialize a markdown file.
    Format(FormatArgs),
    /// Resolve clauses from the template directory.
    Resolve(ResolveArgs),
    /// Convert an HTML fragment to markdown.
    Import(ImportArgs),
    /// Print the composed schema as JSON.
    Schema(SchemaArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Parse(args) => args.execute(),
        Commands::Format(args) => args.execute(),
        Commands::Resolve(args) => {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(args.execute())
        }
        Commands::Import(args) => args.execute(),
        Commands::Schema(args) => args.execute(),
    };

    if let Err(err) = result {
        output.status(Level::Fail, format_args!("Error: {err}"));
        std::process::exit(1);
    }
}
