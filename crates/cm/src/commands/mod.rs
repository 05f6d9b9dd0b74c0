//! CLI command implementations.

pub(crate) mod format;
pub(crate) mod import;
pub(crate) mod parse;
pub(crate) mod resolve;
pub(crate) mod schema;

use std::path::{Path, PathBuf};

use clap::Args;

pub(crate) use format::FormatArgs;
pub(crate) use import::ImportArgs;
pub(crate) use parse::ParseArgs;
pub(crate) use resolve::ResolveArgs;
pub(crate) use schema::SchemaArgs;

/// Configuration file selection shared by all commands.
#[derive(Args)]
pub(crate) struct ConfigArgs {
    /// Path to configuration file (default: auto-discover clausemark.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    pub(crate) fn path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}
