//! `cm format` command implementation.

use std::path::PathBuf;

use clap::Args;

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::{Level, Output};
use crate::session::Session;

/// Arguments for the format command.
#[derive(Args)]
pub(crate) struct FormatArgs {
    /// Path to the markdown file.
    file: PathBuf,

    /// Rewrite the file in place instead of printing.
    #[arg(short, long)]
    write: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

impl FormatArgs {
    /// Execute the format command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let session = Session::load(self.config.path(), None)?;
        let text = Session::read(&self.file)?;
        let doc = session.converter.parse(&text)?;
        let formatted = session.converter.serialize(&doc)?;

        if !self.write {
            output.document(&formatted);
            return Ok(());
        }

        if formatted == text {
            output.status(
                Level::Info,
                format_args!("{} is already formatted", self.file.display()),
            );
        } else {
            std::fs::write(&self.file, formatted)?;
            output.status(Level::Done, format_args!("Formatted {}", self.file.display()));
        }
        Ok(())
    }
}
