//! `cm import` command implementation.

use std::path::PathBuf;

use clap::Args;

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::Output;
use crate::session::Session;

/// Arguments for the import command.
#[derive(Args)]
pub(crate) struct ImportArgs {
    /// Path to the HTML fragment.
    file: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ImportArgs {
    /// Execute the import command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or converted.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let session = Session::load(self.config.path(), None)?;
        let html = Session::read(&self.file)?;
        let doc = session.converter.from_html(&html)?;
        output.document(&session.converter.serialize(&doc)?);
        Ok(())
    }
}
