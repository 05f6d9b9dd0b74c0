//! `cm schema` command implementation.

use clap::Args;

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::Output;
use crate::session::Session;

/// Arguments for the schema command.
#[derive(Args)]
pub(crate) struct SchemaArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

impl SchemaArgs {
    /// Execute the schema command.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin set does not compose.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let session = Session::load(self.config.path(), None)?;
        output.document(&serde_json::to_string_pretty(session.converter.schema())?);
        Ok(())
    }
}
