//! `cm resolve` command implementation.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use cm_config::{CliSettings, UnboundSetting};

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::{Level, Output};
use crate::session::Session;

/// Handling of placeholders a clause does not bind.
#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum UnboundArg {
    /// Insert an unresolved variable.
    Variable,
    /// Keep `{{name}}` as text.
    Keep,
    /// Remove the placeholder.
    Remove,
}

impl From<UnboundArg> for UnboundSetting {
    fn from(arg: UnboundArg) -> Self {
        match arg {
            UnboundArg::Variable => Self::Variable,
            UnboundArg::Keep => Self::Keep,
            UnboundArg::Remove => Self::Remove,
        }
    }
}

/// Arguments for the resolve command.
#[derive(Args)]
pub(crate) struct ResolveArgs {
    /// Path to the markdown file.
    file: PathBuf,

    /// Template directory (overrides config).
    #[arg(short, long, env = "CLAUSEMARK_TEMPLATES")]
    templates_dir: Option<PathBuf>,

    /// Clause nesting limit (overrides config).
    #[arg(long)]
    max_depth: Option<usize>,

    /// Unbound placeholder handling (overrides config).
    #[arg(long, value_enum)]
    unbound: Option<UnboundArg>,

    /// Load every template from disk, even if used repeatedly.
    #[arg(long)]
    no_cache: bool,

    /// Print the render description as JSON instead of markdown.
    #[arg(long)]
    json: bool,

    /// Fail if any clause stays unresolved.
    #[arg(long)]
    strict: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ResolveArgs {
    /// Execute the resolve command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or with
    /// `--strict` if a clause could not be resolved.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            templates_dir: self.templates_dir.clone(),
            cache: self.no_cache.then_some(false),
            max_depth: self.max_depth,
            unbound: self.unbound.map(UnboundSetting::from),
        };
        let session = Session::load(self.config.path(), Some(&cli_settings))?;

        let text = Session::read(&self.file)?;
        let mut doc = session.converter.parse(&text)?;
        output.status(Level::Info, format_args!("Resolving {}...", self.file.display()));

        let report = session.resolver().resolve(&mut doc).await;

        if self.json {
            output.document(&serde_json::to_string_pretty(&doc.describe())?);
        } else {
            output.document(&session.converter.serialize(&doc)?);
        }
        output.report(&report);

        if self.strict && !report.is_complete() {
            return Err(CliError::Validation(format!(
                "{} clause(s) unresolved",
                report.failures.len()
            )));
        }
        Ok(())
    }
}
