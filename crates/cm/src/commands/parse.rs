//! `cm parse` command implementation.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use cm_document::Node;

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::Output;
use crate::session::Session;

/// Arguments for the parse command.
#[derive(Args)]
pub(crate) struct ParseArgs {
    /// Path to the markdown file.
    file: PathBuf,

    /// Print the render description as JSON instead of an outline.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ParseArgs {
    /// Execute the parse command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let session = Session::load(self.config.path(), None)?;
        let text = Session::read(&self.file)?;
        let doc = session.converter.parse(&text)?;

        if self.json {
            output.document(&serde_json::to_string_pretty(&doc.describe())?);
        } else {
            output.document(&outline(&doc));
        }
        Ok(())
    }
}

/// Indented one-line-per-node view of a tree.
pub(crate) fn outline(node: &Node) -> String {
    let mut out = String::new();
    write_outline(node, 0, &mut out);
    out
}

fn write_outline(node: &Node, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    match node {
        Node::Text(text) => {
            let _ = writeln!(out, "{indent}{:?}", text.text);
        }
        Node::Document(el) | Node::Block(el) | Node::Inline(el) => {
            let _ = write!(out, "{indent}{}", el.node_type);
            for (key, value) in el.data.iter() {
                if value.contains('\n') {
                    let _ = write!(out, " {key}=<{} lines>", value.lines().count());
                } else {
                    let _ = write!(out, " {key}={value:?}");
                }
            }
            out.push('\n');
            for child in &el.nodes {
                write_outline(child, level + 1, out);
            }
        }
    }
}
