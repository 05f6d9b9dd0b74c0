//! Terminal output for `cm` commands.
//!
//! Documents and JSON go to stdout so they can be piped; status lines and
//! resolution reports go to stderr.

use std::fmt::Display;

use cm_clause::{ClauseFailure, ResolutionReport};
use console::{Style, Term};

/// Severity of a status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Level {
    Info,
    Done,
    Warn,
    Fail,
    /// Indented detail under a previous line.
    Note,
}

impl Level {
    fn style(self) -> Style {
        match self {
            Self::Info => Style::new(),
            Self::Done => Style::new().green(),
            Self::Warn => Style::new().yellow(),
            Self::Fail => Style::new().red().bold(),
            Self::Note => Style::new().dim(),
        }
    }
}

/// Split terminal output of a command.
pub(crate) struct Output {
    status: Term,
    document: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            status: Term::stderr(),
            document: Term::stdout(),
        }
    }

    /// Write a document (markdown, JSON, outline) to stdout, newline-terminated.
    pub(crate) fn document(&self, text: &str) {
        let _ = self.document.write_str(text);
        if !text.ends_with('\n') {
            let _ = self.document.write_line("");
        }
    }

    /// Write one status line to stderr.
    pub(crate) fn status(&self, level: Level, msg: impl Display) {
        let _ = self
            .status
            .write_line(&level.style().apply_to(msg).to_string());
    }

    /// Summarize a resolution run on stderr.
    pub(crate) fn report(&self, report: &ResolutionReport) {
        for (level, line) in report_lines(report) {
            self.status(level, line);
        }
    }
}

/// Status lines for a resolution report: a summary, then one entry and one
/// error note per failed clause.
fn report_lines(report: &ResolutionReport) -> Vec<(Level, String)> {
    if report.is_complete() {
        return vec![(Level::Done, format!("Resolved {} clause(s)", report.resolved))];
    }

    let mut lines = vec![(
        Level::Warn,
        format!(
            "Resolved {} clause(s), {} unresolved:",
            report.resolved,
            report.failures.len()
        ),
    )];
    for ClauseFailure {
        clause_id,
        src,
        error,
    } in &report.failures
    {
        let id = clause_id.as_deref().unwrap_or("-");
        let src = src.as_deref().unwrap_or("-");
        lines.push((Level::Info, format!("  - [{id}] {src}")));
        lines.push((Level::Note, format!("      {error}")));
    }
    lines
}
