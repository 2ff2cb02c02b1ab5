//! Build progress on stderr.

use std::path::Path;

use console::{Style, Term};
use weft_site::{BuildReport, RebuildOutcome};

/// Writes build summaries to the terminal.
pub(crate) struct Output {
    term: Term,
    ok: Style,
    failed: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            ok: Style::new().green(),
            failed: Style::new().red(),
        }
    }

    fn line(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a plain line.
    pub(crate) fn info(&self, msg: &str) {
        self.line(msg);
    }

    /// Print an error in red.
    pub(crate) fn error(&self, msg: &str) {
        self.line(&self.failed.apply_to(msg).to_string());
    }

    /// Announce the watched content root.
    pub(crate) fn watching(&self, root: &Path) {
        let msg = format!("Watching {} (Ctrl-C to stop)", root.display());
        self.line(&Style::new().cyan().bold().apply_to(msg).to_string());
    }

    /// Print the summary of a full build.
    pub(crate) fn report(&self, report: &BuildReport) {
        self.line(&self.ok.apply_to(summary(report)).to_string());
        if report.warnings > 0 {
            let msg = format!("{} template warning(s), see log", report.warnings);
            self.line(&Style::new().yellow().apply_to(msg).to_string());
        }
    }

    /// Print the result of a watch-mode rebuild; unchanged batches are silent.
    pub(crate) fn rebuilt(&self, outcome: &RebuildOutcome) {
        match outcome {
            RebuildOutcome::Unchanged => {}
            RebuildOutcome::Incremental { rendered, written } => {
                let msg = format!("Rebuilt {rendered} page(s), {written} file(s) written");
                self.line(&self.ok.apply_to(msg).to_string());
            }
            RebuildOutcome::Full(report) => self.report(report),
        }
    }
}

/// One-line summary of a full build.
fn summary(report: &BuildReport) -> String {
    format!(
        "Built {} page(s): {} of {} node(s) published, {} file(s) written",
        report.rendered, report.published, report.nodes, report.written
    )
}
