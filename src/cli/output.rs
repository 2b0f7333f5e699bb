//! Handles all user-facing output for the CLI.
//!
//! Progress is streamed to stdout as cases run: suites print their name,
//! leaves print a dot-padded name followed by a colored marker. Failures dump
//! their captured output and diff right away so a single run explains itself.

use std::io::Write;
use std::path::Path;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::bench::{BenchmarkRun, BenchmarkSink};
use crate::exec::ExecutionResult;
use crate::runner::{CaseFailure, CaseReport, CaseStatus, Marker, ProgressSink, RunSummary};

/// Column at which leaf markers are printed.
pub const OUTPUT_WIDTH: usize = 60;
const INDENT: &str = "  ";

// ============================================================================
// TERMINAL REPORTER
// ============================================================================

/// Writes hierarchical progress to any `WriteColor` target.
pub struct TerminalReporter<W: WriteColor> {
    out: W,
}

impl TerminalReporter<StandardStream> {
    /// Reporter on stdout, colored when `use_colors` is set.
    pub fn stdout(use_colors: bool) -> Self {
        let choice = if use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> TerminalReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints the closing one-line summary.
    pub fn print_summary(&mut self, summary: &RunSummary) {
        let _ = writeln!(self.out);
        self.colored(Color::Green, &format!("{} passed", summary.passed));
        let _ = write!(self.out, ", ");
        self.colored(Color::Red, &format!("{} failed", summary.failed));
        let _ = write!(self.out, ", ");
        self.colored(Color::Yellow, &format!("{} errors", summary.errored));
        let _ = write!(self.out, ", {} not run", summary.not_run);
        if summary.pinned > 0 {
            let _ = write!(self.out, ", {} pinned", summary.pinned);
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn colored(&mut self, color: Color, text: &str) {
        let _ = self.out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(self.out, "{text}");
        let _ = self.out.reset();
    }

    fn marker(&mut self, marker: Marker) {
        let color = match marker {
            Marker::Ok => Color::Green,
            Marker::Fail => Color::Red,
            Marker::Err => Color::Yellow,
        };
        self.colored(color, marker.as_str());
        let _ = writeln!(self.out);
    }

    fn print_failure(&mut self, failure: &CaseFailure) {
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "{}", failure.headline);
        if let Some(execution) = &failure.execution {
            self.print_streams(execution);
        }
        if let Some(diff) = &failure.diff {
            let _ = writeln!(self.out, "-DIFF-");
            print_diff(&mut self.out, diff);
        }
    }

    fn print_streams(&mut self, execution: &ExecutionResult) {
        if !execution.stdout.is_empty() {
            let _ = writeln!(self.out, "-STDOUT-");
            let _ = writeln!(self.out, "{}", execution.stdout.trim_end_matches('\n'));
        }
        if !execution.stderr.is_empty() {
            let _ = writeln!(self.out, "-STDERR-");
            let _ = writeln!(self.out, "{}", execution.stderr.trim_end_matches('\n'));
        }
    }
}

impl<W: WriteColor> ProgressSink for TerminalReporter<W> {
    fn suite_started(&mut self, name: &str, depth: usize) {
        let _ = writeln!(self.out, "{}{name}", INDENT.repeat(depth));
        let _ = self.out.flush();
    }

    fn case_started(&mut self, name: &str, depth: usize) {
        let indent = INDENT.repeat(depth);
        let width = OUTPUT_WIDTH.saturating_sub(indent.len());
        let _ = write!(self.out, "{indent}{name:.<width$}");
        let _ = self.out.flush();
    }

    fn case_finished(&mut self, report: &CaseReport) {
        self.marker(report.status.marker());
        if let CaseStatus::Failed(failure) = &report.status {
            self.print_failure(failure);
        }
        let _ = self.out.flush();
    }
}

impl<W: WriteColor> BenchmarkSink for TerminalReporter<W> {
    fn benchmark_started(&mut self, dir: &Path) {
        let _ = writeln!(self.out, "Running {:?}...", dir.display().to_string());
        let _ = self.out.flush();
    }

    fn script_started(&mut self, script: &Path) {
        let _ = writeln!(self.out, "Running {:?}...", script.display().to_string());
        let _ = self.out.flush();
    }

    fn script_finished(&mut self, run: &BenchmarkRun) {
        match &run.result {
            Ok(result) if result.success() => {
                let _ = writeln!(self.out, "Elapsed time: {}", result.elapsed.as_secs_f64());
            }
            Ok(result) => {
                self.marker(Marker::Fail);
                let _ = writeln!(self.out, "{}", result.describe());
                self.print_streams(result);
            }
            Err(message) => {
                self.marker(Marker::Err);
                let _ = writeln!(self.out, "{message}");
            }
        }
        let _ = self.out.flush();
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

/// Prints unified-style diff text, coloring added and removed lines.
fn print_diff<W: WriteColor>(out: &mut W, diff: &str) {
    for line in diff.lines() {
        let color = if line.starts_with("+++") || line.starts_with("---") {
            None
        } else if line.starts_with('+') || line.starts_with('>') {
            Some(Color::Green)
        } else if line.starts_with('-') || line.starts_with('<') {
            Some(Color::Red)
        } else {
            None
        };
        match color {
            Some(color) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(color)));
                let _ = writeln!(out, "{line}");
                let _ = out.reset();
            }
            None => {
                let _ = writeln!(out, "{line}");
            }
        }
    }
}
