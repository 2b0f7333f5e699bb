//! Text differs.
//!
//! Both implementations ignore differences in the amount of whitespace, the
//! way `diff -b` does: runs of blanks compare equal to a single blank and
//! trailing blanks, a trailing carriage return included, are dropped.
//! Everything else must match exactly, including whether the text ends with
//! a newline.

use std::fs;
use std::path::Path;
use std::process::Command;

use difference::{Changeset, Difference};
use tracing::trace;

use crate::errors::{HarnessError, HarnessResult};

/// Produces a diff between an expected and an actual file.
pub trait TextDiffer {
    /// `Ok(None)` when the files match, `Ok(Some(diff))` when they do not.
    fn diff(&self, expected: &Path, actual: &Path) -> HarnessResult<Option<String>>;
}

// ============================================================================
// EXTERNAL
// ============================================================================

/// Runs an external diff command, `diff -b` by default.
#[derive(Debug, Clone)]
pub struct ExternalDiff {
    command: Vec<String>,
}

impl ExternalDiff {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl TextDiffer for ExternalDiff {
    fn diff(&self, expected: &Path, actual: &Path) -> HarnessResult<Option<String>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| HarnessError::tooling("diff", "empty diff command"))?;

        let output = Command::new(program)
            .args(args)
            .arg(expected)
            .arg(actual)
            .output()
            .map_err(|source| HarnessError::Spawn {
                program: program.into(),
                source,
            })?;
        trace!(program, status = ?output.status.code(), "diff finished");

        match output.status.code() {
            Some(0) => Ok(None),
            Some(1) if output.stdout.is_empty() => Ok(Some(format!(
                "{program} reported a difference but printed no diff"
            ))),
            Some(1) => Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned())),
            code => Err(HarnessError::tooling(
                program.clone(),
                format!(
                    "exited with {}: {}",
                    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            )),
        }
    }
}

// ============================================================================
// BUILTIN
// ============================================================================

/// In-process line diff over whitespace-normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDiff;

impl BuiltinDiff {
    /// Compares two texts directly.
    pub fn diff_text(&self, expected: &str, actual: &str) -> Option<String> {
        let expected = normalize_whitespace(expected);
        let actual = normalize_whitespace(actual);
        if expected == actual {
            return None;
        }
        let changeset = Changeset::new(&expected, &actual, "\n");
        Some(render_changeset(&changeset.diffs))
    }
}

impl TextDiffer for BuiltinDiff {
    fn diff(&self, expected: &Path, actual: &Path) -> HarnessResult<Option<String>> {
        let expected_text = fs::read_to_string(expected).map_err(|e| HarnessError::io(expected, e))?;
        let actual_text = fs::read_to_string(actual).map_err(|e| HarnessError::io(actual, e))?;
        Ok(self.diff_text(&expected_text, &actual_text).map(|body| {
            format!(
                "--- {}\n+++ {}\n{body}",
                expected.display(),
                actual.display()
            )
        }))
    }
}

/// Collapses every run of blanks to one space and strips trailing blanks,
/// line by line. Line structure is preserved, so a missing final newline
/// still counts as a difference.
pub fn normalize_whitespace(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let mut out = String::with_capacity(line.len());
            let mut in_blank = false;
            for ch in line.chars() {
                if ch == ' ' || ch == '\t' {
                    in_blank = true;
                    continue;
                }
                if in_blank {
                    out.push(' ');
                }
                in_blank = false;
                out.push(ch);
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a changeset as `-`/`+`/` ` prefixed lines.
fn render_changeset(diffs: &[Difference]) -> String {
    let mut out = String::new();
    for diff in diffs {
        let (prefix, text) = match diff {
            Difference::Same(x) => (' ', x),
            Difference::Rem(x) => ('-', x),
            Difference::Add(x) => ('+', x),
        };
        for line in text.split('\n') {
            out.push(prefix);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_width_is_ignored() {
        assert_eq!(normalize_whitespace("a   b\t\tc  \n"), "a b c\n");
        assert_eq!(normalize_whitespace("  x"), " x");
        assert_eq!(BuiltinDiff.diff_text("a  b\n", "a b\n"), None);
        assert_eq!(BuiltinDiff.diff_text("a b  \n", "a b\n"), None);
    }

    #[test]
    fn removed_blank_is_a_difference() {
        assert!(BuiltinDiff.diff_text("a b\n", "ab\n").is_some());
    }

    #[test]
    fn missing_final_newline_is_a_difference() {
        assert!(BuiltinDiff.diff_text("hello\n", "hello").is_some());
    }

    #[test]
    fn single_changed_line_shows_both_sides() {
        let diff = BuiltinDiff.diff_text("one\nhello\nthree\n", "one\ngoodbye\nthree\n").unwrap();
        assert!(diff.contains("-hello"), "{diff}");
        assert!(diff.contains("+goodbye"), "{diff}");
        assert!(diff.contains(" one"), "{diff}");
    }

    #[test]
    fn identical_text_has_no_diff() {
        assert_eq!(BuiltinDiff.diff_text("same\n", "same\n"), None);
    }

    #[test]
    fn carriage_returns_are_ignored() {
        assert_eq!(BuiltinDiff.diff_text("a\r\nb\r\n", "a\nb\n"), None);
    }

    // ------------------------------------------------------------------------
    // External differ
    // ------------------------------------------------------------------------

    fn files(expected: &str, actual: &str) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let exp = tmp.path().join("expected.txt");
        let act = tmp.path().join("actual.txt");
        fs::write(&exp, expected).unwrap();
        fs::write(&act, actual).unwrap();
        (tmp, exp, act)
    }

    fn shell(script: &str) -> ExternalDiff {
        ExternalDiff::new(vec!["sh".into(), "-c".into(), script.into(), "differ".into()])
    }

    #[test]
    fn external_exit_status_decides_the_verdict() {
        let (_tmp, exp, act) = files("a\n", "b\n");
        assert_eq!(shell("exit 0").diff(&exp, &act).unwrap(), None);
        assert_eq!(
            shell("echo \"< $1\"; exit 1").diff(&exp, &act).unwrap().as_deref(),
            Some(format!("< {}\n", exp.display()).as_str())
        );
        assert!(matches!(
            shell("echo broken >&2; exit 2").diff(&exp, &act),
            Err(HarnessError::Tooling { .. })
        ));
    }

    #[test]
    fn external_difference_without_output_still_explains() {
        let (_tmp, exp, act) = files("a\n", "b\n");
        let diff = shell("exit 1").diff(&exp, &act).unwrap().unwrap();
        assert_eq!(diff, "sh reported a difference but printed no diff");
    }

    #[test]
    fn missing_external_program_is_a_spawn_error() {
        let (_tmp, exp, act) = files("a\n", "a\n");
        let differ = ExternalDiff::new(vec!["golden-harness-no-such-diff".into()]);
        assert!(matches!(differ.diff(&exp, &act), Err(HarnessError::Spawn { .. })));
        assert!(matches!(
            ExternalDiff::new(vec![]).diff(&exp, &act),
            Err(HarnessError::Tooling { .. })
        ));
    }

    #[test]
    fn default_diff_command_ignores_blank_width() {
        if Command::new("diff").arg("--version").output().is_err() {
            return;
        }
        let differ = match crate::config::DiffBackend::default() {
            crate::config::DiffBackend::External { command } => ExternalDiff::new(command),
            crate::config::DiffBackend::Builtin => unreachable!(),
        };
        let (_tmp, exp, act) = files("a  b\nhello\n", "a b\nhello\n");
        assert_eq!(differ.diff(&exp, &act).unwrap(), None);

        let (_tmp, exp, act) = files("goodbye\n", "hello\n");
        let diff = differ.diff(&exp, &act).unwrap().unwrap();
        assert!(diff.contains("goodbye") && diff.contains("hello"), "{diff}");
    }
}
