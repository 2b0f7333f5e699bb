//! Filesystem listings for the snapshot comparator.
//!
//! A listing has one line per entry: permission bits, owner, group, size,
//! path, and symlink target. The invoking user's name is replaced with
//! [`USER_PLACEHOLDER`] so fixtures pinned on one machine verify on another.

use std::cmp::Ordering;
use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

use regex::Regex;
use tracing::trace;
use walkdir::WalkDir;

use crate::errors::{HarnessError, HarnessResult};

pub const USER_PLACEHOLDER: &str = "user";

/// Produces a textual listing of a directory tree.
pub trait Lister {
    fn list(&self, dir: &Path) -> HarnessResult<String>;
}

// ============================================================================
// EXTERNAL
// ============================================================================

/// Runs an external listing command (`tree -afisupg -v --noreport` by
/// default) with `dir` as its working directory.
#[derive(Debug, Clone)]
pub struct ExternalListing {
    command: Vec<String>,
}

impl ExternalListing {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Lister for ExternalListing {
    fn list(&self, dir: &Path) -> HarnessResult<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| HarnessError::tooling("listing", "empty listing command"))?;

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|source| HarnessError::Spawn {
                program: program.into(),
                source,
            })?;
        trace!(program, status = ?output.status.code(), "listing finished");

        if !output.status.success() {
            return Err(HarnessError::tooling(
                program.clone(),
                format!(
                    "{}: {}",
                    output
                        .status
                        .code()
                        .map_or_else(|| "killed by a signal".to_string(), |c| format!("exit status {c}")),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(match current_user_name() {
            Some(user) => normalize_user(&text, &user),
            None => text.into_owned(),
        })
    }
}

/// Name of the user running the harness.
pub fn current_user_name() -> Option<String> {
    for key in ["USER", "LOGNAME"] {
        if let Ok(name) = env::var(key) {
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    let output = Command::new("id").arg("-un").output().ok()?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !name.is_empty()).then_some(name)
}

/// Replaces whole-word occurrences of `user` inside each line's leading
/// `[...]` attribute block. Paths are left alone.
pub fn normalize_user(listing: &str, user: &str) -> String {
    let Ok(word) = Regex::new(&format!(r"\b{}\b", regex::escape(user))) else {
        return listing.to_string();
    };
    listing
        .split_inclusive('\n')
        .map(|line| match (line.starts_with('['), line.find(']')) {
            (true, Some(end)) => {
                let attrs = word.replace_all(&line[..end], USER_PLACEHOLDER);
                format!("{attrs}{}", &line[end..])
            }
            _ => line.to_string(),
        })
        .collect()
}

// ============================================================================
// BUILTIN
// ============================================================================

/// In-process listing in a `tree -afisupg`-like layout.
///
/// Directory sizes are reported as 0 and owners as [`USER_PLACEHOLDER`] when
/// they are the caller's own ids, so the text depends only on the tree's
/// content and permission bits. It is not byte-compatible with `tree`;
/// fixtures must be pinned with the backend that verifies them.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinListing;

impl Lister for BuiltinListing {
    fn list(&self, dir: &Path) -> HarnessResult<String> {
        let mut out = String::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by(|a, b| version_cmp(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy()));
        for entry in walker {
            let entry = entry.map_err(|e| {
                HarnessError::tooling("builtin listing", format!("{}: {e}", dir.display()))
            })?;
            let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            let shown = if rel.as_os_str().is_empty() {
                ".".to_string()
            } else {
                format!("./{}", rel.display())
            };
            let meta = fs::symlink_metadata(entry.path()).map_err(|e| HarnessError::io(entry.path(), e))?;
            out.push_str(&format!("[{}]  {shown}", attributes(&meta)));
            if meta.file_type().is_symlink() {
                let target = fs::read_link(entry.path()).map_err(|e| HarnessError::io(entry.path(), e))?;
                out.push_str(&format!(" -> {}", target.display()));
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn attributes(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;

    // SAFETY: geteuid/getegid cannot fail.
    let (uid, gid) = unsafe { (libc::geteuid(), libc::getegid()) };
    let owner = if meta.uid() == uid {
        USER_PLACEHOLDER.to_string()
    } else {
        meta.uid().to_string()
    };
    let group = if meta.gid() == gid {
        USER_PLACEHOLDER.to_string()
    } else {
        meta.gid().to_string()
    };
    let size = if meta.is_dir() { 0 } else { meta.len() };
    format!("{} {owner} {group} {size:>11}", mode_string(meta.mode(), &meta.file_type()))
}

#[cfg(not(unix))]
fn attributes(meta: &fs::Metadata) -> String {
    let kind = if meta.is_dir() { 'd' } else { '-' };
    let size = if meta.is_dir() { 0 } else { meta.len() };
    format!("{kind} {USER_PLACEHOLDER} {USER_PLACEHOLDER} {size:>11}")
}

/// `ls -l` style type and permission string, e.g. `drwxr-xr-x`.
#[cfg(unix)]
pub fn mode_string(mode: u32, file_type: &fs::FileType) -> String {
    use std::os::unix::fs::FileTypeExt;

    let kind = if file_type.is_dir() {
        'd'
    } else if file_type.is_symlink() {
        'l'
    } else if file_type.is_fifo() {
        'p'
    } else if file_type.is_socket() {
        's'
    } else if file_type.is_char_device() {
        'c'
    } else if file_type.is_block_device() {
        'b'
    } else {
        '-'
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Version-aware name ordering: digit runs compare numerically, so
/// `file2` sorts before `file10`.
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => {
                        let xs = x.trim_start_matches('0');
                        let ys = y.trim_start_matches('0');
                        xs.len().cmp(&ys.len()).then_with(|| xs.cmp(ys))
                    }
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Splits `s` into alternating runs of ASCII digits and non-digits.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map_or(rest.len(), |(i, _)| i);
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_order_is_numeric_aware() {
        let mut names = vec!["file10", "file2", "file1", "a", "file02b"];
        names.sort_by(|a, b| version_cmp(a, b));
        assert_eq!(names, vec!["a", "file1", "file2", "file02b", "file10"]);
    }

    #[test]
    fn user_is_replaced_only_in_attributes() {
        let listing = "[drwxr-xr-x alice    staff      4096]  .\n[-rw-r--r-- alice    alice         3]  ./alice.txt\n";
        let got = normalize_user(listing, "alice");
        assert_eq!(
            got,
            "[drwxr-xr-x user    staff      4096]  .\n[-rw-r--r-- user    user         3]  ./alice.txt\n"
        );
    }

    #[test]
    fn external_listing_runs_inside_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();

        let lister = ExternalListing::new(vec!["ls".into(), "-1".into()]);
        assert_eq!(lister.list(tmp.path()).unwrap(), "a.txt\nb.txt\n");
    }

    #[test]
    fn external_listing_normalizes_the_current_user() {
        let Some(user) = current_user_name() else {
            return;
        };
        let tmp = tempfile::tempdir().unwrap();
        let lister = ExternalListing::new(vec![
            "sh".into(),
            "-c".into(),
            "printf '[-rw-r--r-- %s %s 3]  ./%s\\n' \"$1\" \"$1\" \"$1\"".into(),
            "lister".into(),
            user.clone(),
        ]);
        assert_eq!(
            lister.list(tmp.path()).unwrap(),
            format!("[-rw-r--r-- {USER_PLACEHOLDER} {USER_PLACEHOLDER} 3]  ./{user}\n")
        );
    }

    #[test]
    fn failing_external_listing_is_a_tooling_error() {
        let tmp = tempfile::tempdir().unwrap();
        let failing = ExternalListing::new(vec!["sh".into(), "-c".into(), "exit 3".into()]);
        assert!(matches!(failing.list(tmp.path()), Err(HarnessError::Tooling { .. })));

        let missing = ExternalListing::new(vec!["golden-harness-no-such-lister".into()]);
        assert!(matches!(missing.list(tmp.path()), Err(HarnessError::Spawn { .. })));
    }

    #[test]
    fn default_listing_command_lists_every_entry() {
        if Command::new("tree").arg("--version").output().is_err() {
            return;
        }
        let lister = match crate::config::ListingBackend::default() {
            crate::config::ListingBackend::External { command } => ExternalListing::new(command),
            crate::config::ListingBackend::Builtin => unreachable!(),
        };
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/file2"), "xy").unwrap();
        fs::write(tmp.path().join("file10"), "").unwrap();

        let listing = lister.list(tmp.path()).unwrap();
        assert!(listing.contains("./sub/file2"), "{listing}");
        assert!(listing.contains("./file10"), "{listing}");
    }

    #[cfg(unix)]
    #[test]
    fn mode_string_renders_permission_bits() {
        let dir = std::env::temp_dir();
        let file_type = fs::symlink_metadata(&dir).unwrap().file_type();
        assert_eq!(mode_string(0o755, &file_type), "drwxr-xr-x");
        assert_eq!(&mode_string(0o640, &file_type)[1..], "rw-r-----");
    }
}
