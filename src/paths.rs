//! Path normalization for test selection.
//!
//! Downstream joins are sensitive to trailing separators, and the run order
//! must not depend on how the caller spelled or ordered its arguments.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Lexically normalizes one path: drops trailing separators and `.` segments
/// and folds `..` into the preceding normal segment.
///
/// The filesystem is never consulted, so symlinks are not resolved and the
/// path does not need to exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_in_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if ends_in_normal {
                    out.pop();
                } else if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Normalizes every path, sorts them and collapses duplicates.
///
/// An empty input yields an empty output; callers decide what that means
/// (the CLI treats it as "run the default set").
pub fn normalize_paths<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut normalized: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| normalize_path(p.as_ref()))
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Display label for a path: its last normal segment, or the whole path
/// when it has none (`.` or `/`).
pub fn display_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

/// Name of the directory `path` refers to, with `.`, `..` and symlinks
/// resolved through the filesystem. `None` for `/` or a missing path.
pub fn resolved_name(path: &Path) -> Option<String> {
    let resolved = fs::canonicalize(path).ok()?;
    resolved.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// Label for a directory that exists: its resolved name, or the spelling
/// given when it cannot be resolved.
pub fn dir_label(path: &Path) -> String {
    resolved_name(path).unwrap_or_else(|| display_name(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_separators_and_duplicates_collapse() {
        let got = normalize_paths(["b/", "a", "a/"]);
        assert_eq!(got, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn relative_segments_are_resolved() {
        assert_eq!(normalize_path(Path::new("x/./y/../z/")), PathBuf::from("x/z"));
        assert_eq!(normalize_path(Path::new("./x")), PathBuf::from("x"));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("x/..")), PathBuf::from("."));
    }

    #[test]
    fn empty_input_stays_empty() {
        let none: [&str; 0] = [];
        assert!(normalize_paths(none).is_empty());
    }

    #[test]
    fn order_does_not_depend_on_input_order() {
        let a = normalize_paths(["tests/b", "tests/a/", "tests/c"]);
        let b = normalize_paths(["tests/c/", "tests/b", "tests/a"]);
        assert_eq!(a, b);
    }

    #[test]
    fn display_name_uses_last_segment() {
        assert_eq!(display_name(Path::new("tests/basic")), "basic");
        assert_eq!(display_name(Path::new(".")), ".");
    }

    #[test]
    fn resolved_name_sees_through_dot_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let case = tmp.path().join("case");
        fs::create_dir_all(case.join("data")).unwrap();

        assert_eq!(resolved_name(&case.join(".")).as_deref(), Some("case"));
        assert_eq!(resolved_name(&case.join("data/..")).as_deref(), Some("case"));
        assert_eq!(resolved_name(&tmp.path().join("absent")), None);
        assert_eq!(dir_label(&tmp.path().join("absent")), "absent");
    }
}
