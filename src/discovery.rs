//! Test discovery.
//!
//! Turns a selected directory into a [`TestNode`] tree once, before anything
//! runs. Leaf-ness is decided here and never re-derived: a directory with a
//! `run` file is a [`LeafCase`]; otherwise its case-like subdirectories make
//! it a [`Suite`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{HarnessError, HarnessResult};
use crate::paths::{dir_label, normalize_paths};

/// Entry point every leaf case must provide.
pub const RUN_SCRIPT: &str = "run";
/// Optional input tree copied into the scratch working directory.
pub const DATA_DIR: &str = "data";

// ============================================================================
// NODE TYPES
// ============================================================================

/// A directory holding one runnable case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCase {
    pub path: PathBuf,
    pub name: String,
}

impl LeafCase {
    pub fn run_script(&self) -> PathBuf {
        self.path.join(RUN_SCRIPT)
    }

    /// The case's `data/` directory, if it has one.
    pub fn data_dir(&self) -> Option<PathBuf> {
        let dir = self.path.join(DATA_DIR);
        dir.is_dir().then_some(dir)
    }
}

/// A directory whose children are themselves cases or suites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub path: PathBuf,
    pub name: String,
    pub children: Vec<TestNode>,
}

/// One node of the discovered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestNode {
    Leaf(LeafCase),
    Suite(Suite),
}

impl TestNode {
    pub fn name(&self) -> &str {
        match self {
            TestNode::Leaf(case) => &case.name,
            TestNode::Suite(suite) => &suite.name,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TestNode::Leaf(case) => &case.path,
            TestNode::Suite(suite) => &suite.path,
        }
    }

    /// Number of leaf cases in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            TestNode::Leaf(_) => 1,
            TestNode::Suite(suite) => suite.children.iter().map(TestNode::leaf_count).sum(),
        }
    }
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// Returns true if `dir` contains a `run` entry point.
pub fn is_leaf_dir(dir: &Path) -> bool {
    dir.join(RUN_SCRIPT).is_file()
}

/// Classifies `dir` and, for suites, its whole subtree.
///
/// Subdirectories that are neither cases nor suites (a leaf's `data/`, stray
/// folders) are skipped. A top-level directory that is neither is an error.
pub fn discover(dir: &Path) -> HarnessResult<TestNode> {
    match discover_node(dir)? {
        Some(node) => Ok(node),
        None => Err(HarnessError::NotATest {
            path: dir.to_path_buf(),
        }),
    }
}

fn discover_node(dir: &Path) -> HarnessResult<Option<TestNode>> {
    let name = dir_label(dir);
    if is_leaf_dir(dir) {
        debug!(path = %dir.display(), "discovered leaf case");
        return Ok(Some(TestNode::Leaf(LeafCase {
            path: dir.to_path_buf(),
            name,
        })));
    }
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut children = Vec::new();
    for sub_dir in list_subdirs(dir)? {
        match discover_node(&sub_dir)? {
            Some(child) => children.push(child),
            None => debug!(path = %sub_dir.display(), "skipping non-case directory"),
        }
    }
    if children.is_empty() {
        return Ok(None);
    }
    debug!(path = %dir.display(), children = children.len(), "discovered suite");
    Ok(Some(TestNode::Suite(Suite {
        path: dir.to_path_buf(),
        name,
        children,
    })))
}

/// Immediate subdirectories of `dir`, normalized and sorted.
pub fn list_subdirs(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| HarnessError::io(dir, e))?;
    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    Ok(normalize_paths(subdirs))
}

/// The default selection: every subdirectory of `root` (the `<root>/*` glob).
pub fn default_selection(root: &Path) -> HarnessResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    list_subdirs(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_run(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(RUN_SCRIPT), "#!/bin/sh\n").unwrap();
    }

    #[test]
    fn leaf_wins_over_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let case = tmp.path().join("case");
        touch_run(&case);
        touch_run(&case.join("nested"));
        fs::create_dir_all(case.join("data")).unwrap();

        match discover(&case).unwrap() {
            TestNode::Leaf(leaf) => {
                assert_eq!(leaf.name, "case");
                assert_eq!(leaf.data_dir(), Some(case.join("data")));
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn suites_skip_non_case_children() {
        let tmp = tempfile::tempdir().unwrap();
        let suite = tmp.path().join("suite");
        touch_run(&suite.join("b"));
        touch_run(&suite.join("a"));
        fs::create_dir_all(suite.join("notes")).unwrap();

        let node = discover(&suite).unwrap();
        assert_eq!(node.leaf_count(), 2);
        match node {
            TestNode::Suite(suite) => {
                let names: Vec<_> = suite.children.iter().map(TestNode::name).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("expected suite, got {other:?}"),
        }
    }

    #[test]
    fn empty_directory_is_not_a_test() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(tmp.path()),
            Err(HarnessError::NotATest { .. })
        ));
    }

    #[test]
    fn missing_root_selects_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(default_selection(&tmp.path().join("absent")).unwrap().is_empty());
    }
}
