//! Scratch environments.
//!
//! Every leaf case runs inside `<scratch_root>/<case name>/<working_subdir>`.
//! The scratch root is shared by the whole invocation and created once; each
//! case directory under it is wiped and rebuilt right before the case runs
//! and left behind afterwards for inspection.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::HarnessConfig;
use crate::discovery::{LeafCase, DATA_DIR};
use crate::errors::{HarnessError, HarnessResult};

/// Sidecar holding the case's captured standard output.
pub const OUTPUT_SIDECAR: &str = "actual_output.txt";
/// Sidecar holding the captured filesystem listing.
pub const FS_SIDECAR: &str = "actual_fs.txt";

/// An isolated, disposable directory tree bound to one case run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchEnvironment {
    /// `<scratch_root>/<case name>`; holds the sidecars.
    pub root: PathBuf,
    /// Where the case's command executes.
    pub working_dir: PathBuf,
}

impl ScratchEnvironment {
    pub fn output_sidecar(&self) -> PathBuf {
        self.root.join(OUTPUT_SIDECAR)
    }

    pub fn fs_sidecar(&self) -> PathBuf {
        self.root.join(FS_SIDECAR)
    }
}

/// Creates scratch environments under one shared root.
#[derive(Debug, Clone)]
pub struct ScratchManager {
    scratch_root: PathBuf,
    working_subdir: String,
    umask: u32,
}

impl ScratchManager {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            scratch_root: config.scratch_root.clone(),
            working_subdir: config.working_subdir.clone(),
            umask: config.umask,
        }
    }

    /// One-time setup for the invocation: applies the file-creation mask and
    /// creates the shared root. Failure here aborts the whole run.
    pub fn init(&self) -> HarnessResult<()> {
        apply_umask(self.umask);
        fs::create_dir_all(&self.scratch_root)
            .map_err(|e| HarnessError::setup(&self.scratch_root, e))?;
        debug!(root = %self.scratch_root.display(), umask = format!("{:03o}", self.umask), "scratch root ready");
        Ok(())
    }

    /// Builds a fresh environment for `case`, copying in its `data/` tree.
    pub fn prepare(&self, case: &LeafCase) -> HarnessResult<ScratchEnvironment> {
        self.prepare_named(&case.name, case.data_dir().as_deref())
    }

    /// Builds a fresh environment named `name`, optionally seeded from `data`.
    ///
    /// `name` must be a single plain path segment, so the directory that gets
    /// wiped is always a direct child of the scratch root.
    pub fn prepare_named(&self, name: &str, data: Option<&Path>) -> HarnessResult<ScratchEnvironment> {
        let root = self.case_root(name)?;
        if root.exists() {
            debug!(path = %root.display(), "removing previous scratch directory");
            fs::remove_dir_all(&root).map_err(|e| HarnessError::setup(&root, e))?;
        }
        let working_dir = root.join(&self.working_subdir);
        fs::create_dir_all(&working_dir).map_err(|e| HarnessError::setup(&working_dir, e))?;

        if let Some(data) = data {
            let dest = working_dir.join(DATA_DIR);
            debug!(from = %data.display(), to = %dest.display(), "copying input data");
            copy_tree(data, &dest)?;
            sync_barrier();
        }

        Ok(ScratchEnvironment { root, working_dir })
    }

    fn case_root(&self, name: &str) -> HarnessResult<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) => Ok(self.scratch_root.join(segment)),
            _ => Err(HarnessError::setup(
                self.scratch_root.join(name),
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{name:?} is not a usable scratch directory name"),
                ),
            )),
        }
    }
}

/// Recursively copies `src` to `dest`, recreating symlinks rather than
/// following them.
pub fn copy_tree(src: &Path, dest: &Path) -> HarnessResult<()> {
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            HarnessError::setup(path, io::Error::other(e.to_string()))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| HarnessError::setup(entry.path(), io::Error::other(e.to_string())))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| HarnessError::setup(&target, e))?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|e| HarnessError::setup(entry.path(), e))?;
            make_symlink(&link, &target).map_err(|e| HarnessError::setup(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| HarnessError::setup(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let _ = (link, target);
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks in case data require a unix host",
    ))
}

/// Sets the process-wide file-creation mask. Child processes inherit it.
#[cfg(unix)]
pub fn apply_umask(mask: u32) {
    // SAFETY: umask has no memory-safety preconditions.
    unsafe {
        libc::umask(mask as libc::mode_t);
    }
}

#[cfg(not(unix))]
pub fn apply_umask(_mask: u32) {}

/// Flushes filesystem buffers so copied data is durable before a case runs.
#[cfg(unix)]
pub fn sync_barrier() {
    // SAFETY: sync takes no arguments and cannot fail.
    unsafe { libc::sync() };
}

#[cfg(not(unix))]
pub fn sync_barrier() {}
