//! Filesystem snapshot facet.
//!
//! The listing is written to the `actual_fs.txt` sidecar in the scratch root
//! before it is compared, so a failed run leaves it behind for inspection.

use std::fs;
use std::path::PathBuf;

use super::{Comparator, Facet, Lister};
use crate::config::SnapshotRoot;
use crate::errors::{HarnessError, HarnessResult};
use crate::scratch::ScratchEnvironment;

pub const EXPECTED_FS: &str = "expected_fs.txt";

pub struct FilesystemComparator {
    lister: Box<dyn Lister>,
    snapshot_root: SnapshotRoot,
}

impl FilesystemComparator {
    pub fn new(lister: Box<dyn Lister>, snapshot_root: SnapshotRoot) -> Self {
        Self {
            lister,
            snapshot_root,
        }
    }
}

impl Comparator for FilesystemComparator {
    fn facet(&self) -> Facet {
        Facet::Filesystem
    }

    fn expectation_name(&self) -> String {
        EXPECTED_FS.to_string()
    }

    /// Snapshots are opt-in: pinning only refreshes an existing one.
    fn pin_creates(&self) -> bool {
        false
    }

    fn capture(&self, env: &ScratchEnvironment) -> HarnessResult<Option<PathBuf>> {
        let dir = match self.snapshot_root {
            SnapshotRoot::WorkingDir => &env.working_dir,
            SnapshotRoot::ScratchRoot => &env.root,
        };
        let listing = self.lister.list(dir)?;
        let sidecar = env.fs_sidecar();
        fs::write(&sidecar, listing).map_err(|e| HarnessError::io(&sidecar, e))?;
        Ok(Some(sidecar))
    }
}
