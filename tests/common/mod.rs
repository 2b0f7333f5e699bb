//! Shared fixture builders for the integration tests.
//!
//! Every test gets its own temporary tree holding both the case definitions
//! and the scratch root, and runs with the in-process diff and listing so no
//! external tools are required.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use golden_harness::config::RunMode;
use golden_harness::runner::SilentSink;
use golden_harness::{Harness, HarnessConfig, RunSummary};
use tempfile::TempDir;

pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tests_root(&self) -> PathBuf {
        self.path().join("tests")
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.path().join("scratch")
    }

    /// Creates `tests/<rel>` with an executable `run` script.
    pub fn case(&self, rel: &str, script: &str) -> PathBuf {
        let dir = self.tests_root().join(rel);
        fs::create_dir_all(&dir).unwrap();
        write_script(&dir.join("run"), script);
        dir
    }

    pub fn config(&self, mode: RunMode) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.scratch_root = self.scratch_root();
        config.tests_root = self.tests_root();
        config.timeout_secs = 10;
        config.use_colors = false;
        config.mode = mode;
        config.use_builtin_tools();
        config
    }

    pub fn run(&self, mode: RunMode, dirs: &[PathBuf]) -> RunSummary {
        Harness::new(self.config(mode))
            .run(dirs, &mut SilentSink)
            .unwrap()
    }
}

pub fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn write(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
