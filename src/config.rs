//! Harness configuration.
//!
//! The file-creation mask and the shared scratch root are process-wide in
//! effect but live here as plain values; they are threaded through the
//! scratch manager instead of being read from globals.
//!
//! Layering, lowest to highest: built-in defaults, an optional YAML file,
//! environment variables, command-line flags (applied by `cli`).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{HarnessError, HarnessResult};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Name of the directory created under the system temp dir.
pub const DEFAULT_SCRATCH_DIR_NAME: &str = "golden-harness";
pub const DEFAULT_WORKING_SUBDIR: &str = "repo";
/// Owner read/write, group and other read-only.
pub const DEFAULT_UMASK: u32 = 0o022;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOCK_ARTIFACT: &str = "lock.yaml";
pub const DEFAULT_TESTS_ROOT: &str = "integration/tests";
pub const DEFAULT_BENCHMARKS_ROOT: &str = "integration/benchmarks";

pub const ENV_SCRATCH_ROOT: &str = "HARNESS_SCRATCH_ROOT";
pub const ENV_TIMEOUT_SECS: &str = "HARNESS_TIMEOUT_SECS";
pub const ENV_NO_COLOR: &str = "NO_COLOR";

// ============================================================================
// CONFIG TYPES
// ============================================================================

/// Whether comparators check against their fixtures or overwrite them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Verify,
    Pin,
}

impl RunMode {
    pub fn is_pin(self) -> bool {
        self == RunMode::Pin
    }
}

/// Directory the filesystem-snapshot comparator lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotRoot {
    /// The case's working subdirectory; harness sidecars are excluded.
    #[default]
    WorkingDir,
    /// The whole scratch root, sidecars included.
    ScratchRoot,
}

/// How text fixtures are diffed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DiffBackend {
    /// An external command invoked as `<command...> <expected> <actual>`.
    /// Exit 0 means equal, 1 means different, anything else is a tooling error.
    External { command: Vec<String> },
    /// In-process line diff on whitespace-normalized text.
    Builtin,
}

impl Default for DiffBackend {
    fn default() -> Self {
        DiffBackend::External {
            command: vec!["diff".to_string(), "-b".to_string()],
        }
    }
}

/// How the filesystem snapshot is produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ListingBackend {
    /// An external command run with the snapshot root as working directory.
    External { command: Vec<String> },
    /// In-process walk producing one line per entry.
    Builtin,
}

impl Default for ListingBackend {
    fn default() -> Self {
        ListingBackend::External {
            command: ["tree", "-afisupg", "-v", "--noreport"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Configuration for one harness invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub scratch_root: PathBuf,
    pub working_subdir: String,
    pub umask: u32,
    pub timeout_secs: u64,
    pub lock_artifact: PathBuf,
    pub snapshot_root: SnapshotRoot,
    pub diff: DiffBackend,
    pub listing: ListingBackend,
    pub tests_root: PathBuf,
    pub benchmarks_root: PathBuf,
    pub use_colors: bool,
    pub mode: RunMode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scratch_root: env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME),
            working_subdir: DEFAULT_WORKING_SUBDIR.to_string(),
            umask: DEFAULT_UMASK,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            lock_artifact: PathBuf::from(DEFAULT_LOCK_ARTIFACT),
            snapshot_root: SnapshotRoot::default(),
            diff: DiffBackend::default(),
            listing: ListingBackend::default(),
            tests_root: PathBuf::from(DEFAULT_TESTS_ROOT),
            benchmarks_root: PathBuf::from(DEFAULT_BENCHMARKS_ROOT),
            use_colors: atty::is(atty::Stream::Stdout),
            mode: RunMode::default(),
        }
    }
}

impl HarnessConfig {
    /// Loads a YAML configuration file on top of the defaults.
    pub fn from_yaml_file(path: &Path) -> HarnessResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::from_yaml_str(&text).map_err(|message| HarnessError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses YAML text; an empty document yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    /// Applies `HARNESS_SCRATCH_ROOT`, `HARNESS_TIMEOUT_SECS` and `NO_COLOR`.
    pub fn apply_env(&mut self) -> HarnessResult<()> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> HarnessResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_SCRATCH_ROOT).filter(|v| !v.is_empty()) {
            self.scratch_root = PathBuf::from(root);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.is_empty()) {
            self.timeout_secs = secs.trim().parse().map_err(|_| HarnessError::Config {
                path: PathBuf::from(format!("${ENV_TIMEOUT_SECS}")),
                message: format!("expected a whole number of seconds, got {secs:?}"),
            })?;
        }
        if lookup(ENV_NO_COLOR).is_some_and(|v| !v.is_empty()) {
            self.use_colors = false;
        }
        Ok(())
    }

    /// Switches both comparator tools to their in-process implementations.
    pub fn use_builtin_tools(&mut self) {
        self.diff = DiffBackend::Builtin;
        self.listing = ListingBackend::Builtin;
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// File name of the golden lock artifact: `expected_<artifact file name>`.
    pub fn lock_expectation_name(&self) -> String {
        let file_name = self
            .lock_artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOCK_ARTIFACT.to_string());
        format!("expected_{file_name}")
    }
}
