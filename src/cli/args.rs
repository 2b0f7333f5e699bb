//! Defines the command-line arguments for the harness binaries.
//!
//! This module uses the `clap` crate with its "derive" feature. Flags only
//! override [`HarnessConfig`] fields; everything else comes from the config
//! file and environment.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{HarnessConfig, RunMode};

/// Arguments for `run_tests`.
#[derive(Debug, Parser)]
#[command(
    name = "run_tests",
    version,
    about = "Run golden-fixture integration tests in scratch environments."
)]
pub struct TestArgs {
    /// Top-level test directories to run (if empty, run all under the tests root).
    pub test_dirs: Vec<PathBuf>,

    /// Overwrite expected fixtures with their current values instead of comparing.
    #[arg(long)]
    pub pin: bool,

    #[command(flatten)]
    pub common: CommonArgs,

    /// Use the in-process diff and listing instead of `diff` and `tree`.
    #[arg(long)]
    pub builtin_tools: bool,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for `run_benchmarks`.
#[derive(Debug, Parser)]
#[command(
    name = "run_benchmarks",
    version,
    about = "Time benchmark scripts in freshly prepared scratch environments."
)]
pub struct BenchArgs {
    /// Benchmark directories to run (if empty, run all under the benchmarks root).
    pub benchmark_dirs: Vec<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Flags shared by both binaries.
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// YAML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-command wall-clock timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Shared scratch directory for this invocation.
    #[arg(long, value_name = "DIR")]
    pub scratch_root: Option<PathBuf>,
}

impl CommonArgs {
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        if let Some(root) = &self.scratch_root {
            config.scratch_root = root.clone();
        }
    }
}

impl TestArgs {
    /// Applies the flags on top of an already layered configuration.
    pub fn apply(&self, config: &mut HarnessConfig) {
        self.common.apply(config);
        if self.pin {
            config.mode = RunMode::Pin;
        }
        if self.builtin_tools {
            config.use_builtin_tools();
        }
        if self.no_color {
            config.use_colors = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffBackend;

    #[test]
    fn flags_override_config() {
        let args = TestArgs::parse_from([
            "run_tests",
            "--pin",
            "--timeout",
            "3",
            "--builtin-tools",
            "--no-color",
            "tests/b/",
            "tests/a",
        ]);
        let mut config = HarnessConfig::default();
        args.apply(&mut config);
        assert_eq!(config.mode, RunMode::Pin);
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.diff, DiffBackend::Builtin);
        assert!(!config.use_colors);
        assert_eq!(args.test_dirs.len(), 2);
    }

    #[test]
    fn no_arguments_means_verify_everything() {
        let args = TestArgs::parse_from(["run_tests"]);
        assert!(args.test_dirs.is_empty());
        assert!(!args.pin);
    }
}
