//! The harness command-line interface.
//!
//! Each binary under `src/bin/` calls one entry point here. They layer the
//! configuration, install logging, run, and map the outcome to an exit code:
//! 0 when everything passed, 1 when any case failed, 2 on a fatal error.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::bench::BenchmarkRunner;
use crate::config::HarnessConfig;
use crate::errors::HarnessResult;
use crate::exec::Executor;
use crate::runner::Harness;
use crate::scratch::ScratchManager;

pub mod args;
pub mod output;

use args::{BenchArgs, CommonArgs, TestArgs};
use output::TerminalReporter;

const EXIT_FAILURE: u8 = 1;
const EXIT_FATAL: u8 = 2;

/// Entry point for `run_tests`.
pub fn run_tests() -> ExitCode {
    init_logging();
    let args = TestArgs::parse();
    match run_tests_with(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Entry point for `run_benchmarks`.
pub fn run_benchmarks() -> ExitCode {
    init_logging();
    let args = BenchArgs::parse();
    match run_benchmarks_with(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Runs the selected tests; `Ok(true)` iff every top-level directory passed.
pub fn run_tests_with(args: &TestArgs) -> HarnessResult<bool> {
    let mut config = layered_config(&args.common)?;
    args.apply(&mut config);

    let mut reporter = TerminalReporter::stdout(config.use_colors);
    let harness = Harness::new(config);
    let dirs = harness.select(&args.test_dirs)?;
    let summary = harness.run(&dirs, &mut reporter)?;
    reporter.print_summary(&summary);
    Ok(summary.success())
}

pub fn run_benchmarks_with(args: &BenchArgs) -> HarnessResult<()> {
    let config = layered_config(&args.common)?;
    let dirs = if args.benchmark_dirs.is_empty() {
        crate::discovery::default_selection(&config.benchmarks_root)?
    } else {
        crate::paths::normalize_paths(&args.benchmark_dirs)
    };

    let mut reporter = TerminalReporter::stdout(config.use_colors);
    let runner = BenchmarkRunner::new(ScratchManager::new(&config), Executor::new(config.timeout()));
    runner.run(&dirs, &mut reporter)?;
    Ok(())
}

/// Defaults, then the config file, then the environment, then shared flags.
fn layered_config(common: &CommonArgs) -> HarnessResult<HarnessConfig> {
    let mut config = match &common.config {
        Some(path) => HarnessConfig::from_yaml_file(path)?,
        None => HarnessConfig::default(),
    };
    config.apply_env()?;
    common.apply(&mut config);
    Ok(config)
}

/// Logs go to stderr so the progress stream on stdout stays clean.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}
