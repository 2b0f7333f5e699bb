//! Benchmark runner.
//!
//! A benchmark directory holds one or more `run_<tool>` scripts and usually a
//! `data/` tree. Each script gets its own freshly prepared scratch
//! environment and is timed; nothing is compared.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::discovery::DATA_DIR;
use crate::errors::{HarnessError, HarnessResult};
use crate::exec::{CommandSpec, ExecutionResult, Executor};
use crate::paths::dir_label;
use crate::scratch::ScratchManager;

/// Prefix shared by all benchmark entry points.
pub const BENCH_SCRIPT_PREFIX: &str = "run_";

/// One timed script.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    /// The script, or the benchmark directory when it could not be listed.
    pub script: PathBuf,
    /// `Err` holds the reason when the script could not be launched or its
    /// scratch environment could not be prepared.
    pub result: Result<ExecutionResult, String>,
}

impl BenchmarkRun {
    pub fn elapsed(&self) -> Option<Duration> {
        match &self.result {
            Ok(result) if result.success() => Some(result.elapsed),
            _ => None,
        }
    }
}

/// Receives benchmark progress.
pub trait BenchmarkSink {
    fn benchmark_started(&mut self, dir: &Path);
    fn script_started(&mut self, script: &Path);
    fn script_finished(&mut self, run: &BenchmarkRun);
}

/// Runs benchmark directories with shared scratch and executor settings.
#[derive(Debug)]
pub struct BenchmarkRunner {
    scratch: ScratchManager,
    executor: Executor,
}

impl BenchmarkRunner {
    pub fn new(scratch: ScratchManager, executor: Executor) -> Self {
        Self { scratch, executor }
    }

    /// Runs every `run_<tool>` script of every directory, in sorted order.
    ///
    /// A directory whose scripts cannot be listed is reported as one failed
    /// run and the remaining directories still run.
    pub fn run(&self, dirs: &[PathBuf], sink: &mut dyn BenchmarkSink) -> HarnessResult<Vec<BenchmarkRun>> {
        self.scratch.init()?;
        let mut runs = Vec::new();
        for dir in dirs {
            sink.benchmark_started(dir);
            let scripts = match bench_scripts(dir) {
                Ok(scripts) => scripts,
                Err(error) => {
                    warn!(dir = %dir.display(), "cannot list benchmark scripts");
                    let run = BenchmarkRun {
                        script: dir.clone(),
                        result: Err(crate::runner::error_chain(&error)),
                    };
                    sink.script_finished(&run);
                    runs.push(run);
                    continue;
                }
            };
            for script in scripts {
                sink.script_started(&script);
                let run = BenchmarkRun {
                    result: self.run_script(dir, &script).map_err(|e| crate::runner::error_chain(&e)),
                    script,
                };
                sink.script_finished(&run);
                runs.push(run);
            }
        }
        Ok(runs)
    }

    fn run_script(&self, dir: &Path, script: &Path) -> HarnessResult<ExecutionResult> {
        let data = dir.join(DATA_DIR);
        let env = self
            .scratch
            .prepare_named(&dir_label(dir), data.is_dir().then_some(data.as_path()))?;
        let script = fs::canonicalize(script).map_err(|e| HarnessError::setup(script, e))?;
        debug!(script = %script.display(), "timing benchmark script");
        self.executor.run(&CommandSpec::new(script, &env.working_dir))
    }
}

/// Files in `dir` named `run_<tool>`, sorted.
pub fn bench_scripts(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| HarnessError::io(dir, e))?;
    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HarnessError::io(dir, e))?;
        let path = entry.path();
        let is_script = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(BENCH_SCRIPT_PREFIX) && n.len() > BENCH_SCRIPT_PREFIX.len());
        if is_script && path.is_file() {
            scripts.push(path);
        }
    }
    scripts.sort();
    Ok(scripts)
}
