//! Suite runner and result aggregation.
//!
//! A leaf case runs in phases: prepare scratch, execute, then each applicable
//! comparator in fixed order (output, filesystem, lock artifact). The first
//! failing phase ends the case. Suites run their children in sorted order and
//! stop at the first failing child; its remaining siblings are never started.
//!
//! Nothing that goes wrong inside a case escapes it: every error becomes a
//! [`CaseFailure`] classified by the phase that produced it.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info_span};

use crate::config::HarnessConfig;
use crate::discovery::{self, LeafCase, TestNode};
use crate::errors::{HarnessError, HarnessResult};
use crate::exec::{CommandSpec, ExecutionResult, Executor};
use crate::fixtures::{Facet, FixtureSet, Verdict};
use crate::paths::{dir_label, normalize_paths};
use crate::scratch::ScratchManager;

/// Absolute path of the case definition directory, for the run script.
pub const ENV_CASE_DIR: &str = "HARNESS_CASE_DIR";
/// Scratch root of the running case.
pub const ENV_SCRATCH_DIR: &str = "HARNESS_SCRATCH_DIR";

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Terminal marker printed after each leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Ok,
    Fail,
    Err,
}

impl Marker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::Ok => "OK",
            Marker::Fail => "FAIL",
            Marker::Err => "ERR",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which phase of a case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Scratch environment, discovery, or launching the run script.
    Setup,
    /// Non-zero exit or timeout.
    Execution,
    /// A fixture did not match.
    Mismatch,
    /// A comparator's own tooling broke.
    Tooling,
}

impl FailureKind {
    /// Harness problems print `ERR`; regressions print `FAIL`.
    pub fn marker(&self) -> Marker {
        match self {
            FailureKind::Setup | FailureKind::Tooling => Marker::Err,
            FailureKind::Execution | FailureKind::Mismatch => Marker::Fail,
        }
    }
}

/// Everything needed to explain a failed case without re-running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFailure {
    pub kind: FailureKind,
    pub headline: String,
    pub facet: Option<Facet>,
    pub execution: Option<ExecutionResult>,
    pub diff: Option<String>,
}

impl CaseFailure {
    fn new(kind: FailureKind, headline: impl Into<String>) -> Self {
        Self {
            kind,
            headline: headline.into(),
            facet: None,
            execution: None,
            diff: None,
        }
    }
}

/// Final state of a leaf case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    Passed { pinned: Vec<Facet> },
    Failed(CaseFailure),
}

impl CaseStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CaseStatus::Passed { .. })
    }

    pub fn marker(&self) -> Marker {
        match self {
            CaseStatus::Passed { .. } => Marker::Ok,
            CaseStatus::Failed(failure) => failure.kind.marker(),
        }
    }
}

/// Result of one leaf, as reported to the progress sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub name: String,
    pub path: PathBuf,
    pub depth: usize,
    pub status: CaseStatus,
}

/// Aggregate over a whole invocation.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Leaves skipped because an earlier sibling failed.
    pub not_run: usize,
    pub pinned: usize,
    pub cases: Vec<CaseReport>,
}

impl RunSummary {
    /// True iff no case failed or errored.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    /// Names of the leaves that actually executed, in order.
    pub fn executed(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name.as_str()).collect()
    }

    fn record(&mut self, report: CaseReport) {
        match &report.status {
            CaseStatus::Passed { pinned } => {
                self.passed += 1;
                self.pinned += pinned.len();
            }
            CaseStatus::Failed(failure) => match failure.kind.marker() {
                Marker::Err => self.errored += 1,
                _ => self.failed += 1,
            },
        }
        self.cases.push(report);
    }
}

// ============================================================================
// PROGRESS SINK
// ============================================================================

/// Receives hierarchical progress as the run advances.
pub trait ProgressSink {
    fn suite_started(&mut self, name: &str, depth: usize);
    fn case_started(&mut self, name: &str, depth: usize);
    fn case_finished(&mut self, report: &CaseReport);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn suite_started(&mut self, _name: &str, _depth: usize) {}
    fn case_started(&mut self, _name: &str, _depth: usize) {}
    fn case_finished(&mut self, _report: &CaseReport) {}
}

// ============================================================================
// HARNESS
// ============================================================================

/// Owns the configured pieces for one invocation.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    scratch: ScratchManager,
    executor: Executor,
    fixtures: FixtureSet,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        let fixtures = FixtureSet::from_config(&config);
        Self::with_fixtures(config, fixtures)
    }

    /// Builds a harness with a caller-supplied comparator set.
    pub fn with_fixtures(config: HarnessConfig, fixtures: FixtureSet) -> Self {
        Self {
            scratch: ScratchManager::new(&config),
            executor: Executor::new(config.timeout()),
            fixtures,
            config,
        }
    }

    /// Test directories to run: the given ones, or `<tests_root>/*` when
    /// none were given. Always normalized and sorted.
    pub fn select(&self, dirs: &[PathBuf]) -> HarnessResult<Vec<PathBuf>> {
        if dirs.is_empty() {
            return discovery::default_selection(&self.config.tests_root);
        }
        Ok(normalize_paths(dirs))
    }

    /// Runs every directory independently and folds the results.
    ///
    /// Only failing to set up the shared scratch root is an `Err`.
    pub fn run(&self, dirs: &[PathBuf], sink: &mut dyn ProgressSink) -> HarnessResult<RunSummary> {
        self.scratch.init()?;
        let mut summary = RunSummary::default();
        for dir in normalize_paths(dirs) {
            self.run_top_level(&dir, sink, &mut summary);
        }
        Ok(summary)
    }

    fn run_top_level(&self, dir: &Path, sink: &mut dyn ProgressSink, summary: &mut RunSummary) -> bool {
        match discovery::discover(dir) {
            Ok(node) => self.run_node(&node, 0, sink, summary),
            Err(error) => {
                let name = dir_label(dir);
                sink.case_started(&name, 0);
                let report = CaseReport {
                    name,
                    path: dir.to_path_buf(),
                    depth: 0,
                    status: CaseStatus::Failed(CaseFailure::new(FailureKind::Setup, error_chain(&error))),
                };
                sink.case_finished(&report);
                summary.record(report);
                false
            }
        }
    }

    /// Runs one node and its subtree; returns its aggregate success.
    pub fn run_node(
        &self,
        node: &TestNode,
        depth: usize,
        sink: &mut dyn ProgressSink,
        summary: &mut RunSummary,
    ) -> bool {
        match node {
            TestNode::Leaf(case) => {
                sink.case_started(&case.name, depth);
                let report = CaseReport {
                    name: case.name.clone(),
                    path: case.path.clone(),
                    depth,
                    status: self.run_leaf(case),
                };
                let passed = report.status.is_success();
                sink.case_finished(&report);
                summary.record(report);
                passed
            }
            TestNode::Suite(suite) => {
                sink.suite_started(&suite.name, depth);
                for (index, child) in suite.children.iter().enumerate() {
                    if !self.run_node(child, depth + 1, sink, summary) {
                        let skipped: usize = suite.children[index + 1..]
                            .iter()
                            .map(TestNode::leaf_count)
                            .sum();
                        debug!(suite = %suite.name, skipped, "stopping suite after failure");
                        summary.not_run += skipped;
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Runs a single leaf case through all of its phases.
    pub fn run_leaf(&self, case: &LeafCase) -> CaseStatus {
        let _span = info_span!("case", name = %case.name).entered();

        let env = match self.scratch.prepare(case) {
            Ok(env) => env,
            Err(error) => return setup_failure(&error),
        };

        let (script, case_dir) = match absolute_paths(case) {
            Ok(paths) => paths,
            Err(error) => return setup_failure(&error),
        };
        let spec = CommandSpec::new(script, &env.working_dir)
            .env(ENV_CASE_DIR, case_dir.to_string_lossy())
            .env(ENV_SCRATCH_DIR, env.root.to_string_lossy())
            .stdout_sidecar(env.output_sidecar());

        let execution = match self.executor.run(&spec) {
            Ok(execution) => execution,
            Err(error) => return setup_failure(&error),
        };
        if !execution.success() {
            let mut failure = CaseFailure::new(FailureKind::Execution, execution.describe());
            failure.execution = Some(execution);
            return CaseStatus::Failed(failure);
        }

        let mut pinned = Vec::new();
        for comparator in self.fixtures.comparators() {
            let facet = comparator.facet();
            let outcome = match self.fixtures.check(comparator, case, &env, self.config.mode) {
                Ok(Some(outcome)) => outcome,
                Ok(None) => continue,
                Err(error) => {
                    let mut failure = CaseFailure::new(
                        FailureKind::Tooling,
                        format!("{facet} check failed: {}", error_chain(&error)),
                    );
                    failure.facet = Some(facet);
                    failure.execution = Some(execution);
                    return CaseStatus::Failed(failure);
                }
            };
            match outcome.verdict {
                Verdict::Matched => {}
                Verdict::Pinned => pinned.push(facet),
                Verdict::Mismatch { diff } => {
                    let mut failure = CaseFailure::new(
                        FailureKind::Mismatch,
                        format!("{facet} does not match {}", outcome.expectation.display()),
                    );
                    failure.facet = Some(facet);
                    failure.execution = Some(execution);
                    failure.diff = Some(diff);
                    return CaseStatus::Failed(failure);
                }
            }
        }
        CaseStatus::Passed { pinned }
    }
}

fn setup_failure(error: &HarnessError) -> CaseStatus {
    CaseStatus::Failed(CaseFailure::new(FailureKind::Setup, error_chain(error)))
}

fn absolute_paths(case: &LeafCase) -> HarnessResult<(PathBuf, PathBuf)> {
    let script = case.run_script();
    let script = fs::canonicalize(&script).map_err(|e| HarnessError::setup(&script, e))?;
    let case_dir = fs::canonicalize(&case.path).map_err(|e| HarnessError::setup(&case.path, e))?;
    Ok((script, case_dir))
}

/// `error: cause: cause...` on one line.
pub fn error_chain(error: &dyn Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
