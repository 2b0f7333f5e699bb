//! Fixture comparators.
//!
//! One [`Comparator`] per observable facet of a case. A comparator only knows
//! where its golden file lives and how to capture the actual value; diffing
//! and pinning are done once, in [`FixtureSet::check`], so a pinned fixture is
//! always produced by exactly the capture logic that later verifies it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{DiffBackend, HarnessConfig, ListingBackend, RunMode};
use crate::discovery::LeafCase;
use crate::errors::{HarnessError, HarnessResult};
use crate::scratch::ScratchEnvironment;

pub mod diff;
pub mod filesystem;
pub mod listing;
pub mod lock;
pub mod output;

pub use diff::{normalize_whitespace, BuiltinDiff, ExternalDiff, TextDiffer};
pub use filesystem::FilesystemComparator;
pub use listing::{BuiltinListing, ExternalListing, Lister};
pub use lock::LockArtifactComparator;
pub use output::OutputComparator;

// ============================================================================
// FACETS AND OUTCOMES
// ============================================================================

/// One observable dimension of a case's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Output,
    Filesystem,
    LockArtifact,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Output => "output",
            Facet::Filesystem => "filesystem",
            Facet::LockArtifact => "lock artifact",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single facet comparison ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matched,
    /// Pin mode overwrote the expectation; no diff was taken.
    Pinned,
    Mismatch { diff: String },
}

/// Result of comparing one facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonOutcome {
    pub facet: Facet,
    pub expectation: PathBuf,
    pub verdict: Verdict,
}

// ============================================================================
// COMPARATOR TRAIT
// ============================================================================

/// Knows one facet's golden file and how to capture its actual value.
pub trait Comparator {
    fn facet(&self) -> Facet;

    /// File name of the golden expectation inside the case directory.
    fn expectation_name(&self) -> String;

    /// Whether pin mode may create the expectation when none exists yet.
    fn pin_creates(&self) -> bool;

    /// Captures the actual value into a file and returns its path, or
    /// `None` if the case produced nothing for this facet.
    fn capture(&self, env: &ScratchEnvironment) -> HarnessResult<Option<PathBuf>>;

    fn expectation_path(&self, case_dir: &Path) -> PathBuf {
        case_dir.join(self.expectation_name())
    }
}

// ============================================================================
// FIXTURE SET
// ============================================================================

/// The ordered comparators plus the differ they share.
pub struct FixtureSet {
    comparators: Vec<Box<dyn Comparator>>,
    differ: Box<dyn TextDiffer>,
}

impl FixtureSet {
    pub fn new(comparators: Vec<Box<dyn Comparator>>, differ: Box<dyn TextDiffer>) -> Self {
        Self { comparators, differ }
    }

    /// Output, filesystem and lock-artifact comparators wired per `config`.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let differ: Box<dyn TextDiffer> = match &config.diff {
            DiffBackend::External { command } => Box::new(ExternalDiff::new(command.clone())),
            DiffBackend::Builtin => Box::new(BuiltinDiff),
        };
        let lister: Box<dyn Lister> = match &config.listing {
            ListingBackend::External { command } => Box::new(ExternalListing::new(command.clone())),
            ListingBackend::Builtin => Box::new(BuiltinListing),
        };
        Self::new(
            vec![
                Box::new(OutputComparator),
                Box::new(FilesystemComparator::new(lister, config.snapshot_root)),
                Box::new(LockArtifactComparator::new(
                    config.lock_artifact.clone(),
                    config.lock_expectation_name(),
                )),
            ],
            differ,
        )
    }

    pub fn comparators(&self) -> impl Iterator<Item = &dyn Comparator> {
        self.comparators.iter().map(|c| c.as_ref())
    }

    /// Verifies or pins one facet of `case`.
    ///
    /// `Ok(None)` means the facet does not apply: no expectation exists and
    /// this mode will not create one. `Err` is a tooling problem, distinct
    /// from a mismatch.
    pub fn check(
        &self,
        comparator: &dyn Comparator,
        case: &LeafCase,
        env: &ScratchEnvironment,
        mode: RunMode,
    ) -> HarnessResult<Option<ComparisonOutcome>> {
        let facet = comparator.facet();
        let expectation = comparator.expectation_path(&case.path);
        let has_expectation = expectation.is_file();
        if !has_expectation && !(mode.is_pin() && comparator.pin_creates()) {
            return Ok(None);
        }

        let actual = comparator.capture(env)?;
        debug!(case = %case.name, %facet, actual = ?actual, "captured");

        let verdict = match (mode, actual) {
            (RunMode::Pin, Some(actual)) => {
                fs::copy(&actual, &expectation).map_err(|e| HarnessError::io(&expectation, e))?;
                info!(case = %case.name, %facet, path = %expectation.display(), "pinned expectation");
                Verdict::Pinned
            }
            (_, None) if !has_expectation => return Ok(None),
            (_, None) => Verdict::Mismatch {
                diff: format!(
                    "{facet} was not produced but {} expects it",
                    expectation.display()
                ),
            },
            (RunMode::Verify, Some(actual)) => match self.differ.diff(&expectation, &actual)? {
                None => Verdict::Matched,
                Some(diff) => Verdict::Mismatch { diff },
            },
        };

        Ok(Some(ComparisonOutcome {
            facet,
            expectation,
            verdict,
        }))
    }
}

impl fmt::Debug for FixtureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureSet")
            .field(
                "comparators",
                &self.comparators.iter().map(|c| c.facet()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
