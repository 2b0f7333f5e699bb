//! Lock artifact facet: a file the command under test writes into its
//! working directory, compared against `expected_<artifact name>`.

use std::path::PathBuf;

use super::{Comparator, Facet};
use crate::errors::HarnessResult;
use crate::scratch::ScratchEnvironment;

#[derive(Debug, Clone)]
pub struct LockArtifactComparator {
    /// Relative to the working directory.
    artifact: PathBuf,
    expectation_name: String,
}

impl LockArtifactComparator {
    pub fn new(artifact: PathBuf, expectation_name: String) -> Self {
        Self {
            artifact,
            expectation_name,
        }
    }
}

impl Comparator for LockArtifactComparator {
    fn facet(&self) -> Facet {
        Facet::LockArtifact
    }

    fn expectation_name(&self) -> String {
        self.expectation_name.clone()
    }

    fn pin_creates(&self) -> bool {
        true
    }

    fn capture(&self, env: &ScratchEnvironment) -> HarnessResult<Option<PathBuf>> {
        let path = env.working_dir.join(&self.artifact);
        Ok(path.is_file().then_some(path))
    }
}
