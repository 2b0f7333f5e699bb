//! Process output facet: the case's captured stdout against
//! `expected_output.txt`.

use std::path::PathBuf;

use super::{Comparator, Facet};
use crate::errors::HarnessResult;
use crate::scratch::ScratchEnvironment;

pub const EXPECTED_OUTPUT: &str = "expected_output.txt";

/// Compares the stdout sidecar written by the executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputComparator;

impl Comparator for OutputComparator {
    fn facet(&self) -> Facet {
        Facet::Output
    }

    fn expectation_name(&self) -> String {
        EXPECTED_OUTPUT.to_string()
    }

    /// Every case has output, so pinning always records it.
    fn pin_creates(&self) -> bool {
        true
    }

    fn capture(&self, env: &ScratchEnvironment) -> HarnessResult<Option<PathBuf>> {
        let sidecar = env.output_sidecar();
        Ok(sidecar.is_file().then_some(sidecar))
    }
}
