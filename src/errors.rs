//! Harness error type.
//!
//! Every fallible operation in the harness returns [`HarnessError`]. The runner
//! never lets one escape a leaf case: it classifies the error by the phase it
//! happened in and turns it into a failed case. Only errors raised before any
//! case runs (configuration, shared scratch root) reach the binaries, which
//! render them through `miette`.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all harness failure modes.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    /// A scratch environment could not be created or populated.
    #[error("failed to prepare scratch environment at {}", path.display())]
    #[diagnostic(code(harness::setup))]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A case's command (or a supporting tool) could not be started at all.
    #[error("failed to launch {}", program.display())]
    #[diagnostic(
        code(harness::spawn),
        help("check that the file exists and has its executable bit set")
    )]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A comparator's supporting command ran but did not behave.
    #[error("verification tool `{tool}` failed: {message}")]
    #[diagnostic(code(harness::tooling))]
    Tooling { tool: String, message: String },

    /// Plain I/O failure on a known path.
    #[error("I/O error on {}", path.display())]
    #[diagnostic(code(harness::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration in {}: {message}", path.display())]
    #[diagnostic(code(harness::config))]
    Config { path: PathBuf, message: String },

    /// A selected directory is neither a leaf case nor a suite.
    #[error("{} is not a test case or suite", path.display())]
    #[diagnostic(
        code(harness::discovery),
        help("a case needs a `run` script; a suite needs case subdirectories")
    )]
    NotATest { path: PathBuf },
}

impl HarnessError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps an I/O error raised while building a scratch environment.
    pub fn setup(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Setup {
            path: path.into(),
            source,
        }
    }

    pub fn tooling(tool: impl Into<String>, message: impl Into<String>) -> Self {
        HarnessError::Tooling {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type HarnessResult<T> = Result<T, HarnessError>;
