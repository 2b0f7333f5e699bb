pub use crate::config::HarnessConfig;
pub use crate::errors::{HarnessError, HarnessResult};
pub use crate::runner::{Harness, RunSummary};

pub mod bench;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod exec;
pub mod fixtures;
pub mod paths;
pub mod runner;
pub mod scratch;
