//! Runner error types.

use gld_core::ports::{ProcessError, RunFailure};
use thiserror::Error;

/// Errors raised by a [`Runner`](crate::Runner) instead of being captured
/// in its result.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The output format name is not `text` or `json`.
    #[error("output format '{0}' is not valid")]
    InvalidFormat(String),

    /// The command has no program to run.
    #[error("command is empty")]
    EmptyCommand,

    /// A failure whose kind the caller asked to have propagated.
    #[error("{0}")]
    Propagated(RunFailure),

    /// The runtime for a blocking run could not be created.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<RunnerError> for ProcessError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Propagated(failure) => Self::Failed(failure),
            other => Self::Configuration(other.to_string()),
        }
    }
}
