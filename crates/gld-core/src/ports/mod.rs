//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the model expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No process spawning or pipe handling in any signature
//! - Failures of the external program are data (`RunFailure`), not panics
//! - Only failures the caller opted into propagate as `ProcessError`

pub mod command_runner;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

pub use command_runner::{CommandOutcome, CommandRequest, CommandRunner};

#[cfg(test)]
pub use command_runner::MockCommandRunner;

/// Return code reported when the process never completed normally.
///
/// Real exit statuses are never negative: signal terminations are mapped
/// to `128 + signal` by the runtime.
pub const SENTINEL_RETURN_CODE: i32 = -1;

/// Category of a captured process failure.
///
/// Callers list categories they want raised instead of captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The executable does not exist.
    NotFound,
    /// The executable exists but may not be run.
    PermissionDenied,
    /// Any other failure while spawning the process.
    Launch,
    /// Waiting on the process or reading its pipes failed.
    Io,
    /// The process did not finish within the allowed time.
    Timeout,
    /// Output could not be decoded in the requested format.
    Decode,
}

impl FailureKind {
    /// Classify a spawn error.
    pub fn from_launch_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Launch,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Launch => "launch",
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured failure information for one process execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RunFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure for a process that could not be spawned.
    pub fn launch(program: &str, err: &io::Error) -> Self {
        Self::new(
            FailureKind::from_launch_error(err),
            format!("failed to launch '{program}': {err}"),
        )
    }

    /// Failure for a process that outlived its timeout.
    pub fn timeout(program: &str, seconds: f64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("'{program}' timed out after {seconds}s"),
        )
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::Timeout)
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Errors surfaced by a process execution backend.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// A failure the caller asked to have raised rather than captured.
    #[error("Process failed: {0}")]
    Failed(RunFailure),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_classification() {
        let missing = io::Error::from(io::ErrorKind::NotFound);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let other = io::Error::other("boom");

        assert_eq!(
            FailureKind::from_launch_error(&missing),
            FailureKind::NotFound
        );
        assert_eq!(
            FailureKind::from_launch_error(&denied),
            FailureKind::PermissionDenied
        );
        assert_eq!(FailureKind::from_launch_error(&other), FailureKind::Launch);
    }

    #[test]
    fn test_timeout_failure_mentions_timeout() {
        let failure = RunFailure::timeout("sleep", 0.5);
        assert!(failure.is_timeout());
        assert!(failure.to_string().contains("timed out"));
        assert!(failure.to_string().contains("timeout"));
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
    }
}
