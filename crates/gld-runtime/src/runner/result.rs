//! Captured result of one runner execution.

use gld_core::ports::{FailureKind, RunFailure};
use serde::Serialize;
use serde_json::Value;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// The process exited and its output was collected.
    Completed,
    /// The process was killed after exceeding its timeout.
    TimedOut,
    /// The process could not be spawned.
    LaunchFailed,
    /// The process ran but waiting on it or decoding its output failed.
    Failed,
}

/// Output, errors, and exit information of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    pub(crate) output: Vec<String>,
    pub(crate) json: Option<Value>,
    pub(crate) errors: Vec<String>,
    pub(crate) returncode: Option<i32>,
    pub(crate) failure: Option<RunFailure>,
}

impl RunResult {
    pub(crate) fn failed(failure: RunFailure, returncode: Option<i32>) -> Self {
        Self {
            failure: Some(failure),
            returncode,
            ..Self::default()
        }
    }

    /// Buffered stdout lines. Empty when an output callback consumed them.
    pub fn output_lines(&self) -> &[String] {
        &self.output
    }

    /// Buffered stdout joined with newlines.
    pub fn output(&self) -> String {
        self.output.join("\n")
    }

    /// Buffered stdout joined with `separator`.
    pub fn output_joined(&self, separator: &str) -> String {
        self.output.join(separator).trim().to_string()
    }

    /// Parsed stdout of a `json` format run.
    pub const fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Buffered stderr lines. Empty when an error callback consumed them.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn errors_joined(&self, separator: &str) -> String {
        self.errors.join(separator).trim().to_string()
    }

    /// Exit code; `None` when the process never completed normally.
    pub const fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    pub const fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn state(&self) -> RunState {
        match self.failure.as_ref().map(|f| f.kind) {
            None => RunState::Completed,
            Some(FailureKind::Timeout) => RunState::TimedOut,
            Some(FailureKind::NotFound | FailureKind::PermissionDenied | FailureKind::Launch) => {
                RunState::LaunchFailed
            }
            Some(FailureKind::Io | FailureKind::Decode) => RunState::Failed,
        }
    }

    /// Completed with exit code 0.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.returncode == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_output_is_trimmed() {
        let result = RunResult {
            output: vec!["a".into(), "b".into()],
            errors: vec!["warning".into()],
            returncode: Some(0),
            ..Default::default()
        };
        assert_eq!(result.output(), "a\nb");
        assert_eq!(result.output_joined(" "), "a b");
        assert_eq!(result.errors_joined("\n"), "warning");
        assert!(result.succeeded());
        assert_eq!(result.state(), RunState::Completed);
    }

    #[test]
    fn test_state_follows_failure_kind() {
        let cases = [
            (FailureKind::Timeout, RunState::TimedOut),
            (FailureKind::NotFound, RunState::LaunchFailed),
            (FailureKind::PermissionDenied, RunState::LaunchFailed),
            (FailureKind::Launch, RunState::LaunchFailed),
            (FailureKind::Io, RunState::Failed),
            (FailureKind::Decode, RunState::Failed),
        ];
        for (kind, state) in cases {
            let result = RunResult::failed(RunFailure::new(kind, "x"), None);
            assert_eq!(result.state(), state);
            assert!(!result.succeeded());
        }
    }
}
