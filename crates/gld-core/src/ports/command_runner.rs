//! Command runner trait definition.
//!
//! This port defines how the model hands a rendered GLM file to the
//! external simulation program. Implementations own spawning, pipe
//! draining and timeouts; the model only sees the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ProcessError, RunFailure};

/// One invocation of an external program, as a token list.
///
/// The arguments are never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Upper bound on the wait for completion.
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    #[must_use]
    pub const fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The program name (first token), if any.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Text captured from one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Standard output, decoded as UTF-8 and joined with newlines.
    pub stdout: String,
    /// Standard error, decoded as UTF-8 and joined with newlines.
    pub stderr: String,
    /// Exit code, absent if the process never completed.
    pub returncode: Option<i32>,
    /// Captured failure, absent on success.
    pub failure: Option<RunFailure>,
}

impl CommandOutcome {
    /// Outcome of a process that ran to completion.
    pub fn completed(stdout: impl Into<String>, stderr: impl Into<String>, code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            returncode: Some(code),
            failure: None,
        }
    }

    /// Outcome of a process that failed to launch or finish.
    pub fn failed(failure: RunFailure, returncode: Option<i32>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            returncode,
            failure: Some(failure),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.returncode == Some(0)
    }
}

/// Executes external commands on behalf of the model.
///
/// Returns `Err` only for failures the implementation was configured to
/// propagate; everything else is reported in the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, request: CommandRequest) -> Result<CommandOutcome, ProcessError>;
}
