//! CommandRunner implementation backed by [`Runner`].

use async_trait::async_trait;
use gld_core::ports::{
    CommandOutcome, CommandRequest, CommandRunner, FailureKind, ProcessError,
};

use crate::runner::Runner;

/// Executes model runs as real child processes.
///
/// Output is captured as text. Stdout and stderr lines are joined with
/// newlines in the outcome.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommandRunner {
    propagate: Vec<FailureKind>,
}

impl ProcessCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface failures of these kinds as `ProcessError::Failed`.
    #[must_use]
    pub fn propagate(mut self, kinds: &[FailureKind]) -> Self {
        self.propagate.extend_from_slice(kinds);
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn execute(&self, request: CommandRequest) -> Result<CommandOutcome, ProcessError> {
        let result = Runner::new(request.argv)?
            .timeout(request.timeout)
            .propagate(&self.propagate)
            .run()
            .await?;

        let mut outcome = match result.failure() {
            Some(failure) => CommandOutcome::failed(failure.clone(), result.returncode()),
            None => CommandOutcome {
                returncode: result.returncode(),
                ..CommandOutcome::default()
            },
        };
        outcome.stdout = result.output();
        outcome.stderr = result.errors_joined("\n");
        Ok(outcome)
    }
}
