//! Single-use external process runner.
//!
//! A [`Runner`] spawns one command, drains stdout and stderr concurrently in
//! two reader tasks, and reports the outcome as a [`RunResult`]. Failures of
//! the process itself (launch errors, timeouts, undecodable output) are
//! captured in the result unless their [`FailureKind`] was listed with
//! [`Runner::propagate`].
//!
//! On timeout the child is killed and both readers are aborted; whatever
//! they had read is discarded.

mod result;
mod stream;

pub use result::{RunResult, RunState};
pub use stream::{LineSink, spawn_line_reader};

use gld_core::ports::{FailureKind, RunFailure, SENTINEL_RETURN_CODE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RunnerError;

/// How stdout is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lines pass through unchanged.
    #[default]
    Text,
    /// The whole of stdout is parsed once as a JSON document.
    Json,
}

impl OutputFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(RunnerError::InvalidFormat(other.to_string())),
        }
    }
}

/// A value handed to the output callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// One stdout line of a `text` run.
    Text(String),
    /// The parsed stdout of a `json` run.
    Json(Value),
}

pub type OutputCallback = Arc<dyn Fn(Output) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// A command given either as one string or as separate arguments.
///
/// A string is split on whitespace. Neither form goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn argv(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for CommandLine {
    fn from(command: &str) -> Self {
        Self(command.split_whitespace().map(str::to_string).collect())
    }
}

impl From<String> for CommandLine {
    fn from(command: String) -> Self {
        Self::from(command.as_str())
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(argv: Vec<String>) -> Self {
        Self(argv)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(argv: &[&str]) -> Self {
        Self(argv.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(argv: [&str; N]) -> Self {
        Self::from(argv.as_slice())
    }
}

/// Runs one command once.
pub struct Runner {
    argv: Vec<String>,
    format: OutputFormat,
    on_output: Option<OutputCallback>,
    on_error: Option<ErrorCallback>,
    timeout: Option<Duration>,
    propagate: HashSet<FailureKind>,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("argv", &self.argv)
            .field("format", &self.format)
            .field("on_output", &self.on_output.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("timeout", &self.timeout)
            .field("propagate", &self.propagate)
            .finish()
    }
}

impl Runner {
    /// Create a runner for `command`.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::EmptyCommand` if the command has no program.
    pub fn new(command: impl Into<CommandLine>) -> Result<Self, RunnerError> {
        let CommandLine(argv) = command.into();
        if argv.first().is_none_or(|program| program.is_empty()) {
            return Err(RunnerError::EmptyCommand);
        }
        Ok(Self {
            argv,
            format: OutputFormat::Text,
            on_output: None,
            on_error: None,
            timeout: None,
            propagate: HashSet::new(),
        })
    }

    /// Deliver stdout to `callback` instead of buffering it.
    ///
    /// In `json` format the callback receives the single parsed value.
    #[must_use]
    pub fn on_output(mut self, callback: impl Fn(Output) + Send + Sync + 'static) -> Self {
        self.on_output = Some(Arc::new(callback));
        self
    }

    /// Deliver each stderr line to `callback` instead of buffering it.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub const fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Select the output format by name.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::InvalidFormat` for names other than `text` and `json`.
    pub fn format_named(self, name: &str) -> Result<Self, RunnerError> {
        Ok(self.format(name.parse()?))
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return failures of these kinds as `Err` instead of capturing them.
    #[must_use]
    pub fn propagate(mut self, kinds: &[FailureKind]) -> Self {
        self.propagate.extend(kinds.iter().copied());
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// Run the command to completion, timeout, or failure.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Propagated` when the captured failure's kind was
    /// listed with [`Runner::propagate`].
    pub async fn run(self) -> Result<RunResult, RunnerError> {
        let result = self.execute().await;
        match result.failure {
            Some(ref failure) if self.propagate.contains(&failure.kind) => {
                Err(RunnerError::Propagated(failure.clone()))
            }
            _ => Ok(result),
        }
    }

    /// Run on a private current-thread runtime.
    ///
    /// Must not be called from inside an async context.
    ///
    /// # Errors
    ///
    /// As [`Runner::run`], plus `RunnerError::Runtime` if the runtime cannot
    /// be built.
    pub fn run_blocking(self) -> Result<RunResult, RunnerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run())
    }

    async fn execute(&self) -> RunResult {
        let program = self.program();
        let mut command = Command::new(program);
        command
            .args(&self.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program, args = ?self.argv, format = %self.format, "spawning command");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                let failure = RunFailure::launch(program, &err);
                warn!(program, %failure, "command failed to launch");
                return RunResult::failed(failure, None);
            }
        };

        let stdout_sink: Option<LineSink> = match (self.format, &self.on_output) {
            (OutputFormat::Text, Some(callback)) => {
                let callback = Arc::clone(callback);
                Some(Arc::new(move |line| callback(Output::Text(line))))
            }
            _ => None,
        };
        let stderr_sink: Option<LineSink> = self.on_error.as_ref().map(Arc::clone);

        let stdout = child
            .stdout
            .take()
            .map(|pipe| spawn_line_reader(pipe, "stdout", stdout_sink));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| spawn_line_reader(pipe, "stderr", stderr_sink));
        let aborts: Vec<_> = stdout
            .iter()
            .chain(stderr.iter())
            .map(JoinHandle::abort_handle)
            .collect();

        let completion = async {
            let (status, output, errors) =
                tokio::join!(child.wait(), collect(stdout), collect(stderr));
            (status, output, errors)
        };
        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, completion).await.ok(),
            None => Some(completion.await),
        };

        let Some((status, output, errors)) = finished else {
            for abort in &aborts {
                abort.abort();
            }
            if let Err(e) = child.kill().await {
                debug!(program, error = %e, "failed to kill timed out command");
            }
            let seconds = self.timeout.map_or(0.0, |t| t.as_secs_f64());
            let failure = RunFailure::timeout(program, seconds);
            warn!(program, %failure, "command timed out");
            return RunResult::failed(failure, Some(SENTINEL_RETURN_CODE));
        };

        let status = match status {
            Ok(status) => status,
            Err(err) => {
                let failure = RunFailure::new(
                    FailureKind::Io,
                    format!("failed to wait for '{program}': {err}"),
                );
                warn!(program, %failure, "command wait failed");
                return RunResult {
                    output,
                    errors,
                    ..RunResult::failed(failure, None)
                };
            }
        };

        let returncode = exit_code(status);
        debug!(program, returncode, "command completed");
        let mut result = RunResult {
            output,
            errors,
            returncode: Some(returncode),
            ..RunResult::default()
        };
        if self.format == OutputFormat::Json {
            self.decode_json(&mut result);
        }
        result
    }

    /// Parse buffered stdout as one JSON document.
    ///
    /// Empty output leaves `json` unset. A parse error replaces the return
    /// code with a `Decode` failure.
    fn decode_json(&self, result: &mut RunResult) {
        if result.output.is_empty() {
            return;
        }
        match serde_json::from_str::<Value>(&result.output.join("\n")) {
            Ok(value) => {
                if let Some(callback) = &self.on_output {
                    callback(Output::Json(value.clone()));
                }
                result.json = Some(value);
            }
            Err(err) => {
                let failure = RunFailure::new(
                    FailureKind::Decode,
                    format!("output of '{}' is not valid JSON: {err}", self.program()),
                );
                warn!(program = self.program(), %failure, "command output not decoded");
                result.returncode = None;
                result.failure = Some(failure);
            }
        }
    }
}

async fn collect(reader: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    let Some(reader) = reader else {
        return Vec::new();
    };
    reader.await.unwrap_or_else(|e| {
        warn!(error = %e, "stream reader task failed");
        Vec::new()
    })
}

/// Exit code of a finished process; `128 + signal` for signal exits.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    SENTINEL_RETURN_CODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_command_is_split_on_whitespace() {
        let runner = Runner::new("gridlabd  --version=json\tfoo").unwrap();
        assert_eq!(runner.argv(), ["gridlabd", "--version=json", "foo"]);
    }

    #[test]
    fn test_argument_list_is_kept_verbatim() {
        let runner = Runner::new(vec!["sh".to_string(), "-c".to_string(), "echo a b".to_string()])
            .unwrap();
        assert_eq!(runner.argv(), ["sh", "-c", "echo a b"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(Runner::new(""), Err(RunnerError::EmptyCommand)));
        assert!(matches!(Runner::new(Vec::<String>::new()), Err(RunnerError::EmptyCommand)));
    }

    #[test]
    fn test_invalid_format_rejected_before_spawn() {
        let err = Runner::new("does-not-exist")
            .unwrap()
            .format_named("xml")
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidFormat(name) if name == "xml"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_decode_failure_clears_returncode() {
        let runner = Runner::new("gridlabd").unwrap().format(OutputFormat::Json);
        let mut result = RunResult {
            output: vec!["{not json".into()],
            returncode: Some(0),
            ..Default::default()
        };
        runner.decode_json(&mut result);
        assert_eq!(result.returncode(), None);
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Decode));
        assert_eq!(result.state(), RunState::Failed);
    }

    #[test]
    fn test_run_blocking_missing_program() {
        let result = Runner::new("gld-definitely-missing-program")
            .unwrap()
            .run_blocking()
            .unwrap();
        assert_eq!(result.returncode(), None);
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::NotFound));
        assert_eq!(result.state(), RunState::LaunchFailed);
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_exit_maps_above_128() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }
}
