//! Running a model through the external simulation program.
//!
//! The GLM rendering is written to a scoped temporary file that is removed
//! on every exit path, then handed to a [`CommandRunner`] as
//! `<program> -W <workdir> [pre...] <file> [post...]`.

use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::collection::GldModel;
use super::error::{ModelError, ModelResult};
use crate::ports::{CommandRequest, CommandRunner, RunFailure, SENTINEL_RETURN_CODE};
use crate::settings::{ModelSettings, SavePolicy, SettingsError};

/// Options for one model run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Program to invoke.
    pub program: String,
    /// Arguments placed before the model file.
    pub pre_options: Vec<String>,
    /// Arguments placed after the model file.
    pub post_options: Vec<String>,
    /// Working directory passed with `-W`.
    pub workdir: PathBuf,
    /// When to keep the rendered GLM with the result.
    pub save: SavePolicy,
    pub timeout: Option<Duration>,
    /// Return run failures as `Err` instead of a synthesized result.
    pub raise_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_settings(&ModelSettings::default())
    }
}

impl RunOptions {
    /// Options seeded from model settings.
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            program: settings.program.clone(),
            pre_options: Vec::new(),
            post_options: Vec::new(),
            workdir: PathBuf::from("."),
            save: settings.save_policy,
            timeout: settings.default_timeout(),
            raise_on_error: false,
        }
    }

    #[must_use]
    pub fn with_pre_options<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pre_options = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_post_options<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_options = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    #[must_use]
    pub const fn with_save_policy(mut self, save: SavePolicy) -> Self {
        self.save = save;
        self
    }

    /// Set the save policy by name (`never`, `always`, `onerror`).
    pub fn with_save_policy_name(self, name: &str) -> Result<Self, SettingsError> {
        Ok(self.with_save_policy(name.parse()?))
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }
}

/// Result of running a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRunResult {
    /// Standard output as UTF-8 text.
    pub output: String,
    /// Standard error as UTF-8 text, plus the failure description if any.
    pub errors: String,
    /// Exit code; `SENTINEL_RETURN_CODE` when the run failed.
    pub returncode: Option<i32>,
    pub failure: Option<RunFailure>,
    /// The GLM that was run, when the save policy kept it.
    pub script: Option<String>,
}

impl ModelRunResult {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.returncode == Some(0)
    }
}

impl GldModel {
    /// The argument list used to run a GLM file.
    pub fn command_line(&self, options: &RunOptions, glm_path: &Path) -> Vec<String> {
        let mut argv = Vec::with_capacity(4 + options.pre_options.len() + options.post_options.len());
        argv.push(options.program.clone());
        argv.push("-W".to_string());
        argv.push(options.workdir.to_string_lossy().into_owned());
        argv.extend(options.pre_options.iter().cloned());
        argv.push(glm_path.to_string_lossy().into_owned());
        argv.extend(options.post_options.iter().cloned());
        argv
    }

    /// Render the model to GLM and run it.
    ///
    /// Failures of the external program are folded into the result with
    /// `SENTINEL_RETURN_CODE` unless `options.raise_on_error` is set.
    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        options: &RunOptions,
    ) -> ModelResult<ModelRunResult> {
        if options.program.trim().is_empty() {
            return Err(ModelError::Configuration("program name is empty".to_string()));
        }

        let script = self.glm();
        let mut file = tempfile::Builder::new()
            .prefix("gld-")
            .suffix(".glm")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;

        let argv = self.command_line(options, file.path());
        debug!(program = %options.program, args = ?argv, "running model");
        let request = CommandRequest::new(argv).with_timeout(options.timeout);
        let outcome = runner.execute(request).await?;
        drop(file);

        let mut result = match outcome.failure {
            Some(failure) if options.raise_on_error => return Err(ModelError::RunFailed(failure)),
            Some(failure) => {
                warn!(%failure, "model run failed");
                let mut errors = outcome.stderr;
                if !errors.is_empty() {
                    errors.push('\n');
                }
                errors.push_str(&failure.to_string());
                ModelRunResult {
                    output: outcome.stdout,
                    errors,
                    returncode: Some(SENTINEL_RETURN_CODE),
                    failure: Some(failure),
                    script: None,
                }
            }
            None => ModelRunResult {
                output: outcome.stdout,
                errors: outcome.stderr,
                returncode: outcome.returncode,
                failure: None,
                script: None,
            },
        };

        if options.save.keeps(!result.succeeded()) {
            result.script = Some(script);
        }
        Ok(result)
    }
}
