//! Cached queries against the gridlabd executable.
//!
//! Module and class metadata do not change while a session runs, so each
//! query is made at most once per [`Gridlabd`] instance.

use anyhow::{Context, Result, anyhow, bail};
use gld_core::settings::ModelSettings;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::runner::{OutputFormat, RunResult, Runner};

/// Lines of `--modlist` output before the first module.
const MODLIST_HEADER_LINES: usize = 2;

/// Handle to one gridlabd installation.
#[derive(Debug)]
pub struct Gridlabd {
    program: String,
    timeout: Option<Duration>,
    modules: OnceCell<Vec<String>>,
    classes: Mutex<HashMap<String, Value>>,
}

impl Default for Gridlabd {
    fn default() -> Self {
        Self::new(gld_core::settings::DEFAULT_PROGRAM)
    }
}

impl Gridlabd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            modules: OnceCell::new(),
            classes: Mutex::new(HashMap::new()),
        }
    }

    /// Program and timeout taken from model settings.
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self::new(settings.program.clone()).with_timeout(settings.default_timeout())
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `gridlabd ARGS...` and return the raw result.
    pub async fn run(&self, args: &[&str], format: OutputFormat) -> Result<RunResult> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(args.iter().map(|arg| (*arg).to_string()));

        let result = Runner::new(argv)?
            .format(format)
            .timeout(self.timeout)
            .run()
            .await
            .with_context(|| format!("failed to run {} {}", self.program, args.join(" ")))?;
        Ok(result)
    }

    /// Run a query and require a clean exit.
    async fn query(&self, args: &[&str], format: OutputFormat) -> Result<RunResult> {
        let result = self.run(args, format).await?;
        if let Some(failure) = result.failure() {
            bail!("{} {}: {failure}", self.program, args.join(" "));
        }
        if result.returncode() != Some(0) {
            bail!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                result.returncode().unwrap_or_default(),
                result.errors_joined("\n")
            );
        }
        Ok(result)
    }

    async fn query_json(&self, args: &[&str]) -> Result<Value> {
        let result = self.query(args, OutputFormat::Json).await?;
        result
            .json()
            .cloned()
            .ok_or_else(|| anyhow!("{} {} produced no output", self.program, args.join(" ")))
    }

    /// Names of the installed modules.
    pub async fn modules(&self) -> Result<&[String]> {
        let modules = self
            .modules
            .get_or_try_init(|| async {
                let result = self.query(&["--modlist"], OutputFormat::Text).await?;
                let names: Vec<String> = result
                    .output_lines()
                    .iter()
                    .skip(MODLIST_HEADER_LINES)
                    .filter_map(|line| line.split_whitespace().next())
                    .map(str::to_string)
                    .collect();
                debug!(count = names.len(), "loaded module list");
                Ok::<_, anyhow::Error>(names)
            })
            .await?;
        Ok(modules)
    }

    /// The `classes` object from the module's JSON help.
    pub async fn classes(&self, module: &str) -> Result<Value> {
        let mut cache = self.classes.lock().await;
        if let Some(classes) = cache.get(module) {
            return Ok(classes.clone());
        }
        let help = self
            .query_json(&["--modhelp=json", module])
            .await
            .with_context(|| format!("failed to load classes of module '{module}'"))?;
        let classes = help
            .get("classes")
            .cloned()
            .ok_or_else(|| anyhow!("help for module '{module}' has no classes"))?;
        debug!(module, "cached module classes");
        cache.insert(module.to_string(), classes.clone());
        Ok(classes)
    }

    /// Description of a class property, if the module documents one.
    pub async fn property_description(
        &self,
        module: &str,
        class: &str,
        property: &str,
    ) -> Result<Option<String>> {
        let classes = self.classes(module).await?;
        Ok(classes
            .get(class)
            .and_then(|c| c.get(property))
            .and_then(|p| p.get("description"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Version information from `--version=json`.
    pub async fn version(&self) -> Result<Value> {
        self.query_json(&["--version=json"]).await
    }

    /// Running simulation status from `--pstatus=json`.
    pub async fn pstatus(&self) -> Result<Value> {
        self.query_json(&["--pstatus=json"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = ModelSettings {
            program: "/opt/gridlabd/bin/gridlabd".to_string(),
            default_timeout_secs: Some(30),
            ..ModelSettings::default()
        };
        let gld = Gridlabd::from_settings(&settings);
        assert_eq!(gld.program(), "/opt/gridlabd/bin/gridlabd");
        assert_eq!(gld.timeout, Some(Duration::from_secs(30)));
        assert_eq!(Gridlabd::default().program(), "gridlabd");
    }
}
