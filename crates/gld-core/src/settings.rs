//! Model settings and validation.
//!
//! These are the knobs the editor persists in its preferences: which
//! program to run, which document marker to accept, and which properties
//! and globals never make it into the rendered GLM.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Application marker expected at the top of a model document.
pub const DEFAULT_APPLICATION: &str = "gridlabd";

/// External simulation program.
pub const DEFAULT_PROGRAM: &str = "gridlabd";

/// Object properties never emitted in an object block.
pub const DEFAULT_HIDDEN_PROPERTIES: &[&str] = &["class", "id", "rank", "flags"];

/// Globals owned by the simulator at runtime; never emitted as `#set`.
pub const DEFAULT_HIDDEN_GLOBALS: &[&str] = &[
    "version.major",
    "version.minor",
    "version.patch",
    "version.build",
    "version.branch",
    "command_line",
    "execdir",
    "workdir",
    "hostname",
    "hostaddr",
    "pid",
];

/// When the rendered GLM is kept alongside a run result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    Never,
    Always,
    #[default]
    OnError,
}

impl SavePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Always => "always",
            Self::OnError => "onerror",
        }
    }

    /// Whether the script should be kept for a run that did or did not fail.
    pub const fn keeps(self, failed: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::OnError => failed,
        }
    }
}

impl fmt::Display for SavePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SavePolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            "onerror" => Ok(Self::OnError),
            other => Err(SettingsError::InvalidSavePolicy(other.to_string())),
        }
    }
}

/// Settings shared by a model collection and its runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelSettings {
    /// Value the document's `application` key must carry.
    pub application: String,

    /// Program invoked by `GldModel::run`.
    pub program: String,

    /// Object payload keys left out of object blocks.
    pub hidden_properties: BTreeSet<String>,

    /// Globals that never produce a `#set` directive.
    pub hidden_globals: BTreeSet<String>,

    /// Default run timeout in seconds (None = wait forever).
    pub default_timeout_secs: Option<u64>,

    /// Default policy for keeping the rendered GLM with a run result.
    pub save_policy: SavePolicy,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            application: DEFAULT_APPLICATION.to_string(),
            program: DEFAULT_PROGRAM.to_string(),
            hidden_properties: DEFAULT_HIDDEN_PROPERTIES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            hidden_globals: DEFAULT_HIDDEN_GLOBALS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            default_timeout_secs: None,
            save_policy: SavePolicy::default(),
        }
    }
}

impl ModelSettings {
    /// Parse and validate settings from a JSON preferences document.
    pub fn from_json_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Get the effective default timeout.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }

    pub fn is_hidden_property(&self, key: &str) -> bool {
        self.hidden_properties.contains(key)
    }

    pub fn is_hidden_global(&self, name: &str) -> bool {
        self.hidden_globals.contains(name)
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Application marker cannot be empty")]
    EmptyApplication,

    #[error("Program name cannot be empty")]
    EmptyProgram,

    #[error("Timeout must be at least one second, got {0}")]
    InvalidTimeout(u64),

    #[error("Save policy must be one of never, always, onerror; got '{0}'")]
    InvalidSavePolicy(String),

    #[error("Invalid settings document: {0}")]
    Parse(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &ModelSettings) -> Result<(), SettingsError> {
    if settings.application.trim().is_empty() {
        return Err(SettingsError::EmptyApplication);
    }

    if settings.program.trim().is_empty() {
        return Err(SettingsError::EmptyProgram);
    }

    if let Some(secs) = settings.default_timeout_secs {
        if secs == 0 {
            return Err(SettingsError::InvalidTimeout(secs));
        }
    }

    Ok(())
}
