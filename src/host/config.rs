//! Host Configuration
//!
//! The host lists the plugin executables it may launch in a JSON file:
//!
//! ```json
//! {
//!   "plugins": [
//!     {
//!       "id": "weather",
//!       "name": "Weather",
//!       "command": "/opt/plugins/weather",
//!       "args": ["--units", "metric"],
//!       "env": { "WEATHER_API_KEY": "${WEATHER_API_KEY}" },
//!       "timeout": 30
//!     }
//!   ]
//! }
//! ```
//!
//! Env values of the form `${VAR}` are resolved from the host environment when
//! the plugin is spawned, not when the file is loaded, so a missing variable
//! only blocks the plugin that needs it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PluginError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

/// One launchable plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Unique across the file
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Executable path or name on `PATH`
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment; `${VAR}` values are taken from the host
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-request timeout in seconds (0 disables)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    60
}

impl PluginEntry {
    /// Entry for an ad-hoc executable (used by the CLI)
    pub fn for_executable(command: impl Into<String>) -> Self {
        let command = command.into();
        let id = Path::new(&command)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| command.clone());
        Self {
            name: id.clone(),
            id,
            description: None,
            command,
            args: Vec::new(),
            env: HashMap::new(),
            enabled: true,
            timeout: default_timeout(),
            working_dir: None,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    /// Environment with every `${VAR}` reference resolved
    pub fn resolved_env(&self) -> Result<HashMap<String, String>> {
        self.env
            .iter()
            .map(|(key, value)| Ok((key.clone(), resolve_env_var(value)?)))
            .collect()
    }
}

impl HostConfig {
    /// Load and validate a host configuration file
    ///
    /// Error Conditions:
    /// - File not found: `Io`
    /// - Invalid JSON: `Json`
    /// - Empty id/name/command or duplicate ids: `Config`
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = std::collections::HashSet::new();

        for entry in &self.plugins {
            if entry.id.is_empty() {
                return Err(PluginError::Config("Plugin ID cannot be empty".to_string()));
            }
            if entry.name.is_empty() {
                return Err(PluginError::Config("Plugin name cannot be empty".to_string()));
            }
            if entry.command.is_empty() {
                return Err(PluginError::Config(format!(
                    "Plugin '{}' has empty command",
                    entry.id
                )));
            }
            if !ids.insert(&entry.id) {
                return Err(PluginError::Config(format!("Duplicate plugin ID: {}", entry.id)));
            }
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn enabled(&self) -> impl Iterator<Item = &PluginEntry> {
        self.plugins.iter().filter(|p| p.enabled)
    }
}

/// Resolve a whole-value `${VAR}` reference; anything else is returned as-is
///
/// Example:
///     resolve_env_var("${API_KEY}") -> Ok("sk_12345...")
///     resolve_env_var("literal-value") -> Ok("literal-value")
pub fn resolve_env_var(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).map_err(|_| {
            PluginError::Config(format!("Environment variable not found: {}", var_name))
        }),
        None => Ok(value.to_string()),
    }
}
