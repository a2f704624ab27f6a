//! Persistent Per-Plugin Settings
//!
//! Settings live in a JSON object file inside the agent directory:
//!
//! `{agent_dir}/{normalized_name}_settings.json`
//!
//! where the plugin name is lowercased, `_` becomes `-`, and surrounding
//! whitespace is trimmed. Older layouts stored them at
//! `{agent_dir}/plugins/{name}/settings.json`; that file is read when the new
//! one does not exist, and the next write lands at the new path.
//!
//! All values are cached in memory behind a `RwLock`. Every `set` and `delete`
//! persists immediately through a sibling `.tmp` file and a rename, so a crash
//! mid-write never leaves a truncated settings file behind.
//!
//! Typed getters return the zero value for a missing key and a
//! [`PluginError::Settings`] when the stored value has the wrong type.

#[cfg(test)]
use mockall::automock;

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{PluginError, Result};

/// Key-value settings shared between a plugin and its host
#[cfg_attr(test, automock)]
pub trait SettingsStore: Send + Sync {
    /// `None` when the key was never set
    fn get(&self, key: &str) -> Option<Value>;
    fn get_string(&self, key: &str) -> Result<String>;
    /// Whole-number view; fractional JSON numbers are truncated
    fn get_int(&self, key: &str) -> Result<i64>;
    fn get_bool(&self, key: &str) -> Result<bool>;
    fn get_float(&self, key: &str) -> Result<f64>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    /// Snapshot copy; mutating it does not touch the store
    fn get_all(&self) -> Map<String, Value>;
    fn save(&self) -> Result<()>;
    /// Replace the cache with the file contents (empty if the file is gone)
    fn load(&self) -> Result<()>;
}

/// Normalized file stem for a plugin's settings
pub fn normalize_plugin_name(name: &str) -> String {
    name.replace('_', "-").to_lowercase().trim().to_string()
}

struct SettingsState {
    values: Map<String, Value>,
    dirty: bool,
}

/// JSON-file backed [`SettingsStore`]
pub struct FileSettingsStore {
    path: PathBuf,
    state: RwLock<SettingsState>,
}

impl FileSettingsStore {
    /// Open (or prepare) the settings file for `plugin_name` under `agent_dir`
    ///
    /// Error Conditions:
    /// - Empty `agent_dir` or `plugin_name`
    /// - Existing settings file is unreadable or not a JSON object
    pub fn open(agent_dir: impl AsRef<Path>, plugin_name: &str) -> Result<Self> {
        let agent_dir = agent_dir.as_ref();
        if agent_dir.as_os_str().is_empty() {
            return Err(PluginError::Settings("agent_dir cannot be empty".to_string()));
        }
        if plugin_name.is_empty() {
            return Err(PluginError::Settings("plugin_name cannot be empty".to_string()));
        }

        let path = agent_dir.join(format!("{}_settings.json", normalize_plugin_name(plugin_name)));
        let legacy = agent_dir.join("plugins").join(plugin_name).join("settings.json");

        let values = if path.exists() {
            read_settings(&path)?
        } else if legacy.exists() {
            tracing::debug!("Loading legacy settings from {}", legacy.display());
            read_settings(&legacy)?
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            state: RwLock::new(SettingsState { values, dirty: false }),
        })
    }

    /// Where writes go
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SettingsState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SettingsState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, state: &mut SettingsState) -> Result<()> {
        if !state.dirty {
            return Ok(());
        }

        let content = serde_json::to_string_pretty(&state.values)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, content).map_err(|e| {
            PluginError::Settings(format!("failed to write temp settings file: {}", e))
        })?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(PluginError::Settings(format!(
                "failed to rename settings file: {}",
                e
            )));
        }

        state.dirty = false;
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| PluginError::Settings(format!("failed to parse settings file: {}", e)))
}

fn type_mismatch(key: &str, expected: &str, value: &Value) -> PluginError {
    PluginError::Settings(format!(
        "setting \"{}\" is not {} (type: {})",
        key,
        expected,
        json_type_name(value)
    ))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_state().values.get(key).cloned()
    }

    fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(type_mismatch(key, "a string", &other)),
        }
    }

    fn get_int(&self, key: &str) -> Result<i64> {
        match self.get(key) {
            None => Ok(0),
            Some(Value::Number(n)) => Ok(n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or_default()),
            Some(other) => Err(type_mismatch(key, "an integer", &other)),
        }
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(type_mismatch(key, "a boolean", &other)),
        }
    }

    fn get_float(&self, key: &str) -> Result<f64> {
        match self.get(key) {
            None => Ok(0.0),
            Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or_default()),
            Some(other) => Err(type_mismatch(key, "a number", &other)),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.write_state();
        state.values.insert(key.to_string(), value);
        state.dirty = true;
        self.persist(&mut state)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.write_state();
        state.values.remove(key);
        state.dirty = true;
        self.persist(&mut state)
    }

    fn get_all(&self) -> Map<String, Value> {
        self.read_state().values.clone()
    }

    fn save(&self) -> Result<()> {
        let mut state = self.write_state();
        self.persist(&mut state)
    }

    fn load(&self) -> Result<()> {
        let values = if self.path.exists() {
            read_settings(&self.path)?
        } else {
            Map::new()
        };
        let mut state = self.write_state();
        state.values = values;
        state.dirty = false;
        Ok(())
    }
}
