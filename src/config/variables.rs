//! Configuration variables a plugin asks the host to collect
//!
//! Declared in the manifest under `config.variables`:
//!
//! ```yaml
//! config:
//!   variables:
//!     - key: project_dir
//!       name: Project Directory
//!       description: Where projects are stored
//!       type: dirpath
//!       required: true
//!       default_value: "~/Music/Projects"
//!       platform_defaults:
//!         windows: "%USERPROFILE%\\Music\\Projects"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::expand::Expander;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigVariableType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    FilePath,
    DirPath,
    Password,
    Url,
    Email,
}

/// Resolved variable as sent to the host over `GetRequiredConfig`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigVariable {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub var_type: ConfigVariableType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub validation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
}

/// Variable as written in the manifest, before template expansion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestVariable {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub var_type: ConfigVariableType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub validation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
    /// Per-OS defaults keyed by `linux`, `darwin`, `windows`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub platform_defaults: BTreeMap<String, Value>,
}

impl ManifestVariable {
    /// Expand templates and apply the current platform's override
    ///
    /// A matching `platform_defaults` entry replaces the generic default. When
    /// no explicit placeholder was declared, a string override also becomes
    /// the placeholder.
    pub fn resolve(&self, expander: &Expander) -> ConfigVariable {
        let mut placeholder = if self.placeholder.is_empty() {
            String::new()
        } else {
            expander.expand_str(&self.placeholder)
        };

        let mut default_value = self.default_value.as_ref().map(|v| expander.expand_value(v));

        if let Some(platform_default) = self.platform_defaults.get(&expander.os) {
            let expanded = expander.expand_value(platform_default);
            if placeholder.is_empty() {
                if let Value::String(s) = &expanded {
                    placeholder = s.clone();
                }
            }
            default_value = Some(expanded);
        }

        ConfigVariable {
            key: self.key.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            var_type: self.var_type,
            required: self.required,
            default_value,
            validation: self.validation.clone(),
            options: self.options.clone(),
            placeholder,
        }
    }
}
