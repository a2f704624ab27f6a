//! Plugin Manifest (`plugin.yaml`)
//!
//! Every plugin ships a manifest describing who it is, where it runs, what it
//! needs from the host, and (optionally) its tool definition:
//!
//! ```yaml
//! name: music-projects
//! version: 1.2.0
//! description: Create and manage music projects
//! license: MIT
//! repository: https://github.com/example/music-projects
//! tags: [music, projects]
//! platforms:
//!   - os: darwin
//!     architectures: [arm64, amd64]
//! maintainers:
//!   - name: Jane Doe
//!     email: jane@example.com
//! requirements:
//!   min_agent_version: 0.5.0
//! config:
//!   variables: [...]
//! tool_definition:
//!   name: music_project
//!   ...
//! ```
//!
//! Parsing validates the required fields up front. Every failure is a
//! [`PluginError::Definition`] prefixed with `invalid plugin config:`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use super::expand::Expander;
use super::variables::{ConfigVariable, ManifestVariable};
use crate::capability::{Maintainer, Platform, PluginMetadata, Requirements};
use crate::error::{PluginError, Result};
use crate::schema::ToolDefinition;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<ManifestVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub config: ManifestConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_definition: Option<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_pages: Vec<String>,
}

fn semver_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^v?\d+(\.\d+)?(\.\d+)?(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
        )
        .expect("static pattern")
    })
}

/// Loose semantic-version check (`1`, `1.2`, `v1.2.3-beta.1+build` all pass)
pub fn is_semver(version: &str) -> bool {
    semver_pattern().is_match(version)
}

fn invalid(message: impl std::fmt::Display) -> PluginError {
    PluginError::Definition(format!("invalid plugin config: {}", message))
}

impl PluginManifest {
    /// Parse and validate manifest YAML
    ///
    /// Error Conditions:
    /// - YAML syntax errors
    /// - Missing name, version, description, license, repository,
    ///   platforms, or maintainers
    /// - Version (or `requirements.min_agent_version`) not semver
    /// - Repository not an absolute URL
    /// - Platform without `os` or architectures, maintainer without name or email
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: PluginManifest = serde_yaml::from_str(yaml).map_err(|e| {
            PluginError::Definition(format!("invalid plugin config YAML: {}", e))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("name", self.name.is_empty()),
            ("version", self.version.is_empty()),
            ("description", self.description.is_empty()),
            ("license", self.license.is_empty()),
            ("repository", self.repository.is_empty()),
            ("platforms", self.platforms.is_empty()),
            ("maintainers", self.maintainers.is_empty()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(invalid(format!("missing required field: {}", field)));
        }

        if !is_semver(&self.version) {
            return Err(invalid(format!(
                "invalid semver format for version: {}",
                self.version
            )));
        }

        if url::Url::parse(&self.repository).is_err() {
            return Err(invalid(format!(
                "invalid URL format for repository: {}",
                self.repository
            )));
        }

        for (i, platform) in self.platforms.iter().enumerate() {
            if platform.os.is_empty() {
                return Err(invalid(format!("platform[{}] missing os field", i)));
            }
            if platform.architectures.is_empty() {
                return Err(invalid(format!(
                    "platform[{}] has empty architectures array",
                    i
                )));
            }
        }

        for (i, maintainer) in self.maintainers.iter().enumerate() {
            if maintainer.name.is_empty() {
                return Err(invalid(format!("maintainer[{}] missing name field", i)));
            }
            if maintainer.email.is_empty() {
                return Err(invalid(format!("maintainer[{}] missing email field", i)));
            }
        }

        let min = &self.requirements.min_agent_version;
        if !min.is_empty() && !is_semver(min) {
            return Err(invalid(format!(
                "invalid semver format for min_agent_version: {}",
                min
            )));
        }

        Ok(())
    }

    pub fn to_metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            license: self.license.clone(),
            repository: self.repository.clone(),
            maintainers: self.maintainers.clone(),
            platforms: self.platforms.clone(),
            requirements: self.requirements.clone(),
        }
    }

    /// Config variables with templates expanded for the running host
    pub fn to_config_variables(&self) -> Vec<ConfigVariable> {
        self.config_variables_for(&Expander::from_host())
    }

    pub fn config_variables_for(&self, expander: &Expander) -> Vec<ConfigVariable> {
        self.config
            .variables
            .iter()
            .map(|v| v.resolve(expander))
            .collect()
    }

    /// Tool definition with its name defaulted to the plugin name
    pub fn tool(&self) -> Option<ToolDefinition> {
        self.tool_definition.clone().map(|mut def| {
            if def.name.is_empty() {
                def.name = self.name.clone();
            }
            def
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
name: music-projects
version: 1.2.0
description: Create and manage music projects
license: MIT
repository: https://github.com/example/music-projects
tags: [music, projects]
platforms:
  - os: darwin
    architectures: [arm64, amd64]
  - os: linux
    architectures: [amd64]
maintainers:
  - name: Jane Doe
    email: jane@example.com
requirements:
  min_agent_version: 0.5.0
  dependencies: [ffmpeg]
config:
  variables:
    - key: project_dir
      name: Project Directory
      description: Where projects live
      type: dirpath
      required: true
      default_value: "{{USER_HOME}}/Projects"
tool_definition:
  description: Manage projects
  parameters:
    - name: operation
      type: string
      description: Operation
      required: true
  operations:
    create:
      parameters:
        - name: title
          type: string
          description: Title
          required: true
    list: {}
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = PluginManifest::from_yaml(MANIFEST).unwrap();
        assert_eq!(manifest.name, "music-projects");
        assert_eq!(manifest.platforms.len(), 2);
        assert_eq!(manifest.requirements.min_agent_version, "0.5.0");

        let metadata = manifest.to_metadata();
        assert_eq!(metadata.tags, vec!["music", "projects"]);
        assert_eq!(metadata.maintainers[0].email, "jane@example.com");
        assert_eq!(metadata.requirements.dependencies, vec!["ffmpeg"]);
    }

    #[test]
    fn test_tool_name_defaults_to_plugin_name() {
        let manifest = PluginManifest::from_yaml(MANIFEST).unwrap();
        let tool = manifest.tool().unwrap();
        assert_eq!(tool.name, "music-projects");
        assert_eq!(tool.operation_names(), vec!["create", "list"]);
    }

    #[test]
    fn test_config_variables_expanded() {
        let manifest = PluginManifest::from_yaml(MANIFEST).unwrap();
        let expander = Expander {
            os: "linux".into(),
            arch: "amd64".into(),
            home: Some("/home/a".into()),
        };
        let vars = manifest.config_variables_for(&expander);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].default_value, Some(serde_json::json!("/home/a/Projects")));
    }

    #[test]
    fn test_missing_required_fields() {
        let yaml = MANIFEST.replace("license: MIT\n", "");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid plugin config: missing required field: license"
        );
        assert!(matches!(err, PluginError::Definition(_)));
    }

    #[test]
    fn test_invalid_version_and_repository() {
        let yaml = MANIFEST.replace("version: 1.2.0", "version: one");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("invalid semver format for version: one"));

        let yaml = MANIFEST.replace(
            "repository: https://github.com/example/music-projects",
            "repository: not a url",
        );
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("invalid URL format for repository"));

        let yaml = MANIFEST.replace("min_agent_version: 0.5.0", "min_agent_version: latest");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("min_agent_version: latest"));
    }

    #[test]
    fn test_platform_and_maintainer_fields() {
        let yaml = MANIFEST.replace("    architectures: [amd64]\n", "    architectures: []\n");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("platform[1] has empty architectures array"));

        let yaml = MANIFEST.replace("    email: jane@example.com\n", "");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("maintainer[0] missing email field"));

        let yaml = MANIFEST.replace("  - name: Jane Doe\n    email:", "  - email:");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid plugin config: maintainer[0] missing name field"
        );

        let yaml = MANIFEST.replace("  - os: linux\n    architectures:", "  - architectures:");
        let err = PluginManifest::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid plugin config: platform[1] missing os field"
        );
    }

    #[test]
    fn test_semver_check() {
        assert!(is_semver("1.0.0"));
        assert!(is_semver("v2.3"));
        assert!(is_semver("1.2.3-beta.1+build.5"));
        assert!(!is_semver("1.x"));
        assert!(!is_semver(""));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        file.flush().unwrap();

        let manifest = PluginManifest::load_from_file(file.path()).unwrap();
        assert_eq!(manifest.version, "1.2.0");
    }
}
