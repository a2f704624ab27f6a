//! Base Plugin
//!
//! Reusable default implementations of the optional capabilities. A plugin
//! composes a `BasePlugin` and returns it from [`PluginTool::base`]; the
//! trait's default accessors then route `Versioned`, `Compatibility`,
//! `MetadataProvider`, `OperationsProvider`, `DefaultSettingsProvider` and
//! `AgentAware` to it.
//!
//! A base built from a manifest also supplies the tool definition, its
//! operations listing, and the config variables declared in YAML.
//!
//! Example:
//! ```rust,ignore
//! let manifest = PluginManifest::from_yaml(include_str!("plugin.yaml"))?;
//! let tool = MyTool { base: BasePlugin::from_manifest(manifest) };
//! serve_plugin(Arc::new(tool)).await?;
//! ```
//!
//! [`PluginTool::base`]: crate::capability::PluginTool::base

use std::sync::{Arc, Mutex, RwLock};

use crate::capability::{
    AgentAware, AgentContext, Compatibility, DefaultSettingsProvider, MetadataProvider,
    OperationInfo, OperationsProvider, PluginMetadata, Versioned,
};
use crate::config::{ConfigVariable, PluginManifest};
use crate::error::{PluginError, Result};
use crate::settings::{FileSettingsStore, SettingsStore};
use crate::tool::Tool;

/// API level reported when none is declared
pub const DEFAULT_API_VERSION: &str = "v1";

const FALLBACK_TOOL_NAME: &str = "unknown-plugin";
const FALLBACK_TOOL_DESCRIPTION: &str = "Plugin integration";

pub struct BasePlugin {
    version: String,
    min_agent_version: String,
    max_agent_version: String,
    api_version: String,
    metadata: Option<PluginMetadata>,
    default_settings: String,
    manifest: Option<PluginManifest>,
    agent_context: RwLock<AgentContext>,
    settings: Mutex<Option<Arc<dyn SettingsStore>>>,
}

impl BasePlugin {
    /// Bare base with version information only
    ///
    /// An empty `api_version` becomes [`DEFAULT_API_VERSION`].
    pub fn new(
        version: impl Into<String>,
        min_agent_version: impl Into<String>,
        max_agent_version: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let api_version = api_version.into();
        Self {
            version: version.into(),
            min_agent_version: min_agent_version.into(),
            max_agent_version: max_agent_version.into(),
            api_version: if api_version.is_empty() {
                DEFAULT_API_VERSION.to_string()
            } else {
                api_version
            },
            metadata: None,
            default_settings: String::new(),
            manifest: None,
            agent_context: RwLock::new(AgentContext::default()),
            settings: Mutex::new(None),
        }
    }

    /// Base populated from a validated manifest
    pub fn from_manifest(manifest: PluginManifest) -> Self {
        let req = &manifest.requirements;
        let mut base = Self::new(
            manifest.version.clone(),
            req.min_agent_version.clone(),
            req.max_agent_version.clone(),
            req.api_version.clone(),
        );
        base.metadata = Some(manifest.to_metadata());
        base.manifest = Some(manifest);
        base
    }

    pub fn with_metadata(mut self, metadata: PluginMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// JSON string returned from `GetDefaultSettings`
    pub fn with_default_settings(mut self, settings: impl Into<String>) -> Self {
        self.default_settings = settings.into();
        self
    }

    pub fn manifest(&self) -> Option<&PluginManifest> {
        self.manifest.as_ref()
    }

    /// Copy of the context last pushed by the host
    pub fn agent_context(&self) -> AgentContext {
        self.agent_context
            .read()
            .map(|ctx| ctx.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Config variables declared in the manifest, templates expanded
    ///
    /// Useful as a starting point for a hand-written `required_config`.
    pub fn config_from_yaml(&self) -> Vec<ConfigVariable> {
        self.manifest
            .as_ref()
            .map(PluginManifest::to_config_variables)
            .unwrap_or_default()
    }

    /// Settings store for this plugin, created on first use
    ///
    /// `None` until the host has supplied an agent context with a non-empty
    /// `agent_dir`, or if the settings file cannot be opened.
    pub fn settings(&self) -> Option<Arc<dyn SettingsStore>> {
        let mut slot = self.settings.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(store) = slot.as_ref() {
            return Some(Arc::clone(store));
        }

        let agent_dir = self.agent_context().agent_dir;
        if agent_dir.is_empty() {
            return None;
        }

        let plugin_name = self
            .metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("unknown");

        match FileSettingsStore::open(&agent_dir, plugin_name) {
            Ok(store) => {
                let store: Arc<dyn SettingsStore> = Arc::new(store);
                *slot = Some(Arc::clone(&store));
                Some(store)
            }
            Err(e) => {
                tracing::warn!("Failed to open settings for {}: {}", plugin_name, e);
                None
            }
        }
    }

    /// Tool compiled from the manifest's `tool_definition`
    ///
    /// Error Conditions:
    /// - No manifest, or the manifest has no tool definition
    /// - The definition does not compile
    pub fn tool_definition(&self) -> Result<Tool> {
        let manifest = self
            .manifest
            .as_ref()
            .ok_or_else(|| PluginError::Definition("plugin config not set".to_string()))?;
        let def = manifest.tool().ok_or_else(|| {
            PluginError::Definition("no tool definition in plugin.yaml".to_string())
        })?;
        def.to_tool()
    }

    /// Manifest-derived definition, or a minimal one built from metadata
    pub fn definition(&self) -> Tool {
        match self.tool_definition() {
            Ok(tool) => tool,
            Err(e) => {
                tracing::debug!("Using fallback tool definition: {}", e);
                let name = self
                    .metadata
                    .as_ref()
                    .map(|m| m.name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| FALLBACK_TOOL_NAME.to_string());
                let description = self
                    .metadata
                    .as_ref()
                    .map(|m| m.description.clone())
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| FALLBACK_TOOL_DESCRIPTION.to_string());
                Tool::new(name, description, serde_json::json!({}))
            }
        }
    }
}

impl Versioned for BasePlugin {
    fn version(&self) -> String {
        self.version.clone()
    }
}

impl Compatibility for BasePlugin {
    fn min_agent_version(&self) -> String {
        self.min_agent_version.clone()
    }

    fn max_agent_version(&self) -> String {
        self.max_agent_version.clone()
    }

    fn api_version(&self) -> String {
        self.api_version.clone()
    }
}

impl MetadataProvider for BasePlugin {
    fn metadata(&self) -> anyhow::Result<Option<PluginMetadata>> {
        Ok(self.metadata.clone())
    }

    /// Manifest tags when declared, else the metadata tags
    fn tags(&self) -> Vec<String> {
        if let Some(manifest) = self.manifest.as_ref().filter(|m| !m.tags.is_empty()) {
            return manifest.tags.clone();
        }
        self.metadata
            .as_ref()
            .map(|m| m.tags.clone())
            .unwrap_or_default()
    }
}

impl OperationsProvider for BasePlugin {
    fn operations(&self) -> Vec<OperationInfo> {
        self.manifest
            .as_ref()
            .and_then(PluginManifest::tool)
            .map(|def| def.operations_info())
            .unwrap_or_default()
    }
}

impl DefaultSettingsProvider for BasePlugin {
    fn default_settings(&self) -> anyhow::Result<String> {
        Ok(self.default_settings.clone())
    }
}

impl AgentAware for BasePlugin {
    fn set_agent_context(&self, ctx: AgentContext) {
        let mut slot = self.agent_context.write().unwrap_or_else(|p| p.into_inner());
        *slot = ctx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PluginTool;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
name: music_projects
version: 0.3.1
description: Manage music projects
license: MIT
repository: https://github.com/example/music
tags: [music]
platforms:
  - os: linux
    architectures: [amd64]
maintainers:
  - name: Dev
    email: dev@example.com
requirements:
  min_agent_version: 0.0.6
config:
  variables:
    - key: root
      name: Root
      type: dirpath
      default_value: /srv/music
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

    fn manifest_base() -> BasePlugin {
        BasePlugin::from_manifest(PluginManifest::from_yaml(MANIFEST).unwrap())
    }

    struct Wrapper {
        base: BasePlugin,
    }

    #[async_trait]
    impl PluginTool for Wrapper {
        async fn call(&self, args: &str) -> anyhow::Result<String> {
            Ok(args.to_string())
        }

        fn base(&self) -> Option<&BasePlugin> {
            Some(&self.base)
        }
    }

    #[test]
    fn test_new_defaults_api_version() {
        let base = BasePlugin::new("1.0.0", "", "", "");
        assert_eq!(base.api_version(), "v1");
        assert_eq!(Versioned::version(&base), "1.0.0");
        assert_eq!(base.compatibility_info().min_agent_version, "");
    }

    #[test]
    fn test_from_manifest() {
        let base = manifest_base();
        assert_eq!(Versioned::version(&base), "0.3.1");
        assert_eq!(base.min_agent_version(), "0.0.6");
        assert_eq!(base.api_version(), "v1");
        let metadata = base.metadata().unwrap().unwrap();
        assert_eq!(metadata.name, "music_projects");
        assert_eq!(base.tags(), vec!["music"]);
        assert_eq!(base.config_from_yaml()[0].default_value, Some(json!("/srv/music")));
    }

    #[test]
    fn test_definition_from_manifest() {
        let tool = manifest_base().definition();
        assert_eq!(tool.name, "music_projects");
        assert_eq!(tool.description, "Manage projects");
        assert_eq!(
            tool.parameters["properties"]["operation"]["enum"],
            json!(["create", "list"])
        );
    }

    #[test]
    fn test_definition_fallbacks() {
        let bare = BasePlugin::new("1.0.0", "", "", "");
        let tool = bare.definition();
        assert_eq!(tool.name, "unknown-plugin");
        assert_eq!(tool.description, "Plugin integration");
        assert_eq!(tool.parameters, json!({}));
        assert!(bare.tool_definition().is_err());

        let named = BasePlugin::new("1.0.0", "", "", "").with_metadata(PluginMetadata {
            name: "weather".into(),
            description: "Forecasts".into(),
            ..Default::default()
        });
        let tool = named.definition();
        assert_eq!(tool.name, "weather");
        assert_eq!(tool.description, "Forecasts");
    }

    #[test]
    fn test_operations() {
        let ops = manifest_base().operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "create");
        assert_eq!(ops[0].required_parameters, vec!["title"]);
        assert!(BasePlugin::new("1", "", "", "").operations().is_empty());
    }

    #[test]
    fn test_settings_require_agent_dir() {
        let base = manifest_base();
        assert!(base.settings().is_none());

        let dir = TempDir::new().unwrap();
        base.set_agent_context(AgentContext {
            name: "main".into(),
            agent_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        });
        let store = base.settings().unwrap();
        store.set("volume", json!(7)).unwrap();
        assert!(dir.path().join("music-projects_settings.json").exists());

        let again = base.settings().unwrap();
        assert_eq!(again.get_int("volume").unwrap(), 7);
    }

    #[test]
    fn test_composed_tool_gets_capabilities() {
        let tool = Wrapper {
            base: manifest_base().with_default_settings(r#"{"volume": 5}"#),
        };
        assert_eq!(tool.definition().name, "music_projects");
        assert_eq!(tool.as_versioned().unwrap().version(), "0.3.1");
        assert_eq!(
            tool.as_default_settings_provider().unwrap().default_settings().unwrap(),
            r#"{"volume": 5}"#
        );
        assert!(tool.as_initialization_provider().is_none());

        tool.as_agent_aware().unwrap().set_agent_context(AgentContext {
            name: "studio".into(),
            ..Default::default()
        });
        assert_eq!(tool.base.agent_context().name, "studio");
    }
}
