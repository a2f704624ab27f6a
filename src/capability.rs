//! Capability Contract
//!
//! Every plugin implements [`PluginTool`] (a definition and a `call`). Everything
//! else is optional and expressed as a separate capability trait:
//!
//! | Capability                  | RPC methods                                         |
//! |-----------------------------|-----------------------------------------------------|
//! | [`Versioned`]               | `GetVersion`                                        |
//! | [`Compatibility`]           | `GetCompatibilityInfo`                              |
//! | [`MetadataProvider`]        | `GetMetadata`                                       |
//! | [`InitializationProvider`]  | `GetRequiredConfig`, `ValidateConfig`, `InitializeWithConfig` |
//! | [`FileAttachmentHandler`]   | `AcceptsFiles`, `CallWithFiles`                     |
//! | [`WebPageProvider`]         | `GetWebPages`, `ServeWebPage`                       |
//! | [`OperationsProvider`]      | `GetOperations`                                     |
//! | [`HealthCheck`]             | `HealthCheck`                                       |
//! | [`DefaultSettingsProvider`] | `GetDefaultSettings`                                |
//! | [`AgentAware`]              | `SetAgentContext`                                   |
//!
//! A tool advertises a capability by returning `Some(self)` from the matching
//! `as_*` accessor. The RPC server asks on every request, so membership is a
//! property of the concrete type alone; nothing is registered or cached.
//!
//! Tools that compose a [`BasePlugin`] and return it from
//! [`PluginTool::base`] get `Versioned`, `Compatibility`, `MetadataProvider`,
//! `OperationsProvider`, `DefaultSettingsProvider` and `AgentAware` from it
//! without writing any of those methods.
//!
//! Example:
//! ```rust,ignore
//! struct Echo { base: BasePlugin }
//!
//! #[async_trait]
//! impl PluginTool for Echo {
//!     async fn call(&self, args: &str) -> anyhow::Result<String> {
//!         Ok(args.to_string())
//!     }
//!
//!     fn base(&self) -> Option<&BasePlugin> {
//!         Some(&self.base)
//!     }
//!
//!     fn as_health_check(&self) -> Option<&dyn HealthCheck> {
//!         Some(self)
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::base::BasePlugin;
use crate::config::ConfigVariable;
use crate::files::FileAttachment;
use crate::tool::Tool;

/// Information about the agent the plugin is currently serving
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    pub name: String,
    #[serde(default)]
    pub config_path: String,
    #[serde(default)]
    pub settings_path: String,
    #[serde(default)]
    pub agent_dir: String,
    /// Location zone reported by the host (e.g. "Home", "Office")
    #[serde(default)]
    pub current_location: String,
}

/// One operation and its parameter names, both lists sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub required_parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architectures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_agent_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub max_agent_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Authorship and licensing information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub requirements: Requirements,
}

/// Agent version range and API level a plugin was built against
///
/// Empty strings mean "no constraint" or "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityInfo {
    #[serde(default)]
    pub min_agent_version: String,
    #[serde(default)]
    pub max_agent_version: String,
    #[serde(default)]
    pub api_version: String,
}

/// Rendered page returned by a [`WebPageProvider`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPage {
    pub content: String,
    pub content_type: String,
}

pub trait Versioned: Send + Sync {
    fn version(&self) -> String;
}

pub trait Compatibility: Send + Sync {
    fn min_agent_version(&self) -> String;
    fn max_agent_version(&self) -> String;
    fn api_version(&self) -> String;

    fn compatibility_info(&self) -> CompatibilityInfo {
        CompatibilityInfo {
            min_agent_version: self.min_agent_version(),
            max_agent_version: self.max_agent_version(),
            api_version: self.api_version(),
        }
    }
}

pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` when the plugin has no metadata to report
    fn metadata(&self) -> anyhow::Result<Option<PluginMetadata>>;

    /// Lowercase, hyphen-separated tags; replaces the metadata tags on the wire
    fn tags(&self) -> Vec<String>;
}

/// Configuration the host must collect before the plugin can run
pub trait InitializationProvider: Send + Sync {
    fn required_config(&self) -> Vec<ConfigVariable>;
    fn validate_config(&self, config: &Map<String, Value>) -> anyhow::Result<()>;
    fn initialize_with_config(&self, config: &Map<String, Value>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait FileAttachmentHandler: Send + Sync {
    /// Extensions (`.wav`) and/or media types (`audio/wav`); empty rejects all files
    fn accepts_files(&self) -> Vec<String>;

    async fn call_with_files(&self, args: &str, files: Vec<FileAttachment>) -> anyhow::Result<String>;
}

pub trait WebPageProvider: Send + Sync {
    fn web_pages(&self) -> Vec<String>;
    fn serve_web_page(&self, path: &str, query: &HashMap<String, String>) -> anyhow::Result<WebPage>;
}

pub trait OperationsProvider: Send + Sync {
    /// Empty means the tool has no operations
    fn operations(&self) -> Vec<OperationInfo>;
}

pub trait HealthCheck: Send + Sync {
    fn health_check(&self) -> anyhow::Result<()>;
}

pub trait DefaultSettingsProvider: Send + Sync {
    /// Default settings as a JSON string
    fn default_settings(&self) -> anyhow::Result<String>;
}

pub trait AgentAware: Send + Sync {
    fn set_agent_context(&self, ctx: AgentContext);
}

/// The one trait every plugin implements
///
/// `call` receives the raw argument JSON and returns the raw result string.
/// Errors returned from `call` travel back to the host as tool errors, never
/// as transport failures.
#[async_trait]
pub trait PluginTool: Send + Sync {
    /// Tool description sent on `GetDefinition`
    ///
    /// Defaults to the composed base plugin's definition.
    fn definition(&self) -> Tool {
        self.base().map(BasePlugin::definition).unwrap_or_default()
    }

    async fn call(&self, args: &str) -> anyhow::Result<String>;

    /// Composed default-implementing delegate, if any
    fn base(&self) -> Option<&BasePlugin> {
        None
    }

    fn as_versioned(&self) -> Option<&dyn Versioned> {
        self.base().map(|b| b as &dyn Versioned)
    }

    fn as_compatibility(&self) -> Option<&dyn Compatibility> {
        self.base().map(|b| b as &dyn Compatibility)
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        self.base().map(|b| b as &dyn MetadataProvider)
    }

    fn as_initialization_provider(&self) -> Option<&dyn InitializationProvider> {
        None
    }

    fn as_file_handler(&self) -> Option<&dyn FileAttachmentHandler> {
        None
    }

    fn as_web_page_provider(&self) -> Option<&dyn WebPageProvider> {
        None
    }

    fn as_operations_provider(&self) -> Option<&dyn OperationsProvider> {
        self.base().map(|b| b as &dyn OperationsProvider)
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        None
    }

    fn as_default_settings_provider(&self) -> Option<&dyn DefaultSettingsProvider> {
        self.base().map(|b| b as &dyn DefaultSettingsProvider)
    }

    fn as_agent_aware(&self) -> Option<&dyn AgentAware> {
        self.base().map(|b| b as &dyn AgentAware)
    }
}

/// Names of the capabilities a tool currently advertises
pub fn capability_names(tool: &dyn PluginTool) -> Vec<&'static str> {
    let checks: [(&'static str, bool); 10] = [
        ("Versioned", tool.as_versioned().is_some()),
        ("Compatibility", tool.as_compatibility().is_some()),
        ("Metadata", tool.as_metadata_provider().is_some()),
        ("InitializationProvider", tool.as_initialization_provider().is_some()),
        ("FileAttachmentHandler", tool.as_file_handler().is_some()),
        ("WebPageProvider", tool.as_web_page_provider().is_some()),
        ("OperationsProvider", tool.as_operations_provider().is_some()),
        ("HealthCheck", tool.as_health_check().is_some()),
        ("DefaultSettingsProvider", tool.as_default_settings_provider().is_some()),
        ("AgentAware", tool.as_agent_aware().is_some()),
    ];
    checks
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
}
