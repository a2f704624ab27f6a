//! Wire Messages
//!
//! Method names and the `params` / `result` payload of each method. Fields that
//! carry a failure reported by the plugin itself (`error`) are plain strings so
//! that a tool failure never looks like a transport failure.
//!
//! | Method                 | params                 | result                  |
//! |------------------------|------------------------|-------------------------|
//! | `GetDefinition`        | none                   | [`Tool`]                |
//! | `Call`                 | [`CallRequest`]        | [`CallResponse`]        |
//! | `CallWithFiles`        | [`CallWithFilesRequest`] | [`CallResponse`]      |
//! | `GetVersion`           | none                   | [`VersionResponse`]     |
//! | `SetAgentContext`      | [`AgentContext`]       | `{}`                    |
//! | `GetDefaultSettings`   | none                   | [`SettingsResponse`]    |
//! | `GetRequiredConfig`    | none                   | [`ConfigVariablesResponse`] |
//! | `ValidateConfig`       | [`ConfigRequest`]      | [`ConfigResponse`]      |
//! | `InitializeWithConfig` | [`ConfigRequest`]      | [`ConfigResponse`]      |
//! | `GetMetadata`          | none                   | [`MetadataResponse`]    |
//! | `GetCompatibilityInfo` | none                   | [`CompatibilityInfo`]   |
//! | `GetWebPages`          | none                   | [`WebPagesResponse`]    |
//! | `ServeWebPage`         | [`WebPageRequest`]     | [`WebPageResponse`]     |
//! | `GetOperations`        | none                   | [`OperationsResponse`]  |
//! | `AcceptsFiles`         | none                   | [`AcceptsFilesResponse`] |
//! | `HealthCheck`          | none                   | [`HealthResponse`]      |
//!
//! [`Tool`]: crate::tool::Tool
//! [`AgentContext`]: crate::capability::AgentContext
//! [`CompatibilityInfo`]: crate::capability::CompatibilityInfo

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::capability::{OperationInfo, PluginMetadata};
use crate::config::ConfigVariable;
use crate::files::FileAttachment;

pub mod methods {
    pub const GET_DEFINITION: &str = "GetDefinition";
    pub const CALL: &str = "Call";
    pub const CALL_WITH_FILES: &str = "CallWithFiles";
    pub const GET_VERSION: &str = "GetVersion";
    pub const SET_AGENT_CONTEXT: &str = "SetAgentContext";
    pub const GET_DEFAULT_SETTINGS: &str = "GetDefaultSettings";
    pub const GET_REQUIRED_CONFIG: &str = "GetRequiredConfig";
    pub const VALIDATE_CONFIG: &str = "ValidateConfig";
    pub const INITIALIZE_WITH_CONFIG: &str = "InitializeWithConfig";
    pub const GET_METADATA: &str = "GetMetadata";
    pub const GET_COMPATIBILITY_INFO: &str = "GetCompatibilityInfo";
    pub const GET_WEB_PAGES: &str = "GetWebPages";
    pub const SERVE_WEB_PAGE: &str = "ServeWebPage";
    pub const GET_OPERATIONS: &str = "GetOperations";
    pub const ACCEPTS_FILES: &str = "AcceptsFiles";
    pub const HEALTH_CHECK: &str = "HealthCheck";
}

/// Version reported for plugins that are not `Versioned`
pub const UNKNOWN_VERSION: &str = "unknown";

pub const NO_INITIALIZATION_PROVIDER: &str = "plugin does not implement InitializationProvider";
pub const NO_WEB_PAGE_PROVIDER: &str = "plugin does not implement WebPageProvider";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub args: String,
}

/// Outcome of `Call` / `CallWithFiles`; a non-empty `error` is a tool failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl CallResponse {
    pub fn from_result(result: anyhow::Result<String>) -> Self {
        match result {
            Ok(result) => Self {
                result,
                error: String::new(),
            },
            Err(e) => Self {
                result: String::new(),
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallWithFilesRequest {
    pub args: String,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsResponse {
    #[serde(default)]
    pub settings: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigVariablesResponse {
    #[serde(default)]
    pub variables: Vec<ConfigVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigRequest {
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ConfigResponse {
    pub fn from_result(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error: String::new(),
            },
            Err(e) => Self {
                success: false,
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PluginMetadata>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebPagesResponse {
    #[serde(default)]
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebPageRequest {
    pub path: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebPageResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationsResponse {
    #[serde(default)]
    pub operations: Vec<OperationInfo>,
    pub supports_operations: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptsFilesResponse {
    #[serde(default)]
    pub accepted_types: Vec<String>,
    pub supports_files: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub supported: bool,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
