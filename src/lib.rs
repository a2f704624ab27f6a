// Library interface for toolbridge
// Plugins link it to describe and serve a tool; hosts link it to launch
// plugins and call them over JSON-RPC.

pub mod base;
pub mod capability;
pub mod config;
pub mod error;
pub mod files;
pub mod host;
pub mod result;
pub mod rpc;
pub mod schema;
pub mod serve;
pub mod settings;
pub mod tool;

// Re-export commonly used types for convenience
pub use base::BasePlugin;
pub use capability::{
    AgentAware, AgentContext, Compatibility, CompatibilityInfo, DefaultSettingsProvider,
    FileAttachmentHandler, HealthCheck, InitializationProvider, MetadataProvider, OperationInfo,
    OperationsProvider, PluginMetadata, PluginTool, Versioned, WebPage, WebPageProvider,
};
pub use config::{ConfigVariable, ConfigVariableType, Expander, PluginManifest};
pub use error::{PluginError, Result};
pub use files::FileAttachment;
pub use host::{HostConfig, PluginEntry, PluginManager, PluginState};
pub use result::{DisplayType, StructuredResult};
pub use rpc::{PluginClient, PluginServer, StdioTransport, StreamTransport, Transport};
pub use schema::{ToolDefinition, ToolParameter};
pub use serve::serve_plugin;
pub use settings::{FileSettingsStore, SettingsStore};
pub use tool::Tool;
