//! Plugin lifecycle state as seen by the host

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Lifecycle state of one configured plugin
///
/// State transitions:
/// ```text
/// Disabled ──enable──▶ Stopped ──start──▶ Starting ──spawn ok──▶ Initializing
///                         ▲                  │                       │
///                         │              spawn error          definition ok
///                         │                  ▼                       ▼
///                      Stopping ◀─stop── Error { .. }           Running
///                         ▲                                         │
///                         └─────────────────stop────────────────────┘
/// ```
///
/// A transport failure during a call moves a `Running` plugin to `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PluginState {
    /// Listed in the host config with `enabled: false`
    Disabled,

    /// Enabled but not running
    Stopped,

    /// Process is being spawned
    Starting,

    /// Process is up; the host is fetching its definition
    Initializing,

    /// Ready for calls
    Running,

    /// Shutting down
    Stopping,

    Error {
        message: String,
        timestamp: SystemTime,
    },
}

impl PluginState {
    pub fn error(message: impl Into<String>) -> Self {
        PluginState::Error {
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PluginState::Running)
    }

    /// Nothing to stop in these states
    pub fn is_inactive(&self) -> bool {
        matches!(self, PluginState::Stopped | PluginState::Disabled)
    }
}

/// Summary row returned by `PluginManager::list_plugins`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: PluginState,
    /// Tool name reported by the plugin once it has started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
