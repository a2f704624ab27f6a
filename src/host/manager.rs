//! Plugin Manager
//!
//! Design Decision: One coordinator owns every plugin's state and connection
//!
//! Rationale: Starting, stopping and routing calls all touch the same two maps
//! (plugin state and running clients). Keeping them in one manager behind
//! `Arc<RwLock<..>>` lets the CLI and background tasks share a clone, and no
//! lock is held across an RPC.
//!
//! Trade-offs:
//! - Map-level locks vs per-plugin locks: simpler, but a slow start briefly
//!   blocks writers to unrelated plugins
//! - Clients are `Arc`-shared so a call never holds the running-map lock
//! - Boxed transports: one client type for stdio and in-memory plugins
//!
//! Alternatives Considered:
//! 1. Actor per plugin: Rejected - message plumbing with no extra safety here
//! 2. Restart on failure: Deferred - a failed plugin stays in `Error` until
//!    `start_plugin()` is called again
//!
//! Performance Characteristics:
//! - Plugin lookup: O(1) via HashMap
//! - Tool-name routing: O(n) over configured plugins
//! - `start_enabled()` / `stop_all()` / `health_check_all()` run concurrently
//!
//! Lifecycle:
//! 1. `load_config()` registers every entry as `Stopped` (or `Disabled`)
//! 2. `start_plugin()` spawns the executable, fetches its definition, and
//!    pushes the current agent context
//! 3. `call_tool()` routes a call to the plugin's client
//! 4. `stop_plugin()` closes the connection and kills the process
//!
//! A transport failure during a call moves the plugin to `Error`; a tool error
//! leaves it `Running`.
//!
//! Example:
//! ```rust,ignore
//! let manager = PluginManager::new();
//! manager.load_config(Path::new("plugins.json")).await?;
//! manager.start_plugin("weather").await?;
//! let forecast = manager.call_tool("weather", r#"{"city": "Oslo"}"#).await?;
//! ```

use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::config::{HostConfig, PluginEntry};
use super::plugin::{PluginInfo, PluginState};
use crate::capability::AgentContext;
use crate::error::{PluginError, Result};
use crate::files::FileAttachment;
use crate::rpc::client::PluginClient;
use crate::rpc::stdio::StdioTransport;
use crate::rpc::transport::Transport;
use crate::rpc::wire::HealthResponse;
use crate::tool::Tool;

/// Client type held for every running plugin
pub type HostClient = PluginClient<Box<dyn Transport>>;

/// Registry entry for one configured plugin
struct ManagedPlugin {
    entry: PluginEntry,
    state: PluginState,
    tool: Option<Tool>,
    version: Option<String>,
}

impl ManagedPlugin {
    fn new(entry: PluginEntry) -> Self {
        let state = if entry.enabled {
            PluginState::Stopped
        } else {
            PluginState::Disabled
        };
        Self {
            entry,
            state,
            tool: None,
            version: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct PluginManager {
    config: Arc<RwLock<HostConfig>>,
    plugins: Arc<RwLock<HashMap<String, ManagedPlugin>>>,
    running: Arc<RwLock<HashMap<String, Arc<HostClient>>>>,
    agent_context: Arc<RwLock<Option<AgentContext>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a host configuration file and register its plugins
    ///
    /// Error Conditions:
    /// - File not found: `Io`
    /// - Invalid JSON: `Json`
    /// - Validation failure: `Config`
    pub async fn load_config(&self, config_path: &Path) -> Result<()> {
        let config = HostConfig::load_from_file(config_path)?;
        self.apply_config(config).await
    }

    /// Replace the registry with `config`; running plugins are stopped first
    pub async fn apply_config(&self, config: HostConfig) -> Result<()> {
        config.validate()?;
        self.stop_all().await;

        let mut plugins = self.plugins.write().await;
        plugins.clear();
        for entry in &config.plugins {
            plugins.insert(entry.id.clone(), ManagedPlugin::new(entry.clone()));
        }
        drop(plugins);

        tracing::info!("Loaded {} plugin(s) from host config", config.plugins.len());
        *self.config.write().await = config;
        Ok(())
    }

    pub async fn config(&self) -> HostConfig {
        self.config.read().await.clone()
    }

    pub async fn get_plugin_state(&self, plugin_id: &str) -> Option<PluginState> {
        self.plugins
            .read()
            .await
            .get(plugin_id)
            .map(|p| p.state.clone())
    }

    /// All configured plugins, sorted by id
    pub async fn list_plugins(&self) -> Vec<PluginInfo> {
        let plugins = self.plugins.read().await;
        let mut list: Vec<PluginInfo> = plugins
            .values()
            .map(|p| PluginInfo {
                id: p.entry.id.clone(),
                name: p.entry.name.clone(),
                description: p.entry.description.clone(),
                state: p.state.clone(),
                tool_name: p.tool.as_ref().map(|t| t.name.clone()),
                version: p.version.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub async fn plugin_count(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.read().await.contains_key(plugin_id)
    }

    async fn set_state(&self, plugin_id: &str, state: PluginState) {
        if let Some(plugin) = self.plugins.write().await.get_mut(plugin_id) {
            tracing::debug!("Plugin '{}' -> {:?}", plugin_id, state);
            plugin.state = state;
        }
    }

    async fn entry(&self, plugin_id: &str) -> Result<PluginEntry> {
        self.plugins
            .read()
            .await
            .get(plugin_id)
            .map(|p| p.entry.clone())
            .ok_or_else(|| PluginError::PluginNotFound(plugin_id.to_string()))
    }

    /// Spawn a configured plugin and bring it to `Running`
    ///
    /// Starting a running plugin is a no-op.
    ///
    /// Error Conditions:
    /// - Unknown id: `PluginNotFound`
    /// - Spawn failure: `Transport` (state becomes `Error`)
    /// - No tool definition from the plugin: `Protocol` (state becomes `Error`)
    pub async fn start_plugin(&self, plugin_id: &str) -> Result<()> {
        if self.running.read().await.contains_key(plugin_id) {
            tracing::debug!("Plugin '{}' already running", plugin_id);
            return Ok(());
        }

        let entry = self.entry(plugin_id).await?;
        self.set_state(plugin_id, PluginState::Starting).await;

        let transport = match StdioTransport::spawn(&entry).await {
            Ok(transport) => transport,
            Err(e) => {
                self.set_state(plugin_id, PluginState::error(e.to_string())).await;
                return Err(e);
            }
        };

        self.attach(plugin_id, Box::new(transport)).await
    }

    /// Finish starting a configured plugin over an already-open transport
    pub async fn attach(&self, plugin_id: &str, transport: Box<dyn Transport>) -> Result<()> {
        self.entry(plugin_id).await?;
        self.set_state(plugin_id, PluginState::Initializing).await;

        let client = PluginClient::new(transport);
        let tool = client.definition().await;
        if tool.is_empty() {
            if let Err(e) = client.close().await {
                tracing::warn!("Failed to close plugin '{}': {}", plugin_id, e);
            }
            let err = PluginError::Protocol(format!(
                "Plugin '{}' returned no tool definition",
                plugin_id
            ));
            self.set_state(plugin_id, PluginState::error(err.to_string())).await;
            return Err(err);
        }

        let version = client.version().await;
        if let Some(ctx) = self.agent_context.read().await.clone() {
            client.set_agent_context(ctx).await;
        }

        tracing::info!(
            "Plugin '{}' running: tool '{}' version {}",
            plugin_id,
            tool.name,
            version
        );

        if let Some(plugin) = self.plugins.write().await.get_mut(plugin_id) {
            plugin.tool = Some(tool);
            plugin.version = Some(version);
            plugin.state = PluginState::Running;
        }
        self.running
            .write()
            .await
            .insert(plugin_id.to_string(), Arc::new(client));
        Ok(())
    }

    /// Start every enabled plugin concurrently
    pub async fn start_enabled(&self) -> Vec<(String, Result<()>)> {
        let ids: Vec<String> = self
            .config
            .read()
            .await
            .enabled()
            .map(|p| p.id.clone())
            .collect();

        let results = join_all(ids.iter().map(|id| self.start_plugin(id))).await;
        ids.into_iter().zip(results).collect()
    }

    /// Stop a plugin; stopping a stopped or disabled plugin is a no-op
    pub async fn stop_plugin(&self, plugin_id: &str) -> Result<()> {
        let state = self
            .get_plugin_state(plugin_id)
            .await
            .ok_or_else(|| PluginError::PluginNotFound(plugin_id.to_string()))?;
        if state.is_inactive() {
            return Ok(());
        }

        self.set_state(plugin_id, PluginState::Stopping).await;

        let client = self.running.write().await.remove(plugin_id);
        if let Some(client) = client {
            if let Err(e) = client.close().await {
                tracing::warn!("Error closing plugin '{}': {}", plugin_id, e);
            }
        }

        self.set_state(plugin_id, PluginState::Stopped).await;
        tracing::info!("Plugin '{}' stopped", plugin_id);
        Ok(())
    }

    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.running.read().await.keys().cloned().collect();
        for (id, result) in ids
            .iter()
            .zip(join_all(ids.iter().map(|id| self.stop_plugin(id))).await)
        {
            if let Err(e) = result {
                tracing::warn!("Failed to stop plugin '{}': {}", id, e);
            }
        }
    }

    /// Client for a running plugin
    pub async fn client(&self, plugin_id: &str) -> Result<Arc<HostClient>> {
        if let Some(client) = self.running.read().await.get(plugin_id) {
            return Ok(Arc::clone(client));
        }
        if self.has_plugin(plugin_id).await {
            Err(PluginError::Transport(format!(
                "Plugin '{}' is not running",
                plugin_id
            )))
        } else {
            Err(PluginError::PluginNotFound(plugin_id.to_string()))
        }
    }

    /// Id of the running plugin whose tool is called `tool_name`
    pub async fn find_by_tool_name(&self, tool_name: &str) -> Option<String> {
        self.plugins
            .read()
            .await
            .iter()
            .find(|(_, p)| p.state.is_running() && p.tool.as_ref().is_some_and(|t| t.name == tool_name))
            .map(|(id, _)| id.clone())
    }

    /// Tool definitions of every running plugin, keyed by plugin id
    pub async fn tools(&self) -> HashMap<String, Tool> {
        self.plugins
            .read()
            .await
            .iter()
            .filter(|(_, p)| p.state.is_running())
            .filter_map(|(id, p)| p.tool.clone().map(|t| (id.clone(), t)))
            .collect()
    }

    pub async fn call_tool(&self, plugin_id: &str, args: &str) -> Result<String> {
        let client = self.client(plugin_id).await?;
        let outcome = client.call(args).await;
        self.track_failure(plugin_id, &outcome).await;
        outcome
    }

    /// Call with attachments, forwarding only the file types the plugin accepts
    pub async fn call_with_attachments(
        &self,
        plugin_id: &str,
        args: &str,
        files: &[FileAttachment],
    ) -> Result<String> {
        let client = self.client(plugin_id).await?;
        let outcome = client.call_with_attachments(args, files).await;
        self.track_failure(plugin_id, &outcome).await;
        outcome
    }

    async fn track_failure<T>(&self, plugin_id: &str, outcome: &Result<T>) {
        if let Err(e @ PluginError::Transport(_)) = outcome {
            tracing::error!("Plugin '{}' transport failure: {}", plugin_id, e);
            self.running.write().await.remove(plugin_id);
            self.set_state(plugin_id, PluginState::error(e.to_string())).await;
        }
    }

    /// Remember `ctx` and push it to every running plugin
    pub async fn set_agent_context(&self, ctx: AgentContext) {
        *self.agent_context.write().await = Some(ctx.clone());

        let clients: Vec<Arc<HostClient>> = self.running.read().await.values().cloned().collect();
        join_all(clients.iter().map(|c| c.set_agent_context(ctx.clone()))).await;
    }

    /// Health of every running plugin; `Ok(None)` means no health check
    pub async fn health_check_all(&self) -> HashMap<String, Result<Option<HealthResponse>>> {
        let clients: Vec<(String, Arc<HostClient>)> = self
            .running
            .read()
            .await
            .iter()
            .map(|(id, c)| (id.clone(), Arc::clone(c)))
            .collect();

        let results = join_all(clients.iter().map(|(_, c)| c.health_check())).await;
        clients
            .into_iter()
            .map(|(id, _)| id)
            .zip(results)
            .collect()
    }
}
