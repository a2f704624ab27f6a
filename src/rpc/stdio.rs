//! stdio Transport
//!
//! Spawns a plugin executable and talks newline-delimited JSON-RPC over its
//! stdin/stdout. The plugin's stderr is inherited so its logs show up in the
//! host's terminal.
//!
//! The child always gets the handshake variable
//! (`TOOLBRIDGE_PLUGIN=toolbridge-v1`) in its environment; a plugin started any
//! other way refuses to serve.
//!
//! Lifecycle:
//! 1. `StdioTransport::spawn(&entry)` starts the process
//! 2. `send_request()` exchanges one request/response pair
//! 3. `close()` kills the process; dropping the transport does the same

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::stream::StreamTransport;
use super::transport::{JsonRpcRequest, JsonRpcResponse, Transport};
use super::{HANDSHAKE_KEY, HANDSHAKE_VALUE};
use crate::error::{PluginError, Result};
use crate::host::config::PluginEntry;

pub struct StdioTransport {
    plugin_id: String,
    process: Option<Child>,
    stream: StreamTransport<ChildStdout, ChildStdin>,
}

impl StdioTransport {
    /// Spawn the plugin described by `entry`
    ///
    /// Error Conditions:
    /// - Unresolvable `${VAR}` in the entry's env: `Config`
    /// - Command not found, permission denied, bad working dir: `Transport`
    pub async fn spawn(entry: &PluginEntry) -> Result<Self> {
        let mut cmd = Command::new(&entry.command);
        cmd.args(&entry.args);
        cmd.envs(entry.resolved_env()?);
        cmd.env(HANDSHAKE_KEY, HANDSHAKE_VALUE);

        if let Some(ref working_dir) = entry.working_dir {
            cmd.current_dir(working_dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            PluginError::Transport(format!(
                "Failed to spawn plugin '{}': {} (command: {})",
                entry.name, e, entry.command
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PluginError::Transport("Failed to capture plugin stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Transport("Failed to capture plugin stdout".into()))?;

        let mut stream = StreamTransport::new(stdout, stdin);
        if let Some(timeout) = entry.request_timeout() {
            stream = stream.with_timeout(timeout);
        }

        tracing::info!("Spawned plugin '{}' (pid {:?})", entry.id, child.id());

        Ok(Self {
            plugin_id: entry.id.clone(),
            process: Some(child),
            stream,
        })
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.stream.send_request(request).await
    }

    fn is_connected(&self) -> bool {
        self.process.is_some() && self.stream.is_connected()
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close().await?;

        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill().await {
                tracing::warn!("Failed to kill plugin '{}': {}", self.plugin_id, e);
            }
            tracing::info!("Plugin '{}' stopped", self.plugin_id);
        }

        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.start_kill();
        }
    }
}
