//! Plugin entry point
//!
//! A plugin binary's `main` hands its tool to [`serve_plugin`], which refuses
//! to run unless launched by a host (handshake variable present), sets up
//! stderr logging, checks the manifest's tool definition, and answers requests
//! on stdin/stdout until the host closes the pipe.
//!
//! Example:
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manifest = PluginManifest::from_yaml(include_str!("../plugin.yaml"))?;
//!     serve_plugin(Arc::new(Weather::new(manifest))).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use crate::capability::PluginTool;
use crate::error::{PluginError, Result};
use crate::rpc::{serve_connection, PluginServer, HANDSHAKE_KEY, HANDSHAKE_VALUE};

/// Serve `tool` over stdio until the host disconnects
///
/// Error Conditions:
/// - Not launched by a host: `Config`
/// - Manifest tool definition invalid or uncompilable: `Definition`
/// - stdin/stdout failure: `Io`
pub async fn serve_plugin(tool: Arc<dyn PluginTool>) -> Result<()> {
    check_handshake(std::env::var(HANDSHAKE_KEY).ok().as_deref())?;
    init_logging();

    let server = build_server(tool)?;
    tracing::info!("Plugin serving on stdio");

    serve_connection(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("Host closed the connection");
    Ok(())
}

/// Server for `tool`, with call validation when its manifest has a tool definition
///
/// The definition is validated and compiled up front so an authoring mistake
/// stops the plugin before the host sends its first request.
pub fn build_server(tool: Arc<dyn PluginTool>) -> Result<PluginServer> {
    let definition = tool
        .base()
        .and_then(|base| base.manifest())
        .and_then(|manifest| manifest.tool());

    let server = PluginServer::new(tool);
    match definition {
        Some(def) => {
            def.validate()?;
            def.compile()?;
            tracing::debug!("Validating calls against tool definition '{}'", def.name);
            Ok(server.with_validation(def))
        }
        None => Ok(server),
    }
}

fn check_handshake(value: Option<&str>) -> Result<()> {
    match value {
        Some(HANDSHAKE_VALUE) => Ok(()),
        Some(other) => Err(PluginError::Config(format!(
            "Unsupported handshake {}={} (expected {})",
            HANDSHAKE_KEY, other, HANDSHAKE_VALUE
        ))),
        None => Err(PluginError::Config(format!(
            "This binary is a plugin and must be launched by a host ({} not set)",
            HANDSHAKE_KEY
        ))),
    }
}

/// Logs go to stderr; stdout carries the protocol
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BasePlugin;
    use crate::config::PluginManifest;
    use async_trait::async_trait;

    struct Manifested {
        base: BasePlugin,
    }

    #[async_trait]
    impl PluginTool for Manifested {
        async fn call(&self, _args: &str) -> anyhow::Result<String> {
            Ok("ok".into())
        }

        fn base(&self) -> Option<&BasePlugin> {
            Some(&self.base)
        }
    }

    fn manifested(tool_yaml: &str) -> Arc<dyn PluginTool> {
        let yaml = format!(
            "name: echo
version: 1.0.0
description: Echo
license: MIT
repository: https://github.com/example/echo
platforms:
  - os: linux
    architectures: [amd64]
maintainers:
  - name: Jane Doe
    email: jane@example.com
{}",
            tool_yaml
        );
        let manifest = PluginManifest::from_yaml(&yaml).unwrap();
        Arc::new(Manifested {
            base: BasePlugin::from_manifest(manifest),
        })
    }

    #[test]
    fn test_handshake() {
        assert!(check_handshake(Some("toolbridge-v1")).is_ok());
        assert!(matches!(check_handshake(None), Err(PluginError::Config(_))));
        let err = check_handshake(Some("toolbridge-v0")).unwrap_err();
        assert!(err.to_string().contains("Unsupported handshake"));
    }

    #[test]
    fn test_build_server_without_definition() {
        assert!(build_server(manifested("")).is_ok());
    }

    #[test]
    fn test_build_server_rejects_bad_definition() {
        let tool = manifested(
            "tool_definition:\n  description: Echo\n  parameters:\n    - name: mode\n      type: tuple\n",
        );
        assert!(matches!(build_server(tool), Err(PluginError::Definition(_))));
    }

    #[test]
    fn test_build_server_with_definition() {
        let tool = manifested(
            "tool_definition:\n  description: Echo\n  parameters:\n    - name: message\n      type: string\n      description: Text to echo\n      required: true\n",
        );
        assert!(build_server(tool).is_ok());
    }
}
