//! Minimal toolbridge plugin
//!
//! Build with `cargo build --example echo_plugin`, then from the host side:
//!
//! ```text
//! toolbridge inspect target/debug/examples/echo_plugin
//! toolbridge call target/debug/examples/echo_plugin '{"operation": "echo", "message": "hi"}'
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use toolbridge::schema::parse_arguments;
use toolbridge::{
    BasePlugin, FileAttachment, FileAttachmentHandler, HealthCheck, PluginManifest, PluginTool,
    StructuredResult,
};

const MANIFEST: &str = r#"
name: echo
version: 0.1.0
description: Echo messages back, optionally reversed
license: MIT
repository: https://github.com/example/toolbridge-echo
tags: [demo, text]
platforms:
  - os: linux
    architectures: [amd64, arm64]
  - os: darwin
    architectures: [amd64, arm64]
maintainers:
  - name: Toolbridge Maintainers
    email: maintainers@example.com
requirements:
  min_agent_version: 0.1.0
tool_definition:
  description: Echo a message
  parameters:
    - name: operation
      type: string
      description: What to do with the message
      required: true
  operations:
    echo:
      parameters:
        - name: message
          type: string
          description: Text to send back
          required: true
    reverse:
      parameters:
        - name: message
          type: string
          description: Text to send back reversed
          required: true
    files:
"#;

struct Echo {
    base: BasePlugin,
}

#[async_trait]
impl PluginTool for Echo {
    async fn call(&self, args: &str) -> anyhow::Result<String> {
        let args = parse_arguments(args)?;
        let message = args.get("message").and_then(Value::as_str).unwrap_or_default();

        match args.get("operation").and_then(Value::as_str) {
            Some("echo") => Ok(message.to_string()),
            Some("reverse") => Ok(message.chars().rev().collect()),
            Some("files") => Ok(StructuredResult::text("no files attached").to_json()?),
            other => anyhow::bail!("unsupported operation {:?}", other),
        }
    }

    fn base(&self) -> Option<&BasePlugin> {
        Some(&self.base)
    }

    fn as_file_handler(&self) -> Option<&dyn FileAttachmentHandler> {
        Some(self)
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

#[async_trait]
impl FileAttachmentHandler for Echo {
    fn accepts_files(&self) -> Vec<String> {
        vec![".txt".into(), "text/plain".into()]
    }

    async fn call_with_files(&self, _args: &str, files: Vec<FileAttachment>) -> anyhow::Result<String> {
        let rows: Vec<Value> = files
            .iter()
            .map(|f| json!({"name": f.name, "size": f.size}))
            .collect();
        Ok(StructuredResult::table("Attachments", &["name", "size"], json!(rows)).to_json()?)
    }
}

impl HealthCheck for Echo {
    fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manifest = PluginManifest::from_yaml(MANIFEST)?;
    let echo = Echo {
        base: BasePlugin::from_manifest(manifest),
    };
    toolbridge::serve_plugin(Arc::new(echo)).await?;
    Ok(())
}
