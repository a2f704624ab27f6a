//! toolbridge - host-side utility for RPC tool plugins
//!
//! Validates manifests, launches plugins to inspect their capabilities, calls
//! their tool, and lists the plugins of a host configuration.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use toolbridge::files::{media_type_for, FileAttachment};
use toolbridge::host::{PluginEntry, PluginManager};
use toolbridge::rpc::{PluginClient, StdioTransport};
use toolbridge::{PluginManifest, StructuredResult};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.debug);

    match args.command {
        Command::Validate { manifest } => validate(&manifest),
        Command::Inspect { executable } => inspect(&executable).await,
        Command::Call {
            executable,
            args,
            files,
            timeout,
        } => call(&executable, &args, &files, timeout).await,
        Command::List { config, start } => list(&config, start).await,
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate(path: &Path) -> Result<()> {
    let manifest = PluginManifest::load_from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    println!("{} {} - {}", manifest.name, manifest.version, manifest.description);

    for var in manifest.to_config_variables() {
        println!(
            "  config {} ({:?}){}",
            var.key,
            var.var_type,
            if var.required { " required" } else { "" }
        );
    }

    match manifest.tool() {
        Some(def) => {
            def.validate()?;
            let tool = def.to_tool()?;
            println!("{}", serde_json::to_string_pretty(&tool)?);
        }
        None => println!("  no tool_definition"),
    }
    Ok(())
}

async fn connect(executable: &str, timeout: u64) -> Result<PluginClient<StdioTransport>> {
    let mut entry = PluginEntry::for_executable(executable);
    entry.timeout = timeout;
    let transport = StdioTransport::spawn(&entry).await?;
    Ok(PluginClient::new(transport))
}

async fn inspect(executable: &str) -> Result<()> {
    let client = connect(executable, 30).await?;

    let definition = client.definition().await;
    if definition.is_empty() {
        client.close().await.ok();
        anyhow::bail!("{} did not answer GetDefinition", executable);
    }

    let metadata = match client.get_metadata().await {
        Ok(metadata) => json!(metadata),
        Err(e) => json!({ "error": e.to_string() }),
    };
    let health = match client.health_check().await {
        Ok(Some(status)) => json!(status),
        Ok(None) => json!(null),
        Err(e) => json!({ "error": e.to_string() }),
    };

    let report = json!({
        "definition": definition,
        "version": client.version().await,
        "compatibility": client.compatibility_info().await,
        "metadata": metadata,
        "required_config": client.get_required_config().await,
        "operations": client.get_operations().await,
        "accepted_files": client.accepts_files().await,
        "web_pages": client.get_web_pages().await,
        "health": health,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    client.close().await?;
    Ok(())
}

async fn call(executable: &str, args: &str, files: &[std::path::PathBuf], timeout: u64) -> Result<()> {
    let attachments = files
        .iter()
        .map(|path| -> Result<FileAttachment> {
            let content = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let media_type = media_type_for(&name);
            Ok(FileAttachment::new(name, media_type, content))
        })
        .collect::<Result<Vec<_>>>()?;

    let client = connect(executable, timeout).await?;
    let outcome = if attachments.is_empty() {
        client.call(args).await
    } else {
        client.call_with_attachments(args, &attachments).await
    };
    client.close().await.ok();

    let output = outcome?;
    match StructuredResult::parse(&output) {
        Ok(structured) => println!("{}", structured.to_json()?),
        Err(_) => println!("{}", output),
    }
    Ok(())
}

async fn list(config: &Path, start: bool) -> Result<()> {
    let manager = PluginManager::new();
    manager
        .load_config(config)
        .await
        .with_context(|| format!("Failed to load {}", config.display()))?;

    let mut health = HashMap::new();
    if start {
        for (id, result) in manager.start_enabled().await {
            if let Err(e) = result {
                eprintln!("{}: {}", id, e);
            }
        }
        health = manager.health_check_all().await;
    }

    for plugin in manager.list_plugins().await {
        let status = serde_json::to_value(&plugin.state)?;
        let healthy = match health.get(&plugin.id) {
            Some(Ok(Some(status))) if status.healthy => "healthy",
            Some(Ok(Some(_))) => "unhealthy",
            Some(Ok(None)) => "no health check",
            Some(Err(_)) => "unreachable",
            None => "",
        };
        println!(
            "{:<20} {:<24} {:<12} {:<16} {}",
            plugin.id,
            plugin.name,
            status["status"].as_str().unwrap_or_default(),
            plugin.tool_name.as_deref().unwrap_or("-"),
            healthy
        );
    }

    manager.stop_all().await;
    Ok(())
}
