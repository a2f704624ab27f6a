//! End-to-end tests of host client against plugin server
//!
//! Each test serves a plugin over an in-memory duplex stream and drives it
//! through `PluginClient`, covering:
//! 1. Sentinel answers from a plugin with no optional capabilities
//! 2. Manifest-backed plugins (operations, metadata, compatibility)
//! 3. Call validation against the manifest's tool definition
//! 4. Tool errors vs transport errors

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{duplex, split, AsyncWriteExt, BufReader};

use toolbridge::rpc::{serve_connection, PluginClient, PluginServer, StreamTransport};
use toolbridge::schema::parse_arguments;
use toolbridge::serve::build_server;
use toolbridge::{
    AgentContext, BasePlugin, ConfigVariable, ConfigVariableType, FileAttachment,
    InitializationProvider, PluginError, PluginManifest, PluginTool, StructuredResult, Tool,
    WebPage, WebPageProvider,
};

type DuplexClient =
    PluginClient<StreamTransport<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>>;

fn connect(server: PluginServer) -> (DuplexClient, tokio::task::JoinHandle<toolbridge::Result<()>>) {
    let (host, plugin) = duplex(64 * 1024);
    let (plugin_read, plugin_write) = split(plugin);
    let handle = tokio::spawn(serve_connection(server, BufReader::new(plugin_read), plugin_write));
    let (read, write) = split(host);
    (PluginClient::new(StreamTransport::new(read, write)), handle)
}

/// A plugin with nothing but a definition and a call
struct Bare;

#[async_trait]
impl PluginTool for Bare {
    fn definition(&self) -> Tool {
        Tool::new(
            "bare",
            "Returns its arguments",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, args: &str) -> anyhow::Result<String> {
        if args.contains("explode") {
            anyhow::bail!("exploded on request");
        }
        Ok(format!("got {}", args))
    }
}

const MANIFEST: &str = r#"
name: music-projects
version: 1.2.0
description: Create and manage music projects
license: MIT
repository: https://github.com/example/music-projects
tags: [music, projects]
platforms:
  - os: linux
    architectures: [amd64]
maintainers:
  - name: Jane Doe
    email: jane@example.com
requirements:
  min_agent_version: 0.5.0
  max_agent_version: 2.0.0
config:
  variables:
    - key: project_dir
      name: Project Directory
      type: dirpath
      required: true
tool_definition:
  description: Manage music projects
  parameters:
    - name: operation
      type: string
      description: Operation to perform
      required: true
  operations:
    create:
      parameters:
        - name: title
          type: string
          description: Project title
          required: true
        - name: bpm
          type: integer
          description: Tempo
    list:
"#;

/// Manifest-backed plugin with configuration and web pages
struct Projects {
    base: BasePlugin,
    project_dir: Mutex<Option<String>>,
}

impl Projects {
    fn new() -> Self {
        Self {
            base: BasePlugin::from_manifest(PluginManifest::from_yaml(MANIFEST).unwrap()),
            project_dir: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PluginTool for Projects {
    async fn call(&self, args: &str) -> anyhow::Result<String> {
        let args = parse_arguments(args)?;
        match args.get("operation").and_then(Value::as_str) {
            Some("create") => Ok(format!(
                "created {} in {}",
                args["title"].as_str().unwrap_or_default(),
                self.project_dir.lock().unwrap().clone().unwrap_or_default()
            )),
            Some("list") => Ok(StructuredResult::list("Projects", json!(["demo"])).to_json()?),
            other => anyhow::bail!("unsupported operation {:?}", other),
        }
    }

    fn base(&self) -> Option<&BasePlugin> {
        Some(&self.base)
    }

    fn as_initialization_provider(&self) -> Option<&dyn InitializationProvider> {
        Some(self)
    }

    fn as_web_page_provider(&self) -> Option<&dyn WebPageProvider> {
        Some(self)
    }
}

impl InitializationProvider for Projects {
    fn required_config(&self) -> Vec<ConfigVariable> {
        self.base.config_from_yaml()
    }

    fn validate_config(&self, config: &Map<String, Value>) -> anyhow::Result<()> {
        match config.get("project_dir").and_then(Value::as_str) {
            Some(dir) if !dir.is_empty() => Ok(()),
            _ => anyhow::bail!("project_dir is required"),
        }
    }

    fn initialize_with_config(&self, config: &Map<String, Value>) -> anyhow::Result<()> {
        self.validate_config(config)?;
        *self.project_dir.lock().unwrap() =
            config["project_dir"].as_str().map(str::to_string);
        Ok(())
    }
}

impl WebPageProvider for Projects {
    fn web_pages(&self) -> Vec<String> {
        vec!["/status".into()]
    }

    fn serve_web_page(&self, path: &str, _query: &HashMap<String, String>) -> anyhow::Result<WebPage> {
        match path {
            "/status" => Ok(WebPage {
                content: "<h1>ok</h1>".into(),
                content_type: "text/html".into(),
            }),
            other => anyhow::bail!("no page at {}", other),
        }
    }
}

#[tokio::test]
async fn test_bare_plugin_answers_with_sentinels() {
    let (client, _server) = connect(PluginServer::new(Arc::new(Bare)));

    assert_eq!(client.definition().await.name, "bare");
    assert_eq!(client.version().await, "unknown");
    assert_eq!(client.compatibility_info().await, Default::default());
    assert!(client.get_metadata().await.unwrap().is_none());
    assert!(client.tags().await.is_empty());
    assert!(client.get_required_config().await.is_empty());
    assert!(client.get_web_pages().await.is_empty());
    assert!(client.get_operations().await.is_none());
    assert!(client.accepts_files().await.is_none());
    assert!(client.health_check().await.unwrap().is_none());
    assert_eq!(client.get_default_settings().await.unwrap(), "");

    let err = client.validate_config(&Map::new()).await.unwrap_err();
    assert!(matches!(err, PluginError::Tool(_)));
    assert!(err.to_string().contains("does not implement"));

    let err = client.serve_web_page("/", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, PluginError::Tool(_)));

    client.set_agent_context(AgentContext::default()).await;
    assert!(client.is_connected().await);
}

#[tokio::test]
async fn test_call_with_files_falls_back_to_call() {
    let (client, _server) = connect(PluginServer::new(Arc::new(Bare)));

    let files = vec![FileAttachment::new("kick.wav", "audio/wav", vec![1, 2, 3])];
    let out = client.call_with_files(r#"{"x": 1}"#, files).await.unwrap();
    assert_eq!(out, r#"got {"x": 1}"#);
}

#[tokio::test]
async fn test_tool_error_keeps_connection() {
    let (client, _server) = connect(PluginServer::new(Arc::new(Bare)));

    let err = client.call(r#"{"explode": true}"#).await.unwrap_err();
    assert!(matches!(err, PluginError::Tool(ref msg) if msg == "exploded on request"));
    assert!(!err.is_transport());

    assert!(client.call("{}").await.is_ok());
    assert!(client.is_connected().await);
}

#[tokio::test]
async fn test_manifest_plugin_capabilities() {
    let (client, _server) = connect(build_server(Arc::new(Projects::new())).unwrap());

    let tool = client.definition().await;
    assert_eq!(tool.name, "music-projects");
    assert_eq!(
        tool.parameters["properties"]["operation"]["enum"],
        json!(["create", "list"])
    );
    assert_eq!(tool.parameters["required"], json!(["operation"]));

    assert_eq!(client.version().await, "1.2.0");
    assert_eq!(client.min_agent_version().await, "0.5.0");
    assert_eq!(client.max_agent_version().await, "2.0.0");
    assert_eq!(client.api_version().await, "v1");
    assert_eq!(client.tags().await, vec!["music", "projects"]);

    let operations = client.get_operations().await.unwrap();
    let names: Vec<&str> = operations.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["create", "list"]);
    assert_eq!(operations[0].required_parameters, vec!["title"]);
    assert_eq!(operations[0].parameters, vec!["bpm", "title"]);

    let config = client.get_required_config().await;
    assert_eq!(config[0].key, "project_dir");
    assert_eq!(config[0].var_type, ConfigVariableType::DirPath);

    assert_eq!(client.get_web_pages().await, vec!["/status"]);
    let page = client.serve_web_page("/status", HashMap::new()).await.unwrap();
    assert_eq!(page.content_type, "text/html");
    assert!(client.serve_web_page("/missing", HashMap::new()).await.is_err());
}

#[tokio::test]
async fn test_configuration_then_call() {
    let (client, _server) = connect(build_server(Arc::new(Projects::new())).unwrap());

    let mut config = Map::new();
    config.insert("project_dir".into(), json!(""));
    let err = client.initialize_with_config(&config).await.unwrap_err();
    assert_eq!(err.to_string(), "project_dir is required");

    config.insert("project_dir".into(), json!("/music"));
    client.validate_config(&config).await.unwrap();
    client.initialize_with_config(&config).await.unwrap();

    let out = client
        .call(r#"{"operation": "create", "title": "Demo", "bpm": 0}"#)
        .await
        .unwrap();
    assert_eq!(out, "created Demo in /music");

    let listing = client.call(r#"{"operation": "list"}"#).await.unwrap();
    assert!(StructuredResult::is_structured(&listing));
}

#[tokio::test]
async fn test_call_validation_against_manifest() {
    let (client, _server) = connect(build_server(Arc::new(Projects::new())).unwrap());

    let err = client.call("{}").await.unwrap_err();
    assert_eq!(err.to_string(), "required field 'operation' is missing");

    let err = client.call(r#"{"operation": "delete"}"#).await.unwrap_err();
    assert_eq!(err.to_string(), "unknown operation: delete");

    let err = client
        .call(r#"{"operation": "create", "title": ""}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Tool(_)));
    assert_eq!(err.to_string(), "required field 'title' is missing");

    let err = client.call("[1, 2]").await.unwrap_err();
    assert!(err.to_string().contains("must be a JSON object"));
}

#[tokio::test]
async fn test_concurrent_requests_on_one_connection() {
    let client = Arc::new(connect(PluginServer::new(Arc::new(Bare))).0);

    let calls = (0..8).map(|i| {
        let client = Arc::clone(&client);
        async move { client.call(&format!(r#"{{"n": {}}}"#, i)).await }
    });
    let results = futures::future::join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), format!(r#"got {{"n": {}}}"#, i));
    }
}

#[tokio::test]
async fn test_malformed_line_gets_parse_error() {
    let (host, plugin) = duplex(4096);
    let (plugin_read, plugin_write) = split(plugin);
    let server = tokio::spawn(serve_connection(
        PluginServer::new(Arc::new(Bare)),
        BufReader::new(plugin_read),
        plugin_write,
    ));

    let (read, mut write) = split(host);
    write.write_all(b"this is not json\n").await.unwrap();
    write.shutdown().await.unwrap();

    let mut lines = tokio::io::AsyncBufReadExt::lines(BufReader::new(read));
    let line = lines.next_line().await.unwrap().unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32700);

    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_utf8_line_keeps_connection() {
    let (host, plugin) = duplex(4096);
    let (plugin_read, plugin_write) = split(plugin);
    let server = tokio::spawn(serve_connection(
        PluginServer::new(Arc::new(Bare)),
        BufReader::new(plugin_read),
        plugin_write,
    ));

    let (read, mut write) = split(host);
    write.write_all(b"\xff\xfe garbage\n").await.unwrap();
    write
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"GetVersion\"}\n")
        .await
        .unwrap();
    write.shutdown().await.unwrap();

    let mut lines = tokio::io::AsyncBufReadExt::lines(BufReader::new(read));
    let line = lines.next_line().await.unwrap().unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32700);

    let line = lines.next_line().await.unwrap().unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], 7);
    assert_eq!(response["result"]["version"], "unknown");

    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_degrades_after_plugin_exits() {
    let (client, server) = connect(PluginServer::new(Arc::new(Bare)));
    assert_eq!(client.definition().await.name, "bare");

    server.abort();
    let _ = server.await;

    assert!(client.call("{}").await.unwrap_err().is_transport());
    assert!(!client.is_connected().await);
    assert!(client.definition().await.is_empty());
    assert_eq!(client.version().await, "unknown");
    assert!(client.get_operations().await.is_none());
}
