//! Host-Side Plugin Client
//!
//! [`PluginClient`] mirrors the capability contract over a [`Transport`].
//! Errors are split in two families:
//!
//! - `Transport` / `Protocol`: the request never produced a usable response
//!   (broken pipe, EOF, timeout, JSON-RPC error object, unparseable result).
//! - `Tool`: the plugin answered and reported a failure in the response body.
//!
//! Probe-style lookups (`definition`, `version`, `get_operations`, ...) never
//! fail; they degrade to the same sentinel the server would send for a plugin
//! without the capability, and log a warning.
//!
//! Example:
//! ```rust,ignore
//! let transport = StdioTransport::spawn(&entry).await?;
//! let client = PluginClient::new(transport);
//!
//! let tool = client.definition().await;
//! let output = client.call(r#"{"city": "Oslo"}"#).await?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::transport::{JsonRpcRequest, Transport};
use super::wire::{self, methods};
use crate::capability::{AgentContext, CompatibilityInfo, OperationInfo, PluginMetadata, WebPage};
use crate::config::ConfigVariable;
use crate::error::{PluginError, Result};
use crate::files::{filter_files_by_accepted_types, FileAttachment};
use crate::tool::Tool;

pub struct PluginClient<T: Transport> {
    /// One request at a time per connection
    transport: Mutex<T>,
}

impl<T: Transport> PluginClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = params.map(serde_json::to_value).transpose()?;
        let request = JsonRpcRequest::new(method, params);

        let response = {
            let mut transport = self.transport.lock().await;
            transport.send_request(request).await?
        };

        if let Some(error) = response.error {
            return Err(PluginError::Protocol(format!(
                "{} failed: {} (code: {})",
                method, error.message, error.code
            )));
        }

        let result = response
            .result
            .ok_or_else(|| PluginError::Protocol(format!("No result in {} response", method)))?;

        serde_json::from_value(result)
            .map_err(|e| PluginError::Protocol(format!("Invalid {} result: {}", method, e)))
    }

    async fn query<R: DeserializeOwned>(&self, method: &str) -> Result<R> {
        self.request::<Value, R>(method, None).await
    }

    /// Tool description; an empty [`Tool`] if the plugin cannot be reached
    pub async fn definition(&self) -> Tool {
        match self.query::<Value>(methods::GET_DEFINITION).await {
            Ok(value) => {
                let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
                let description = value
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let parameters = match value.get("parameters") {
                    Some(Value::Object(schema)) => Value::Object(schema.clone()),
                    _ => json!({}),
                };
                Tool::new(name, description, parameters)
            }
            Err(e) => {
                tracing::warn!("GetDefinition failed: {}", e);
                Tool::default()
            }
        }
    }

    pub async fn call(&self, args: &str) -> Result<String> {
        let response: wire::CallResponse = self
            .request(methods::CALL, Some(wire::CallRequest { args: args.to_string() }))
            .await?;
        call_outcome(response)
    }

    pub async fn call_with_files(&self, args: &str, files: Vec<FileAttachment>) -> Result<String> {
        let response: wire::CallResponse = self
            .request(
                methods::CALL_WITH_FILES,
                Some(wire::CallWithFilesRequest {
                    args: args.to_string(),
                    files,
                }),
            )
            .await?;
        call_outcome(response)
    }

    /// Send only the attachments the plugin accepts, or a plain call if it
    /// takes no files at all
    pub async fn call_with_attachments(&self, args: &str, files: &[FileAttachment]) -> Result<String> {
        match self.accepts_files().await {
            Some(accepted) => {
                let kept = filter_files_by_accepted_types(files, accepted.as_slice());
                tracing::debug!("Forwarding {}/{} attachment(s)", kept.len(), files.len());
                self.call_with_files(args, kept).await
            }
            None => self.call(args).await,
        }
    }

    pub async fn version(&self) -> String {
        match self.query::<wire::VersionResponse>(methods::GET_VERSION).await {
            Ok(resp) => resp.version,
            Err(e) => {
                tracing::warn!("GetVersion failed: {}", e);
                wire::UNKNOWN_VERSION.to_string()
            }
        }
    }

    /// Fire-and-forget; failures are logged
    pub async fn set_agent_context(&self, ctx: AgentContext) {
        if let Err(e) = self
            .request::<_, Value>(methods::SET_AGENT_CONTEXT, Some(ctx))
            .await
        {
            tracing::warn!("SetAgentContext failed: {}", e);
        }
    }

    pub async fn get_default_settings(&self) -> Result<String> {
        let resp: wire::SettingsResponse = self.query(methods::GET_DEFAULT_SETTINGS).await?;
        if !resp.error.is_empty() {
            return Err(PluginError::Tool(resp.error));
        }
        Ok(resp.settings)
    }

    pub async fn get_required_config(&self) -> Vec<ConfigVariable> {
        match self
            .query::<wire::ConfigVariablesResponse>(methods::GET_REQUIRED_CONFIG)
            .await
        {
            Ok(resp) => resp.variables,
            Err(e) => {
                tracing::warn!("GetRequiredConfig failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn validate_config(&self, config: &Map<String, Value>) -> Result<()> {
        self.config_request(methods::VALIDATE_CONFIG, config).await
    }

    pub async fn initialize_with_config(&self, config: &Map<String, Value>) -> Result<()> {
        self.config_request(methods::INITIALIZE_WITH_CONFIG, config).await
    }

    async fn config_request(&self, method: &str, config: &Map<String, Value>) -> Result<()> {
        let resp: wire::ConfigResponse = self
            .request(method, Some(wire::ConfigRequest { config: config.clone() }))
            .await?;
        if resp.success {
            Ok(())
        } else {
            Err(PluginError::Tool(resp.error))
        }
    }

    pub async fn get_metadata(&self) -> Result<Option<PluginMetadata>> {
        let resp: wire::MetadataResponse = self.query(methods::GET_METADATA).await?;
        if !resp.error.is_empty() {
            return Err(PluginError::Tool(resp.error));
        }
        Ok(resp.metadata)
    }

    /// Metadata tags; empty if metadata is unavailable
    pub async fn tags(&self) -> Vec<String> {
        match self.get_metadata().await {
            Ok(Some(metadata)) => metadata.tags,
            _ => Vec::new(),
        }
    }

    /// Empty fields when the plugin cannot be reached
    pub async fn compatibility_info(&self) -> CompatibilityInfo {
        self.query(methods::GET_COMPATIBILITY_INFO)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("GetCompatibilityInfo failed: {}", e);
                CompatibilityInfo::default()
            })
    }

    pub async fn min_agent_version(&self) -> String {
        self.compatibility_info().await.min_agent_version
    }

    pub async fn max_agent_version(&self) -> String {
        self.compatibility_info().await.max_agent_version
    }

    pub async fn api_version(&self) -> String {
        self.compatibility_info().await.api_version
    }

    pub async fn get_web_pages(&self) -> Vec<String> {
        match self.query::<wire::WebPagesResponse>(methods::GET_WEB_PAGES).await {
            Ok(resp) => resp.pages,
            Err(e) => {
                tracing::warn!("GetWebPages failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn serve_web_page(&self, path: &str, query: HashMap<String, String>) -> Result<WebPage> {
        let resp: wire::WebPageResponse = self
            .request(
                methods::SERVE_WEB_PAGE,
                Some(wire::WebPageRequest {
                    path: path.to_string(),
                    query,
                }),
            )
            .await?;
        if !resp.error.is_empty() {
            return Err(PluginError::Tool(resp.error));
        }
        Ok(WebPage {
            content: resp.content,
            content_type: resp.content_type,
        })
    }

    /// `None` when the plugin has no operations or cannot be reached
    pub async fn get_operations(&self) -> Option<Vec<OperationInfo>> {
        match self.query::<wire::OperationsResponse>(methods::GET_OPERATIONS).await {
            Ok(resp) if resp.supports_operations => Some(resp.operations),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("GetOperations failed: {}", e);
                None
            }
        }
    }

    /// Accepted types, or `None` if the plugin does not handle files
    pub async fn accepts_files(&self) -> Option<Vec<String>> {
        match self.query::<wire::AcceptsFilesResponse>(methods::ACCEPTS_FILES).await {
            Ok(resp) if resp.supports_files => Some(resp.accepted_types),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("AcceptsFiles failed: {}", e);
                None
            }
        }
    }

    pub async fn supports_files(&self) -> bool {
        self.accepts_files().await.is_some()
    }

    /// `Ok(None)` if the plugin has no health check, `Ok(Some(..))` with the
    /// reported status otherwise
    pub async fn health_check(&self) -> Result<Option<wire::HealthResponse>> {
        let resp: wire::HealthResponse = self.query(methods::HEALTH_CHECK).await?;
        Ok(resp.supported.then_some(resp))
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    pub async fn close(&self) -> Result<()> {
        self.transport.lock().await.close().await
    }
}

fn call_outcome(response: wire::CallResponse) -> Result<String> {
    if response.error.is_empty() {
        Ok(response.result)
    } else {
        Err(PluginError::Tool(response.error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::transport::{error_codes, JsonRpcResponse, MockTransport};

    fn client_returning<F>(respond: F) -> PluginClient<MockTransport>
    where
        F: Fn(JsonRpcRequest) -> Result<JsonRpcResponse> + Send + Sync + 'static,
    {
        let mut mock = MockTransport::new();
        mock.expect_send_request().returning(respond);
        mock.expect_is_connected().return_const(true);
        PluginClient::new(mock)
    }

    fn broken() -> PluginClient<MockTransport> {
        client_returning(|_| Err(PluginError::Transport("connection closed (EOF)".into())))
    }

    #[tokio::test]
    async fn test_probes_degrade_on_transport_failure() {
        let client = broken();

        assert!(client.definition().await.is_empty());
        assert_eq!(client.version().await, "unknown");
        assert_eq!(client.compatibility_info().await, CompatibilityInfo::default());
        assert!(client.get_required_config().await.is_empty());
        assert!(client.get_web_pages().await.is_empty());
        assert!(client.get_operations().await.is_none());
        assert!(client.accepts_files().await.is_none());
        assert!(!client.supports_files().await);
        assert!(client.tags().await.is_empty());
        client.set_agent_context(AgentContext::default()).await;
    }

    #[tokio::test]
    async fn test_fallible_calls_propagate_transport_errors() {
        let client = broken();

        assert!(client.call("{}").await.unwrap_err().is_transport());
        assert!(client.validate_config(&Map::new()).await.unwrap_err().is_transport());
        assert!(client.get_metadata().await.unwrap_err().is_transport());
        assert!(client
            .serve_web_page("/", HashMap::new())
            .await
            .unwrap_err()
            .is_transport());
    }

    #[tokio::test]
    async fn test_tool_error_is_not_transport_error() {
        let client = client_returning(|req| {
            Ok(JsonRpcResponse::success(
                req.id,
                json!({"result": "", "error": "city not found"}),
            ))
        });

        let err = client.call(r#"{"city": "Atlantis"}"#).await.unwrap_err();
        assert!(matches!(err, PluginError::Tool(ref msg) if msg == "city not found"));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_rpc_error_object_is_protocol_error() {
        let client = client_returning(|req| {
            Ok(JsonRpcResponse::failure(
                req.id,
                error_codes::METHOD_NOT_FOUND,
                "Method not found: HealthCheck",
            ))
        });

        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, PluginError::Protocol(_)));
        assert!(err.to_string().contains("code: -32601"));
    }

    #[tokio::test]
    async fn test_definition_with_unparseable_parameters() {
        let client = client_returning(|req| {
            Ok(JsonRpcResponse::success(
                req.id,
                json!({"name": "t", "description": "d", "parameters": "not an object"}),
            ))
        });

        let tool = client.definition().await;
        assert_eq!(tool.name, "t");
        assert_eq!(tool.parameters, json!({}));
    }

    #[tokio::test]
    async fn test_config_failure_becomes_tool_error() {
        let client = client_returning(|req| {
            assert_eq!(req.method, "InitializeWithConfig");
            assert_eq!(req.params.as_ref().unwrap()["config"]["api_key"], "");
            Ok(JsonRpcResponse::success(
                req.id,
                json!({"success": false, "error": "api_key must not be empty"}),
            ))
        });

        let mut config = Map::new();
        config.insert("api_key".into(), json!(""));
        let err = client.initialize_with_config(&config).await.unwrap_err();
        assert_eq!(err.to_string(), "api_key must not be empty");
    }

    #[tokio::test]
    async fn test_call_with_attachments_filters_files() {
        let client = client_returning(|req| match req.method.as_str() {
            "AcceptsFiles" => Ok(JsonRpcResponse::success(
                req.id,
                json!({"accepted_types": [".wav"], "supports_files": true}),
            )),
            "CallWithFiles" => {
                let files = req.params.as_ref().unwrap()["files"].as_array().unwrap().len();
                Ok(JsonRpcResponse::success(
                    req.id,
                    json!({"result": format!("{} file(s)", files)}),
                ))
            }
            other => panic!("unexpected method {}", other),
        });

        let files = vec![
            FileAttachment::new("kick.wav", "audio/wav", vec![0]),
            FileAttachment::new("notes.txt", "text/plain", vec![1]),
        ];
        let out = client.call_with_attachments("{}", &files).await.unwrap();
        assert_eq!(out, "1 file(s)");
    }

    #[tokio::test]
    async fn test_call_with_attachments_without_file_support() {
        let client = client_returning(|req| match req.method.as_str() {
            "AcceptsFiles" => Ok(JsonRpcResponse::success(
                req.id,
                json!({"accepted_types": [], "supports_files": false}),
            )),
            "Call" => Ok(JsonRpcResponse::success(req.id, json!({"result": "plain"}))),
            other => panic!("unexpected method {}", other),
        });

        let files = vec![FileAttachment::new("kick.wav", "audio/wav", vec![0])];
        assert_eq!(client.call_with_attachments("{}", &files).await.unwrap(), "plain");
    }

    #[tokio::test]
    async fn test_health_check_unsupported() {
        let client = client_returning(|req| {
            Ok(JsonRpcResponse::success(
                req.id,
                json!({"supported": false, "healthy": false}),
            ))
        });
        assert!(client.health_check().await.unwrap().is_none());
        assert!(client.is_connected().await);
    }
}
