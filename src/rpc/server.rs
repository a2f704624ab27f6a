//! Plugin-Side RPC Dispatcher
//!
//! [`PluginServer`] turns one JSON-RPC request into one response by probing
//! the wrapped [`PluginTool`] for the capability behind the method. A missing
//! capability yields that method's sentinel response, never a JSON-RPC error.
//! JSON-RPC errors are reserved for unknown methods (-32601) and params that do
//! not deserialize (-32602).
//!
//! [`serve_connection`] drives a server over a line-delimited byte stream.
//! Each request runs on its own task and its response is written as soon as it
//! completes, so a slow `Call` does not hold up a `HealthCheck`.
//!
//! Design Decision: Probe capabilities per request, answer with sentinels
//!
//! Rationale: Hosts built against newer plugins ask for capabilities older
//! plugins never implemented. A sentinel (`"unknown"` version, empty
//! operations, `supports_*: false`) lets the host degrade without treating the
//! plugin as broken.
//!
//! Trade-offs:
//! - Out-of-order responses: hosts must match on `id`, not arrival order
//! - Writes are serialized through one `Mutex` around the writer
//! - Input is read as raw bytes; anything that is not a request, including
//!   invalid UTF-8, gets `-32700` and the loop keeps going
//!
//! Alternatives Considered:
//! 1. Sequential dispatch: Rejected - a long `Call` would starve health checks
//! 2. JSON-RPC errors for missing capabilities: Rejected - every host would
//!    need per-method error handling for the common case
//!
//! Example:
//! ```rust,ignore
//! let server = PluginServer::new(Arc::new(MyTool::new()));
//! serve_connection(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use super::transport::{error_codes, JsonRpcRequest, JsonRpcResponse, RequestId};
use super::wire::{self, methods};
use crate::capability::{AgentContext, PluginTool};
use crate::error::{PluginError, Result};
use crate::schema::{validate_call_json, ToolDefinition};

enum DispatchError {
    MethodNotFound(String),
    InvalidParams(String),
    Internal(String),
}

impl DispatchError {
    fn into_response(self, id: RequestId) -> JsonRpcResponse {
        match self {
            DispatchError::MethodNotFound(method) => JsonRpcResponse::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            ),
            DispatchError::InvalidParams(msg) => {
                JsonRpcResponse::failure(id, error_codes::INVALID_PARAMS, format!("Invalid params: {}", msg))
            }
            DispatchError::Internal(msg) => {
                JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, msg)
            }
        }
    }
}

type DispatchResult = std::result::Result<Value, DispatchError>;

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> std::result::Result<T, DispatchError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| DispatchError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(value: T) -> DispatchResult {
    serde_json::to_value(value).map_err(|e| DispatchError::Internal(e.to_string()))
}

/// Dispatches wire requests to a plugin implementation
#[derive(Clone)]
pub struct PluginServer {
    tool: Arc<dyn PluginTool>,
    definition: Option<Arc<ToolDefinition>>,
}

impl PluginServer {
    pub fn new(tool: Arc<dyn PluginTool>) -> Self {
        Self {
            tool,
            definition: None,
        }
    }

    /// Check `Call` / `CallWithFiles` arguments against `definition` before
    /// they reach the tool; rejections come back as tool errors
    pub fn with_validation(mut self, definition: ToolDefinition) -> Self {
        self.definition = Some(Arc::new(definition));
        self
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest { id, method, params, .. } = request;
        tracing::debug!("RPC request {} (id {})", method, id);

        match self.dispatch(&method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                let response = e.into_response(id);
                if let Some(err) = &response.error {
                    tracing::warn!("RPC {} failed: {}", method, err.message);
                }
                response
            }
        }
    }

    fn check_arguments(&self, args: &str) -> std::result::Result<(), String> {
        match &self.definition {
            Some(def) => validate_call_json(def, args).map(|_| ()).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> DispatchResult {
        let tool = self.tool.as_ref();

        match method {
            methods::GET_DEFINITION => to_result(tool.definition()),

            methods::CALL => {
                let req: wire::CallRequest = parse_params(params)?;
                if let Err(msg) = self.check_arguments(&req.args) {
                    return to_result(wire::CallResponse::from_result(Err(anyhow::anyhow!(msg))));
                }
                to_result(wire::CallResponse::from_result(tool.call(&req.args).await))
            }

            methods::CALL_WITH_FILES => {
                let req: wire::CallWithFilesRequest = parse_params(params)?;
                if let Err(msg) = self.check_arguments(&req.args) {
                    return to_result(wire::CallResponse::from_result(Err(anyhow::anyhow!(msg))));
                }
                let result = match tool.as_file_handler() {
                    Some(handler) => handler.call_with_files(&req.args, req.files).await,
                    None => {
                        tracing::debug!("No file handler, dropping {} attachment(s)", req.files.len());
                        tool.call(&req.args).await
                    }
                };
                to_result(wire::CallResponse::from_result(result))
            }

            methods::GET_VERSION => {
                let version = tool
                    .as_versioned()
                    .map(|v| v.version())
                    .unwrap_or_else(|| wire::UNKNOWN_VERSION.to_string());
                to_result(wire::VersionResponse { version })
            }

            methods::SET_AGENT_CONTEXT => {
                let ctx: AgentContext = parse_params(params)?;
                if let Some(aware) = tool.as_agent_aware() {
                    tracing::info!("Agent context set: {}", ctx.name);
                    aware.set_agent_context(ctx);
                }
                Ok(json!({}))
            }

            methods::GET_DEFAULT_SETTINGS => {
                let response = match tool.as_default_settings_provider() {
                    Some(provider) => match provider.default_settings() {
                        Ok(settings) => wire::SettingsResponse {
                            settings,
                            error: String::new(),
                        },
                        Err(e) => wire::SettingsResponse {
                            settings: String::new(),
                            error: e.to_string(),
                        },
                    },
                    None => wire::SettingsResponse::default(),
                };
                to_result(response)
            }

            methods::GET_REQUIRED_CONFIG => {
                let variables = tool
                    .as_initialization_provider()
                    .map(|p| p.required_config())
                    .unwrap_or_default();
                to_result(wire::ConfigVariablesResponse { variables })
            }

            methods::VALIDATE_CONFIG | methods::INITIALIZE_WITH_CONFIG => {
                let req: wire::ConfigRequest = parse_params(params)?;
                let response = match tool.as_initialization_provider() {
                    Some(provider) if method == methods::VALIDATE_CONFIG => {
                        wire::ConfigResponse::from_result(provider.validate_config(&req.config))
                    }
                    Some(provider) => {
                        wire::ConfigResponse::from_result(provider.initialize_with_config(&req.config))
                    }
                    None => wire::ConfigResponse {
                        success: false,
                        error: wire::NO_INITIALIZATION_PROVIDER.to_string(),
                    },
                };
                to_result(response)
            }

            methods::GET_METADATA => {
                let response = match tool.as_metadata_provider() {
                    Some(provider) => match provider.metadata() {
                        Ok(Some(mut metadata)) => {
                            metadata.tags = provider.tags();
                            wire::MetadataResponse {
                                metadata: Some(metadata),
                                error: String::new(),
                            }
                        }
                        Ok(None) => wire::MetadataResponse::default(),
                        Err(e) => wire::MetadataResponse {
                            metadata: None,
                            error: e.to_string(),
                        },
                    },
                    None => wire::MetadataResponse::default(),
                };
                to_result(response)
            }

            methods::GET_COMPATIBILITY_INFO => to_result(
                tool.as_compatibility()
                    .map(|c| c.compatibility_info())
                    .unwrap_or_default(),
            ),

            methods::GET_WEB_PAGES => {
                let pages = tool
                    .as_web_page_provider()
                    .map(|p| p.web_pages())
                    .unwrap_or_default();
                to_result(wire::WebPagesResponse { pages })
            }

            methods::SERVE_WEB_PAGE => {
                let req: wire::WebPageRequest = parse_params(params)?;
                let response = match tool.as_web_page_provider() {
                    Some(provider) => match provider.serve_web_page(&req.path, &req.query) {
                        Ok(page) => wire::WebPageResponse {
                            content: page.content,
                            content_type: page.content_type,
                            error: String::new(),
                        },
                        Err(e) => wire::WebPageResponse {
                            error: e.to_string(),
                            ..Default::default()
                        },
                    },
                    None => wire::WebPageResponse {
                        error: wire::NO_WEB_PAGE_PROVIDER.to_string(),
                        ..Default::default()
                    },
                };
                to_result(response)
            }

            methods::GET_OPERATIONS => {
                let operations = tool
                    .as_operations_provider()
                    .map(|p| p.operations())
                    .unwrap_or_default();
                to_result(wire::OperationsResponse {
                    supports_operations: !operations.is_empty(),
                    operations,
                })
            }

            methods::ACCEPTS_FILES => {
                let response = match tool.as_file_handler() {
                    Some(handler) => wire::AcceptsFilesResponse {
                        accepted_types: handler.accepts_files(),
                        supports_files: true,
                    },
                    None => wire::AcceptsFilesResponse::default(),
                };
                to_result(response)
            }

            methods::HEALTH_CHECK => {
                let response = match tool.as_health_check() {
                    Some(check) => match check.health_check() {
                        Ok(()) => wire::HealthResponse {
                            supported: true,
                            healthy: true,
                            error: String::new(),
                        },
                        Err(e) => wire::HealthResponse {
                            supported: true,
                            healthy: false,
                            error: e.to_string(),
                        },
                    },
                    None => wire::HealthResponse::default(),
                };
                to_result(response)
            }

            other => Err(DispatchError::MethodNotFound(other.to_string())),
        }
    }
}

async fn write_response<W>(writer: &Mutex<W>, response: &JsonRpcResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(response)?;
    line.push('\n');

    let mut writer = writer.lock().await;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| PluginError::Transport(format!("Failed to write response: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| PluginError::Transport(format!("Failed to flush response: {}", e)))
}

/// Serve requests from `reader` until EOF, writing responses to `writer`
///
/// Blank lines are ignored. A line that is not a JSON-RPC request is answered
/// with a parse error (id `null`). Returns once the input is exhausted and
/// every in-flight request has been answered.
pub async fn serve_connection<R, W>(server: PluginServer, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));
    let mut line = Vec::new();
    let mut in_flight = JoinSet::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        // Raw bytes so a line that is not UTF-8 is a parse error, not a dead connection
        let request: JsonRpcRequest = match serde_json::from_slice(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Discarding malformed request: {}", e);
                let response = JsonRpcResponse::failure(
                    RequestId::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                );
                write_response(&writer, &response).await?;
                continue;
            }
        };

        let server = server.clone();
        let writer = Arc::clone(&writer);
        in_flight.spawn(async move {
            let response = server.handle(request).await;
            if let Err(e) = write_response(&writer, &response).await {
                tracing::error!("{}", e);
            }
        });

        // Reap finished tasks so the set does not grow with the session
        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    tracing::info!("Connection closed");
    Ok(())
}
