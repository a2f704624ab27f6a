//! JSON-RPC Envelope and Transport Trait
//!
//! Host and plugin exchange newline-delimited JSON-RPC 2.0 messages. Every
//! request gets exactly one response carrying the same `id`.
//!
//! The [`Transport`] trait is the client's only view of the channel. The stdio
//! transport spawns a plugin process; the stream transport runs over any pair
//! of async byte streams (an in-memory duplex in tests).

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// JSON-RPC 2.0 request
///
/// Example:
/// ```json
/// {"jsonrpc": "2.0", "id": 3, "method": "Call", "params": {"args": "{\"city\":\"Oslo\"}"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Request with id 0, which transports replace with the next sequential id
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(0),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response; exactly one of `result` and `error` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Request identifier; `Null` only appears on responses to unparseable input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
            RequestId::Null => f.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Client side of a plugin connection
///
/// Error Handling:
/// - Spawn failures, broken pipes, EOF and timeouts: `PluginError::Transport`
/// - Unparseable responses: `PluginError::Protocol`
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response
    ///
    /// A request id of `0` is replaced with the next sequential id.
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    fn is_connected(&self) -> bool;

    /// Release the channel; safe to call more than once
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        (**self).send_request(request).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
