//! Line-Delimited Stream Transport
//!
//! [`Transport`] over any async reader/writer pair. The stdio transport wraps
//! one around a child process's pipes; tests wrap one around an in-memory
//! `tokio::io::duplex`.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::transport::{JsonRpcRequest, JsonRpcResponse, RequestId, Transport};
use crate::error::{PluginError, Result};

pub struct StreamTransport<R, W> {
    reader: Option<BufReader<R>>,
    writer: Option<W>,
    next_id: u64,
    timeout: Option<Duration>,
    connected: bool,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            writer: Some(writer),
            next_id: 0,
            timeout: None,
            connected: true,
        }
    }

    /// Fail requests that get no response within `timeout`
    ///
    /// A timed-out transport is marked disconnected: a late response would
    /// otherwise be read as the answer to the next request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    async fn write_request(&mut self, request: &JsonRpcRequest) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PluginError::Transport("No writer available".into()))?;

        let mut line = serde_json::to_string(request)
            .map_err(|e| PluginError::Protocol(format!("Failed to serialize request: {}", e)))?;
        line.push('\n');

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PluginError::Transport(format!("Failed to write to plugin: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| PluginError::Transport(format!("Failed to flush request: {}", e)))
    }

    async fn read_response(&mut self) -> Result<JsonRpcResponse> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| PluginError::Transport("No reader available".into()))?;

        loop {
            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| PluginError::Transport(format!("Failed to read from plugin: {}", e)))?;

            if read == 0 {
                return Err(PluginError::Transport("connection closed (EOF)".into()));
            }
            if line.trim().is_empty() {
                continue;
            }

            return serde_json::from_str(&line).map_err(|e| {
                PluginError::Protocol(format!("Invalid JSON-RPC response from plugin: {}", e))
            });
        }
    }

    async fn exchange(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.write_request(request).await?;
        let response = self.read_response().await?;
        if response.id != request.id {
            return Err(PluginError::Protocol(format!(
                "Response id {} does not match request id {}",
                response.id, request.id
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    async fn send_request(&mut self, mut request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if !self.connected {
            return Err(PluginError::Transport("Not connected to plugin".into()));
        }

        if matches!(request.id, RequestId::Number(0)) {
            request.id = RequestId::Number(self.next_request_id());
        }

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.exchange(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(PluginError::Transport(format!(
                    "{} timed out after {}s",
                    request.method,
                    limit.as_secs_f64()
                ))),
            },
            None => self.exchange(&request).await,
        };

        if let Err(PluginError::Transport(_)) = &outcome {
            self.connected = false;
        }
        outcome
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, split};

    /// Answer each request line with a fixed result echoing the method name
    async fn echo_peer(stream: tokio::io::DuplexStream, mangle_ids: bool) {
        let (read, mut write) = split(stream);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let request: JsonRpcRequest = serde_json::from_str(&line).unwrap();
            let id = if mangle_ids {
                RequestId::Number(999)
            } else {
                request.id
            };
            let response = JsonRpcResponse::success(id, json!({"method": request.method}));
            let mut out = serde_json::to_string(&response).unwrap();
            out.push('\n');
            write.write_all(out.as_bytes()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_sequential_ids_assigned() {
        let (ours, theirs) = duplex(4096);
        tokio::spawn(echo_peer(theirs, false));
        let (read, write) = split(ours);
        let mut transport = StreamTransport::new(read, write);

        let first = transport
            .send_request(JsonRpcRequest::new("GetVersion", None))
            .await
            .unwrap();
        let second = transport
            .send_request(JsonRpcRequest::new("HealthCheck", None))
            .await
            .unwrap();

        assert_eq!(first.id, RequestId::Number(1));
        assert_eq!(second.id, RequestId::Number(2));
        assert_eq!(second.result.unwrap()["method"], "HealthCheck");
    }

    #[tokio::test]
    async fn test_mismatched_id_is_protocol_error() {
        let (ours, theirs) = duplex(4096);
        tokio::spawn(echo_peer(theirs, true));
        let (read, write) = split(ours);
        let mut transport = StreamTransport::new(read, write);

        let err = transport
            .send_request(JsonRpcRequest::new("GetVersion", None))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Protocol(_)));
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_eof_disconnects() {
        let (ours, theirs) = duplex(4096);
        drop(theirs);
        let (read, write) = split(ours);
        let mut transport = StreamTransport::new(read, write);

        let err = transport
            .send_request(JsonRpcRequest::new("GetVersion", None))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(!transport.is_connected());

        let again = transport
            .send_request(JsonRpcRequest::new("GetVersion", None))
            .await
            .unwrap_err();
        assert!(again.to_string().contains("Not connected"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let (ours, _silent) = duplex(4096);
        let (read, write) = split(ours);
        let mut transport =
            StreamTransport::new(read, write).with_timeout(Duration::from_millis(50));

        let err = transport
            .send_request(JsonRpcRequest::new("Call", Some(json!({"args": "{}"}))))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(!transport.is_connected());
    }
}
