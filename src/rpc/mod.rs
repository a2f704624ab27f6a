//! RPC Transport Adapter
//!
//! Maps the capability contract onto newline-delimited JSON-RPC 2.0:
//!
//! - [`server`]: plugin side, answers every method with a tool or a sentinel
//! - [`client`]: host side, mirrors the contract over a [`Transport`]
//! - [`stdio`] / [`stream`]: concrete transports
//! - [`wire`]: method names and payload shapes

pub mod client;
pub mod server;
pub mod stdio;
pub mod stream;
pub mod transport;
pub mod wire;

pub use client::PluginClient;
pub use server::{serve_connection, PluginServer};
pub use stdio::StdioTransport;
pub use stream::StreamTransport;
pub use transport::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, Transport};

/// Environment variable the host sets on every plugin it launches
pub const HANDSHAKE_KEY: &str = "TOOLBRIDGE_PLUGIN";

/// Expected value of [`HANDSHAKE_KEY`]; bumped on incompatible protocol changes
pub const HANDSHAKE_VALUE: &str = "toolbridge-v1";
