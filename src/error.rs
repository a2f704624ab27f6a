//! Error Types
//!
//! One error enum covers the whole plugin layer. Variants follow the failure
//! taxonomy of the protocol:
//!
//! - `Definition`: malformed tool description or plugin manifest. Fatal at startup.
//! - `Validation`: a single call's arguments are rejected. Call-scoped.
//! - `Transport` / `Protocol`: the channel to the plugin failed or spoke garbage.
//! - `Tool`: the plugin's own logic failed; the message was carried inside a
//!   successful RPC response.
//!
//! Callers that need to tell "the plugin said no" apart from "we could not reach
//! the plugin" match on `Tool` vs `Transport`/`Protocol`.

use thiserror::Error;

/// Plugin framework errors
///
/// Usage:
///     fn load(path: &Path) -> Result<PluginManifest> {
///         let text = std::fs::read_to_string(path)?;
///         PluginManifest::from_yaml(&text)
///     }
#[derive(Debug, Error)]
pub enum PluginError {
    /// Malformed tool definition or manifest
    ///
    /// Examples: missing name, unsupported parameter type, conflicting
    /// parameter types across operations.
    #[error("{0}")]
    Definition(String),

    /// Call arguments failed required-field or operation checks
    ///
    /// The message is a single sentence naming the offending field or operation.
    #[error("{0}")]
    Validation(String),

    /// Transport-level failure (spawn, broken pipe, EOF, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid JSON-RPC traffic or an error object returned by the peer
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Business-logic failure reported by the plugin itself
    #[error("{0}")]
    Tool(String),

    /// Host configuration error
    ///
    /// Examples: duplicate plugin IDs, empty commands, unresolved `${VAR}`.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin with the given ID is not registered with the host
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// Settings store failure (type mismatch, unwritable file)
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PluginError {
    /// True for failures of the channel itself rather than of the plugin
    ///
    /// Optional-capability lookups on the client degrade to their sentinel
    /// value when this returns true.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PluginError::Transport(_) | PluginError::Protocol(_) | PluginError::Io(_)
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::PluginNotFound("weather".to_string());
        assert_eq!(err.to_string(), "Plugin not found: weather");

        let err = PluginError::Validation("required field 'message' is missing".to_string());
        assert_eq!(err.to_string(), "required field 'message' is missing");

        let err = PluginError::Transport("connection closed (EOF)".to_string());
        assert_eq!(err.to_string(), "Transport error: connection closed (EOF)");
    }

    #[test]
    fn test_is_transport() {
        assert!(PluginError::Transport("x".into()).is_transport());
        assert!(PluginError::Protocol("x".into()).is_transport());
        assert!(!PluginError::Tool("x".into()).is_transport());
        assert!(!PluginError::Validation("x".into()).is_transport());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: PluginError = io_err.into();

        match err {
            PluginError::Io(_) => {}
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> = serde_yaml::from_str("a: [1, 2");
        let err: PluginError = result.unwrap_err().into();
        assert!(matches!(err, PluginError::Yaml(_)));
    }
}
