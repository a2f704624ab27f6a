//! Wire-level tool description
//!
//! This is what the host sees after a `GetDefinition` call: a name, a
//! description, and a JSON parameter schema, independent of how the plugin
//! produced it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,

    /// JSON-Schema-like object describing the call arguments
    #[serde(default)]
    pub parameters: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// A default `Tool` is what the client returns when the definition is unreachable
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.description.is_empty()
    }
}
