//! Declarative Tool Description Types
//!
//! These mirror the `tool_definition` section of a plugin manifest:
//!
//! ```yaml
//! tool_definition:
//!   name: music_project
//!   description: Manage music projects
//!   parameters:
//!     - name: operation
//!       type: string
//!       description: Operation to perform
//!       required: true
//!   operations:
//!     create:
//!       parameters:
//!         - name: project_name
//!           type: string
//!           description: Name of the project
//!           required: true
//!     list: {}
//! ```
//!
//! The parameter `type` is kept as the raw string so that an unknown type is
//! reported by the compiler or validator with a descriptive message instead of
//! failing deserialization.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PluginError, Result};

/// Name of the selector parameter for operation-style tools
pub const OPERATION_PARAM: &str = "operation";

/// Closed set of declarable parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Enum,
    Array,
    Object,
}

impl ParamType {
    pub const SUPPORTED: &'static str = "string, integer, number, boolean, enum, array, object";

    /// Parse a declared type name; `None` for anything outside the closed set
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(ParamType::String),
            "integer" => Some(ParamType::Integer),
            "number" => Some(ParamType::Number),
            "boolean" => Some(ParamType::Boolean),
            "enum" => Some(ParamType::Enum),
            "array" => Some(ParamType::Array),
            "object" => Some(ParamType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Enum => "enum",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item type of an array parameter (no recursive item schemas)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsSpec {
    #[serde(rename = "type", default)]
    pub item_type: String,
}

/// A single declared parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Empty for nested object properties, which are keyed by the map instead
    #[serde(default)]
    pub name: String,

    /// One of `string, integer, number, boolean, enum, array, object`
    #[serde(rename = "type", default)]
    pub param_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Array item type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsSpec>,

    /// Nested properties for object parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ToolParameter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ToolParameter {
    /// Shorthand for tests and hand-built definitions
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            ..Default::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(&self) -> Option<ParamType> {
        ParamType::parse(&self.param_type)
    }
}

/// Parameters specific to one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ToolParameter>,
}

/// Declarative tool description
///
/// `operations` is a sorted map, so iteration order is the sorted operation
/// name order used for enum derivation and operation listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ToolParameter>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "deserialize_operations"
    )]
    pub operations: BTreeMap<String, OperationDefinition>,
}

/// Accept `list:` with no body as an operation without parameters
fn deserialize_operations<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, OperationDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<OperationDefinition>>> =
        Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, def)| (name, def.unwrap_or_default()))
        .collect())
}

impl ToolDefinition {
    /// Parse a standalone YAML tool description
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| PluginError::Definition(format!("invalid tool definition YAML: {}", e)))
    }

    pub fn has_operations(&self) -> bool {
        !self.operations.is_empty()
    }

    /// Look up a global parameter by name
    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Operation names in sorted order
    pub fn operation_names(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_parse() {
        assert_eq!(ParamType::parse("integer"), Some(ParamType::Integer));
        assert_eq!(ParamType::parse("enum"), Some(ParamType::Enum));
        assert_eq!(ParamType::parse("float"), None);
        assert_eq!(ParamType::Object.to_string(), "object");
    }

    #[test]
    fn test_parse_definition_from_yaml() {
        let yaml = r#"
name: music_project
description: Manage music projects
parameters:
  - name: operation
    type: string
    description: Operation to perform
    required: true
  - name: bpm
    type: integer
    description: Tempo
    min: 20
    max: 300
operations:
  create:
    parameters:
      - name: project_name
        type: string
        description: Project name
        required: true
  list:
"#;
        let def = ToolDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.name, "music_project");
        assert_eq!(def.parameters.len(), 2);
        assert_eq!(def.parameters[1].min, Some(20.0));
        assert_eq!(def.operation_names(), vec!["create", "list"]);
        assert!(def.operations["list"].parameters.is_empty());
        assert!(def.operations["create"].parameters[0].required);
    }

    #[test]
    fn test_parse_nested_object_and_array() {
        let yaml = r#"
name: t
description: d
parameters:
  - name: filter
    type: object
    description: Filter options
    properties:
      genre:
        type: string
        description: Genre
        required: true
  - name: tags
    type: array
    description: Tags
    items:
      type: string
  - name: mode
    type: enum
    description: Mode
    enum: [fast, slow]
    default: fast
"#;
        let def = ToolDefinition::from_yaml(yaml).unwrap();
        let filter = def.parameter("filter").unwrap();
        assert_eq!(filter.kind(), Some(ParamType::Object));
        assert!(filter.properties["genre"].required);
        assert_eq!(def.parameter("tags").unwrap().items.as_ref().unwrap().item_type, "string");
        let mode = def.parameter("mode").unwrap();
        assert_eq!(mode.enum_values, vec!["fast", "slow"]);
        assert_eq!(mode.default, Some(serde_json::json!("fast")));
    }

    #[test]
    fn test_invalid_yaml_is_definition_error() {
        let err = ToolDefinition::from_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, PluginError::Definition(_)));
    }
}
