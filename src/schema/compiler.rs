//! Parameter Schema Compiler
//!
//! Turns a [`ToolDefinition`] into the flat JSON-Schema-like object the host
//! hands to its function-calling consumer:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": { "operation": { "type": "string", "enum": ["create", "list"] } },
//!   "required": ["operation"]
//! }
//! ```
//!
//! Operation-style definitions compile to the union of the base parameters and
//! every operation's parameters. The top-level `required` list holds only the
//! globally required parameters plus `operation`; per-operation requirements are
//! enforced at call time by [`crate::schema::validate_call`].
//!
//! Enum default membership is not checked here. Run
//! [`crate::schema::validate_definition`] first when that matters.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};

use crate::error::{PluginError, Result};
use crate::schema::types::{ItemsSpec, ParamType, ToolDefinition, ToolParameter, OPERATION_PARAM};
use crate::tool::Tool;

/// Ordered `name -> node` mapping that serializes as a JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap(Vec<(String, SchemaNode)>);

impl PropertyMap {
    /// Insert or replace, keeping the first-seen position
    pub fn insert(&mut self, name: String, node: SchemaNode) {
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = node,
            None => self.0.push((name, node)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, node) in &self.0 {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

/// Compiled schema for a single parameter
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// Flattened parameter schema plus its top-level required list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSchema {
    pub properties: PropertyMap,
    pub required: Vec<String>,
}

impl CompiledSchema {
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.get(name)
    }

    /// Render as `{"type": "object", "properties": ..., "required": ...}`
    ///
    /// `required` is omitted when empty.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

impl Serialize for CompiledSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.required.is_empty() { 2 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &self.properties)?;
        if !self.required.is_empty() {
            map.serialize_entry("required", &self.required)?;
        }
        map.end()
    }
}

/// Compile a tool definition into its flattened schema
///
/// Error Conditions:
/// - Empty tool name or description
/// - Empty parameter name, missing or unsupported type
/// - `enum` without values, `array` without an item type
/// - Same parameter name declared with different types across operations
/// - Operations declared without an `operation` parameter
pub fn compile(def: &ToolDefinition) -> Result<CompiledSchema> {
    if def.name.is_empty() {
        return Err(PluginError::Definition("tool name is required".into()));
    }
    if def.description.is_empty() {
        return Err(PluginError::Definition("tool description is required".into()));
    }

    if !def.has_operations() {
        return compile_parameters(&def.parameters);
    }

    let mut union: Vec<ToolParameter> = Vec::new();
    add_parameter_definitions(&mut union, &def.parameters)?;
    for op in def.operations.values() {
        add_parameter_definitions(&mut union, &op.parameters)?;
    }

    if let Some(op_param) = union.iter_mut().find(|p| p.name == OPERATION_PARAM) {
        if op_param.enum_values.is_empty() {
            op_param.enum_values = def.operation_names();
        }
    }

    let mut properties = PropertyMap::default();
    for param in &union {
        let node = build_node(param).map_err(|e| wrap_parameter(&param.name, e))?;
        properties.insert(param.name.clone(), node);
    }

    let global = compile_parameters(&def.parameters)?;

    if !union.iter().any(|p| p.name == OPERATION_PARAM) {
        return Err(PluginError::Definition(
            "operation parameter is required when operations are defined".into(),
        ));
    }

    let mut required = global.required;
    if !required.iter().any(|r| r == OPERATION_PARAM) {
        required.push(OPERATION_PARAM.to_string());
    }

    Ok(CompiledSchema { properties, required })
}

/// Compile and wrap into the wire-level [`Tool`]
pub fn to_tool(def: &ToolDefinition) -> Result<Tool> {
    let schema = compile(def)?;
    Ok(Tool {
        name: def.name.clone(),
        description: def.description.clone(),
        parameters: schema.to_json(),
    })
}

impl ToolDefinition {
    pub fn compile(&self) -> Result<CompiledSchema> {
        compile(self)
    }

    pub fn to_tool(&self) -> Result<Tool> {
        to_tool(self)
    }
}

fn compile_parameters(params: &[ToolParameter]) -> Result<CompiledSchema> {
    let mut schema = CompiledSchema::default();

    for param in params {
        if param.name.is_empty() {
            return Err(PluginError::Definition("parameter name is required".into()));
        }
        let node = build_node(param).map_err(|e| wrap_parameter(&param.name, e))?;
        schema.properties.insert(param.name.clone(), node);
        if param.required {
            schema.required.push(param.name.clone());
        }
    }

    Ok(schema)
}

fn add_parameter_definitions(all: &mut Vec<ToolParameter>, params: &[ToolParameter]) -> Result<()> {
    for param in params {
        if param.name.is_empty() {
            return Err(PluginError::Definition("parameter name is required".into()));
        }
        match all.iter().find(|existing| existing.name == param.name) {
            Some(existing) if existing.param_type != param.param_type => {
                return Err(PluginError::Definition(format!(
                    "parameter {:?} has conflicting types: {} vs {}",
                    param.name, existing.param_type, param.param_type
                )));
            }
            Some(_) => {}
            None => all.push(param.clone()),
        }
    }
    Ok(())
}

fn wrap_parameter(name: &str, message: String) -> PluginError {
    PluginError::Definition(format!("parameter {:?}: {}", name, message))
}

fn float_number(value: f64) -> Option<Number> {
    Number::from_f64(value)
}

fn build_node(param: &ToolParameter) -> std::result::Result<SchemaNode, String> {
    if param.param_type.is_empty() {
        return Err("type is required".to_string());
    }
    let kind = ParamType::parse(&param.param_type).ok_or_else(|| {
        format!(
            "unsupported type: {} (supported: {})",
            param.param_type,
            ParamType::SUPPORTED
        )
    })?;

    let mut node = SchemaNode {
        description: (!param.description.is_empty()).then(|| param.description.clone()),
        default: param.default.clone(),
        ..Default::default()
    };

    match kind {
        ParamType::String => {
            node.schema_type = "string".into();
            if !param.enum_values.is_empty() {
                node.enum_values = Some(param.enum_values.clone());
            }
            node.min_length = param.min_length;
            node.max_length = param.max_length;
            node.pattern = param.pattern.clone().filter(|p| !p.is_empty());
        }
        ParamType::Integer => {
            node.schema_type = "integer".into();
            // Bounds truncate toward zero
            node.minimum = param.min.map(|v| Number::from(v as i64));
            node.maximum = param.max.map(|v| Number::from(v as i64));
        }
        ParamType::Number => {
            node.schema_type = "number".into();
            node.minimum = param.min.and_then(float_number);
            node.maximum = param.max.and_then(float_number);
        }
        ParamType::Boolean => {
            node.schema_type = "boolean".into();
        }
        ParamType::Enum => {
            if param.enum_values.is_empty() {
                return Err("enum type requires 'enum' field with values".to_string());
            }
            node.schema_type = "string".into();
            node.enum_values = Some(param.enum_values.clone());
        }
        ParamType::Array => {
            let items = param
                .items
                .as_ref()
                .filter(|items| !items.item_type.is_empty())
                .ok_or_else(|| "array type requires 'items' field with type".to_string())?;
            node.schema_type = "array".into();
            node.items = Some(items.clone());
        }
        ParamType::Object => {
            node.schema_type = "object".into();
            if !param.properties.is_empty() {
                let mut nested = PropertyMap::default();
                let mut nested_required = Vec::new();
                for (prop_name, prop) in &param.properties {
                    let child = build_node(prop)
                        .map_err(|e| format!("nested property {:?}: {}", prop_name, e))?;
                    nested.insert(prop_name.clone(), child);
                    if prop.required {
                        nested_required.push(prop_name.clone());
                    }
                }
                node.properties = Some(nested);
                if !nested_required.is_empty() {
                    node.required = Some(nested_required);
                }
            }
        }
    }

    Ok(node)
}
