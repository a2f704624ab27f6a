//! Definition and Call Validation
//!
//! Two passes live here:
//!
//! 1. [`validate_definition`] checks a tool description for authoring mistakes
//!    before it is ever served. Failures are [`PluginError::Definition`].
//! 2. [`validate_call`] checks one call's arguments with operation-aware
//!    required-field rules. Failures are [`PluginError::Validation`].
//!
//! Missing means absent, `null`, or (for string parameters) the empty string.
//! Numeric zero is a real value.
//!
//! Nested object properties are checked by [`validate_definition`] only; call
//! validation looks at top-level arguments.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::capability::OperationInfo;
use crate::error::{PluginError, Result};
use crate::schema::types::{ParamType, ToolDefinition, ToolParameter, OPERATION_PARAM};

// Limits are in bytes, so multi-byte names reach them sooner
const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Check a tool description for authoring errors
///
/// Error Conditions:
/// - Name empty or longer than 64 characters
/// - Description empty or longer than 1024 characters
/// - No parameters and no operations
/// - Any parameter with an invalid type, no description, bad bounds, an enum
///   without values or with a default outside its values, an array without
///   an item type (nested object properties included)
/// - The same name declared with two different types
/// - Operations declared without a required string `operation` parameter,
///   an empty operation name, or an explicit enum missing an operation
pub fn validate_definition(def: &ToolDefinition) -> Result<()> {
    if def.name.is_empty() {
        return Err(definition("tool.name is required"));
    }
    if def.name.len() > MAX_NAME_LEN {
        return Err(definition(format!(
            "tool.name must be {} characters or less (got {})",
            MAX_NAME_LEN,
            def.name.len()
        )));
    }
    if def.description.is_empty() {
        return Err(definition("tool.description is required"));
    }
    if def.description.len() > MAX_DESCRIPTION_LEN {
        return Err(definition(format!(
            "tool.description must be {} characters or less (got {})",
            MAX_DESCRIPTION_LEN,
            def.description.len()
        )));
    }
    if def.parameters.is_empty() && def.operations.is_empty() {
        return Err(definition("tool must have at least one parameter"));
    }

    let mut seen_types: HashMap<&str, &str> = HashMap::new();
    check_parameter_list(&def.parameters, &mut seen_types)?;

    if def.has_operations() {
        let op_param = def.parameter(OPERATION_PARAM).ok_or_else(|| {
            definition("operation parameter is required when operations are defined")
        })?;
        if op_param.param_type != "string" {
            return Err(definition("operation parameter must be type string"));
        }
        if !op_param.required {
            return Err(definition(
                "operation parameter must be required when operations are defined",
            ));
        }
        if def.operations.keys().any(|name| name.is_empty()) {
            return Err(definition("operation name cannot be empty"));
        }
        if !op_param.enum_values.is_empty() {
            if let Some(missing) = def
                .operations
                .keys()
                .find(|name| !op_param.enum_values.contains(name))
            {
                return Err(definition(format!(
                    "operation parameter enum missing value {:?}",
                    missing
                )));
            }
        }

        for op in def.operations.values() {
            check_parameter_list(&op.parameters, &mut seen_types)?;
        }
    }

    Ok(())
}

fn check_parameter_list<'a>(
    params: &'a [ToolParameter],
    seen_types: &mut HashMap<&'a str, &'a str>,
) -> Result<()> {
    for param in params {
        if param.name.is_empty() {
            return Err(definition("parameter name is required"));
        }
        validate_parameter(&param.name, param, "")?;
        if let Some(existing) = seen_types.get(param.name.as_str()) {
            if *existing != param.param_type {
                return Err(definition(format!(
                    "parameter {:?} has conflicting types: {} vs {}",
                    param.name, existing, param.param_type
                )));
            }
        }
        seen_types.insert(&param.name, &param.param_type);
    }
    Ok(())
}

fn validate_parameter(name: &str, param: &ToolParameter, prefix: &str) -> Result<()> {
    let full_name = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    };

    let kind = param.kind().ok_or_else(|| {
        definition(format!(
            "parameter {:?}: invalid type {:?} (must be one of: {})",
            full_name,
            param.param_type,
            ParamType::SUPPORTED
        ))
    })?;

    if param.description.is_empty() {
        return Err(definition(format!(
            "parameter {:?}: description is required",
            full_name
        )));
    }

    match kind {
        ParamType::Enum => {
            if param.enum_values.is_empty() {
                return Err(definition(format!(
                    "parameter {:?}: enum type requires 'enum' field with values",
                    full_name
                )));
            }
            if let Some(default) = &param.default {
                let default = default.as_str().ok_or_else(|| {
                    definition(format!("parameter {:?}: enum default must be a string", full_name))
                })?;
                if !param.enum_values.iter().any(|v| v == default) {
                    return Err(definition(format!(
                        "parameter {:?}: default value {:?} is not in enum values",
                        full_name, default
                    )));
                }
            }
        }
        ParamType::Array => {
            if param.items.as_ref().map_or(true, |i| i.item_type.is_empty()) {
                return Err(definition(format!(
                    "parameter {:?}: array type requires 'items' field with type",
                    full_name
                )));
            }
        }
        ParamType::Object => {
            for (prop_name, prop) in &param.properties {
                validate_parameter(prop_name, prop, &full_name)?;
            }
        }
        ParamType::Integer | ParamType::Number => {
            if let (Some(min), Some(max)) = (param.min, param.max) {
                if min > max {
                    return Err(definition(format!(
                        "parameter {:?}: min ({}) cannot be greater than max ({})",
                        full_name, min, max
                    )));
                }
            }
        }
        ParamType::String => {
            if let (Some(min), Some(max)) = (param.min_length, param.max_length) {
                if min > max {
                    return Err(definition(format!(
                        "parameter {:?}: min_length ({}) cannot be greater than max_length ({})",
                        full_name, min, max
                    )));
                }
            }
        }
        ParamType::Boolean => {}
    }

    Ok(())
}

/// Validate call arguments against a tool description
///
/// Flat definitions check every globally required parameter in declaration
/// order. Operation definitions check, in order: the `operation` value, that it
/// names a known operation (or a value of the declared `operation` enum), the
/// global required parameters, then the operation's own required parameters.
/// The first failure wins.
pub fn validate_call(def: &ToolDefinition, args: &Map<String, Value>) -> Result<()> {
    if !def.has_operations() {
        return check_required(def.parameters.iter(), args);
    }

    let operation = match args.get(OPERATION_PARAM).and_then(Value::as_str) {
        Some(op) if !op.is_empty() => op,
        _ => return Err(missing(OPERATION_PARAM)),
    };

    let op_def = def.operations.get(operation);
    if op_def.is_none() {
        let in_enum = def
            .parameter(OPERATION_PARAM)
            .map_or(false, |p| p.enum_values.iter().any(|v| v == operation));
        if !in_enum {
            return Err(PluginError::Validation(format!(
                "unknown operation: {}",
                operation
            )));
        }
    }

    check_required(
        def.parameters.iter().filter(|p| p.name != OPERATION_PARAM),
        args,
    )?;

    if let Some(op_def) = op_def {
        check_required(op_def.parameters.iter(), args)?;
    }

    Ok(())
}

/// Parse a call's argument JSON and run [`validate_call`] on it
///
/// An empty string is treated as `{}`.
pub fn validate_call_json(def: &ToolDefinition, args_json: &str) -> Result<Map<String, Value>> {
    let args = parse_arguments(args_json)?;
    validate_call(def, &args)?;
    Ok(args)
}

/// Parse an argument string into an object map
pub fn parse_arguments(args_json: &str) -> Result<Map<String, Value>> {
    if args_json.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(args_json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PluginError::Validation(
            "arguments must be a JSON object".to_string(),
        )),
        Err(e) => Err(PluginError::Validation(format!("invalid arguments JSON: {}", e))),
    }
}

/// Validate arguments against a compiled wire schema's `required` list
///
/// Used where only the wire-level schema is known (host side). Property types
/// are read from the schema to decide whether an empty string counts as
/// missing. A schema without `required` accepts anything.
pub fn validate_against_schema(schema: &Value, args: &Map<String, Value>) -> Result<()> {
    let required = match schema.get("required").and_then(Value::as_array) {
        Some(required) => required,
        None => return Ok(()),
    };
    let properties = schema.get("properties").and_then(Value::as_object);

    for name in required.iter().filter_map(Value::as_str) {
        let declared = properties
            .and_then(|p| p.get(name))
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if is_missing(declared, args.get(name)) {
            return Err(missing(name));
        }
    }
    Ok(())
}

impl ToolDefinition {
    pub fn validate(&self) -> Result<()> {
        validate_definition(self)
    }

    /// Operations with their sorted parameter and required-parameter names
    ///
    /// Empty for flat definitions.
    pub fn operations_info(&self) -> Vec<OperationInfo> {
        self.operations
            .iter()
            .map(|(name, op)| {
                let mut parameters: Vec<String> =
                    op.parameters.iter().map(|p| p.name.clone()).collect();
                let mut required_parameters: Vec<String> = op
                    .parameters
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name.clone())
                    .collect();
                parameters.sort();
                required_parameters.sort();
                OperationInfo {
                    name: name.clone(),
                    parameters,
                    required_parameters,
                }
            })
            .collect()
    }
}

fn check_required<'a>(
    params: impl Iterator<Item = &'a ToolParameter>,
    args: &Map<String, Value>,
) -> Result<()> {
    for param in params.filter(|p| p.required) {
        if is_missing(&param.param_type, args.get(&param.name)) {
            return Err(missing(&param.name));
        }
    }
    Ok(())
}

fn is_missing(param_type: &str, value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => param_type == "string" && s.is_empty(),
        Some(_) => false,
    }
}

fn missing(name: &str) -> PluginError {
    PluginError::Validation(format!("required field '{}' is missing", name))
}

fn definition(message: impl Into<String>) -> PluginError {
    PluginError::Definition(message.into())
}
