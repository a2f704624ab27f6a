//! Tool Schema Layer
//!
//! - `types`: the declarative tool description read from `plugin.yaml`
//! - `compiler`: description → flattened JSON parameter schema
//! - `validator`: definition checks and operation-aware call validation
//! - `helpers`: builders for hand-written schemas

pub mod compiler;
pub mod helpers;
pub mod types;
pub mod validator;

pub use compiler::{compile, to_tool, CompiledSchema, PropertyMap, SchemaNode};
pub use types::{
    ItemsSpec, OperationDefinition, ParamType, ToolDefinition, ToolParameter, OPERATION_PARAM,
};
pub use validator::{
    parse_arguments, validate_against_schema, validate_call, validate_call_json,
    validate_definition,
};
