//! Hand-written schema builders
//!
//! For plugins that skip the declarative description and build their
//! parameter schema in code:
//!
//! ```rust,ignore
//! let tool = Tool::new(
//!     "calculate",
//!     "Perform a calculation",
//!     object_property("", [("expression", string_property("Expression"))], &["expression"]),
//! );
//! ```

use serde_json::{json, Map, Value};

pub fn string_property(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

pub fn number_property(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

pub fn integer_property(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

pub fn boolean_property(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

pub fn array_property(description: &str, items: Value) -> Value {
    json!({ "type": "array", "description": description, "items": items })
}

/// Object schema; `description` and `required` are omitted when empty
pub fn object_property<I, K>(description: &str, properties: I, required: &[&str]) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut obj = Map::new();
    obj.insert("type".into(), json!("object"));
    let props: Map<String, Value> = properties.into_iter().map(|(k, v)| (k.into(), v)).collect();
    obj.insert("properties".into(), Value::Object(props));
    if !description.is_empty() {
        obj.insert("description".into(), json!(description));
    }
    if !required.is_empty() {
        obj.insert("required".into(), json!(required));
    }
    Value::Object(obj)
}

/// Enumerated values of an arbitrary JSON type (`string`, `number`, `integer`)
pub fn enum_property(value_type: &str, description: &str, values: Vec<Value>) -> Value {
    json!({ "type": value_type, "description": description, "enum": values })
}

pub fn string_enum_property(description: &str, values: &[&str]) -> Value {
    enum_property(
        "string",
        description,
        values.iter().map(|v| json!(v)).collect(),
    )
}

pub fn with_min_max(property: Value, min: f64, max: f64) -> Value {
    with_entries(property, [("minimum", json!(min)), ("maximum", json!(max))])
}

pub fn with_default(property: Value, default: Value) -> Value {
    with_entries(property, [("default", default)])
}

pub fn with_pattern(property: Value, pattern: &str) -> Value {
    with_entries(property, [("pattern", json!(pattern))])
}

pub fn with_length(property: Value, min_length: u64, max_length: u64) -> Value {
    with_entries(
        property,
        [("minLength", json!(min_length)), ("maxLength", json!(max_length))],
    )
}

fn with_entries<const N: usize>(mut property: Value, entries: [(&str, Value); N]) -> Value {
    if let Value::Object(obj) = &mut property {
        for (key, value) in entries {
            obj.insert(key.to_string(), value);
        }
    }
    property
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_property() {
        let schema = object_property(
            "",
            [
                ("name", string_property("User name")),
                ("age", with_min_max(integer_property("Age"), 0.0, 150.0)),
            ],
            &["name"],
        );
        assert_eq!(schema["type"], "object");
        assert!(schema.get("description").is_none());
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["age"]["maximum"], json!(150.0));
    }

    #[test]
    fn test_modifiers() {
        let unit = with_default(string_enum_property("Unit", &["c", "f"]), json!("c"));
        assert_eq!(unit["enum"], json!(["c", "f"]));
        assert_eq!(unit["default"], "c");

        let code = with_length(with_pattern(string_property("Code"), "^[a-z]+$"), 1, 4);
        assert_eq!(code["pattern"], "^[a-z]+$");
        assert_eq!(code["minLength"], 1);

        let tags = array_property("Tags", string_property("Tag"));
        assert_eq!(tags["items"]["type"], "string");
        assert_eq!(boolean_property("b")["type"], "boolean");
        assert_eq!(number_property("n")["type"], "number");
    }
}
