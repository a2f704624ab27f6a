//! Structured Results
//!
//! Plain `call` results are opaque strings. A plugin that wants the host to
//! render a table, a modal, or a list returns a serialized [`StructuredResult`]
//! instead; the host recognises it with [`StructuredResult::parse`].
//!
//! JSON shape:
//! ```json
//! {"displayType": "table", "title": "Projects", "data": [...], "metadata": {"columns": ["Name"]}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PluginError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Text,
    Table,
    Modal,
    Card,
    List,
    Json,
}

/// Plugin result with rendering hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    #[serde(rename = "displayType")]
    pub display_type: DisplayType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl StructuredResult {
    fn with(display_type: DisplayType, title: &str, data: Value) -> Self {
        Self {
            display_type,
            title: title.to_string(),
            description: String::new(),
            data,
            metadata: Map::new(),
        }
    }

    /// Rows in `data`, column names in `metadata.columns`
    pub fn table(title: &str, columns: &[&str], data: Value) -> Self {
        let mut result = Self::with(DisplayType::Table, title, data);
        result
            .metadata
            .insert("columns".to_string(), Value::from(columns.to_vec()));
        result
    }

    pub fn modal(title: &str, description: &str, data: Value) -> Self {
        let mut result = Self::with(DisplayType::Modal, title, data);
        result.description = description.to_string();
        result
    }

    pub fn text(text: &str) -> Self {
        Self::with(DisplayType::Text, "", Value::String(text.to_string()))
    }

    pub fn list(title: &str, items: Value) -> Self {
        Self::with(DisplayType::List, title, items)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Recognise a call result as structured, trying JSON before YAML
    ///
    /// A result without a valid `displayType` is not structured.
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_json(input)
            .or_else(|_| Self::from_yaml(input))
            .map_err(|_| {
                PluginError::Protocol(
                    "result is not a valid structured result (neither JSON nor YAML)".to_string(),
                )
            })
    }

    pub fn is_structured(input: &str) -> bool {
        Self::parse(input).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_result_json() {
        let result = StructuredResult::table(
            "Projects",
            &["Name", "BPM"],
            json!([{"Name": "Demo", "BPM": 120}]),
        );
        let value: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(value["displayType"], "table");
        assert_eq!(value["metadata"]["columns"], json!(["Name", "BPM"]));
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_constructors() {
        let modal = StructuredResult::modal("Confirm", "Delete project?", json!({"id": 1}));
        assert_eq!(modal.display_type, DisplayType::Modal);
        assert_eq!(modal.description, "Delete project?");
        assert!(modal.metadata.is_empty());

        let text = StructuredResult::text("done");
        assert_eq!(text.data, json!("done"));
        assert!(text.title.is_empty());

        let list = StructuredResult::list("Tags", json!(["a", "b"]));
        assert_eq!(list.display_type, DisplayType::List);
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let parsed = StructuredResult::parse(r#"{"displayType":"card","data":{"k":1}}"#).unwrap();
        assert_eq!(parsed.display_type, DisplayType::Card);

        let yaml = StructuredResult::list("Items", json!(["x"])).to_yaml().unwrap();
        let parsed = StructuredResult::parse(&yaml).unwrap();
        assert_eq!(parsed.title, "Items");
        assert_eq!(parsed.data, json!(["x"]));
    }

    #[test]
    fn test_plain_text_is_not_structured() {
        assert!(!StructuredResult::is_structured("Hello, world"));
        assert!(!StructuredResult::is_structured(r#"{"data": 1}"#));
        let err = StructuredResult::parse("plain").unwrap_err();
        assert!(err.to_string().contains("neither JSON nor YAML"));
    }
}
