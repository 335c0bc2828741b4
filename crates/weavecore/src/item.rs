use crate::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Open JSON object carried by items and node parameters
pub type JsonMap = serde_json::Map<String, Value>;

/// Ordered list of items flowing along an edge
pub type NodeData = Vec<NodeDataItem>;

/// One record travelling between nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDataItem {
    #[serde(default)]
    pub json: JsonMap,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub binary: HashMap<String, BinaryRef>,
}

impl NodeDataItem {
    pub fn new(json: JsonMap) -> Self {
        Self {
            json,
            binary: HashMap::new(),
        }
    }

    /// Build an item from any JSON value. Objects become the item json,
    /// everything else is wrapped under `value`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            other => {
                let mut json = JsonMap::new();
                json.insert("value".to_string(), other);
                Self::new(json)
            }
        }
    }

    /// The marker emitted in place of real output when a node fails under a
    /// continue policy.
    pub fn error_marker(message: impl Into<String>, node_id: NodeId) -> Self {
        let mut json = JsonMap::new();
        json.insert("error".to_string(), Value::String(message.into()));
        json.insert("nodeId".to_string(), Value::String(node_id.to_string()));
        Self::new(json)
    }

    pub fn is_error_marker(&self) -> bool {
        self.json.contains_key("error") && self.json.contains_key("nodeId")
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.json.insert(key.into(), value.into());
        self
    }

    pub fn with_binary(mut self, key: impl Into<String>, binary: BinaryRef) -> Self {
        self.binary.insert(key.into(), binary);
        self
    }

    /// Look up a json field by dotted path (`a.b.c`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = self.json.get(parts.next()?)?;
        parts.try_fold(first, |current, key| match current {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

/// Reference to binary content attached to an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryRef {
    /// Base64 payload, empty when the content lives behind `url`
    #[serde(default)]
    pub data: String,
    pub mime_type: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BinaryRef {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
            url: None,
        }
    }

    pub fn remote(url: impl Into<String>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            data: String::new(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
            url: Some(url.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_values_are_wrapped() {
        let item = NodeDataItem::from_value(json!(42));
        assert_eq!(item.json.get("value"), Some(&json!(42)));
    }

    #[test]
    fn error_marker_shape() {
        let id = NodeId::new_v4();
        let item = NodeDataItem::error_marker("boom", id);
        let encoded = serde_json::to_value(&item).unwrap();
        assert_eq!(encoded, json!({"json": {"error": "boom", "nodeId": id.to_string()}}));
        assert!(item.is_error_marker());
    }

    #[test]
    fn dotted_field_lookup() {
        let item = NodeDataItem::from_value(json!({"a": {"b": [1, {"c": "x"}]}}));
        assert_eq!(item.field("a.b.1.c"), Some(&json!("x")));
        assert_eq!(item.field("a.missing"), None);
    }
}
