//! Node kinds: ports, parameter schema and default settings.
//!
//! Definitions are plain data. They are registered once at start-up into a
//! [`NodeCatalog`] and only read afterwards.

use crate::{JsonMap, NodeSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Port carrying regular output
pub const MAIN_PORT: &str = "main";

/// Port carrying error markers from a failed node
pub const ERROR_PORT: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDataType {
    Any,
    Text,
    Json,
    Image,
    Audio,
    Video,
    Binary,
}

/// Named attachment point on a node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    pub display_name: String,
    pub direction: PortDirection,
    pub data_type: PortDataType,
    pub required: bool,
    pub multiple: bool,
}

impl Port {
    pub fn input(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            direction: PortDirection::Input,
            data_type: PortDataType::Any,
            required: true,
            multiple: true,
        }
    }

    pub fn output(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            direction: PortDirection::Output,
            data_type: PortDataType::Any,
            required: false,
            multiple: true,
        }
    }

    pub fn with_data_type(mut self, data_type: PortDataType) -> Self {
        self.data_type = data_type;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Trigger,
    Ai,
    Media,
    Audio,
    Transform,
    Logic,
    Output,
    Utility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Text,
    Number,
    Boolean,
    Options,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOption {
    pub value: String,
    pub label: String,
}

/// One configurable field of a node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub id: String,
    pub display_name: String,
    pub value_type: ParameterType,
    pub required: bool,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ParameterOption>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParameterSpec {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        value_type: ParameterType,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            value_type,
            required: false,
            default: default.into(),
            options: Vec::new(),
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, options: &[(&str, &str)]) -> Self {
        self.value_type = ParameterType::Options;
        self.options = options
            .iter()
            .map(|(value, label)| ParameterOption {
                value: value.to_string(),
                label: label.to_string(),
            })
            .collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Registry entry describing a kind of node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    pub kind: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub category: NodeCategory,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    pub parameters: Vec<ParameterSpec>,
    pub default_settings: NodeSettings,
}

impl NodeDefinition {
    pub fn new(kind: impl Into<String>, display_name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            kind: kind.into(),
            display_name: display_name.into(),
            description: String::new(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
            default_settings: NodeSettings::default(),
        }
    }

    /// A trigger kind: no inputs, a single main output.
    pub fn trigger(kind: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(kind, display_name, NodeCategory::Trigger).with_output(Port::output(MAIN_PORT, "Main"))
    }

    /// A processing kind: main input, main and error outputs.
    pub fn processing(kind: impl Into<String>, display_name: impl Into<String>, category: NodeCategory) -> Self {
        Self::new(kind, display_name, category)
            .with_input(Port::input(MAIN_PORT, "Main"))
            .with_output(Port::output(MAIN_PORT, "Main"))
            .with_output(Port::output(ERROR_PORT, "Error"))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.default_settings = settings;
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }

    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p.id == port)
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p.id == port)
    }

    /// Parameter defaults keyed by parameter id
    pub fn default_parameters(&self) -> JsonMap {
        self.parameters
            .iter()
            .map(|p| (p.id.clone(), p.default.clone()))
            .collect()
    }
}

/// Catalog of node kinds, looked up by `kind`
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    definitions: HashMap<String, NodeDefinition>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: NodeDefinition) {
        tracing::debug!("Registering node kind: {}", definition.kind);
        self.definitions.insert(definition.kind.clone(), definition);
    }

    pub fn get_definition(&self, kind: &str) -> Option<&NodeDefinition> {
        self.definitions.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.definitions.contains_key(kind)
    }

    /// All definitions, ordered by category then kind
    pub fn list(&self) -> Vec<&NodeDefinition> {
        let mut all: Vec<_> = self.definitions.values().collect();
        all.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.kind.cmp(&b.kind)));
        all
    }

    pub fn default_parameters(&self, kind: &str) -> Option<JsonMap> {
        self.get_definition(kind).map(NodeDefinition::default_parameters)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
