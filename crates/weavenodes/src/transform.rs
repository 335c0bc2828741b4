use crate::template::render_value;
use async_trait::async_trait;
use serde_json::{json, Value};
use weavecore::{
    Effector, EffectorContext, JsonMap, NodeCategory, NodeData, NodeDataItem, NodeDefinition,
    NodeError, ParameterSpec, ParameterType,
};

pub const SET: &str = "transform.set";
pub const SPLIT_OUT: &str = "transform.split_out";

pub fn set_definition() -> NodeDefinition {
    NodeDefinition::processing(SET, "Set Fields", NodeCategory::Transform)
        .with_description("Writes fields into every item")
        .with_parameter(
            ParameterSpec::new("values", "Values", ParameterType::Json, json!({}))
                .with_description("Object merged into each item; strings support {{field}} placeholders"),
        )
        .with_parameter(ParameterSpec::new("keepOnlySet", "Keep Only Set", ParameterType::Boolean, false))
}

pub fn split_out_definition() -> NodeDefinition {
    NodeDefinition::processing(SPLIT_OUT, "Split Out", NodeCategory::Transform)
        .with_description("Turns an array field into one item per element")
        .with_parameter(ParameterSpec::new("field", "Field", ParameterType::String, "").required())
        .with_parameter(
            ParameterSpec::new("destinationField", "Destination Field", ParameterType::String, "")
                .with_description("Name for non-object elements, defaults to the source field"),
        )
}

pub struct SetEffector;

#[async_trait]
impl Effector for SetEffector {
    fn kind(&self) -> &str {
        SET
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let values = match ctx.parameter_or("values", json!({})) {
            Value::Object(map) => map,
            _ => {
                return Err(NodeError::InvalidParameter {
                    name: "values".to_string(),
                    expected: "object".to_string(),
                })
            }
        };
        let keep_only_set = ctx.parameter_or("keepOnlySet", json!(false)).as_bool().unwrap_or(false);

        Ok(ctx
            .input
            .iter()
            .map(|item| {
                let mut json = if keep_only_set { JsonMap::new() } else { item.json.clone() };
                for (key, value) in &values {
                    json.insert(key.clone(), render_value(value, item));
                }
                NodeDataItem {
                    json,
                    binary: item.binary.clone(),
                }
            })
            .collect())
    }
}

pub struct SplitOutEffector;

#[async_trait]
impl Effector for SplitOutEffector {
    fn kind(&self) -> &str {
        SPLIT_OUT
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let field = ctx.parameter_str("field")?;
        if field.is_empty() {
            return Err(NodeError::Configuration("Missing parameter: field".to_string()));
        }
        let destination = ctx.optional_str("destinationField").unwrap_or_else(|| field.to_string());

        let mut output = Vec::new();
        for item in &ctx.input {
            // A scalar counts as a one-element list, a missing field as none
            let elements = match item.field(field) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(elements)) => elements.clone(),
                Some(other) => vec![other.clone()],
            };
            for element in elements {
                output.push(match element {
                    Value::Object(map) => NodeDataItem::new(map),
                    other => NodeDataItem::default().with_field(destination.as_str(), other),
                });
            }
        }

        tracing::debug!("{}: split {} item(s) into {}", ctx.node_name, ctx.input.len(), output.len());
        Ok(output)
    }
}
