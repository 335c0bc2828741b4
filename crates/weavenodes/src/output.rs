use crate::binary;
use crate::template::render;
use async_trait::async_trait;
use serde_json::json;
use weavecore::{
    Effector, EffectorContext, NodeCategory, NodeData, NodeDataItem, NodeDefinition, NodeError,
    ParameterSpec, ParameterType,
};

pub const EXPORT: &str = "output.export";

pub fn definition() -> NodeDefinition {
    NodeDefinition::processing(EXPORT, "Export", NodeCategory::Output)
        .with_description("Stores a binary property of every item as a file")
        .with_parameter(
            ParameterSpec::new("fileName", "File Name", ParameterType::String, "output")
                .with_description("Supports {{field}} placeholders"),
        )
        .with_parameter(ParameterSpec::new("binaryProperty", "Binary Property", ParameterType::String, "output"))
}

pub struct ExportEffector;

#[async_trait]
impl Effector for ExportEffector {
    fn kind(&self) -> &str {
        EXPORT
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let store = ctx.asset_store()?;
        let property = ctx.optional_str("binaryProperty").unwrap_or_else(|| "output".to_string());
        let template = ctx.optional_str("fileName").unwrap_or_else(|| "output".to_string());

        let mut output = Vec::with_capacity(ctx.input.len());
        for item in &ctx.input {
            let content = binary(item, &property)?;
            let mut file_name = render(&template, item);
            if file_name.trim().is_empty() {
                file_name = content.file_name.clone();
            }

            let location = store.put(&file_name, content).await?;
            tracing::info!("{}: exported {} to {}", ctx.node_name, file_name, location);

            output.push(NodeDataItem::from_value(json!({
                "location": location,
                "fileName": file_name,
                "mimeType": content.mime_type,
            })));
        }
        Ok(output)
    }
}
