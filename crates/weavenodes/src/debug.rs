use async_trait::async_trait;
use weavecore::{Effector, EffectorContext, NodeCategory, NodeData, NodeDefinition, NodeError};

pub const DEBUG: &str = "util.debug";

pub fn definition() -> NodeDefinition {
    NodeDefinition::processing(DEBUG, "Debug", NodeCategory::Utility)
        .with_description("Logs every item and passes it on unchanged")
}

/// Simple debug node that logs its input
pub struct DebugEffector;

#[async_trait]
impl Effector for DebugEffector {
    fn kind(&self) -> &str {
        DEBUG
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        tracing::info!("DEBUG {}: {} item(s)", ctx.node_name, ctx.input.len());
        for (index, item) in ctx.input.iter().enumerate() {
            let binaries: Vec<&str> = item.binary.keys().map(String::as_str).collect();
            tracing::info!(
                "  [{}] {} binary={:?}",
                index,
                serde_json::Value::Object(item.json.clone()),
                binaries
            );
        }
        Ok(ctx.input)
    }
}
