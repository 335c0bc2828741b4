use async_trait::async_trait;
use weavecore::{Effector, EffectorContext, NodeData, NodeDataItem, NodeDefinition, NodeError};

pub const MANUAL_TRIGGER: &str = "trigger.manual";

pub fn definition() -> NodeDefinition {
    NodeDefinition::trigger(MANUAL_TRIGGER, "Manual Trigger")
        .with_description("Starts the workflow by hand and emits the seed items")
}

/// Emits the seed items, or a single empty item when there are none
pub struct ManualTrigger;

#[async_trait]
impl Effector for ManualTrigger {
    fn kind(&self) -> &str {
        MANUAL_TRIGGER
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        if ctx.input.is_empty() {
            Ok(vec![NodeDataItem::default()])
        } else {
            Ok(ctx.input)
        }
    }
}
