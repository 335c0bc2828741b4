use async_trait::async_trait;
use serde_json::json;
use tokio::time::{sleep, Duration};
use weavecore::{
    Effector, EffectorContext, NodeCategory, NodeData, NodeDefinition, NodeError, ParameterSpec,
    ParameterType,
};

pub const DELAY: &str = "util.delay";

pub fn definition() -> NodeDefinition {
    NodeDefinition::processing(DELAY, "Delay", NodeCategory::Utility)
        .with_description("Waits before passing items on")
        .with_parameter(ParameterSpec::new("delayMs", "Delay (ms)", ParameterType::Number, json!(1000)))
}

/// Delay execution for a specified duration
pub struct DelayEffector;

#[async_trait]
impl Effector for DelayEffector {
    fn kind(&self) -> &str {
        DELAY
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let delay_ms = ctx.parameter_f64("delayMs")?;
        if delay_ms < 0.0 {
            return Err(NodeError::InvalidParameter {
                name: "delayMs".to_string(),
                expected: "non-negative number".to_string(),
            });
        }

        tracing::debug!("{}: delaying for {}ms", ctx.node_name, delay_ms);
        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms as u64)) => Ok(ctx.input),
            _ = ctx.cancellation.cancelled() => Err(NodeError::Cancelled),
        }
    }
}
