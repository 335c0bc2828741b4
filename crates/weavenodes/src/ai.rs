use crate::required_text;
use crate::template::render;
use async_trait::async_trait;
use serde_json::json;
use weavecore::services::TextRequest;
use weavecore::{
    Effector, EffectorContext, NodeCategory, NodeData, NodeDefinition, NodeError, ParameterSpec,
    ParameterType,
};

pub const TEXT_GENERATION: &str = "ai.text_generation";

pub fn definition() -> NodeDefinition {
    NodeDefinition::processing(TEXT_GENERATION, "Text Generation", NodeCategory::Ai)
        .with_description("Generates text with a language model, once per item")
        .with_parameter(
            ParameterSpec::new("prompt", "Prompt", ParameterType::Text, "")
                .required()
                .with_description("Supports {{field}} placeholders"),
        )
        .with_parameter(ParameterSpec::new("systemPrompt", "System Prompt", ParameterType::Text, ""))
        .with_parameter(ParameterSpec::new("model", "Model", ParameterType::String, ""))
        .with_parameter(ParameterSpec::new("temperature", "Temperature", ParameterType::Number, json!(0.7)))
        .with_parameter(ParameterSpec::new("maxTokens", "Max Tokens", ParameterType::Number, json!(1024)))
        .with_parameter(ParameterSpec::new("outputField", "Output Field", ParameterType::String, "text"))
}

pub struct TextGenerationEffector;

#[async_trait]
impl Effector for TextGenerationEffector {
    fn kind(&self) -> &str {
        TEXT_GENERATION
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let service = ctx.text_service()?;
        let prompt = required_text(&ctx, "prompt")?;
        let system_prompt = ctx.optional_str("systemPrompt");
        let output_field = ctx.optional_str("outputField").unwrap_or_else(|| "text".to_string());
        let temperature = ctx.parameter_or("temperature", json!(0.7)).as_f64();
        let max_tokens = ctx
            .parameter_or("maxTokens", json!(1024))
            .as_u64()
            .map(|n| n as u32);

        let mut output = Vec::with_capacity(ctx.input.len());
        for item in &ctx.input {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }

            let request = TextRequest {
                prompt: render(&prompt, item),
                system_prompt: system_prompt.as_deref().map(|s| render(s, item)),
                model: ctx.optional_str("model"),
                temperature,
                max_tokens,
            };
            tracing::debug!("{}: generating text ({} chars of prompt)", ctx.node_name, request.prompt.len());

            let text = service.generate(request).await?;
            output.push(item.clone().with_field(output_field.as_str(), text));
        }
        Ok(output)
    }
}
