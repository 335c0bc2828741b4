use crate::required_text;
use crate::template::render;
use async_trait::async_trait;
use serde_json::json;
use weavecore::services::SpeechRequest;
use weavecore::{
    Effector, EffectorContext, NodeCategory, NodeData, NodeDefinition, NodeError, ParameterSpec,
    ParameterType,
};

pub const TEXT_TO_SPEECH: &str = "audio.text_to_speech";

pub fn definition() -> NodeDefinition {
    NodeDefinition::processing(TEXT_TO_SPEECH, "Text to Speech", NodeCategory::Audio)
        .with_description("Narrates text into binary.audio, once per item")
        .with_parameter(
            ParameterSpec::new("text", "Text", ParameterType::Text, "{{text}}")
                .required()
                .with_description("Supports {{field}} placeholders"),
        )
        .with_parameter(ParameterSpec::new("voice", "Voice", ParameterType::String, ""))
        .with_parameter(ParameterSpec::new("speed", "Speed", ParameterType::Number, json!(1.0)))
}

pub struct TextToSpeechEffector;

#[async_trait]
impl Effector for TextToSpeechEffector {
    fn kind(&self) -> &str {
        TEXT_TO_SPEECH
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let service = ctx.speech_service()?;
        let text = required_text(&ctx, "text")?;
        let speed = ctx.parameter_or("speed", json!(1.0)).as_f64();

        let mut output = Vec::with_capacity(ctx.input.len());
        for item in &ctx.input {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }

            let spoken = render(&text, item);
            if spoken.trim().is_empty() {
                return Err(NodeError::MissingInput("text to narrate".to_string()));
            }
            let audio = service
                .synthesize(SpeechRequest {
                    text: spoken,
                    voice: ctx.optional_str("voice"),
                    speed,
                })
                .await?;
            output.push(item.clone().with_binary("audio", audio));
        }
        Ok(output)
    }
}
