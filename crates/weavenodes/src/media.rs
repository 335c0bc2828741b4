//! Image and video generation plus FFmpeg-style post-processing.

use crate::template::render;
use crate::{binary, required_text};
use async_trait::async_trait;
use serde_json::json;
use weavecore::services::{ImageRequest, MediaJob, VideoRequest};
use weavecore::{
    Effector, EffectorContext, JsonMap, NodeCategory, NodeData, NodeDataItem,
    NodeDefinition, NodeError, NodeSettings, ParameterSpec, ParameterType,
};

pub const IMAGE_GENERATION: &str = "media.image_generation";
pub const VIDEO_GENERATION: &str = "media.video_generation";
pub const MEDIA_PROCESS: &str = "media.process";

pub fn image_definition() -> NodeDefinition {
    NodeDefinition::processing(IMAGE_GENERATION, "Image Generation", NodeCategory::Media)
        .with_description("Generates one image per item into binary.image")
        .with_parameter(ParameterSpec::new("prompt", "Prompt", ParameterType::Text, "").required())
        .with_parameter(ParameterSpec::new("width", "Width", ParameterType::Number, json!(1024)))
        .with_parameter(ParameterSpec::new("height", "Height", ParameterType::Number, json!(1024)))
        .with_parameter(ParameterSpec::new("model", "Model", ParameterType::String, ""))
}

pub fn video_definition() -> NodeDefinition {
    NodeDefinition::processing(VIDEO_GENERATION, "Video Generation", NodeCategory::Media)
        .with_description("Generates one clip per item into binary.video, optionally from a still")
        .with_parameter(ParameterSpec::new("prompt", "Prompt", ParameterType::Text, "").required())
        .with_parameter(ParameterSpec::new(
            "durationSeconds",
            "Duration (s)",
            ParameterType::Number,
            json!(5),
        ))
        .with_parameter(
            ParameterSpec::new("imageProperty", "Image Property", ParameterType::String, "")
                .with_description("Binary property holding the first frame"),
        )
        .with_parameter(ParameterSpec::new("model", "Model", ParameterType::String, ""))
        // Render backends are slow
        .with_settings(NodeSettings::default().with_timeout(900))
}

pub fn process_definition() -> NodeDefinition {
    NodeDefinition::processing(MEDIA_PROCESS, "Media Process", NodeCategory::Media)
        .with_description("Concatenates, transcodes or muxes media into binary.output")
        .with_parameter(
            ParameterSpec::new("operation", "Operation", ParameterType::Options, "transcode").with_options(&[
                ("concat", "Concatenate"),
                ("transcode", "Transcode"),
                ("mux_audio", "Add Audio Track"),
                ("extract_audio", "Extract Audio"),
            ]),
        )
        .with_parameter(ParameterSpec::new("binaryProperty", "Binary Property", ParameterType::String, "video"))
        .with_parameter(ParameterSpec::new("audioProperty", "Audio Property", ParameterType::String, "audio"))
        .with_parameter(ParameterSpec::new("format", "Format", ParameterType::String, "mp4"))
        .with_settings(NodeSettings::default().with_timeout(900))
}

pub struct ImageGenerationEffector;

#[async_trait]
impl Effector for ImageGenerationEffector {
    fn kind(&self) -> &str {
        IMAGE_GENERATION
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let service = ctx.media_service()?;
        let prompt = required_text(&ctx, "prompt")?;
        let width = dimension(&ctx, "width")?;
        let height = dimension(&ctx, "height")?;

        let mut output = Vec::with_capacity(ctx.input.len());
        for item in &ctx.input {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            let image = service
                .generate_image(ImageRequest {
                    prompt: render(&prompt, item),
                    width,
                    height,
                    model: ctx.optional_str("model"),
                })
                .await?;
            output.push(item.clone().with_binary("image", image));
        }
        Ok(output)
    }
}

pub struct VideoGenerationEffector;

#[async_trait]
impl Effector for VideoGenerationEffector {
    fn kind(&self) -> &str {
        VIDEO_GENERATION
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let service = ctx.media_service()?;
        let prompt = required_text(&ctx, "prompt")?;
        let duration_seconds = ctx.parameter_f64("durationSeconds")?;
        let image_property = ctx.optional_str("imageProperty");

        let mut output = Vec::with_capacity(ctx.input.len());
        for item in &ctx.input {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            let image = match &image_property {
                Some(property) => Some(binary(item, property)?.clone()),
                None => None,
            };
            let video = service
                .generate_video(VideoRequest {
                    prompt: render(&prompt, item),
                    duration_seconds,
                    image,
                    model: ctx.optional_str("model"),
                })
                .await?;
            output.push(item.clone().with_binary("video", video));
        }
        Ok(output)
    }
}

pub struct MediaProcessEffector;

#[async_trait]
impl Effector for MediaProcessEffector {
    fn kind(&self) -> &str {
        MEDIA_PROCESS
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let service = ctx.processing_service()?;
        let operation = ctx.parameter_str("operation")?.to_string();
        let property = ctx.optional_str("binaryProperty").unwrap_or_else(|| "video".to_string());

        let mut args = JsonMap::new();
        if let Some(format) = ctx.optional_str("format") {
            args.insert("format".to_string(), json!(format));
        }

        match operation.as_str() {
            "concat" => {
                let inputs = ctx
                    .input
                    .iter()
                    .map(|item| binary(item, &property).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                if inputs.is_empty() {
                    return Ok(Vec::new());
                }
                tracing::debug!("{}: concatenating {} clips", ctx.node_name, inputs.len());

                let joined = service
                    .process(MediaJob {
                        operation: operation.clone(),
                        inputs,
                        args,
                    })
                    .await?;
                Ok(vec![NodeDataItem::default()
                    .with_field("clipCount", ctx.input.len())
                    .with_binary("output", joined)])
            }
            "transcode" | "extract_audio" | "mux_audio" => {
                let audio_property = ctx.optional_str("audioProperty").unwrap_or_else(|| "audio".to_string());

                let mut output = Vec::with_capacity(ctx.input.len());
                for item in &ctx.input {
                    if ctx.cancellation.is_cancelled() {
                        return Err(NodeError::Cancelled);
                    }
                    let mut inputs = vec![binary(item, &property)?.clone()];
                    if operation == "mux_audio" {
                        inputs.push(binary(item, &audio_property)?.clone());
                    }
                    let result = service
                        .process(MediaJob {
                            operation: operation.clone(),
                            inputs,
                            args: args.clone(),
                        })
                        .await?;
                    output.push(item.clone().with_binary("output", result));
                }
                Ok(output)
            }
            other => Err(NodeError::InvalidParameter {
                name: "operation".to_string(),
                expected: format!("one of concat, transcode, mux_audio, extract_audio (got '{}')", other),
            }),
        }
    }
}

fn dimension(ctx: &EffectorContext, name: &str) -> Result<u32, NodeError> {
    ctx.parameter_f64(name)
        .ok()
        .filter(|v| *v >= 1.0)
        .map(|v| v as u32)
        .ok_or_else(|| NodeError::InvalidParameter {
            name: name.to_string(),
            expected: "positive number".to_string(),
        })
}
