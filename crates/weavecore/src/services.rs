//! External capability services handed to effectors.
//!
//! The engine never calls these itself; it only forwards them through the
//! [`EffectorContext`](crate::EffectorContext). Concrete implementations
//! (LLM providers, TTS engines, render backends) live outside this workspace.

use crate::{BinaryRef, JsonMap, ServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn generate(&self, request: TextRequest) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub speed: Option<f64>,
}

#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    async fn synthesize(&self, request: SpeechRequest) -> Result<BinaryRef, ServiceError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub prompt: String,
    pub duration_seconds: f64,
    /// Optional still used as the first frame
    pub image: Option<BinaryRef>,
    pub model: Option<String>,
}

#[async_trait]
pub trait MediaGeneration: Send + Sync {
    async fn generate_image(&self, request: ImageRequest) -> Result<BinaryRef, ServiceError>;

    async fn generate_video(&self, request: VideoRequest) -> Result<BinaryRef, ServiceError>;
}

/// A single FFmpeg-style job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaJob {
    pub operation: String,
    pub inputs: Vec<BinaryRef>,
    pub args: JsonMap,
}

#[async_trait]
pub trait MediaProcessing: Send + Sync {
    async fn process(&self, job: MediaJob) -> Result<BinaryRef, ServiceError>;
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist `content` under `file_name`, returning where it was stored
    async fn put(&self, file_name: &str, content: &BinaryRef) -> Result<String, ServiceError>;
}

/// Handles to every external service an effector may use
#[derive(Clone, Default)]
pub struct Services {
    pub text: Option<Arc<dyn TextGeneration>>,
    pub speech: Option<Arc<dyn SpeechSynthesis>>,
    pub media: Option<Arc<dyn MediaGeneration>>,
    pub processing: Option<Arc<dyn MediaProcessing>>,
    pub assets: Option<Arc<dyn AssetStore>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, service: Arc<dyn TextGeneration>) -> Self {
        self.text = Some(service);
        self
    }

    pub fn with_speech(mut self, service: Arc<dyn SpeechSynthesis>) -> Self {
        self.speech = Some(service);
        self
    }

    pub fn with_media(mut self, service: Arc<dyn MediaGeneration>) -> Self {
        self.media = Some(service);
        self
    }

    pub fn with_processing(mut self, service: Arc<dyn MediaProcessing>) -> Self {
        self.processing = Some(service);
        self
    }

    pub fn with_assets(mut self, service: Arc<dyn AssetStore>) -> Self {
        self.assets = Some(service);
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("text", &self.text.is_some())
            .field("speech", &self.speech.is_some())
            .field("media", &self.media.is_some())
            .field("processing", &self.processing.is_some())
            .field("assets", &self.assets.is_some())
            .finish()
    }
}
