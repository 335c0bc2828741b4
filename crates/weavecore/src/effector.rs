use crate::services::{
    AssetStore, MediaGeneration, MediaProcessing, Services, SpeechSynthesis, TextGeneration,
};
use crate::{ExecutionId, JsonMap, NodeData, NodeError, NodeId, NodeSettings, WorkflowId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Business logic behind one node kind
#[async_trait]
pub trait Effector: Send + Sync {
    /// Kind this effector serves (e.g. "ai.text_generation")
    fn kind(&self) -> &str;

    /// Turn the aggregated input into this node's output items
    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError>;
}

/// Everything an effector gets to see for one invocation
#[derive(Clone, Debug)]
pub struct EffectorContext {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub node_id: NodeId,
    pub node_name: String,
    pub kind: String,

    /// Node parameters layered over the definition defaults
    pub parameters: JsonMap,

    /// Concatenated items from every upstream connection
    pub input: NodeData,

    /// The same items grouped per incoming connection, in connection order
    pub input_groups: Vec<NodeData>,

    pub settings: NodeSettings,
    pub services: Services,

    /// Fires when the run is cancelled or halted by a failing branch
    pub cancellation: CancellationToken,
}

impl EffectorContext {
    pub fn new(node_id: NodeId, kind: impl Into<String>) -> Self {
        Self {
            execution_id: ExecutionId::new_v4(),
            workflow_id: WorkflowId::new_v4(),
            node_id,
            node_name: String::new(),
            kind: kind.into(),
            parameters: JsonMap::new(),
            input: Vec::new(),
            input_groups: Vec::new(),
            settings: NodeSettings::default(),
            services: Services::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, input: NodeData) -> Self {
        self.input_groups = vec![input.clone()];
        self.input = input;
        self
    }

    pub fn with_input_groups(mut self, groups: Vec<NodeData>) -> Self {
        self.input = groups.concat();
        self.input_groups = groups;
        self
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Get a parameter or fail with a configuration error
    pub fn require_parameter(&self, name: &str) -> Result<&Value, NodeError> {
        match self.parameters.get(name) {
            Some(Value::Null) | None => Err(NodeError::Configuration(format!(
                "Missing parameter: {}",
                name
            ))),
            Some(value) => Ok(value),
        }
    }

    pub fn parameter_str(&self, name: &str) -> Result<&str, NodeError> {
        self.require_parameter(name)?
            .as_str()
            .ok_or_else(|| NodeError::InvalidParameter {
                name: name.to_string(),
                expected: "string".to_string(),
            })
    }

    pub fn parameter_f64(&self, name: &str) -> Result<f64, NodeError> {
        self.require_parameter(name)?
            .as_f64()
            .ok_or_else(|| NodeError::InvalidParameter {
                name: name.to_string(),
                expected: "number".to_string(),
            })
    }

    pub fn parameter_bool(&self, name: &str) -> Result<bool, NodeError> {
        self.require_parameter(name)?
            .as_bool()
            .ok_or_else(|| NodeError::InvalidParameter {
                name: name.to_string(),
                expected: "boolean".to_string(),
            })
    }

    /// Get a parameter with a fallback
    pub fn parameter_or(&self, name: &str, default: Value) -> Value {
        match self.parameters.get(name) {
            Some(Value::Null) | None => default,
            Some(value) => value.clone(),
        }
    }

    /// Optional string parameter, empty strings count as unset
    pub fn optional_str(&self, name: &str) -> Option<String> {
        self.parameters
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn text_service(&self) -> Result<Arc<dyn TextGeneration>, NodeError> {
        self.services.text.clone().ok_or_else(|| missing_service("text generation"))
    }

    pub fn speech_service(&self) -> Result<Arc<dyn SpeechSynthesis>, NodeError> {
        self.services.speech.clone().ok_or_else(|| missing_service("speech synthesis"))
    }

    pub fn media_service(&self) -> Result<Arc<dyn MediaGeneration>, NodeError> {
        self.services.media.clone().ok_or_else(|| missing_service("media generation"))
    }

    pub fn processing_service(&self) -> Result<Arc<dyn MediaProcessing>, NodeError> {
        self.services
            .processing
            .clone()
            .ok_or_else(|| missing_service("media processing"))
    }

    pub fn asset_store(&self) -> Result<Arc<dyn AssetStore>, NodeError> {
        self.services.assets.clone().ok_or_else(|| missing_service("asset store"))
    }
}

fn missing_service(name: &str) -> NodeError {
    NodeError::Configuration(format!("No {} service configured", name))
}
