use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by an effector (or by the engine on its behalf) while a
/// node is running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid parameter '{name}': expected {expected}")]
    InvalidParameter { name: String, expected: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed(message.into())
    }

    /// Configuration problems and cancellation are never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NodeError::Configuration(_) | NodeError::Cancelled)
    }
}

/// Error reported by an external capability service (LLM, TTS, media...)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<ServiceError> for NodeError {
    fn from(err: ServiceError) -> Self {
        NodeError::Service(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Invalid workflow: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),
}

impl WorkflowError {
    /// Issues carried by a validation failure, empty for every other variant.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            WorkflowError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One structural problem found while validating a workflow graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    #[error("workflow has no trigger node")]
    MissingTrigger,

    #[error("node '{node}' uses unknown kind '{kind}'")]
    UnknownKind { node: String, kind: String },

    #[error("node id {0} is used more than once")]
    DuplicateNodeId(String),

    #[error("connection {connection} references missing node {node}")]
    DanglingConnection { connection: String, node: String },

    #[error("connection {connection} references unknown port '{port}' on node '{node}'")]
    UnknownPort {
        connection: String,
        node: String,
        port: String,
    },

    #[error("node '{0}' has no incoming connection")]
    OrphanNode(String),

    #[error("connections form a cycle")]
    Cycle,
}
