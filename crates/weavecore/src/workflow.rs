use crate::{JsonMap, Port};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = Uuid;
pub type ConnectionId = Uuid;

/// Complete workflow document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub version: u32,
    pub status: WorkflowStatus,
    pub nodes: Vec<WorkflowNode>,
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default)]
    pub metadata: JsonMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 1,
            status: WorkflowStatus::Draft,
            nodes: Vec::new(),
            connections: Vec::new(),
            settings: WorkflowSettings::default(),
            metadata: JsonMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn find_node(&self, id: NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut WorkflowNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Connections terminating at `node`
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.target_node_id == node)
    }

    /// Connections leaving `node`
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.source_node_id == node)
    }

    pub fn has_connection(
        &self,
        source: NodeId,
        source_output: &str,
        target: NodeId,
        target_input: &str,
    ) -> bool {
        self.connections.iter().any(|c| {
            c.source_node_id == source
                && c.source_output_port_id == source_output
                && c.target_node_id == target
                && c.target_input_port_id == target_input
        })
    }

    /// Record a modification
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn reset_statuses(&mut self) {
        for node in &mut self.nodes {
            node.status = NodeStatus::Idle;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// Node instance within a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: NodeId,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub parameters: JsonMap,
    /// Ports copied from the definition when the node was created
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub settings: NodeSettings,
    #[serde(default)]
    pub status: NodeStatus,
}

impl WorkflowNode {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            name: name.into(),
            position: Position::default(),
            parameters: JsonMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            settings: NodeSettings::default(),
            status: NodeStatus::Idle,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// Per-node runtime policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSettings {
    pub execute_once: bool,
    pub retry_on_fail: bool,
    /// Additional attempts after the first failure
    pub retry_count: u32,
    /// Per-call timeout, 0 disables it
    pub timeout_seconds: u64,
    pub on_error: OnError,
    pub notes: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            execute_once: false,
            retry_on_fail: false,
            retry_count: 3,
            timeout_seconds: 300,
            on_error: OnError::Stop,
            notes: String::new(),
        }
    }
}

impl NodeSettings {
    pub fn with_retry(mut self, retry_count: u32) -> Self {
        self.retry_on_fail = true;
        self.retry_count = retry_count;
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn execute_once(mut self) -> Self {
        self.execute_once = true;
        self
    }
}

/// What happens to the run when a node fails after its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnError {
    /// Abort the run
    #[default]
    Stop,
    /// Keep the run going but drop this branch; the error marker only
    /// travels along connections leaving the error port
    Continue,
    /// Keep the run going and hand the error marker to every dependent
    ContinueWithError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
    Skipped,
}

/// Directed edge between an output port and an input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub source_node_id: NodeId,
    pub source_output_port_id: String,
    pub target_node_id: NodeId,
    pub target_input_port_id: String,
}

impl Connection {
    pub fn new(
        source_node_id: NodeId,
        source_output: impl Into<String>,
        target_node_id: NodeId,
        target_input: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_node_id,
            source_output_port_id: source_output.into(),
            target_node_id,
            target_input_port_id: target_input.into(),
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.source_node_id == node || self.target_node_id == node
    }
}

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Workflow-wide execution settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSettings {
    /// Deadline for the whole run
    pub max_execution_time_ms: Option<u64>,
    /// Overrides the runtime bound on concurrently running effectors
    pub max_parallel_nodes: Option<usize>,
}
