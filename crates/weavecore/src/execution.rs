use crate::{ExecutionId, NodeData, NodeId, NodeStatus, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What started a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionTrigger {
    #[default]
    Manual,
    Cron {
        expression: String,
    },
    Webhook {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        event_type: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

/// One run of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub trigger: ExecutionTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    /// Output of every node that produced data, keyed by node id
    pub data: HashMap<NodeId, NodeData>,
    pub node_executions: Vec<NodeExecution>,
    pub error: Option<ExecutionError>,
}

impl Execution {
    pub fn start(workflow_id: WorkflowId, trigger: ExecutionTrigger) -> Self {
        Self {
            id: ExecutionId::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            trigger,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            data: HashMap::new(),
            node_executions: Vec::new(),
            error: None,
        }
    }

    /// Close the run with its final status
    pub fn finish(&mut self, error: Option<ExecutionError>) {
        let now = Utc::now();
        self.status = if error.is_some() {
            ExecutionStatus::Error
        } else {
            ExecutionStatus::Success
        };
        self.error = error;
        self.finished_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn node_execution(&self, node_id: NodeId) -> Option<&NodeExecution> {
        self.node_executions.iter().find(|n| n.node_id == node_id)
    }

    pub fn node_status(&self, node_id: NodeId) -> NodeStatus {
        self.node_execution(node_id)
            .map(|n| n.status)
            .unwrap_or(NodeStatus::Idle)
    }

    /// Node ids in the order their executions were recorded
    pub fn execution_order(&self) -> Vec<NodeId> {
        self.node_executions.iter().map(|n| n.node_id).collect()
    }
}

/// Record of a single node run within an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecution {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub input: NodeData,
    pub output: Option<NodeData>,
    pub error: Option<String>,
    /// Number of effector invocations, retries included
    pub attempts: u32,
}

impl NodeExecution {
    pub fn running(node_id: NodeId, input: NodeData) -> Self {
        Self {
            node_id,
            status: NodeStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            input,
            output: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn skipped(node_id: NodeId) -> Self {
        let now = Utc::now();
        Self {
            node_id,
            status: NodeStatus::Skipped,
            start_time: now,
            end_time: Some(now),
            duration_ms: Some(0),
            input: Vec::new(),
            output: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn succeed(&mut self, output: NodeData) {
        self.status = NodeStatus::Success;
        self.output = Some(output);
        self.close();
    }

    pub fn fail(&mut self, message: impl Into<String>, output: Option<NodeData>) {
        self.status = NodeStatus::Error;
        self.error = Some(message.into());
        self.output = output;
        self.close();
    }

    fn close(&mut self) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration_ms = Some((now - self.start_time).num_milliseconds().max(0) as u64);
    }
}
