//! Core abstractions for the weave workflow engine
//!
//! This crate provides the data model every other component depends on:
//! items flowing along edges, the node catalog, the workflow graph, the
//! execution record, the effector trait and the event bus. It contains
//! no scheduling logic.

mod definition;
mod effector;
mod error;
pub mod events;
mod execution;
mod item;
pub mod services;
mod workflow;

pub use definition::{
    NodeCatalog, NodeCategory, NodeDefinition, ParameterOption, ParameterSpec, ParameterType,
    Port, PortDataType, PortDirection, ERROR_PORT, MAIN_PORT,
};
pub use effector::{Effector, EffectorContext};
pub use error::{FlowError, NodeError, ServiceError, ValidationIssue, WorkflowError};
pub use events::*;
pub use execution::{Execution, ExecutionError, ExecutionStatus, ExecutionTrigger, NodeExecution};
pub use item::{BinaryRef, JsonMap, NodeData, NodeDataItem};
pub use services::Services;
pub use workflow::{
    Connection, ConnectionId, NodeId, NodeSettings, NodeStatus, OnError, Position, Workflow,
    WorkflowId, WorkflowNode, WorkflowSettings, WorkflowStatus,
};

/// Identifier of one run of a workflow
pub type ExecutionId = uuid::Uuid;

/// Result type for weave operations
pub type Result<T> = std::result::Result<T, FlowError>;
