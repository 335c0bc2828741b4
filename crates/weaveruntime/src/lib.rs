//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows, the effector
//! registry it dispatches through, graph validation, and the manager used
//! to edit and store workflow documents.

mod executor;
pub mod manager;
mod registry;
mod runtime;
pub mod store;
pub mod validation;

pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use manager::{would_create_cycle, NodeUpdate, WorkflowManager};
pub use registry::EffectorRegistry;
pub use runtime::{Runtime, RuntimeConfig};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
pub use validation::validate;
