#![allow(dead_code)]

use serde_json::json;
use weavecore::{
    Connection, NodeCatalog, NodeCategory, NodeDefinition, NodeId, NodeSettings, ParameterSpec,
    ParameterType, Workflow, WorkflowNode, MAIN_PORT,
};

pub const TRIGGER: &str = "test.trigger";
pub const STEP: &str = "test.step";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("weaveruntime=debug")
        .with_test_writer()
        .try_init();
}

pub fn catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    catalog.register(NodeDefinition::trigger(TRIGGER, "Start"));
    catalog.register(
        NodeDefinition::processing(STEP, "Step", NodeCategory::Transform).with_parameter(
            ParameterSpec::new("label", "Label", ParameterType::String, json!("step")),
        ),
    );
    catalog
}

/// Builds workflows node by node without going through the manager
pub struct GraphBuilder {
    pub workflow: Workflow,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            workflow: Workflow::new("test"),
        }
    }

    pub fn node(&mut self, kind: &str, name: &str) -> NodeId {
        self.node_with(kind, name, NodeSettings::default())
    }

    pub fn node_with(&mut self, kind: &str, name: &str, settings: NodeSettings) -> NodeId {
        let node = WorkflowNode::new(kind, name).with_settings(settings);
        let id = node.id;
        self.workflow.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: NodeId, target: NodeId) {
        self.connect_port(source, MAIN_PORT, target);
    }

    pub fn connect_port(&mut self, source: NodeId, port: &str, target: NodeId) {
        self.workflow
            .connections
            .push(Connection::new(source, port, target, MAIN_PORT));
    }

    pub fn set_parameter(&mut self, node: NodeId, name: &str, value: serde_json::Value) {
        if let Some(node) = self.workflow.nodes.iter_mut().find(|n| n.id == node) {
            node.parameters.insert(name.to_string(), value);
        }
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}
