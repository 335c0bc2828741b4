//! Graph editing operations and workflow document management.
//!
//! Graph operations work on a `&mut Workflow` and never touch the store;
//! document operations (`create`, `save`, ...) go through the injected
//! [`WorkflowStore`].

use crate::store::WorkflowStore;
use crate::validation;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use weavecore::{
    Connection, ConnectionId, FlowError, JsonMap, NodeCatalog, NodeId, NodeSettings, Position,
    Workflow, WorkflowError, WorkflowId, WorkflowNode, WorkflowStatus,
};

/// Partial update applied by [`WorkflowManager::update_node`]
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    /// Merged key by key into the existing parameters
    pub parameters: Option<JsonMap>,
    pub settings: Option<NodeSettings>,
}

pub struct WorkflowManager {
    catalog: Arc<NodeCatalog>,
    store: Arc<dyn WorkflowStore>,
}

impl WorkflowManager {
    pub fn new(catalog: Arc<NodeCatalog>, store: Arc<dyn WorkflowStore>) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &Arc<NodeCatalog> {
        &self.catalog
    }

    pub async fn create_workflow(&self, name: impl Into<String>) -> Result<Workflow, FlowError> {
        let workflow = Workflow::new(name);
        self.store.save(&workflow).await?;
        tracing::info!("Created workflow {} ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, FlowError> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()).into())
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, FlowError> {
        self.store.list().await
    }

    /// Persist `workflow`, bumping its version
    pub async fn save_workflow(&self, workflow: &mut Workflow) -> Result<(), FlowError> {
        workflow.version += 1;
        workflow.touch();
        self.store.save(workflow).await
    }

    pub async fn delete_workflow(&self, id: WorkflowId) -> Result<bool, FlowError> {
        self.store.delete(id).await
    }

    /// Instantiate a node of `kind`, with parameters layered over the
    /// definition defaults.
    pub fn add_node(
        &self,
        workflow: &mut Workflow,
        kind: &str,
        position: Position,
        name: Option<&str>,
        parameters: Option<JsonMap>,
    ) -> Result<NodeId, WorkflowError> {
        let definition = self
            .catalog
            .get_definition(kind)
            .ok_or_else(|| WorkflowError::UnknownNodeKind(kind.to_string()))?;

        let mut merged = definition.default_parameters();
        merged.extend(parameters.unwrap_or_default());

        let base = name.unwrap_or(definition.display_name.as_str());
        let node = WorkflowNode {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            name: unique_name(workflow, base, None),
            position,
            parameters: merged,
            inputs: definition.inputs.clone(),
            outputs: definition.outputs.clone(),
            settings: definition.default_settings.clone(),
            status: Default::default(),
        };

        let id = node.id;
        tracing::debug!("Adding node {} ({}) to workflow {}", node.name, kind, workflow.id);
        workflow.nodes.push(node);
        workflow.touch();
        Ok(id)
    }

    pub fn update_node(
        &self,
        workflow: &mut Workflow,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> Result<(), WorkflowError> {
        let name = match update.name {
            Some(name) => Some(unique_name(workflow, &name, Some(node_id))),
            None => None,
        };

        let node = workflow
            .find_node_mut(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))?;

        if let Some(name) = name {
            node.name = name;
        }
        if let Some(parameters) = update.parameters {
            node.parameters.extend(parameters);
        }
        if let Some(settings) = update.settings {
            node.settings = settings;
        }

        workflow.touch();
        Ok(())
    }

    pub fn move_node(
        &self,
        workflow: &mut Workflow,
        node_id: NodeId,
        position: Position,
    ) -> Result<(), WorkflowError> {
        let node = workflow
            .find_node_mut(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))?;
        node.position = position;
        workflow.touch();
        Ok(())
    }

    /// Remove a node together with every connection touching it
    pub fn delete_node(&self, workflow: &mut Workflow, node_id: NodeId) -> Result<WorkflowNode, WorkflowError> {
        let index = workflow
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))?;

        let removed = workflow.nodes.remove(index);
        workflow.connections.retain(|c| !c.touches(node_id));
        workflow.touch();
        Ok(removed)
    }

    /// Connect two ports. Returns `None` and leaves the graph untouched when
    /// a node or port is missing, the connection already exists, or the new
    /// edge would close a cycle.
    pub fn add_connection(
        &self,
        workflow: &mut Workflow,
        source: NodeId,
        source_output: &str,
        target: NodeId,
        target_input: &str,
    ) -> Option<Connection> {
        let source_node = workflow.find_node(source)?;
        let target_node = workflow.find_node(target)?;

        if !self.has_output(source_node, source_output) || !self.has_input(target_node, target_input) {
            tracing::debug!("Rejected connection: unknown port {} -> {}", source_output, target_input);
            return None;
        }
        if workflow.has_connection(source, source_output, target, target_input) {
            return None;
        }
        if would_create_cycle(workflow, source, target) {
            tracing::debug!("Rejected connection {} -> {}: would create a cycle", source, target);
            return None;
        }

        let connection = Connection::new(source, source_output, target, target_input);
        workflow.connections.push(connection.clone());
        workflow.touch();
        Some(connection)
    }

    pub fn delete_connection(&self, workflow: &mut Workflow, connection_id: ConnectionId) -> bool {
        let before = workflow.connections.len();
        workflow.connections.retain(|c| c.id != connection_id);
        let removed = workflow.connections.len() != before;
        if removed {
            workflow.touch();
        }
        removed
    }

    /// Deep copy under fresh ids, reset to draft
    pub fn duplicate_workflow(&self, workflow: &Workflow) -> Workflow {
        let mut copy = remap_ids(workflow);
        copy.name = format!("{} (copy)", workflow.name);
        copy
    }

    pub fn validate(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        validation::validate(workflow, &self.catalog)
    }

    pub fn export_json(&self, workflow: &Workflow) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(workflow)?)
    }

    /// Parse a workflow document, regenerating every id so it can live next
    /// to the one it was exported from.
    pub fn import_json(&self, json: &str) -> Result<Workflow, FlowError> {
        let parsed: Workflow = serde_json::from_str(json)?;
        Ok(remap_ids(&parsed))
    }

    fn has_output(&self, node: &WorkflowNode, port: &str) -> bool {
        match self.catalog.get_definition(&node.kind) {
            Some(def) => def.has_output(port),
            None => node.outputs.iter().any(|p| p.id == port),
        }
    }

    fn has_input(&self, node: &WorkflowNode, port: &str) -> bool {
        match self.catalog.get_definition(&node.kind) {
            Some(def) => def.has_input(port),
            None => node.inputs.iter().any(|p| p.id == port),
        }
    }
}

/// Walk edges backwards from `source`; reaching `target` means `target` is
/// already an ancestor of `source`, so `source -> target` would close a loop.
pub fn would_create_cycle(workflow: &Workflow, source: NodeId, target: NodeId) -> bool {
    if source == target {
        return true;
    }

    let mut visited = HashSet::new();
    let mut stack = vec![source];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for conn in workflow.incoming(current) {
            if conn.source_node_id == target {
                return true;
            }
            stack.push(conn.source_node_id);
        }
    }
    false
}

fn unique_name(workflow: &Workflow, base: &str, ignore: Option<NodeId>) -> String {
    let taken = |candidate: &str| {
        workflow
            .nodes
            .iter()
            .any(|n| n.name == candidate && Some(n.id) != ignore)
    };

    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{} {}", base, i))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn remap_ids(source: &Workflow) -> Workflow {
    let node_ids: HashMap<NodeId, NodeId> = source
        .nodes
        .iter()
        .map(|n| (n.id, Uuid::new_v4()))
        .collect();
    let remap = |id: NodeId| node_ids.get(&id).copied().unwrap_or(id);

    let now = Utc::now();
    let mut copy = source.clone();
    copy.id = Uuid::new_v4();
    copy.version = 1;
    copy.status = WorkflowStatus::Draft;
    copy.created_at = now;
    copy.updated_at = now;

    for node in &mut copy.nodes {
        node.id = remap(node.id);
    }
    for conn in &mut copy.connections {
        conn.id = Uuid::new_v4();
        conn.source_node_id = remap(conn.source_node_id);
        conn.target_node_id = remap(conn.target_node_id);
    }
    copy.reset_statuses();
    copy
}
