//! Structural validation run before a workflow may execute.
//!
//! Rules:
//! 1. at least one node of category `trigger`
//! 2. every node kind is known to the catalog and node ids are unique
//! 3. every connection references existing nodes and existing ports
//! 4. every non-trigger node has an incoming connection
//! 5. the connection set is acyclic

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use weavecore::{NodeCatalog, NodeId, ValidationIssue, Workflow, WorkflowError, WorkflowNode};

/// Validate `workflow`, reporting every issue found rather than the first.
pub fn validate(workflow: &Workflow, catalog: &NodeCatalog) -> Result<(), WorkflowError> {
    let issues = collect_issues(workflow, catalog);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(issues))
    }
}

pub fn collect_issues(workflow: &Workflow, catalog: &NodeCatalog) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id) {
            issues.push(ValidationIssue::DuplicateNodeId(node.id.to_string()));
        }
        if !catalog.contains(&node.kind) {
            issues.push(ValidationIssue::UnknownKind {
                node: node.name.clone(),
                kind: node.kind.clone(),
            });
        }
    }

    if !workflow.nodes.iter().any(|n| is_trigger(n, catalog)) {
        issues.push(ValidationIssue::MissingTrigger);
    }

    let nodes: HashMap<NodeId, &WorkflowNode> = workflow.nodes.iter().map(|n| (n.id, n)).collect();
    for conn in &workflow.connections {
        let source = nodes.get(&conn.source_node_id);
        let target = nodes.get(&conn.target_node_id);

        for (endpoint, id) in [(source, conn.source_node_id), (target, conn.target_node_id)] {
            if endpoint.is_none() {
                issues.push(ValidationIssue::DanglingConnection {
                    connection: conn.id.to_string(),
                    node: id.to_string(),
                });
            }
        }

        if let Some(source) = source {
            if !has_output(source, &conn.source_output_port_id, catalog) {
                issues.push(ValidationIssue::UnknownPort {
                    connection: conn.id.to_string(),
                    node: source.name.clone(),
                    port: conn.source_output_port_id.clone(),
                });
            }
        }
        if let Some(target) = target {
            if !has_input(target, &conn.target_input_port_id, catalog) {
                issues.push(ValidationIssue::UnknownPort {
                    connection: conn.id.to_string(),
                    node: target.name.clone(),
                    port: conn.target_input_port_id.clone(),
                });
            }
        }
    }

    let targets: HashSet<NodeId> = workflow.connections.iter().map(|c| c.target_node_id).collect();
    for node in &workflow.nodes {
        if !is_trigger(node, catalog) && !targets.contains(&node.id) {
            issues.push(ValidationIssue::OrphanNode(node.name.clone()));
        }
    }

    if toposort(&build_graph(workflow), None).is_err() {
        issues.push(ValidationIssue::Cycle);
    }

    issues
}

/// Dependency graph over the workflow's nodes. Connections with a missing
/// endpoint are left out.
pub fn build_graph(workflow: &Workflow) -> DiGraph<NodeId, ()> {
    let mut graph = DiGraph::new();
    let mut node_to_index: HashMap<NodeId, NodeIndex> = HashMap::new();

    for node in &workflow.nodes {
        node_to_index
            .entry(node.id)
            .or_insert_with(|| graph.add_node(node.id));
    }

    for conn in &workflow.connections {
        if let (Some(from), Some(to)) = (
            node_to_index.get(&conn.source_node_id),
            node_to_index.get(&conn.target_node_id),
        ) {
            graph.add_edge(*from, *to, ());
        }
    }

    graph
}

pub(crate) fn is_trigger(node: &WorkflowNode, catalog: &NodeCatalog) -> bool {
    catalog
        .get_definition(&node.kind)
        .map(|d| d.is_trigger())
        .unwrap_or(false)
}

// Ports come from the definition when the kind is known, otherwise from the
// copy taken when the node was created.
fn has_output(node: &WorkflowNode, port: &str, catalog: &NodeCatalog) -> bool {
    match catalog.get_definition(&node.kind) {
        Some(def) => def.has_output(port),
        None => node.outputs.iter().any(|p| p.id == port),
    }
}

fn has_input(node: &WorkflowNode, port: &str, catalog: &NodeCatalog) -> bool {
    match catalog.get_definition(&node.kind) {
        Some(def) => def.has_input(port),
        None => node.inputs.iter().any(|p| p.id == port),
    }
}
