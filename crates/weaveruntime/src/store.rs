use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use weavecore::{FlowError, Workflow, WorkflowId};

/// Persistence of workflow documents
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load(&self, id: WorkflowId) -> Result<Option<Workflow>, FlowError>;

    async fn save(&self, workflow: &Workflow) -> Result<(), FlowError>;

    /// Returns whether a document was removed
    async fn delete(&self, id: WorkflowId) -> Result<bool, FlowError>;

    async fn list(&self) -> Result<Vec<Workflow>, FlowError>;
}

/// Keeps workflows in process memory
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load(&self, id: WorkflowId) -> Result<Option<Workflow>, FlowError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn save(&self, workflow: &Workflow) -> Result<(), FlowError> {
        self.workflows
            .write()
            .await
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn delete(&self, id: WorkflowId) -> Result<bool, FlowError> {
        Ok(self.workflows.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Workflow>, FlowError> {
        let mut all: Vec<_> = self.workflows.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}
