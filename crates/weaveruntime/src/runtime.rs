use crate::manager::WorkflowManager;
use crate::registry::EffectorRegistry;
use crate::store::{InMemoryWorkflowStore, WorkflowStore};
use crate::{ExecutorConfig, WorkflowExecutor};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use weavecore::{
    EventBus, EventListener, Execution, ExecutionEvent, ExecutionId, ExecutionTrigger, FlowError,
    NodeCatalog, NodeData, Services, Subscription, Workflow, WorkflowId,
};

/// Main entry point for embedding the engine
pub struct Runtime {
    catalog: Arc<NodeCatalog>,
    effectors: Arc<EffectorRegistry>,
    executor: Arc<WorkflowExecutor>,
    manager: Arc<WorkflowManager>,
    event_bus: EventBus,
    executions: RwLock<VecDeque<Execution>>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Runtime without external services and with an in-memory store
    pub fn new(catalog: NodeCatalog, effectors: EffectorRegistry, config: RuntimeConfig) -> Self {
        Self::with_services(catalog, effectors, Services::default(), config)
    }

    pub fn with_services(
        catalog: NodeCatalog,
        effectors: EffectorRegistry,
        services: Services,
        config: RuntimeConfig,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let effectors = Arc::new(effectors);
        let event_bus = EventBus::new();
        let executor = WorkflowExecutor::new(
            catalog.clone(),
            effectors.clone(),
            event_bus.clone(),
            config.executor_config(),
        )
        .with_services(services);
        let manager = WorkflowManager::new(catalog.clone(), Arc::new(InMemoryWorkflowStore::new()));

        Self {
            catalog,
            effectors,
            executor: Arc::new(executor),
            manager: Arc::new(manager),
            event_bus,
            executions: RwLock::new(VecDeque::new()),
            config,
        }
    }

    /// Swap the workflow store
    pub fn with_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.manager = Arc::new(WorkflowManager::new(self.catalog.clone(), store));
        self
    }

    pub fn catalog(&self) -> &Arc<NodeCatalog> {
        &self.catalog
    }

    pub fn effectors(&self) -> &Arc<EffectorRegistry> {
        &self.effectors
    }

    pub fn manager(&self) -> &Arc<WorkflowManager> {
        &self.manager
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn subscribe(&self, listener: impl EventListener + 'static) -> Subscription {
        self.event_bus.subscribe(listener)
    }

    /// Subscribe to execution events through a broadcast channel
    pub fn subscribe_channel(&self) -> (Subscription, broadcast::Receiver<ExecutionEvent>) {
        self.event_bus.subscribe_channel(self.config.event_buffer_size)
    }

    /// Execute a workflow directly (without registration)
    pub async fn execute(
        &self,
        workflow: &Workflow,
        trigger: ExecutionTrigger,
        seed: Option<NodeData>,
    ) -> Execution {
        self.execute_with_cancel(workflow, trigger, seed, CancellationToken::new())
            .await
    }

    pub async fn execute_with_cancel(
        &self,
        workflow: &Workflow,
        trigger: ExecutionTrigger,
        seed: Option<NodeData>,
        cancel: CancellationToken,
    ) -> Execution {
        let execution = self.executor.execute(workflow, trigger, seed, cancel).await;
        self.retain(execution.clone()).await;
        execution
    }

    /// Execute a stored workflow by id
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        trigger: ExecutionTrigger,
        seed: Option<NodeData>,
    ) -> Result<Execution, FlowError> {
        let workflow = self.manager.get_workflow(workflow_id).await?;
        Ok(self.execute(&workflow, trigger, seed).await)
    }

    pub async fn execution(&self, id: ExecutionId) -> Option<Execution> {
        self.executions
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Retained executions of one workflow, newest first
    pub async fn executions_for(&self, workflow_id: WorkflowId) -> Vec<Execution> {
        self.executions
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    async fn retain(&self, execution: Execution) {
        let limit = self.config.execution_history_limit;
        if limit == 0 {
            return;
        }
        let mut history = self.executions.write().await;
        history.push_back(execution);
        while history.len() > limit {
            history.pop_front();
        }
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub retry_base_delay_ms: u64,
    pub execution_history_limit: usize,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            retry_base_delay_ms: 1000,
            execution_history_limit: 100,
            event_buffer_size: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_parallel_nodes: self.max_parallel_nodes,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}
