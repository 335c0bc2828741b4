//! Workflow execution engine.
//!
//! A run starts at the trigger nodes (one after another) and walks the graph
//! depth-first. When a node finishes, every dependent whose upstream
//! producers have all settled is claimed. It runs if at least one incoming
//! connection delivers items, otherwise it is skipped along with whatever
//! that leaves without input. Siblings made ready by the same completion run
//! concurrently and are joined before the parent call returns.

use crate::registry::EffectorRegistry;
use crate::validation::{self, is_trigger};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use weavecore::{
    Connection, Effector, EffectorContext, EventBus, EventKind, Execution, ExecutionError,
    ExecutionEvent, ExecutionId, ExecutionTrigger, NodeCatalog, NodeData, NodeDataItem, NodeError,
    NodeExecution, NodeId, NodeStatus, OnError, Services, Workflow, WorkflowNode, ERROR_PORT,
};

/// Tuning knobs for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Bound on effector calls in flight at once, 0 for no bound
    pub max_parallel_nodes: usize,
    /// First retry waits this long, each further retry doubles it
    pub retry_base_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            retry_base_delay: Duration::from_millis(1000),
        }
    }
}

/// Runs workflows against a catalog and a set of effectors
pub struct WorkflowExecutor {
    catalog: Arc<NodeCatalog>,
    effectors: Arc<EffectorRegistry>,
    services: Services,
    event_bus: EventBus,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(
        catalog: Arc<NodeCatalog>,
        effectors: Arc<EffectorRegistry>,
        event_bus: EventBus,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            catalog,
            effectors,
            services: Services::default(),
            event_bus,
            config,
        }
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run `workflow` to completion.
    ///
    /// Never fails as a call: validation problems, missing effectors and
    /// node failures all end up as `status = error` on the returned record.
    #[instrument(skip_all, fields(workflow_id = %workflow.id))]
    pub async fn execute(
        &self,
        workflow: &Workflow,
        trigger: ExecutionTrigger,
        seed: Option<NodeData>,
        cancel: CancellationToken,
    ) -> Execution {
        let mut execution = Execution::start(workflow.id, trigger);

        if let Err(message) = self.preflight(workflow) {
            warn!("Workflow {} rejected before execution: {}", workflow.id, message);
            execution.finish(Some(ExecutionError {
                message: message.clone(),
                node_id: None,
            }));
            self.event_bus.emit(
                ExecutionEvent::new(EventKind::WorkflowError, workflow.id, execution.id)
                    .with_data(json!({ "error": message })),
            );
            return execution;
        }

        self.event_bus
            .emit(ExecutionEvent::new(EventKind::WorkflowStart, workflow.id, execution.id));
        info!("Starting workflow execution: {}", execution.id);

        let limit = workflow
            .settings
            .max_parallel_nodes
            .unwrap_or(self.config.max_parallel_nodes);
        let run = Run::new(workflow, execution.id, cancel.child_token(), limit);

        let walk = self.run_triggers(&run, &cancel, seed.unwrap_or_default());
        let outcome = match workflow.settings.max_execution_time_ms {
            Some(ms) => match timeout(Duration::from_millis(ms), walk).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    run.halt.cancel();
                    Err(NodeFailure::run(format!("Workflow timed out after {}ms", ms)))
                }
            },
            None => walk.await,
        };

        let state = run.state.into_inner();
        execution.data = state.data;
        execution.node_executions = state.node_executions;
        for interrupted in execution
            .node_executions
            .iter_mut()
            .filter(|n| n.status == NodeStatus::Running)
        {
            interrupted.fail("Interrupted before completion", None);
        }

        execution.finish(outcome.err().map(|failure| ExecutionError {
            message: failure.message,
            node_id: failure.node_id,
        }));

        let event = match &execution.error {
            None => {
                info!(
                    "Workflow {} completed in {}ms",
                    workflow.id,
                    execution.duration_ms.unwrap_or_default()
                );
                ExecutionEvent::new(EventKind::WorkflowComplete, workflow.id, execution.id).with_data(
                    json!({ "status": "success", "durationMs": execution.duration_ms }),
                )
            }
            Some(err) => {
                error!("Workflow {} failed: {}", workflow.id, err.message);
                ExecutionEvent::new(EventKind::WorkflowError, workflow.id, execution.id).with_data(
                    json!({ "error": err.message, "nodeId": err.node_id, "durationMs": execution.duration_ms }),
                )
            }
        };
        self.event_bus.emit(event);

        execution
    }

    /// Structural validation plus an effector for every kind in use
    fn preflight(&self, workflow: &Workflow) -> Result<(), String> {
        validation::validate(workflow, &self.catalog).map_err(|e| e.to_string())?;

        let mut missing: Vec<&str> = workflow
            .nodes
            .iter()
            .map(|n| n.kind.as_str())
            .filter(|kind| !self.effectors.contains(kind))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("No effector registered for kind(s): {}", missing.join(", ")))
        }
    }

    async fn run_triggers(
        &self,
        run: &Run<'_>,
        cancel: &CancellationToken,
        seed: NodeData,
    ) -> Result<(), NodeFailure> {
        let triggers: Vec<&WorkflowNode> = run
            .workflow
            .nodes
            .iter()
            .filter(|n| is_trigger(n, &self.catalog))
            .collect();

        for (position, &trigger) in triggers.iter().enumerate() {
            if cancel.is_cancelled() {
                for skipped in &triggers[position..] {
                    run.state
                        .lock()
                        .await
                        .node_executions
                        .push(NodeExecution::skipped(skipped.id));
                    self.emit(run, EventKind::NodeSkipped, skipped.id, None);
                }
                return Err(NodeFailure::cancelled());
            }

            run.state.lock().await.claimed.insert(trigger.id);
            self.execute_node(run, trigger, vec![seed.clone()]).await?;
        }
        Ok(())
    }

    fn execute_node<'a>(
        &'a self,
        run: &'a Run<'a>,
        node: &'a WorkflowNode,
        input_groups: Vec<NodeData>,
    ) -> BoxFuture<'a, Result<(), NodeFailure>> {
        async move {
            if run.halt.is_cancelled() {
                return Err(NodeFailure::cancelled());
            }

            let slot = {
                let mut state = run.state.lock().await;
                state
                    .node_executions
                    .push(NodeExecution::running(node.id, input_groups.concat()));
                state.node_executions.len() - 1
            };
            self.emit(
                run,
                EventKind::NodeStart,
                node.id,
                Some(json!({ "kind": node.kind, "name": node.name })),
            );
            debug!("Starting node {} ({})", node.name, node.kind);

            let Some(effector) = self.effectors.get(&node.kind) else {
                let err = NodeError::Configuration(format!(
                    "No effector registered for kind '{}'",
                    node.kind
                ));
                return self.handle_failure(run, node, slot, err, true).await;
            };
            let ctx = self.build_context(run, node, input_groups);

            match self.invoke(run, node, effector.as_ref(), ctx, slot).await {
                Ok(mut output) => {
                    if node.settings.execute_once {
                        output.truncate(1);
                    }
                    let count = output.len();
                    {
                        let mut state = run.state.lock().await;
                        state.node_executions[slot].succeed(output.clone());
                        state.data.insert(node.id, output);
                    }
                    info!("Node {} completed with {} item(s)", node.name, count);
                    self.emit(
                        run,
                        EventKind::NodeComplete,
                        node.id,
                        Some(json!({ "itemCount": count })),
                    );
                    self.schedule_downstream(run, node).await
                }
                Err(err) => self.handle_failure(run, node, slot, err, false).await,
            }
        }
        .boxed()
    }

    async fn handle_failure<'a>(
        &'a self,
        run: &'a Run<'a>,
        node: &'a WorkflowNode,
        slot: usize,
        err: NodeError,
        missing_effector: bool,
    ) -> Result<(), NodeFailure> {
        let message = err.to_string();
        let cancelled = err == NodeError::Cancelled;
        let fatal = cancelled || missing_effector || node.settings.on_error == OnError::Stop;

        if cancelled {
            debug!("Node {} cancelled", node.name);
        } else {
            error!("Node {} failed: {}", node.name, message);
        }
        self.emit(run, EventKind::NodeError, node.id, Some(json!({ "error": message })));

        if fatal {
            run.state.lock().await.node_executions[slot].fail(message.clone(), None);
            if !cancelled {
                run.halt.cancel();
            }
            return Err(NodeFailure {
                message,
                node_id: Some(node.id),
                cancelled,
            });
        }

        let payload = vec![NodeDataItem::error_marker(message.clone(), node.id)];
        {
            let mut state = run.state.lock().await;
            state.node_executions[slot].fail(message, Some(payload.clone()));
            state.data.insert(node.id, payload);
            state.failures.insert(node.id, node.settings.on_error);
        }
        self.schedule_downstream(run, node).await
    }

    /// Start every dependent of `node` that has become ready and wait for
    /// all of them.
    fn schedule_downstream<'a>(
        &'a self,
        run: &'a Run<'a>,
        node: &'a WorkflowNode,
    ) -> BoxFuture<'a, Result<(), NodeFailure>> {
        async move {
            if run.halt.is_cancelled() {
                return Err(NodeFailure::cancelled());
            }

            let Settled { ready, skipped } = run.settle_dependents(node.id).await;
            for target in skipped {
                debug!("Node {} skipped, no incoming connection delivered items", target);
                self.emit(run, EventKind::NodeSkipped, target, None);
            }
            if ready.is_empty() {
                return Ok(());
            }
            if ready.len() > 1 {
                debug!("Node {} fans out to {} branches", node.name, ready.len());
            }

            let branches = ready.into_iter().filter_map(|(target, groups)| {
                run.index
                    .node(target)
                    .map(|target| self.execute_node(run, target, groups))
            });
            first_failure(join_all(branches).await)
        }
        .boxed()
    }

    async fn invoke(
        &self,
        run: &Run<'_>,
        node: &WorkflowNode,
        effector: &dyn Effector,
        ctx: EffectorContext,
        slot: usize,
    ) -> Result<NodeData, NodeError> {
        let settings = &node.settings;
        let max_attempts = if settings.retry_on_fail {
            settings.retry_count.saturating_add(1)
        } else {
            1
        };

        let mut attempt: u32 = 0;
        loop {
            run.state.lock().await.node_executions[slot].attempts += 1;

            match self
                .invoke_once(run, effector, ctx.clone(), settings.timeout_seconds)
                .await
            {
                Ok(output) => return Ok(output),
                Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt.min(16));
                    warn!(
                        "Node {} attempt {} failed: {}; retrying in {:?}",
                        node.name,
                        attempt + 1,
                        err,
                        delay
                    );
                    self.emit(
                        run,
                        EventKind::NodeRetry,
                        node.id,
                        Some(json!({
                            "attempt": attempt + 1,
                            "delayMs": delay.as_millis() as u64,
                            "error": err.to_string(),
                        })),
                    );

                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = run.halt.cancelled() => return Err(NodeError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn invoke_once(
        &self,
        run: &Run<'_>,
        effector: &dyn Effector,
        ctx: EffectorContext,
        timeout_seconds: u64,
    ) -> Result<NodeData, NodeError> {
        let call = async {
            let _permit = match &run.permits {
                Some(permits) => Some(permits.acquire().await.map_err(|_| NodeError::Cancelled)?),
                None => None,
            };

            if timeout_seconds == 0 {
                return effector.execute(ctx).await;
            }
            match timeout(Duration::from_secs(timeout_seconds), effector.execute(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout {
                    seconds: timeout_seconds,
                }),
            }
        };

        tokio::select! {
            biased;
            _ = run.halt.cancelled() => Err(NodeError::Cancelled),
            result = call => result,
        }
    }

    fn build_context(&self, run: &Run<'_>, node: &WorkflowNode, input_groups: Vec<NodeData>) -> EffectorContext {
        let mut parameters = self.catalog.default_parameters(&node.kind).unwrap_or_default();
        parameters.extend(node.parameters.clone());

        EffectorContext {
            execution_id: run.execution_id,
            workflow_id: run.workflow.id,
            node_id: node.id,
            node_name: node.name.clone(),
            kind: node.kind.clone(),
            parameters,
            input: input_groups.concat(),
            input_groups,
            settings: node.settings.clone(),
            services: self.services.clone(),
            cancellation: run.halt.clone(),
        }
    }

    fn emit(&self, run: &Run<'_>, kind: EventKind, node_id: NodeId, data: Option<Value>) {
        let mut event = ExecutionEvent::new(kind, run.workflow.id, run.execution_id).for_node(node_id);
        event.data = data;
        self.event_bus.emit(event);
    }
}

/// Why a branch stopped
#[derive(Debug)]
struct NodeFailure {
    message: String,
    node_id: Option<NodeId>,
    cancelled: bool,
}

impl NodeFailure {
    fn run(message: String) -> Self {
        Self {
            message,
            node_id: None,
            cancelled: false,
        }
    }

    fn cancelled() -> Self {
        Self {
            message: "Execution cancelled".to_string(),
            node_id: None,
            cancelled: true,
        }
    }
}

/// Prefer a real failure over the cancellations it caused in sibling branches
fn first_failure(results: Vec<Result<(), NodeFailure>>) -> Result<(), NodeFailure> {
    let mut cancelled = None;
    for result in results {
        match result {
            Ok(()) => {}
            Err(failure) if failure.cancelled => {
                cancelled.get_or_insert(failure);
            }
            Err(failure) => return Err(failure),
        }
    }
    cancelled.map_or(Ok(()), Err)
}

/// Adjacency lookups for one workflow snapshot
struct GraphIndex<'w> {
    nodes: HashMap<NodeId, &'w WorkflowNode>,
    incoming: HashMap<NodeId, Vec<&'w Connection>>,
    outgoing: HashMap<NodeId, Vec<&'w Connection>>,
}

impl<'w> GraphIndex<'w> {
    fn new(workflow: &'w Workflow) -> Self {
        let mut incoming: HashMap<NodeId, Vec<&Connection>> = HashMap::new();
        let mut outgoing: HashMap<NodeId, Vec<&Connection>> = HashMap::new();
        for conn in &workflow.connections {
            incoming.entry(conn.target_node_id).or_default().push(conn);
            outgoing.entry(conn.source_node_id).or_default().push(conn);
        }
        // Group each node's fan-out by output port
        for conns in outgoing.values_mut() {
            conns.sort_by(|a, b| a.source_output_port_id.cmp(&b.source_output_port_id));
        }

        Self {
            nodes: workflow.nodes.iter().map(|n| (n.id, n)).collect(),
            incoming,
            outgoing,
        }
    }

    fn node(&self, id: NodeId) -> Option<&'w WorkflowNode> {
        self.nodes.get(&id).copied()
    }

    fn incoming(&self, id: NodeId) -> &[&'w Connection] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn outgoing(&self, id: NodeId) -> &[&'w Connection] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Mutable state shared by every branch of one run
#[derive(Default)]
struct RunState {
    data: HashMap<NodeId, NodeData>,
    /// Nodes whose stored output is an error marker, with the policy that applied
    failures: HashMap<NodeId, OnError>,
    /// Nodes on a branch not taken
    skipped: HashSet<NodeId>,
    /// Nodes already started or skipped; each is settled at most once
    claimed: HashSet<NodeId>,
    node_executions: Vec<NodeExecution>,
}

impl RunState {
    /// Whether output of `source` travels along a connection leaving `port`
    fn delivers(&self, source: NodeId, port: &str) -> bool {
        match self.failures.get(&source) {
            None => port != ERROR_PORT,
            Some(OnError::ContinueWithError) => true,
            Some(OnError::Continue) => port == ERROR_PORT,
            Some(OnError::Stop) => false,
        }
    }

    /// A producer has settled once it recorded output or was skipped
    fn settled(&self, node: NodeId) -> bool {
        self.data.contains_key(&node) || self.skipped.contains(&node)
    }

    fn carries(&self, conn: &Connection) -> bool {
        self.data.contains_key(&conn.source_node_id)
            && self.delivers(conn.source_node_id, &conn.source_output_port_id)
    }

    fn items_for(&self, conn: &Connection) -> NodeData {
        if !self.carries(conn) {
            return Vec::new();
        }
        self.data
            .get(&conn.source_node_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Dependents decided by one settle pass
#[derive(Debug, Default)]
struct Settled {
    /// Targets to start, each with its input grouped per incoming connection
    ready: Vec<(NodeId, Vec<NodeData>)>,
    skipped: Vec<NodeId>,
}

struct Run<'w> {
    workflow: &'w Workflow,
    execution_id: ExecutionId,
    index: GraphIndex<'w>,
    state: Mutex<RunState>,
    /// Cancelled by the caller or by a branch failing under `stop`
    halt: CancellationToken,
    permits: Option<Semaphore>,
}

impl<'w> Run<'w> {
    fn new(workflow: &'w Workflow, execution_id: ExecutionId, halt: CancellationToken, limit: usize) -> Self {
        Self {
            workflow,
            execution_id,
            index: GraphIndex::new(workflow),
            state: Mutex::new(RunState::default()),
            halt,
            permits: (limit > 0).then(|| Semaphore::new(limit)),
        }
    }

    /// Decide every dependent of `source` whose upstream producers have all
    /// settled. A dependent with at least one delivering connection is
    /// claimed to run; one with none is recorded as skipped, and the skip is
    /// carried on to its own dependents.
    ///
    /// The whole pass happens under one lock, so a join reached from two
    /// branches finishing together is decided exactly once, and the decision
    /// does not depend on which branch finished first.
    async fn settle_dependents(&self, source: NodeId) -> Settled {
        let mut state = self.state.lock().await;
        let mut settled = Settled::default();
        let mut pending = vec![source];

        while let Some(current) = pending.pop() {
            for conn in self.index.outgoing(current) {
                let target = conn.target_node_id;
                if state.claimed.contains(&target) {
                    continue;
                }

                let incoming = self.index.incoming(target);
                if !incoming.iter().all(|c| state.settled(c.source_node_id)) {
                    continue;
                }

                state.claimed.insert(target);
                if incoming.iter().any(|c| state.carries(c)) {
                    let groups = incoming.iter().map(|c| state.items_for(c)).collect();
                    settled.ready.push((target, groups));
                } else {
                    state.skipped.insert(target);
                    state.node_executions.push(NodeExecution::skipped(target));
                    settled.skipped.push(target);
                    pending.push(target);
                }
            }
        }

        settled
    }
}
