use crate::{ExecutionId, NodeId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Lifecycle points reported during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "workflow:start")]
    WorkflowStart,
    #[serde(rename = "workflow:complete")]
    WorkflowComplete,
    #[serde(rename = "workflow:error")]
    WorkflowError,
    #[serde(rename = "node:start")]
    NodeStart,
    #[serde(rename = "node:complete")]
    NodeComplete,
    #[serde(rename = "node:error")]
    NodeError,
    #[serde(rename = "node:retry")]
    NodeRetry,
    #[serde(rename = "node:skipped")]
    NodeSkipped,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::WorkflowStart => "workflow:start",
            EventKind::WorkflowComplete => "workflow:complete",
            EventKind::WorkflowError => "workflow:error",
            EventKind::NodeStart => "node:start",
            EventKind::NodeComplete => "node:complete",
            EventKind::NodeError => "node:error",
            EventKind::NodeRetry => "node:retry",
            EventKind::NodeSkipped => "node:skipped",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted during workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub workflow_id: WorkflowId,
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(kind: EventKind, workflow_id: WorkflowId, execution_id: ExecutionId) -> Self {
        Self {
            kind,
            workflow_id,
            execution_id,
            node_id: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Observer of execution events
///
/// Listeners are called synchronously on the emitting task, so they should
/// hand off anything slow (see [`ChannelListener`](super::ChannelListener)).
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

impl<F> EventListener for F
where
    F: Fn(&ExecutionEvent) + Send + Sync,
{
    fn on_event(&self, event: &ExecutionEvent) {
        self(event)
    }
}

type ListenerList = Vec<(u64, Arc<dyn EventListener>)>;

#[derive(Default)]
struct BusInner {
    listeners: RwLock<ListenerList>,
    next_id: AtomicU64,
}

/// In-process publish/subscribe of execution events
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl EventListener + 'static) -> Subscription {
        self.subscribe_arc(Arc::new(listener))
    }

    pub fn subscribe_arc(&self, listener: Arc<dyn EventListener>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, listener));

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every listener. A listener that panics is logged
    /// and skipped; the others still receive the event.
    pub fn emit(&self, event: ExecutionEvent) {
        let snapshot: ListenerList = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))).is_err() {
                tracing::warn!("Event listener {} panicked while handling {}", id, event.kind);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Detach the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let mut listeners = bus
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}
