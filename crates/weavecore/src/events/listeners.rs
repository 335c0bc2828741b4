use super::base::{EventBus, EventKind, EventListener, ExecutionEvent, Subscription};
use tokio::sync::broadcast;

/// Forwards events into a broadcast channel so async consumers can await them
pub struct ChannelListener {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl ChannelListener {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<ExecutionEvent>) {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &ExecutionEvent) {
        // No receivers left is not an error for the run
        let _ = self.sender.send(event.clone());
    }
}

impl EventBus {
    /// Subscribe a channel-backed listener and return its receiving end
    pub fn subscribe_channel(&self, capacity: usize) -> (Subscription, broadcast::Receiver<ExecutionEvent>) {
        let (listener, receiver) = ChannelListener::new(capacity);
        (self.subscribe(listener), receiver)
    }
}

/// Writes every event to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_event(&self, event: &ExecutionEvent) {
        let node = event.node_id.map(|id| id.to_string()).unwrap_or_default();
        match event.kind {
            EventKind::WorkflowError | EventKind::NodeError => tracing::warn!(
                execution_id = %event.execution_id,
                node_id = %node,
                data = ?event.data,
                "{}",
                event.kind
            ),
            _ => tracing::debug!(
                execution_id = %event.execution_id,
                node_id = %node,
                "{}",
                event.kind
            ),
        }
    }
}
