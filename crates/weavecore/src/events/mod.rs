// crates/weavecore/src/events/mod.rs

mod base;
mod listeners;

pub use base::{EventBus, EventKind, EventListener, ExecutionEvent, Subscription};
pub use listeners::{ChannelListener, TracingListener};
