use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use weavecore::{Effector, EffectorContext, NodeData, NodeError};

/// Maps node kinds to the effector that runs them
#[derive(Default)]
pub struct EffectorRegistry {
    effectors: HashMap<String, Arc<dyn Effector>>,
}

impl EffectorRegistry {
    pub fn new() -> Self {
        Self {
            effectors: HashMap::new(),
        }
    }

    /// Register an effector under its own kind, replacing any previous one
    pub fn register(&mut self, effector: Arc<dyn Effector>) {
        let kind = effector.kind().to_string();
        tracing::info!("Registering effector: {}", kind);
        self.effectors.insert(kind, effector);
    }

    /// Register a closure as the effector for `kind`
    pub fn register_fn<F, Fut>(&mut self, kind: impl Into<String>, callback: F)
    where
        F: Fn(EffectorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeData, NodeError>> + Send + 'static,
    {
        let effector = FnEffector {
            kind: kind.into(),
            callback: Box::new(move |ctx| Box::pin(callback(ctx))),
        };
        self.register(Arc::new(effector));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Effector>> {
        self.effectors.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.effectors.contains_key(kind)
    }

    /// All registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.effectors.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

type Callback = Box<dyn Fn(EffectorContext) -> BoxFuture<'static, Result<NodeData, NodeError>> + Send + Sync>;

struct FnEffector {
    kind: String,
    callback: Callback,
}

#[async_trait]
impl Effector for FnEffector {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        (self.callback)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weavecore::{NodeDataItem, NodeId};

    #[tokio::test]
    async fn closure_effector_is_dispatched_by_kind() {
        let mut registry = EffectorRegistry::new();
        registry.register_fn("test.echo", |ctx: EffectorContext| async move { Ok(ctx.input) });

        let effector = registry.get("test.echo").expect("registered");
        let input = vec![NodeDataItem::default().with_field("n", 1)];
        let ctx = EffectorContext::new(NodeId::new_v4(), "test.echo").with_input(input.clone());

        assert_eq!(effector.execute(ctx).await.unwrap(), input);
        assert!(registry.get("test.missing").is_none());
        assert_eq!(registry.kinds(), vec!["test.echo".to_string()]);
    }
}
