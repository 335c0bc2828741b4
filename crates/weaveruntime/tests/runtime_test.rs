mod common;

use common::{catalog, GraphBuilder, STEP, TRIGGER};
use std::io::Write;
use weavecore::{EffectorContext, EventKind, ExecutionTrigger, NodeDataItem};
use weaveruntime::{EffectorRegistry, Runtime, RuntimeConfig};

fn runtime(config: RuntimeConfig) -> Runtime {
    let mut effectors = EffectorRegistry::new();
    effectors.register_fn(TRIGGER, |_ctx: EffectorContext| async move {
        Ok(vec![NodeDataItem::default().with_field("hello", "world")])
    });
    effectors.register_fn(STEP, |ctx: EffectorContext| async move { Ok(ctx.input) });
    Runtime::new(catalog(), effectors, config)
}

fn simple_workflow() -> weavecore::Workflow {
    let mut graph = GraphBuilder::new();
    let t = graph.node(TRIGGER, "T");
    let a = graph.node(STEP, "A");
    graph.connect(t, a);
    graph.build()
}

#[tokio::test]
async fn test_runtime_keeps_execution_history() {
    let runtime = runtime(RuntimeConfig::default());
    let wf = simple_workflow();

    let first = runtime.execute(&wf, ExecutionTrigger::Manual, None).await;
    let second = runtime.execute(&wf, ExecutionTrigger::Manual, None).await;

    assert!(first.is_success() && second.is_success());
    assert_eq!(runtime.execution(first.id).await.unwrap().id, first.id);

    let history = runtime.executions_for(wf.id).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
}

#[tokio::test]
async fn test_history_is_bounded() {
    let runtime = runtime(RuntimeConfig {
        execution_history_limit: 1,
        ..RuntimeConfig::default()
    });
    let wf = simple_workflow();

    let first = runtime.execute(&wf, ExecutionTrigger::Manual, None).await;
    runtime.execute(&wf, ExecutionTrigger::Manual, None).await;

    assert!(runtime.execution(first.id).await.is_none());
    assert_eq!(runtime.executions_for(wf.id).await.len(), 1);
}

#[tokio::test]
async fn test_execute_stored_workflow() {
    let runtime = runtime(RuntimeConfig::default());
    let mut wf = runtime.manager().create_workflow("stored").await.unwrap();
    let built = simple_workflow();
    wf.nodes = built.nodes;
    wf.connections = built.connections;
    runtime.manager().save_workflow(&mut wf).await.unwrap();

    let execution = runtime
        .execute_workflow(wf.id, ExecutionTrigger::Manual, None)
        .await
        .unwrap();
    assert!(execution.is_success());

    assert!(runtime
        .execute_workflow(uuid::Uuid::new_v4(), ExecutionTrigger::Manual, None)
        .await
        .is_err());
}

#[tokio::test]
async fn test_channel_subscription_receives_events() {
    let runtime = runtime(RuntimeConfig::default());
    let (subscription, mut rx) = runtime.subscribe_channel();

    runtime
        .execute(&simple_workflow(), ExecutionTrigger::Manual, None)
        .await;

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(kinds.first(), Some(&EventKind::WorkflowStart));
    assert_eq!(kinds.last(), Some(&EventKind::WorkflowComplete));

    assert!(subscription.unsubscribe());
    assert_eq!(runtime.event_bus().listener_count(), 0);
}

#[test]
fn test_config_from_json_file() {
    let path = std::env::temp_dir().join(format!("weave-config-{}.json", uuid::Uuid::new_v4()));
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{ "max_parallel_nodes": 2, "execution_history_limit": 5 }}"#).unwrap();

    let config = RuntimeConfig::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.max_parallel_nodes, 2);
    assert_eq!(config.execution_history_limit, 5);
    assert_eq!(config.retry_base_delay_ms, 1000);
    assert!(RuntimeConfig::from_json_file("/definitely/not/here.json").is_err());
}
