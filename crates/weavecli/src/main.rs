use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use weavecore::{
    EventKind, ExecutionStatus, ExecutionTrigger, NodeData, NodeDataItem, NodeId, NodeStatus,
    Position, TracingListener, Workflow, MAIN_PORT,
};
use weaveruntime::{InMemoryWorkflowStore, Runtime, RuntimeConfig, WorkflowManager};

#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Weave workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Seed data: a JSON object (one item) or an array of objects
        #[arg(short, long)]
        input: Option<String>,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node kinds
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            config,
            verbose,
        } => {
            init_logging(verbose);
            run_workflow(&file, input.as_deref(), config.as_deref(), verbose).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a workflow document", file.display()))
}

/// An object becomes one item, an array of objects one item each
fn parse_seed(input: &str) -> Result<NodeData> {
    match serde_json::from_str::<Value>(input)? {
        Value::Object(map) => Ok(vec![NodeDataItem::new(map)]),
        Value::Array(values) => values
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => Ok(NodeDataItem::new(map)),
                _ => bail!("Input array must contain only JSON objects"),
            })
            .collect(),
        _ => bail!("Input must be a JSON object or an array of objects"),
    }
}

async fn run_workflow(
    file: &Path,
    input: Option<&str>,
    config: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let seed = input.map(parse_seed).transpose()?;
    let config = match config {
        Some(path) => RuntimeConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let (catalog, registry) = weavenodes::builtins();
    let runtime = Runtime::new(catalog, registry, config);
    let _trace = verbose.then(|| runtime.subscribe(TracingListener));

    // Subscribe to events for real-time output
    let (subscription, mut events) = runtime.subscribe_channel();
    let names: HashMap<NodeId, String> = workflow
        .nodes
        .iter()
        .map(|n| (n.id, format!("{} ({})", n.name, n.kind)))
        .collect();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let node = event
                .node_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_default();
            let detail = |key: &str| event.data.as_ref().and_then(|d| d.get(key)).cloned();

            match event.kind {
                EventKind::WorkflowStart => println!("▶️  Workflow started"),
                EventKind::NodeStart => println!("  ⚡ Starting node: {}", node),
                EventKind::NodeComplete => {
                    let count = detail("itemCount").unwrap_or(json!(0));
                    println!("  ✅ Node {} completed with {} item(s)", node, count);
                }
                EventKind::NodeRetry => {
                    let attempt = detail("attempt").unwrap_or(Value::Null);
                    println!("  🔁 Node {} retrying after attempt {}", node, attempt);
                }
                EventKind::NodeError => {
                    let error = detail("error").unwrap_or(Value::Null);
                    println!("  ❌ Node {} failed: {}", node, error);
                }
                EventKind::NodeSkipped => println!("  ⏭️  Node {} skipped", node),
                EventKind::WorkflowComplete => {
                    let duration = detail("durationMs").unwrap_or(Value::Null);
                    println!("✨ Workflow completed successfully in {}ms", duration);
                }
                EventKind::WorkflowError => {
                    let error = detail("error").unwrap_or(Value::Null);
                    println!("💥 Workflow failed: {}", error);
                }
            }
        }
    });

    let execution = runtime
        .execute(&workflow, ExecutionTrigger::Manual, seed)
        .await;

    // Dropping the listener closes the channel and ends the printer
    subscription.unsubscribe();
    event_task.await?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution.id);
    println!("   Status: {:?}", execution.status);
    println!(
        "   Completed: {}/{} nodes",
        execution
            .node_executions
            .iter()
            .filter(|n| n.status == NodeStatus::Success)
            .count(),
        workflow.nodes.len()
    );

    let leaves: Vec<_> = workflow
        .nodes
        .iter()
        .filter(|n| workflow.outgoing(n.id).next().is_none())
        .filter_map(|n| execution.data.get(&n.id).map(|data| (n, data)))
        .collect();
    if !leaves.is_empty() {
        println!();
        println!("📤 Outputs:");
        for (node, data) in leaves {
            println!("   {}:", node.name);
            for item in data {
                println!("     {}", serde_json::to_string(item)?);
            }
        }
    }

    if execution.status == ExecutionStatus::Error {
        let message = execution
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("Workflow failed: {}", message);
    }
    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let (catalog, _) = weavenodes::builtins();

    if let Err(err) = weaveruntime::validate(&workflow, &catalog) {
        println!("❌ Workflow is invalid:");
        for issue in err.issues() {
            println!("   - {}", issue);
        }
        bail!("{} validation issue(s)", err.issues().len());
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Kinds:");
    println!();

    let (catalog, _) = weavenodes::builtins();
    for definition in catalog.list() {
        println!("  • {} ({:?})", definition.kind, definition.category);
        println!("    {}", definition.description);
        for parameter in &definition.parameters {
            println!("      - {} = {}", parameter.id, parameter.default);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let (catalog, _) = weavenodes::builtins();
    let manager = WorkflowManager::new(
        std::sync::Arc::new(catalog),
        std::sync::Arc::new(InMemoryWorkflowStore::new()),
    );

    let mut workflow = Workflow::new("Example Scene Workflow");
    workflow.metadata.insert(
        "description".to_string(),
        json!("Splits a list of scenes and keeps the long ones"),
    );

    let mut scenes = serde_json::Map::new();
    scenes.insert(
        "values".to_string(),
        json!({ "scenes": [
            { "title": "Intro", "seconds": 4 },
            { "title": "Chase", "seconds": 12 },
            { "title": "Finale", "seconds": 9 }
        ] }),
    );
    let mut long_only = serde_json::Map::new();
    long_only.insert("field".to_string(), json!("seconds"));
    long_only.insert("operation".to_string(), json!("greater_than"));
    long_only.insert("value".to_string(), json!(5));
    let mut split = serde_json::Map::new();
    split.insert("field".to_string(), json!("scenes"));

    let start = manager.add_node(&mut workflow, weavenodes::MANUAL_TRIGGER, Position::new(100.0, 100.0), Some("Start"), None)?;
    let set = manager.add_node(&mut workflow, weavenodes::SET, Position::new(300.0, 100.0), Some("Scenes"), Some(scenes))?;
    let split = manager.add_node(&mut workflow, weavenodes::SPLIT_OUT, Position::new(500.0, 100.0), None, Some(split))?;
    let keep = manager.add_node(&mut workflow, weavenodes::CONDITION, Position::new(700.0, 100.0), Some("Long Scenes"), Some(long_only))?;
    let log = manager.add_node(&mut workflow, weavenodes::DEBUG, Position::new(900.0, 100.0), None, None)?;

    for (source, target) in [(start, set), (set, split), (split, keep), (keep, log)] {
        manager
            .add_connection(&mut workflow, source, MAIN_PORT, target, MAIN_PORT)
            .context("Example connection rejected")?;
    }
    manager.validate(&workflow)?;

    std::fs::write(output, manager.export_json(&workflow)?)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  weave run --file {}", output.display());

    Ok(())
}
