use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tracing::info;
use tracing_subscriber;

use tokenflow::api::ActivityApi;
use tokenflow::callables::builtin::LogWork;
use tokenflow::callables::http::HttpWork;
use tokenflow::definition::loader::load_definition_from_file;
use tokenflow::runtime::engine::Engine;
use tokenflow::runtime::registry::{CallableRegistry, EngineRegistry};
use tokenflow::runtime::state::WorkflowStatus;
use tokenflow::store::redis_store::RedisExecutionStore;
use tokenflow::store::{Execution, ExecutionStore};
use tokenflow::tracker::store_sink::StoreSink;
use tokenflow::tracker::{MemorySink, NodeExecutionSink};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a definition until it completes or pauses
    Run {
        /// Path to the definition file (YAML or JSON)
        #[arg(long, short)]
        file: PathBuf,

        /// Initial token data (key=value)
        #[arg(long, short = 'D', value_parser = parse_key_val)]
        data: Vec<(String, serde_json::Value)>,

        /// Redis URL; when set, node executions are persisted there
        #[arg(long)]
        redis: Option<String>,

        /// Seconds to wait for the workflow to settle
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Load and validate a definition file
    Validate {
        /// Path to the definition file (YAML or JSON)
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, serde_json::Value), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    let key = s[..pos].to_string();
    let val_str = &s[pos + 1..];
    // Try parsing as JSON, otherwise treat as string
    let val = serde_json::from_str(val_str).unwrap_or_else(|_| serde_json::Value::String(val_str.to_string()));
    Ok((key, val))
}

fn standard_callables() -> Arc<CallableRegistry> {
    let registry = CallableRegistry::new();
    registry.register_work(Arc::new(LogWork));
    registry.register_work(Arc::new(HttpWork::new()));
    Arc::new(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => {
            let definition = load_definition_from_file(file.to_str().unwrap())?;
            info!(
                definition_id = %definition.id,
                nodes = definition.nodes.len(),
                "Definition is valid"
            );
        }

        Commands::Run { file, data, redis, timeout } => {
            let definition = load_definition_from_file(file.to_str().unwrap())?;
            let callables = standard_callables();
            let initial_data: HashMap<_, _> = data.into_iter().collect();

            // Pick the tracker sink: in-memory by default, redis-backed on request.
            let memory_sink = Arc::new(MemorySink::new());
            let mut execution_store: Option<Arc<RedisExecutionStore>> = None;
            let sink: Arc<dyn NodeExecutionSink> = match &redis {
                Some(url) => {
                    let client = redis::Client::open(url.as_str())?;
                    let store = Arc::new(RedisExecutionStore::new(client));
                    execution_store = Some(store.clone());
                    Arc::new(StoreSink::new(store))
                }
                None => memory_sink.clone(),
            };

            let engine = Engine::from_definition(&definition, callables, sink).await?;
            let engines = Arc::new(EngineRegistry::new());
            engines.insert(engine.clone());
            let api = ActivityApi::new(engines);

            let mut execution = Execution::new(&definition.id, &definition.id, initial_data.clone());
            // Share the engine's execution id so node execution rows link up.
            execution.id = engine.state().await?.execution_id;
            if let Some(store) = &execution_store {
                store.insert_execution(&execution).await?;
            }

            let token_id = engine.start_workflow(initial_data).await?;
            info!(token_id = %token_id, "Workflow started");

            let summary = engine
                .wait_for(
                    &[WorkflowStatus::Completed, WorkflowStatus::Waiting],
                    Duration::from_secs(timeout),
                )
                .await?;

            println!("workflow:  {}", summary.workflow_id);
            println!("status:    {}", summary.status);
            println!("active:    {}", summary.active_count);
            println!("waiting:   {}", summary.waiting_count);
            println!("completed: {}", summary.completed_count);

            let state = engine.state().await?;
            println!("\nhistory (newest first):");
            for entry in &state.history {
                println!("  {}  {}  {}", entry.at.format("%H:%M:%S%.3f"), entry.node_id, entry.token_id);
            }

            if summary.status == WorkflowStatus::Waiting {
                println!("\nwaiting activities:");
                for activity in api.list_waiting(&definition.id, None).await? {
                    println!("  {} at {} since {}", activity.token_id, activity.node_id, activity.since);
                }
            }

            if let Some(store) = &execution_store {
                execution.status = summary.status;
                execution.current_state = Some(serde_json::to_value(&state)?);
                execution.updated_at = chrono::Utc::now();
                store.update_execution(&execution).await?;
                info!(execution_id = %execution.id, "Execution persisted to redis");
            } else {
                println!("\nnode executions:");
                for row in memory_sink.records() {
                    println!(
                        "  {}  {}  {:?}  {}ms",
                        row.node_id,
                        row.node_type,
                        row.status,
                        row.duration_ms.unwrap_or(0)
                    );
                }
            }
        }
    }

    Ok(())
}
