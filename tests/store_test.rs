use tokenflow::definition::builder::DefinitionBuilder;
use tokenflow::runtime::state::WorkflowStatus;
use tokenflow::store::memory::{InMemoryDefinitionStore, InMemoryExecutionStore};
use tokenflow::store::redis_store::{RedisDefinitionStore, RedisExecutionStore};
use tokenflow::store::{
    DefinitionStore, Execution, ExecutionStore, NodeExecution, NodeExecutionStatus,
};
use std::collections::HashMap;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn sample_node_execution(execution_id: Uuid, node_id: &str) -> NodeExecution {
    NodeExecution {
        id: Uuid::new_v4(),
        execution_id,
        workflow_id: "store-test".to_string(),
        token_id: Uuid::new_v4(),
        node_id: node_id.to_string(),
        node_type: "service".to_string(),
        status: NodeExecutionStatus::Executing,
        input_data: HashMap::from([("x".to_string(), json!(1))]),
        output_data: None,
        error_message: None,
        started_at: Utc::now(),
        completed_at: None,
        duration_ms: None,
    }
}

#[tokio::test]
async fn test_definition_store_round_trip() {
    let store = InMemoryDefinitionStore::new();
    let definition = DefinitionBuilder::new("stored-flow")
        .start("start")
        .end("end")
        .next("start", "end")
        .build();

    store.put(&definition).await.expect("Put failed");

    let loaded = store
        .get("stored-flow")
        .await
        .expect("Get failed")
        .expect("Definition missing");
    assert_eq!(loaded, definition);

    assert_eq!(store.list().await.expect("List failed").len(), 1);

    store.remove("stored-flow").await.expect("Remove failed");
    assert!(store.get("stored-flow").await.expect("Get failed").is_none());
}

#[tokio::test]
async fn test_execution_store_updates_status() {
    let store = InMemoryExecutionStore::new();

    let mut execution = Execution::new(
        "store-test",
        "store-test",
        HashMap::from([("x".to_string(), json!(1))]),
    );
    store.insert_execution(&execution).await.expect("Insert failed");

    execution.status = WorkflowStatus::Completed;
    execution.updated_at = Utc::now();
    store.update_execution(&execution).await.expect("Update failed");

    let loaded = store
        .get_execution(execution.id)
        .await
        .expect("Get failed")
        .expect("Execution missing");
    assert_eq!(loaded.status, WorkflowStatus::Completed);
    assert_eq!(loaded.initial_data.get("x"), Some(&json!(1)));

    let listed = store.list_executions("store-test").await.expect("List failed");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_node_executions_list_in_start_order() {
    let store = InMemoryExecutionStore::new();
    let execution_id = Uuid::new_v4();

    let mut first = sample_node_execution(execution_id, "start");
    let mut second = sample_node_execution(execution_id, "a");
    second.started_at = first.started_at + chrono::Duration::milliseconds(5);

    // Insert out of order; listing sorts by started_at.
    store.insert_node_execution(&second).await.expect("Insert failed");
    store.insert_node_execution(&first).await.expect("Insert failed");

    first.status = NodeExecutionStatus::Completed;
    first.duration_ms = Some(3);
    store.update_node_execution(&first).await.expect("Update failed");

    let rows = store
        .list_node_executions(execution_id)
        .await
        .expect("List failed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].node_id, "start");
    assert_eq!(rows[0].status, NodeExecutionStatus::Completed);
    assert_eq!(rows[1].node_id, "a");

    // Unknown execution id lists empty.
    assert!(store
        .list_node_executions(Uuid::new_v4())
        .await
        .expect("List failed")
        .is_empty());
}

#[tokio::test]
#[ignore = "requires a local redis at 127.0.0.1:6379"]
async fn test_redis_definition_store_round_trip() {
    let client = redis::Client::open("redis://127.0.0.1:6379/0").expect("Invalid redis URL");
    let store = RedisDefinitionStore::new(client);

    let definition = DefinitionBuilder::new("redis-def-test")
        .start("start")
        .end("end")
        .next("start", "end")
        .build();

    store.put(&definition).await.expect("Put failed");

    let loaded = store
        .get("redis-def-test")
        .await
        .expect("Get failed")
        .expect("Definition missing");
    assert_eq!(loaded, definition);

    let listed = store.list().await.expect("List failed");
    assert!(listed.iter().any(|d| d.id == "redis-def-test"));

    store.remove("redis-def-test").await.expect("Remove failed");
    assert!(store.get("redis-def-test").await.expect("Get failed").is_none());
    let listed = store.list().await.expect("List failed");
    assert!(!listed.iter().any(|d| d.id == "redis-def-test"));
}

#[tokio::test]
#[ignore = "requires a local redis at 127.0.0.1:6379"]
async fn test_redis_execution_store_round_trip() {
    let client = redis::Client::open("redis://127.0.0.1:6379/0").expect("Invalid redis URL");
    let store = RedisExecutionStore::new(client);

    let execution = Execution::new("redis-store-test", "redis-store-test", HashMap::new());
    store.insert_execution(&execution).await.expect("Insert failed");

    let row = sample_node_execution(execution.id, "start");
    store.insert_node_execution(&row).await.expect("Insert failed");

    let loaded = store
        .get_execution(execution.id)
        .await
        .expect("Get failed")
        .expect("Execution missing");
    assert_eq!(loaded.workflow_id, "redis-store-test");

    let rows = store
        .list_node_executions(execution.id)
        .await
        .expect("List failed");
    assert!(rows.iter().any(|r| r.id == row.id));
}
