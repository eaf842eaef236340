use async_trait::async_trait;
use std::collections::HashMap;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use uuid::Uuid;

use crate::definition::Definition;
use crate::runtime::state::WorkflowStatus;

pub mod memory;
pub mod redis_store;

/// 节点执行状态词表 (固定)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeExecutionStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Waiting,
    Skipped,
}

/// 一次工作流执行的持久化记录
/// 追加审计用途，不是可重放的 WAL。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: String,
    pub definition_id: String,
    pub status: WorkflowStatus,
    pub initial_data: HashMap<String, Value>,
    /// GetState 快照的 JSON 形式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(workflow_id: &str, definition_id: &str, initial_data: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.to_string(),
            definition_id: definition_id.to_string(),
            status: WorkflowStatus::Initialized,
            initial_data,
            current_state: None,
            error: None,
            inserted_at: now,
            updated_at: now,
        }
    }
}

/// 单次节点访问的持久化记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow_id: String,
    pub token_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeExecutionStatus,
    pub input_data: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

// --- Interfaces ---

#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn put(&self, definition: &Definition) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Definition>>;
    async fn list(&self) -> Result<Vec<Definition>>;
    async fn remove(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_execution(&self, execution: &Execution) -> Result<()>;
    async fn update_execution(&self, execution: &Execution) -> Result<()>;
    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>>;
    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>>;

    async fn insert_node_execution(&self, node_execution: &NodeExecution) -> Result<()>;
    async fn update_node_execution(&self, node_execution: &NodeExecution) -> Result<()>;
    /// Ordered by started_at, oldest first.
    async fn list_node_executions(&self, execution_id: Uuid) -> Result<Vec<NodeExecution>>;
}
