use async_trait::async_trait;
use anyhow::Result;
use dashmap::DashMap;
use uuid::Uuid;

use crate::definition::Definition;
use crate::store::{DefinitionStore, Execution, ExecutionStore, NodeExecution};

// --- In-Memory Implementations ---

#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    definitions: DashMap<String, Definition>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn put(&self, definition: &Definition) -> Result<()> {
        self.definitions.insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Definition>> {
        Ok(self.definitions.get(id).map(|d| d.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Definition>> {
        Ok(self.definitions.iter().map(|d| d.value().clone()).collect())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.definitions.remove(id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: DashMap<Uuid, Execution>,
    // Map<ExecutionId, Map<NodeExecutionId, Record>>
    node_executions: DashMap<Uuid, DashMap<Uuid, NodeExecution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        self.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<()> {
        self.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>> {
        Ok(self.executions.get(&id).map(|e| e.value().clone()))
    }

    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>> {
        let mut executions: Vec<Execution> = self
            .executions
            .iter()
            .filter(|e| e.value().workflow_id == workflow_id)
            .map(|e| e.value().clone())
            .collect();
        executions.sort_by_key(|e| e.inserted_at);
        Ok(executions)
    }

    async fn insert_node_execution(&self, node_execution: &NodeExecution) -> Result<()> {
        let rows = self
            .node_executions
            .entry(node_execution.execution_id)
            .or_insert_with(DashMap::new);
        rows.insert(node_execution.id, node_execution.clone());
        Ok(())
    }

    async fn update_node_execution(&self, node_execution: &NodeExecution) -> Result<()> {
        self.insert_node_execution(node_execution).await
    }

    async fn list_node_executions(&self, execution_id: Uuid) -> Result<Vec<NodeExecution>> {
        let mut rows: Vec<NodeExecution> = match self.node_executions.get(&execution_id) {
            Some(rows) => rows.iter().map(|r| r.value().clone()).collect(),
            None => Vec::new(),
        };
        rows.sort_by_key(|r| r.started_at);
        Ok(rows)
    }
}
