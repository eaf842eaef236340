use async_trait::async_trait;
use anyhow::Result;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::definition::Definition;
use crate::store::{DefinitionStore, Execution, ExecutionStore, NodeExecution};

pub struct RedisDefinitionStore {
    client: redis::Client,
}

impl RedisDefinitionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn def_key(&self, id: &str) -> String {
        format!("tokenflow:def:{}", id)
    }

    fn index_key(&self) -> &'static str {
        "tokenflow:def:index"
    }
}

#[async_trait]
impl DefinitionStore for RedisDefinitionStore {
    async fn put(&self, definition: &Definition) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(definition)?;
        let _: () = conn.set(self.def_key(&definition.id), serialized).await?;
        let _: () = conn.sadd(self.index_key(), &definition.id).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Definition>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized: Option<String> = conn.get(self.def_key(id)).await?;
        match serialized {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Definition>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ids: Vec<String> = conn.smembers(self.index_key()).await?;

        let mut definitions = Vec::with_capacity(ids.len());
        for id in ids {
            let serialized: Option<String> = conn.get(self.def_key(&id)).await?;
            if let Some(s) = serialized {
                definitions.push(serde_json::from_str(&s)?);
            }
        }
        Ok(definitions)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(self.def_key(id)).await?;
        let _: () = conn.srem(self.index_key(), id).await?;
        Ok(())
    }
}

pub struct RedisExecutionStore {
    client: redis::Client,
}

impl RedisExecutionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn exec_key(&self, id: Uuid) -> String {
        format!("tokenflow:exec:{}", id)
    }

    fn index_key(&self, workflow_id: &str) -> String {
        format!("tokenflow:wf:{}:executions", workflow_id)
    }

    fn nodes_key(&self, execution_id: Uuid) -> String {
        format!("tokenflow:exec:{}:nodes", execution_id)
    }
}

#[async_trait]
impl ExecutionStore for RedisExecutionStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(execution)?;
        let _: () = conn.set(self.exec_key(execution.id), serialized).await?;
        let _: () = conn
            .sadd(self.index_key(&execution.workflow_id), execution.id.to_string())
            .await?;
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(execution)?;
        let _: () = conn.set(self.exec_key(execution.id), serialized).await?;
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized: Option<String> = conn.get(self.exec_key(id)).await?;
        match serialized {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ids: Vec<String> = conn.smembers(self.index_key(workflow_id)).await?;

        let mut executions = Vec::with_capacity(ids.len());
        for id in ids {
            let id: Uuid = id.parse()?;
            let serialized: Option<String> = conn.get(self.exec_key(id)).await?;
            if let Some(s) = serialized {
                executions.push(serde_json::from_str(&s)?);
            }
        }
        executions.sort_by_key(|e: &Execution| e.inserted_at);
        Ok(executions)
    }

    async fn insert_node_execution(&self, node_execution: &NodeExecution) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(node_execution)?;
        let _: () = conn
            .hset(
                self.nodes_key(node_execution.execution_id),
                node_execution.id.to_string(),
                serialized,
            )
            .await?;
        Ok(())
    }

    async fn update_node_execution(&self, node_execution: &NodeExecution) -> Result<()> {
        self.insert_node_execution(node_execution).await
    }

    async fn list_node_executions(&self, execution_id: Uuid) -> Result<Vec<NodeExecution>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let values: Vec<String> = conn.hvals(self.nodes_key(execution_id)).await?;

        let mut rows = Vec::with_capacity(values.len());
        for v in values {
            rows.push(serde_json::from_str::<NodeExecution>(&v)?);
        }
        rows.sort_by_key(|r| r.started_at);
        Ok(rows)
    }
}
