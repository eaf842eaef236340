use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::EngineError;
use crate::runtime::engine::EngineHandle;
use crate::runtime::message::WaitingActivity;
use crate::runtime::registry::EngineRegistry;
use crate::runtime::state::StatusSummary;
use crate::runtime::token::Token;

/// 外部完成桥 (ActivityAPI)
/// 把 (workflow, node, token) 三元组解析成一次活动完成。
/// REST 层只是这里的薄封装。
pub struct ActivityApi {
    engines: Arc<EngineRegistry>,
}

impl ActivityApi {
    pub fn new(engines: Arc<EngineRegistry>) -> Self {
        Self { engines }
    }

    fn engine(&self, workflow_id: &str) -> Result<EngineHandle, EngineError> {
        self.engines
            .get(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))
    }

    /// Complete a paused activity with user data.
    pub async fn complete_activity(
        &self,
        workflow_id: &str,
        node_id: &str,
        token_id: Uuid,
        data: HashMap<String, Value>,
    ) -> Result<Token, EngineError> {
        let engine = self.engine(workflow_id)?;

        // 1. Snapshot the engine state and locate the pause.
        let state = engine.state().await?;
        let entry = state
            .waiting_tokens
            .iter()
            .find(|e| e.token.id == token_id)
            .ok_or(EngineError::TokenNotWaiting(token_id))?;

        // 2. The token must be paused at the node the caller named.
        if entry.node_id != node_id {
            return Err(EngineError::TokenAtDifferentNode {
                token_id,
                actual: entry.node_id.clone(),
                requested: node_id.to_string(),
            });
        }

        // 3. Hand over to the worker holding the token.
        let node = engine.node_handle(node_id).await?;
        node.complete(token_id, data).await
    }

    /// Legacy synonym for complete_activity.
    pub async fn trigger_user_task(
        &self,
        workflow_id: &str,
        node_id: &str,
        token_id: Uuid,
        data: HashMap<String, Value>,
    ) -> Result<Token, EngineError> {
        self.complete_activity(workflow_id, node_id, token_id, data).await
    }

    /// Enumerate paused activities, optionally narrowed to one node.
    pub async fn list_waiting(
        &self,
        workflow_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<WaitingActivity>, EngineError> {
        let engine = self.engine(workflow_id)?;
        let state = engine.state().await?;

        let mut node_ids: Vec<String> = state
            .waiting_tokens
            .iter()
            .map(|e| e.node_id.clone())
            .filter(|id| node_id.map(|n| n == id.as_str()).unwrap_or(true))
            .collect();
        node_ids.sort();
        node_ids.dedup();

        let mut waiting = Vec::new();
        for id in node_ids {
            let node = engine.node_handle(&id).await?;
            waiting.extend(node.waiting_tokens().await?);
        }
        Ok(waiting)
    }

    pub async fn status(&self, workflow_id: &str) -> Result<StatusSummary, EngineError> {
        self.engine(workflow_id)?.status().await
    }
}
