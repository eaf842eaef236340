use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::callables::WorkHandler;
use crate::definition::{ActivityType, FormField, NodeSpec};
use crate::error::EngineError;
use crate::nodes::{eval, Worker};
use crate::runtime::message::{EngineMailbox, WaitingActivity};
use crate::runtime::registry::CallableRegistry;
use crate::runtime::token::Token;

/// 活动节点
/// service/script 同步执行；user/manual 挂起令牌，等外部 Complete。
/// 工作函数失败不会打垮工作者：错误写进令牌数据，流程继续。
#[derive(Debug)]
pub struct ActivityWorker {
    id: String,
    activity_type: ActivityType,
    work: Option<Arc<dyn WorkHandler>>,
    script: Option<String>,
    form_fields: Vec<FormField>,
    next_nodes: Vec<String>,
    /// 本地挂起表：token id -> 挂起时的令牌
    waiting: HashMap<Uuid, Token>,
    engine: EngineMailbox,
}

impl ActivityWorker {
    pub fn new(
        spec: &NodeSpec,
        engine: EngineMailbox,
        callables: &CallableRegistry,
    ) -> Result<Self, EngineError> {
        let work = match &spec.work_fn {
            Some(name) => Some(
                callables
                    .work(name)
                    .ok_or_else(|| EngineError::UnknownCallable(name.clone()))?,
            ),
            None => None,
        };

        Ok(Self {
            id: spec.id.clone(),
            activity_type: spec.activity_type(),
            work,
            script: spec.script.clone(),
            form_fields: spec.form_fields.clone(),
            next_nodes: spec.next_nodes.clone(),
            waiting: HashMap::new(),
            engine,
        })
    }

    fn forward_all(&self, token: &Token) {
        // More than one successor is an implicit split; branches beyond the
        // first get their own token id.
        for (i, next) in self.next_nodes.iter().enumerate() {
            let branch = if i == 0 { token.clone() } else { token.child() };
            self.engine.forward(next, branch);
        }
    }

    /// Run the work unit and fold a failure into the token data.
    async fn run_work(&self, token: &Token) -> (Token, Option<String>) {
        let outcome = match (&self.work, &self.script) {
            (Some(handler), _) => handler.execute(&token.data).await,
            (None, Some(script)) => eval::apply_script(script, &token.data),
            (None, None) => Ok(HashMap::new()), // pass through
        };

        match outcome {
            Ok(patch) => (token.merge(patch), None),
            Err(e) => {
                let msg = e.to_string();
                warn!(node_id = %self.id, error = %msg, "Work function failed, poisoning token data");
                let mut patch = HashMap::new();
                patch.insert("error".to_string(), Value::String(msg.clone()));
                (token.merge(patch), Some(msg))
            }
        }
    }
}

#[async_trait]
impl Worker for ActivityWorker {
    async fn on_execute(&mut self, token: Token) {
        let token = token.move_to(&self.id);

        match self.activity_type {
            ActivityType::Service | ActivityType::Script => {
                let (token, error) = self.run_work(&token).await;
                self.engine.node_executed(&self.id, token.clone(), error);
                self.forward_all(&token);
            }
            ActivityType::User | ActivityType::Manual => {
                self.waiting.insert(token.id, token.clone());
                self.engine.node_executed(&self.id, token.clone(), None);
                self.engine.activity_waiting(&self.id, token);
            }
        }
    }

    async fn on_complete(
        &mut self,
        token_id: Uuid,
        data: HashMap<String, Value>,
    ) -> Result<Token, EngineError> {
        let stored = self
            .waiting
            .remove(&token_id)
            .ok_or(EngineError::TokenNotFound(token_id))?;

        let token = stored.merge(data);
        info!(node_id = %self.id, token_id = %token_id, "Activity completed externally");

        // 顺序约定：先让引擎恢复令牌，再转发后继
        self.engine.activity_completed(&self.id, token.clone());
        self.forward_all(&token);
        Ok(token)
    }

    fn waiting_snapshot(&self) -> Vec<WaitingActivity> {
        self.waiting
            .values()
            .map(|token| WaitingActivity {
                token_id: token.id,
                node_id: self.id.clone(),
                data: token.data.clone(),
                since: token.moved_at,
                activity_type: self.activity_type,
                form_fields: self.form_fields.clone(),
            })
            .collect()
    }
}
