use async_trait::async_trait;
use std::collections::HashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::definition::{ActivityType, NodeKind, NodeSpec};
use crate::error::EngineError;
use crate::runtime::message::{EngineMailbox, NodeHandle, NodeMsg, WaitingActivity};
use crate::runtime::registry::CallableRegistry;
use crate::runtime::token::Token;

pub mod activity;
pub mod event;
pub mod eval;
pub mod gateway;

/// 节点工作者接口
/// 每个工作者独占一个收件箱，状态只被自己的任务修改。
#[async_trait]
pub(crate) trait Worker: Send {
    /// Execute 入口：先 move_to 自己，再做本地处理并向引擎回发事件
    async fn on_execute(&mut self, token: Token);

    /// 外部完成。只有 user/manual 活动覆盖此方法。
    async fn on_complete(
        &mut self,
        token_id: Uuid,
        data: HashMap<String, Value>,
    ) -> Result<Token, EngineError> {
        let _ = data;
        Err(EngineError::TokenNotWaiting(token_id))
    }

    fn waiting_snapshot(&self) -> Vec<WaitingActivity> {
        Vec::new()
    }
}

/// Spawn the worker task for a node spec and hand back its mailbox.
/// Callable names are resolved and condition expressions compiled here,
/// so a bad reference fails AddNode instead of a token at runtime.
pub fn spawn_worker(
    spec: &NodeSpec,
    engine: EngineMailbox,
    callables: &CallableRegistry,
) -> Result<NodeHandle, EngineError> {
    let worker: Box<dyn Worker> = match spec.kind {
        NodeKind::Start => Box::new(event::StartEventWorker::new(spec, engine)),
        NodeKind::End => Box::new(event::EndEventWorker::new(spec, engine)),
        NodeKind::Activity => Box::new(activity::ActivityWorker::new(spec, engine, callables)?),
        NodeKind::Gateway => Box::new(gateway::GatewayWorker::new(spec, engine, callables)?),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_worker(worker, rx));
    Ok(NodeHandle::new(tx))
}

async fn run_worker(mut worker: Box<dyn Worker>, mut rx: mpsc::UnboundedReceiver<NodeMsg>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            NodeMsg::Execute(token) => worker.on_execute(token).await,
            NodeMsg::Complete { token_id, data, reply } => {
                let _ = reply.send(worker.on_complete(token_id, data).await);
            }
            NodeMsg::WaitingTokens { reply } => {
                let _ = reply.send(worker.waiting_snapshot());
            }
        }
    }
}

/// Tracker row label: activities report their variant, other kinds their kind.
pub fn type_label(spec: &NodeSpec) -> String {
    match spec.kind {
        NodeKind::Start => "start".to_string(),
        NodeKind::End => "end".to_string(),
        NodeKind::Gateway => "gateway".to_string(),
        NodeKind::Activity => match spec.activity_type() {
            ActivityType::Service => "service".to_string(),
            ActivityType::User => "user".to_string(),
            ActivityType::Manual => "manual".to_string(),
            ActivityType::Script => "script".to_string(),
        },
    }
}
