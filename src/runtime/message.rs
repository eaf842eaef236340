use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use uuid::Uuid;

use crate::definition::{ActivityType, FormField, NodeSpec};
use crate::error::EngineError;
use crate::runtime::state::{EngineSnapshot, StatusSummary};
use crate::runtime::token::Token;

/// Bound on every synchronous request/response exchange. Expiry surfaces
/// EngineError::Timeout and leaves engine state untouched.
pub(crate) const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// 引擎收件箱消息
/// 同步操作带 oneshot 回执，事件类消息单向流动。
#[derive(Debug)]
pub enum EngineMsg {
    AddNode {
        spec: NodeSpec,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    StartWorkflow {
        data: HashMap<String, Value>,
        reply: oneshot::Sender<Result<Uuid, EngineError>>,
    },
    GetState {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    GetStatus {
        reply: oneshot::Sender<StatusSummary>,
    },
    GetNodeHandle {
        node_id: String,
        reply: oneshot::Sender<Option<NodeHandle>>,
    },
    ForwardToken {
        node_id: String,
        token: Token,
    },
    NodeExecuted {
        node_id: String,
        token: Token,
        /// Set when the node's work function failed; the token carries the
        /// poisoned data and keeps flowing.
        error: Option<String>,
    },
    ActivityWaiting {
        node_id: String,
        token: Token,
    },
    ActivityCompleted {
        node_id: String,
        token: Token,
    },
    WorkflowCompleted {
        node_id: String,
        token: Token,
    },
}

/// 节点收件箱消息
#[derive(Debug)]
pub enum NodeMsg {
    Execute(Token),
    Complete {
        token_id: Uuid,
        data: HashMap<String, Value>,
        reply: oneshot::Sender<Result<Token, EngineError>>,
    },
    WaitingTokens {
        reply: oneshot::Sender<Vec<WaitingActivity>>,
    },
}

/// 挂起令牌的对外快照 (ActivityAPI 的列表条目)
#[derive(Debug, Clone, Serialize)]
pub struct WaitingActivity {
    pub token_id: Uuid,
    pub node_id: String,
    pub data: HashMap<String, Value>,
    pub since: DateTime<Utc>,
    pub activity_type: ActivityType,
    pub form_fields: Vec<FormField>,
}

/// 节点句柄：指向某个节点工作者的发送端
#[derive(Debug, Clone)]
pub struct NodeHandle {
    sender: mpsc::UnboundedSender<NodeMsg>,
}

impl NodeHandle {
    pub(crate) fn new(sender: mpsc::UnboundedSender<NodeMsg>) -> Self {
        Self { sender }
    }

    /// Non-blocking dispatch of a token onto the worker's mailbox.
    pub fn execute(&self, token: Token) {
        let _ = self.sender.send(NodeMsg::Execute(token));
    }

    /// External completion of a paused activity (sync call).
    pub async fn complete(
        &self,
        token_id: Uuid,
        data: HashMap<String, Value>,
    ) -> Result<Token, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(NodeMsg::Complete { token_id, data, reply: tx })
            .map_err(|_| EngineError::EngineClosed)?;
        match timeout(SYNC_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::EngineClosed),
            Err(_) => Err(EngineError::Timeout),
        }
    }

    pub async fn waiting_tokens(&self) -> Result<Vec<WaitingActivity>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(NodeMsg::WaitingTokens { reply: tx })
            .map_err(|_| EngineError::EngineClosed)?;
        match timeout(SYNC_TIMEOUT, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(EngineError::EngineClosed),
            Err(_) => Err(EngineError::Timeout),
        }
    }
}

/// 工作者向引擎回传事件的出口
/// 所有发送都是非阻塞的；同一个处理流程内的发送顺序被保留。
#[derive(Debug, Clone)]
pub struct EngineMailbox {
    sender: mpsc::UnboundedSender<EngineMsg>,
}

impl EngineMailbox {
    pub(crate) fn new(sender: mpsc::UnboundedSender<EngineMsg>) -> Self {
        Self { sender }
    }

    pub fn forward(&self, node_id: &str, token: Token) {
        let _ = self.sender.send(EngineMsg::ForwardToken {
            node_id: node_id.to_string(),
            token,
        });
    }

    pub fn node_executed(&self, node_id: &str, token: Token, error: Option<String>) {
        let _ = self.sender.send(EngineMsg::NodeExecuted {
            node_id: node_id.to_string(),
            token,
            error,
        });
    }

    pub fn activity_waiting(&self, node_id: &str, token: Token) {
        let _ = self.sender.send(EngineMsg::ActivityWaiting {
            node_id: node_id.to_string(),
            token,
        });
    }

    pub fn activity_completed(&self, node_id: &str, token: Token) {
        let _ = self.sender.send(EngineMsg::ActivityCompleted {
            node_id: node_id.to_string(),
            token,
        });
    }

    pub fn workflow_completed(&self, node_id: &str, token: Token) {
        let _ = self.sender.send(EngineMsg::WorkflowCompleted {
            node_id: node_id.to_string(),
            token,
        });
    }
}
