use std::collections::{HashMap, VecDeque};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;
use crate::runtime::token::Token;

/// 执行状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initialized,
    Running,
    Waiting,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Waiting => "waiting",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub node_id: String,
    pub token_id: Uuid,
}

/// 引擎私有状态。只在引擎自己的任务里被修改。
/// 不变式：一个令牌 id 任一时刻至多出现在
/// active / waiting / completed 三者之一。
#[derive(Debug)]
pub struct EngineState {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub active_tokens: HashMap<Uuid, Token>,
    /// token id -> (node id, token)，挂起在外部完成型活动上的令牌
    pub waiting_tokens: HashMap<Uuid, (String, Token)>,
    pub completed_tokens: Vec<Token>,
    /// 最新在前的有界历史
    pub history: VecDeque<HistoryEntry>,
}

/// History ring cap. Entries beyond this are discarded oldest-first.
pub const HISTORY_CAP: usize = 1000;

impl EngineState {
    pub fn new(workflow_id: String) -> Self {
        Self {
            workflow_id,
            status: WorkflowStatus::Initialized,
            active_tokens: HashMap::new(),
            waiting_tokens: HashMap::new(),
            completed_tokens: Vec::new(),
            history: VecDeque::new(),
        }
    }

    /// The single status rule, evaluated after every mutation.
    pub fn recompute_status(&mut self) {
        if !self.active_tokens.is_empty() {
            self.status = WorkflowStatus::Running;
        } else if !self.waiting_tokens.is_empty() {
            self.status = WorkflowStatus::Waiting;
        } else if !self.completed_tokens.is_empty() {
            self.status = WorkflowStatus::Completed;
        }
        // No tokens at all: leave as-is (initialized).
    }

    pub fn record_history(&mut self, node_id: &str, token_id: Uuid) {
        self.history.push_front(HistoryEntry {
            at: Utc::now(),
            node_id: node_id.to_string(),
            token_id,
        });
        self.history.truncate(HISTORY_CAP);
    }
}

/// 对外快照，GetState 的返回值
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub workflow_id: String,
    /// 本次引擎运行的执行记录 id；节点执行行通过它关联
    pub execution_id: Uuid,
    pub status: WorkflowStatus,
    pub active_tokens: Vec<Token>,
    pub waiting_tokens: Vec<WaitingEntry>,
    pub completed_tokens: Vec<Token>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitingEntry {
    pub node_id: String,
    pub token: Token,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub active_count: usize,
    pub waiting_count: usize,
    pub completed_count: usize,
    pub node_count: usize,
}
