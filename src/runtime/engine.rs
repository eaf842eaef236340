use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::definition::{ActivityType, Definition, NodeKind, NodeSpec};
use crate::error::EngineError;
use crate::nodes;
use crate::runtime::message::{EngineMailbox, EngineMsg, NodeHandle, SYNC_TIMEOUT};
use crate::runtime::registry::CallableRegistry;
use crate::runtime::state::{
    EngineSnapshot, EngineState, StatusSummary, WaitingEntry, WorkflowStatus,
};
use crate::runtime::token::Token;
use crate::tracker::{ExecutionStart, NodeExecutionSink, SinkHandle};

/// 节点表条目
struct NodeEntry {
    handle: NodeHandle,
    /// 外部完成型活动 (user/manual)：追踪句柄要活过暂停
    pauses: bool,
    type_label: String,
}

/// 单实例协调者
/// 拥有全部执行状态；工作者只通过消息与它交互。
/// 状态只在引擎自己的任务里被修改。
pub struct Engine {
    state: EngineState,
    nodes: HashMap<String, NodeEntry>,
    start_node_id: Option<String>,
    callables: Arc<CallableRegistry>,
    sink: Arc<dyn NodeExecutionSink>,
    /// 这次引擎运行对应的执行记录 id
    execution_id: Uuid,
    /// (node id, token id) -> 进行中的追踪句柄
    node_executions: HashMap<(String, Uuid), SinkHandle>,
    mailbox: EngineMailbox,
}

impl Engine {
    /// Spawn the engine task and return its handle.
    pub fn spawn(
        workflow_id: &str,
        callables: Arc<CallableRegistry>,
        sink: Arc<dyn NodeExecutionSink>,
    ) -> EngineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let mailbox = EngineMailbox::new(tx.clone());

        let engine = Engine {
            state: EngineState::new(workflow_id.to_string()),
            nodes: HashMap::new(),
            start_node_id: None,
            callables,
            sink,
            execution_id: Uuid::new_v4(),
            node_executions: HashMap::new(),
            mailbox,
        };
        tokio::spawn(engine.run(rx));

        EngineHandle {
            workflow_id: workflow_id.to_string(),
            sender: tx,
        }
    }

    /// Validate a definition, spawn an engine for it and register every node.
    pub async fn from_definition(
        definition: &Definition,
        callables: Arc<CallableRegistry>,
        sink: Arc<dyn NodeExecutionSink>,
    ) -> Result<EngineHandle, EngineError> {
        definition.validate()?;
        let handle = Engine::spawn(&definition.id, callables, sink);
        // The engine adopts the first start node it sees; register the
        // declared entry node ahead of the rest.
        let entry_first = definition
            .nodes
            .iter()
            .filter(|n| n.id == definition.start_node_id)
            .chain(definition.nodes.iter().filter(|n| n.id != definition.start_node_id));
        for spec in entry_first {
            handle.add_node(spec.clone()).await?;
        }
        Ok(handle)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                EngineMsg::AddNode { spec, reply } => {
                    let _ = reply.send(self.handle_add_node(spec));
                }
                EngineMsg::StartWorkflow { data, reply } => {
                    let _ = reply.send(self.handle_start_workflow(data));
                }
                EngineMsg::GetState { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                EngineMsg::GetStatus { reply } => {
                    let _ = reply.send(self.summary());
                }
                EngineMsg::GetNodeHandle { node_id, reply } => {
                    let _ = reply.send(self.nodes.get(&node_id).map(|e| e.handle.clone()));
                }
                EngineMsg::ForwardToken { node_id, token } => {
                    self.handle_forward(node_id, token).await;
                }
                EngineMsg::NodeExecuted { node_id, token, error } => {
                    self.handle_node_executed(node_id, token, error).await;
                }
                EngineMsg::ActivityWaiting { node_id, token } => {
                    self.handle_activity_waiting(node_id, token).await;
                }
                EngineMsg::ActivityCompleted { node_id, token } => {
                    self.handle_activity_completed(node_id, token).await;
                }
                EngineMsg::WorkflowCompleted { node_id, token } => {
                    self.handle_workflow_completed(node_id, token);
                }
            }
        }
    }

    fn handle_add_node(&mut self, spec: NodeSpec) -> Result<(), EngineError> {
        if self.nodes.contains_key(&spec.id) {
            return Err(EngineError::DuplicateNode(spec.id));
        }

        let handle = nodes::spawn_worker(&spec, self.mailbox.clone(), &self.callables)?;

        if spec.kind == NodeKind::Start {
            if self.start_node_id.is_none() {
                self.start_node_id = Some(spec.id.clone());
            } else {
                warn!(
                    workflow_id = %self.state.workflow_id,
                    node_id = %spec.id,
                    "Additional start node registered, keeping the first"
                );
            }
        }

        let pauses = spec.kind == NodeKind::Activity
            && matches!(spec.activity_type(), ActivityType::User | ActivityType::Manual);

        self.nodes.insert(
            spec.id.clone(),
            NodeEntry {
                handle,
                pauses,
                type_label: nodes::type_label(&spec),
            },
        );
        Ok(())
    }

    fn handle_start_workflow(
        &mut self,
        data: HashMap<String, Value>,
    ) -> Result<Uuid, EngineError> {
        let start = self.start_node_id.clone().ok_or(EngineError::NoStartNode)?;

        let token = Token::new(data);
        info!(
            workflow_id = %self.state.workflow_id,
            token_id = %token.id,
            "Workflow started"
        );

        self.state.active_tokens.insert(token.id, token.clone());
        self.state.status = WorkflowStatus::Running;
        // Self-directed forward; the worker runs after this handler returns.
        self.mailbox.forward(&start, token.clone());
        Ok(token.id)
    }

    async fn handle_forward(&mut self, node_id: String, token: Token) {
        let entry = match self.nodes.get(&node_id) {
            Some(entry) => entry,
            None => {
                // 路由指向缺失节点：丢弃令牌，该分支静默终止
                warn!(
                    workflow_id = %self.state.workflow_id,
                    node_id = %node_id,
                    token_id = %token.id,
                    "Forward to unknown node, dropping token"
                );
                self.state.active_tokens.remove(&token.id);
                self.state.recompute_status();
                return;
            }
        };

        // Census entry point for branch tokens minted by splits.
        self.state.active_tokens.insert(token.id, token.clone());
        self.state.recompute_status();

        let started = self
            .sink
            .start(ExecutionStart {
                workflow_id: self.state.workflow_id.clone(),
                execution_id: self.execution_id,
                token_id: token.id,
                node_id: node_id.clone(),
                node_type: entry.type_label.clone(),
                input_data: token.data.clone(),
            })
            .await;
        if let Some(handle) = started {
            self.node_executions.insert((node_id.clone(), token.id), handle);
        }

        entry.handle.execute(token);
    }

    async fn handle_node_executed(
        &mut self,
        node_id: String,
        token: Token,
        error: Option<String>,
    ) {
        self.state.record_history(&node_id, token.id);

        let pauses = self.nodes.get(&node_id).map(|e| e.pauses).unwrap_or(false);
        if pauses {
            // 句柄留给 ActivityCompleted，落库行要带合并后的输出
        } else if let Some(handle) = self.node_executions.remove(&(node_id.clone(), token.id)) {
            match error {
                Some(message) => self.sink.fail(handle, message).await,
                None => self.sink.complete(handle, token.data.clone()).await,
            }
        }

        // Refresh the census copy with the post-execution data.
        if let Some(active) = self.state.active_tokens.get_mut(&token.id) {
            *active = token;
        }
    }

    async fn handle_activity_waiting(&mut self, node_id: String, token: Token) {
        self.state.active_tokens.remove(&token.id);
        self.state
            .waiting_tokens
            .insert(token.id, (node_id.clone(), token.clone()));
        self.state.recompute_status();

        if let Some(handle) = self.node_executions.get(&(node_id.clone(), token.id)).copied() {
            self.sink.mark_waiting(handle).await;
        }

        info!(
            workflow_id = %self.state.workflow_id,
            node_id = %node_id,
            token_id = %token.id,
            "Token waiting for external completion"
        );
    }

    async fn handle_activity_completed(&mut self, node_id: String, token: Token) {
        if self.state.waiting_tokens.remove(&token.id).is_none() {
            warn!(
                workflow_id = %self.state.workflow_id,
                node_id = %node_id,
                token_id = %token.id,
                "Completion for a token that was not waiting"
            );
        }
        self.state.active_tokens.insert(token.id, token.clone());
        self.state.recompute_status();

        if let Some(handle) = self.node_executions.remove(&(node_id, token.id)) {
            self.sink.complete(handle, token.data.clone()).await;
        }
    }

    fn handle_workflow_completed(&mut self, node_id: String, token: Token) {
        self.state.active_tokens.remove(&token.id);
        info!(
            workflow_id = %self.state.workflow_id,
            node_id = %node_id,
            token_id = %token.id,
            "Token reached end event"
        );
        self.state.completed_tokens.push(token);
        self.state.recompute_status();

        if self.state.status == WorkflowStatus::Completed {
            info!(
                workflow_id = %self.state.workflow_id,
                completed = self.state.completed_tokens.len(),
                "Workflow completed"
            );
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            workflow_id: self.state.workflow_id.clone(),
            execution_id: self.execution_id,
            status: self.state.status,
            active_tokens: self.state.active_tokens.values().cloned().collect(),
            waiting_tokens: self
                .state
                .waiting_tokens
                .values()
                .map(|(node_id, token)| WaitingEntry {
                    node_id: node_id.clone(),
                    token: token.clone(),
                })
                .collect(),
            completed_tokens: self.state.completed_tokens.clone(),
            history: self.state.history.iter().cloned().collect(),
        }
    }

    fn summary(&self) -> StatusSummary {
        StatusSummary {
            workflow_id: self.state.workflow_id.clone(),
            status: self.state.status,
            active_count: self.state.active_tokens.len(),
            waiting_count: self.state.waiting_tokens.len(),
            completed_count: self.state.completed_tokens.len(),
            node_count: self.nodes.len(),
        }
    }
}

/// 引擎句柄：同步操作走 oneshot 请求/应答，超时返回 Timeout。
#[derive(Debug, Clone)]
pub struct EngineHandle {
    workflow_id: String,
    sender: mpsc::UnboundedSender<EngineMsg>,
}

impl EngineHandle {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    async fn request<T>(
        &self,
        msg: EngineMsg,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, EngineError> {
        self.sender.send(msg).map_err(|_| EngineError::EngineClosed)?;
        match timeout(SYNC_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(EngineError::EngineClosed),
            Err(_) => Err(EngineError::Timeout),
        }
    }

    pub async fn add_node(&self, spec: NodeSpec) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(EngineMsg::AddNode { spec, reply: tx }, rx).await?
    }

    pub async fn start_workflow(
        &self,
        data: HashMap<String, Value>,
    ) -> Result<Uuid, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(EngineMsg::StartWorkflow { data, reply: tx }, rx).await?
    }

    pub async fn state(&self) -> Result<EngineSnapshot, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(EngineMsg::GetState { reply: tx }, rx).await
    }

    pub async fn status(&self) -> Result<StatusSummary, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(EngineMsg::GetStatus { reply: tx }, rx).await
    }

    pub async fn node_handle(&self, node_id: &str) -> Result<NodeHandle, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            EngineMsg::GetNodeHandle {
                node_id: node_id.to_string(),
                reply: tx,
            },
            rx,
        )
        .await?
        .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))
    }

    /// Poll until the engine settles into one of the given statuses.
    pub async fn wait_for(
        &self,
        statuses: &[WorkflowStatus],
        deadline: Duration,
    ) -> Result<StatusSummary, EngineError> {
        let started = tokio::time::Instant::now();
        loop {
            let summary = self.status().await?;
            if statuses.contains(&summary.status) {
                return Ok(summary);
            }
            if started.elapsed() >= deadline {
                return Err(EngineError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
