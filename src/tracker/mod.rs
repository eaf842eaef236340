use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{NodeExecution, NodeExecutionStatus};

pub mod store_sink;

/// 一次节点访问的起始信息
#[derive(Debug, Clone)]
pub struct ExecutionStart {
    pub workflow_id: String,
    pub execution_id: Uuid,
    pub token_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub input_data: HashMap<String, Value>,
}

/// 追踪句柄。Start 失败时返回 None，之后对该次访问的调用全部是空操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(pub Uuid);

/// 节点执行事件的外部观察者
/// 实现不得无限阻塞引擎事件循环；慢消费者应把写操作转交后台任务。
#[async_trait]
pub trait NodeExecutionSink: Send + Sync {
    async fn start(&self, start: ExecutionStart) -> Option<SinkHandle>;
    async fn complete(&self, handle: SinkHandle, output: HashMap<String, Value>);
    async fn fail(&self, handle: SinkHandle, message: String);
    async fn mark_waiting(&self, handle: SinkHandle);
    async fn mark_skipped(&self, handle: SinkHandle);
}

/// 丢弃所有事件
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl NodeExecutionSink for NoopSink {
    async fn start(&self, _start: ExecutionStart) -> Option<SinkHandle> {
        None
    }
    async fn complete(&self, _handle: SinkHandle, _output: HashMap<String, Value>) {}
    async fn fail(&self, _handle: SinkHandle, _message: String) {}
    async fn mark_waiting(&self, _handle: SinkHandle) {}
    async fn mark_skipped(&self, _handle: SinkHandle) {}
}

/// 进程内记录器，测试和 CLI 用
#[derive(Debug, Default)]
pub struct MemorySink {
    records: DashMap<SinkHandle, NodeExecution>,
    order: Mutex<Vec<SinkHandle>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in start order.
    pub fn records(&self) -> Vec<NodeExecution> {
        let order = self.order.lock().unwrap();
        order
            .iter()
            .filter_map(|h| self.records.get(h).map(|r| r.value().clone()))
            .collect()
    }
}

#[async_trait]
impl NodeExecutionSink for MemorySink {
    async fn start(&self, start: ExecutionStart) -> Option<SinkHandle> {
        let record = NodeExecution {
            id: Uuid::new_v4(),
            execution_id: start.execution_id,
            workflow_id: start.workflow_id,
            token_id: start.token_id,
            node_id: start.node_id,
            node_type: start.node_type,
            status: NodeExecutionStatus::Executing,
            input_data: start.input_data,
            output_data: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        };
        let handle = SinkHandle(record.id);
        self.records.insert(handle, record);
        self.order.lock().unwrap().push(handle);
        Some(handle)
    }

    async fn complete(&self, handle: SinkHandle, output: HashMap<String, Value>) {
        if let Some(mut record) = self.records.get_mut(&handle) {
            let now = Utc::now();
            record.status = NodeExecutionStatus::Completed;
            record.output_data = Some(output);
            record.duration_ms = Some((now - record.started_at).num_milliseconds());
            record.completed_at = Some(now);
        }
    }

    async fn fail(&self, handle: SinkHandle, message: String) {
        if let Some(mut record) = self.records.get_mut(&handle) {
            let now = Utc::now();
            record.status = NodeExecutionStatus::Failed;
            record.error_message = Some(message);
            record.duration_ms = Some((now - record.started_at).num_milliseconds());
            record.completed_at = Some(now);
        }
    }

    async fn mark_waiting(&self, handle: SinkHandle) {
        if let Some(mut record) = self.records.get_mut(&handle) {
            record.status = NodeExecutionStatus::Waiting;
        }
    }

    async fn mark_skipped(&self, handle: SinkHandle) {
        if let Some(mut record) = self.records.get_mut(&handle) {
            record.status = NodeExecutionStatus::Skipped;
            record.completed_at = Some(Utc::now());
        }
    }
}
