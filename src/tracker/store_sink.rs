use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::store::{ExecutionStore, NodeExecution, NodeExecutionStatus};
use crate::tracker::{ExecutionStart, NodeExecutionSink, SinkHandle};

enum SinkOp {
    Insert(NodeExecution),
    Update(NodeExecution),
}

/// 把节点执行事件落到 ExecutionStore
/// 写操作交给后台任务，引擎侧只付一次 channel send 的代价。
/// 尽力交付：后台写失败只记日志。
pub struct StoreSink {
    sender: mpsc::UnboundedSender<SinkOp>,
    // Shadow copies of in-flight rows so updates carry the full record.
    pending: DashMap<SinkHandle, NodeExecution>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                let result = match &op {
                    SinkOp::Insert(record) => store.insert_node_execution(record).await,
                    SinkOp::Update(record) => store.update_node_execution(record).await,
                };
                if let Err(e) = result {
                    let id = match &op {
                        SinkOp::Insert(r) | SinkOp::Update(r) => r.id,
                    };
                    warn!(node_execution_id = %id, error = %e, "Node execution write failed");
                }
            }
        });

        Self {
            sender: tx,
            pending: DashMap::new(),
        }
    }

    fn finish(&self, handle: SinkHandle, update: impl FnOnce(&mut NodeExecution)) {
        if let Some((_, mut record)) = self.pending.remove(&handle) {
            update(&mut record);
            let _ = self.sender.send(SinkOp::Update(record));
        }
    }
}

#[async_trait]
impl NodeExecutionSink for StoreSink {
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

        if self.sender.send(SinkOp::Insert(record.clone())).is_err() {
            warn!(node_id = %record.node_id, "Tracker writer gone, dropping node execution");
            return None;
        }
        self.pending.insert(handle, record);
        Some(handle)
    }

    async fn complete(&self, handle: SinkHandle, output: HashMap<String, Value>) {
        self.finish(handle, |record| {
            let now = Utc::now();
            record.status = NodeExecutionStatus::Completed;
            record.output_data = Some(output);
            record.duration_ms = Some((now - record.started_at).num_milliseconds());
            record.completed_at = Some(now);
        });
    }

    async fn fail(&self, handle: SinkHandle, message: String) {
        self.finish(handle, |record| {
            let now = Utc::now();
            record.status = NodeExecutionStatus::Failed;
            record.error_message = Some(message);
            record.duration_ms = Some((now - record.started_at).num_milliseconds());
            record.completed_at = Some(now);
        });
    }

    async fn mark_waiting(&self, handle: SinkHandle) {
        // Non-terminal: keep the shadow copy for the eventual completion.
        if let Some(mut record) = self.pending.get_mut(&handle) {
            record.status = NodeExecutionStatus::Waiting;
            let _ = self.sender.send(SinkOp::Update(record.clone()));
        }
    }

    async fn mark_skipped(&self, handle: SinkHandle) {
        self.finish(handle, |record| {
            record.status = NodeExecutionStatus::Skipped;
            record.completed_at = Some(Utc::now());
        });
    }
}
