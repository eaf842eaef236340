use std::sync::Arc;
use dashmap::DashMap;
use crate::callables::{ConditionHandler, WorkHandler};
use crate::runtime::engine::EngineHandle;

/// 按名字解析工作函数/条件函数
/// 定义文档里只出现名字，函数本体在进程内注册。
#[derive(Debug, Default)]
pub struct CallableRegistry {
    work: DashMap<String, Arc<dyn WorkHandler>>,
    conditions: DashMap<String, Arc<dyn ConditionHandler>>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_work(&self, handler: Arc<dyn WorkHandler>) {
        self.work.insert(handler.name().to_string(), handler);
    }

    pub fn register_condition(&self, handler: Arc<dyn ConditionHandler>) {
        self.conditions.insert(handler.name().to_string(), handler);
    }

    pub fn work(&self, name: &str) -> Option<Arc<dyn WorkHandler>> {
        self.work.get(name).map(|h| h.value().clone())
    }

    pub fn condition(&self, name: &str) -> Option<Arc<dyn ConditionHandler>> {
        self.conditions.get(name).map(|h| h.value().clone())
    }
}

/// workflow id -> 引擎句柄
/// 每个进程一张表即可，不做跨进程命名。
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: DashMap<String, EngineHandle>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: EngineHandle) {
        self.engines.insert(handle.workflow_id().to_string(), handle);
    }

    pub fn get(&self, workflow_id: &str) -> Option<EngineHandle> {
        self.engines.get(workflow_id).map(|h| h.value().clone())
    }

    pub fn remove(&self, workflow_id: &str) -> Option<EngineHandle> {
        self.engines.remove(workflow_id).map(|(_, h)| h)
    }

    pub fn workflow_ids(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.key().clone()).collect()
    }
}
