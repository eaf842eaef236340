use async_trait::async_trait;
use crate::definition::NodeSpec;
use crate::nodes::Worker;
use crate::runtime::message::EngineMailbox;
use crate::runtime::token::Token;

/// 开始事件：把令牌交给每个后继。
/// 多个 next_nodes 等价于一次隐式并行分裂，令牌按值复制。
#[derive(Debug)]
pub struct StartEventWorker {
    id: String,
    next_nodes: Vec<String>,
    engine: EngineMailbox,
}

impl StartEventWorker {
    pub fn new(spec: &NodeSpec, engine: EngineMailbox) -> Self {
        Self {
            id: spec.id.clone(),
            next_nodes: spec.next_nodes.clone(),
            engine,
        }
    }
}

#[async_trait]
impl Worker for StartEventWorker {
    async fn on_execute(&mut self, token: Token) {
        let token = token.move_to(&self.id);
        self.engine.node_executed(&self.id, token.clone(), None);
        for (i, next) in self.next_nodes.iter().enumerate() {
            let branch = if i == 0 { token.clone() } else { token.child() };
            self.engine.forward(next, branch);
        }
    }
}

/// 结束事件：终结令牌，没有后继。
#[derive(Debug)]
pub struct EndEventWorker {
    id: String,
    engine: EngineMailbox,
}

impl EndEventWorker {
    pub fn new(spec: &NodeSpec, engine: EngineMailbox) -> Self {
        Self {
            id: spec.id.clone(),
            engine,
        }
    }
}

#[async_trait]
impl Worker for EndEventWorker {
    async fn on_execute(&mut self, token: Token) {
        let token = token.move_to(&self.id);
        self.engine.node_executed(&self.id, token.clone(), None);
        self.engine.workflow_completed(&self.id, token);
    }
}
