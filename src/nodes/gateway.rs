use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use evalexpr::{DefaultNumericTypes, Node as EvalNode};
use tracing::warn;

use crate::callables::ConditionHandler;
use crate::definition::{GatewayType, NodeSpec};
use crate::error::EngineError;
use crate::nodes::{eval, Worker};
use crate::runtime::message::EngineMailbox;
use crate::runtime::registry::CallableRegistry;
use crate::runtime::token::Token;

/// 网关路由条件，spawn 时解析/编译一次
#[derive(Debug)]
enum GatewayCondition {
    /// 无条件：任何候选都算匹配
    Open,
    Callable(Arc<dyn ConditionHandler>),
    /// 候选 id -> (编译后的表达式, 原文)
    Expressions(HashMap<String, (EvalNode<DefaultNumericTypes>, String)>),
}

impl GatewayCondition {
    fn matches(&self, token: &Token, candidate: &str) -> bool {
        match self {
            GatewayCondition::Open => !candidate.is_empty(),
            GatewayCondition::Callable(handler) => handler.matches(token, candidate),
            GatewayCondition::Expressions(map) => map
                .get(candidate)
                .map(|(tree, raw)| eval::eval_condition(tree, raw, &token.data))
                .unwrap_or(false),
        }
    }
}

/// 网关：只路由，从不挂起。
#[derive(Debug)]
pub struct GatewayWorker {
    id: String,
    gateway_type: GatewayType,
    next_nodes: Vec<String>,
    condition: GatewayCondition,
    engine: EngineMailbox,
}

impl GatewayWorker {
    pub fn new(
        spec: &NodeSpec,
        engine: EngineMailbox,
        callables: &CallableRegistry,
    ) -> Result<Self, EngineError> {
        let condition = if let Some(name) = &spec.condition_fn {
            let handler = callables
                .condition(name)
                .ok_or_else(|| EngineError::UnknownCallable(name.clone()))?;
            GatewayCondition::Callable(handler)
        } else if let Some(exprs) = &spec.conditions {
            let mut compiled = HashMap::new();
            for (target, expr) in exprs {
                compiled.insert(target.clone(), (eval::compile(expr)?, expr.clone()));
            }
            GatewayCondition::Expressions(compiled)
        } else {
            GatewayCondition::Open
        };

        Ok(Self {
            id: spec.id.clone(),
            gateway_type: spec.gateway_type(),
            next_nodes: spec.next_nodes.clone(),
            condition,
            engine,
        })
    }

    /// 排他：按声明顺序取第一个命中者；全不命中退回第一个后继。
    fn route_exclusive(&self, token: &Token) {
        for next in &self.next_nodes {
            if self.condition.matches(token, next) {
                self.engine.forward(next, token.clone());
                return;
            }
        }

        match self.next_nodes.first() {
            Some(first) => {
                warn!(
                    node_id = %self.id,
                    fallback = %first,
                    "No exclusive condition matched, falling back to first successor"
                );
                self.engine.forward(first, token.clone());
            }
            None => {
                warn!(node_id = %self.id, "Exclusive gateway has no successors, dropping token");
            }
        }
    }

    /// 并行：无条件扇出到全部后继。
    /// 第一个分支沿用原令牌 id，其余分支拿新 id 并记录父令牌。
    fn route_parallel(&self, token: &Token) {
        for (i, next) in self.next_nodes.iter().enumerate() {
            let branch = if i == 0 { token.clone() } else { token.child() };
            self.engine.forward(next, branch);
        }
    }

    /// 包含：转发给所有命中的后继；全不命中时转发给全部。
    fn route_inclusive(&self, token: &Token) {
        let matched: Vec<&String> = self
            .next_nodes
            .iter()
            .filter(|next| self.condition.matches(token, next))
            .collect();

        let targets: Vec<&String> = if matched.is_empty() {
            self.next_nodes.iter().collect()
        } else {
            matched
        };

        for (i, next) in targets.iter().enumerate() {
            let branch = if i == 0 { token.clone() } else { token.child() };
            self.engine.forward(next, branch);
        }
    }
}

#[async_trait]
impl Worker for GatewayWorker {
    async fn on_execute(&mut self, token: Token) {
        let token = token.move_to(&self.id);
        self.engine.node_executed(&self.id, token.clone(), None);

        match self.gateway_type {
            GatewayType::Exclusive => self.route_exclusive(&token),
            GatewayType::Parallel => self.route_parallel(&token),
            GatewayType::Inclusive => self.route_inclusive(&token),
        }
    }
}
