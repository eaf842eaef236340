pub mod builder;
pub mod loader;

use std::collections::{HashMap, HashSet};
use serde::{Serialize, Deserialize};
use crate::error::EngineError;

/// 流程定义 (Process Definition)
/// 节点之间只通过 id 互相引用，没有环状所有权。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Definition {
    pub id: String,
    pub name: String,
    pub start_node_id: String,
    pub nodes: Vec<NodeSpec>,
}

/// 节点类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Activity,
    Gateway,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Service,
    User,
    Manual,
    Script,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayType {
    Exclusive,
    Parallel,
    Inclusive,
}

/// 节点配置
/// activity_* 字段只对 Activity 有意义，gateway_* 只对 Gateway 有意义。
/// next_nodes 的声明顺序就是路由的优先顺序。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub next_nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<ActivityType>,
    /// CallableRegistry 中注册的工作函数名。闭包不跨持久化边界。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_fn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_type: Option<GatewayType>,
    /// CallableRegistry 中注册的条件函数名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_fn: Option<String>,
    /// 后继节点 id -> 条件表达式 (evalexpr)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<HashMap<String, String>>,
}

impl NodeSpec {
    pub fn new(id: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            next_nodes: Vec::new(),
            activity_type: None,
            work_fn: None,
            script: None,
            form_fields: Vec::new(),
            gateway_type: None,
            condition_fn: None,
            conditions: None,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity_type.unwrap_or(ActivityType::Service)
    }

    pub fn gateway_type(&self) -> GatewayType {
        self.gateway_type.unwrap_or(GatewayType::Exclusive)
    }
}

/// 用户任务的表单字段描述，原样透传给外部界面
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_field_type() -> String {
    "text".to_string()
}

impl Definition {
    /// Structural validation: unique ids, resolvable references,
    /// and a start_node_id that points at a start node.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(EngineError::DuplicateNode(node.id.clone()));
            }
        }

        let start = self
            .nodes
            .iter()
            .find(|n| n.id == self.start_node_id)
            .ok_or(EngineError::NoStartNode)?;
        if start.kind != NodeKind::Start {
            return Err(EngineError::InvalidDefinition(format!(
                "start_node_id '{}' does not reference a start node",
                self.start_node_id
            )));
        }

        for node in &self.nodes {
            for next in &node.next_nodes {
                if !ids.contains(next.as_str()) {
                    return Err(EngineError::InvalidDefinition(format!(
                        "node '{}' references unknown next node '{}'",
                        node.id, next
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
