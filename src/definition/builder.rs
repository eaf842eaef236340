use std::collections::HashMap;
use crate::definition::{
    ActivityType, Definition, FormField, GatewayType, NodeKind, NodeSpec,
};

/// Fluent construction of a Definition, mainly for tests and demos.
/// Nodes are declared first, then wired with `next` / `next_when`.
pub struct DefinitionBuilder {
    id: String,
    name: String,
    pub nodes: Vec<NodeSpec>,
    start_node_id: Option<String>,
}

impl DefinitionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            nodes: Vec::new(),
            start_node_id: None,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn start(mut self, id: &str) -> Self {
        if self.start_node_id.is_none() {
            self.start_node_id = Some(id.to_string());
        }
        self.nodes.push(NodeSpec::new(id, NodeKind::Start));
        self
    }

    pub fn end(mut self, id: &str) -> Self {
        self.nodes.push(NodeSpec::new(id, NodeKind::End));
        self
    }

    /// Service activity. An empty work_fn declares a pass-through.
    pub fn service(mut self, id: &str, work_fn: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Activity);
        spec.activity_type = Some(ActivityType::Service);
        if !work_fn.is_empty() {
            spec.work_fn = Some(work_fn.to_string());
        }
        self.nodes.push(spec);
        self
    }

    pub fn script(mut self, id: &str, script: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Activity);
        spec.activity_type = Some(ActivityType::Script);
        spec.script = Some(script.to_string());
        self.nodes.push(spec);
        self
    }

    pub fn user(mut self, id: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Activity);
        spec.activity_type = Some(ActivityType::User);
        self.nodes.push(spec);
        self
    }

    pub fn manual(mut self, id: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Activity);
        spec.activity_type = Some(ActivityType::Manual);
        self.nodes.push(spec);
        self
    }

    pub fn exclusive(mut self, id: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Gateway);
        spec.gateway_type = Some(GatewayType::Exclusive);
        self.nodes.push(spec);
        self
    }

    pub fn parallel(mut self, id: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Gateway);
        spec.gateway_type = Some(GatewayType::Parallel);
        self.nodes.push(spec);
        self
    }

    pub fn inclusive(mut self, id: &str) -> Self {
        let mut spec = NodeSpec::new(id, NodeKind::Gateway);
        spec.gateway_type = Some(GatewayType::Inclusive);
        self.nodes.push(spec);
        self
    }

    /// 给最近声明的用户任务追加表单字段
    pub fn form_field(mut self, name: &str, label: &str, field_type: &str, required: bool) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.form_fields.push(FormField {
                name: name.to_string(),
                label: label.to_string(),
                field_type: field_type.to_string(),
                required,
            });
        }
        self
    }

    /// 给最近声明的网关设置已注册的条件函数
    pub fn condition_fn(mut self, name: &str) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.condition_fn = Some(name.to_string());
        }
        self
    }

    pub fn next(mut self, source: &str, target: &str) -> Self {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == source) {
            node.next_nodes.push(target.to_string());
        }
        self
    }

    /// Connect source -> target guarded by an evalexpr condition over token data.
    pub fn next_when(mut self, source: &str, target: &str, condition: &str) -> Self {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == source) {
            node.next_nodes.push(target.to_string());
            node.conditions
                .get_or_insert_with(HashMap::new)
                .insert(target.to_string(), condition.to_string());
        }
        self
    }

    pub fn build(self) -> Definition {
        Definition {
            id: self.id,
            name: self.name,
            start_node_id: self.start_node_id.unwrap_or_default(),
            nodes: self.nodes,
        }
    }
}
