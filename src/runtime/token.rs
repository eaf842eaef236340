use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use uuid::Uuid;

/// 流程令牌 (Token)
/// 携带数据沿图流动的最小单位。更新永远返回新值，不原地修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub id: Uuid,
    pub data: HashMap<String, Value>,
    /// 当前所在节点。只在首次 forward 之前为 None。
    pub current_node: Option<String>,
    /// 最近一次移动时间 (UTC, 毫秒精度)
    pub moved_at: DateTime<Utc>,
    /// 并行分裂的血缘：子令牌记录产生它的令牌 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
}

impl Token {
    pub fn new(data: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            current_node: None,
            moved_at: Utc::now(),
            parent: None,
        }
    }

    /// Move the token onto a node, returning the updated copy.
    pub fn move_to(&self, node_id: &str) -> Token {
        Token {
            current_node: Some(node_id.to_string()),
            moved_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Right-biased merge: keys in `patch` win. Nested maps are replaced,
    /// not deep-merged.
    pub fn merge(&self, patch: HashMap<String, Value>) -> Token {
        let mut data = self.data.clone();
        data.extend(patch);
        Token {
            data,
            moved_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Branch copy for a parallel split: fresh id, same data,
    /// parent pointing back at this token.
    pub fn child(&self) -> Token {
        Token {
            id: Uuid::new_v4(),
            parent: Some(self.id),
            ..self.clone()
        }
    }
}
