use thiserror::Error;
use uuid::Uuid;

/// 引擎错误分类
/// API 层需要按类匹配 (如 TokenNotWaiting / TokenAtDifferentNode)，
/// 所以这里用枚举而不是 anyhow。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("workflow has no start node")]
    NoStartNode,

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("unknown callable: {0}")]
    UnknownCallable(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("token not found: {0}")]
    TokenNotFound(Uuid),

    #[error("token {0} is not waiting")]
    TokenNotWaiting(Uuid),

    #[error("token {token_id} is waiting at node {actual}, not {requested}")]
    TokenAtDifferentNode {
        token_id: Uuid,
        actual: String,
        requested: String,
    },

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid expression '{expr}': {message}")]
    InvalidExpression { expr: String, message: String },

    #[error("operation timed out")]
    Timeout,

    #[error("engine mailbox closed")]
    EngineClosed,
}
