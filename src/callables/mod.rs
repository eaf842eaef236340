use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use anyhow::Result;
use serde_json::Value;
use crate::runtime::token::Token;

pub mod builtin;
pub mod http;

/// 工作函数接口：service 活动通过注册名解析到这里
/// 返回值是对令牌数据的右偏合并补丁。
#[async_trait]
pub trait WorkHandler: Send + Sync + Debug {
    fn name(&self) -> &str;
    async fn execute(&self, data: &HashMap<String, Value>) -> Result<HashMap<String, Value>>;
}

/// 条件函数接口：网关对每个候选后继调用一次
pub trait ConditionHandler: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn matches(&self, token: &Token, candidate: &str) -> bool;
}
