use async_trait::async_trait;
use std::collections::HashMap;
use anyhow::{Result, anyhow};
use serde_json::Value;
use tracing::info;

use crate::callables::WorkHandler;

#[derive(Debug)]
pub struct LogWork;

#[async_trait]
impl WorkHandler for LogWork {
    fn name(&self) -> &str {
        "log"
    }

    async fn execute(&self, data: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        if let Some(msg) = data.get("message").and_then(|v| v.as_str()) {
            info!("[LOG] {}", msg);
        } else {
            info!("[LOG] {:?}", data);
        }
        Ok(HashMap::new())
    }
}

/// Merges a fixed set of values into the token data.
#[derive(Debug)]
pub struct SetValuesWork {
    name: String,
    values: HashMap<String, Value>,
}

impl SetValuesWork {
    pub fn new(name: &str, values: HashMap<String, Value>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

#[async_trait]
impl WorkHandler for SetValuesWork {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _data: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        Ok(self.values.clone())
    }
}

/// Always fails. Exercises the worker-failure path in demos and tests.
#[derive(Debug)]
pub struct FailWork {
    message: String,
}

impl FailWork {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl WorkHandler for FailWork {
    fn name(&self) -> &str {
        "fail"
    }

    async fn execute(&self, _data: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        Err(anyhow!("{}", self.message))
    }
}
