use async_trait::async_trait;
use std::collections::HashMap;
use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use reqwest::Client;

use crate::callables::WorkHandler;

/// Calls out over HTTP, driven by the token data:
/// `url` (required), `method`, `body`, `headers`.
/// The response lands back in the data under `response`.
#[derive(Debug)]
pub struct HttpWork {
    client: Client,
}

impl HttpWork {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkHandler for HttpWork {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, data: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let url = data.get("url").and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing required data key: url"))?;

        let method_str = data.get("method").and_then(|v| v.as_str()).unwrap_or("GET");
        let method = method_str.parse::<reqwest::Method>()
            .map_err(|_| anyhow!("Invalid HTTP method: {}", method_str))?;

        let mut builder = self.client.request(method, url);

        if let Some(body) = data.get("body") {
            builder = builder.json(body);
        }

        if let Some(headers) = data.get("headers").and_then(|v| v.as_object()) {
            for (k, v) in headers {
                if let Some(v_str) = v.as_str() {
                    builder = builder.header(k, v_str);
                }
            }
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let body = match response.json::<Value>().await {
            Ok(json) => json,
            Err(_) => Value::Null,
        };

        let mut patch = HashMap::new();
        patch.insert("response".to_string(), json!({
            "status": status,
            "data": body
        }));
        Ok(patch)
    }
}
