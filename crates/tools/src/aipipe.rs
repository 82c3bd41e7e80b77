//! AI Pipe proxy tool.
//!
//! Posts an arbitrary JSON payload to the proxy and hands back its `result`.

use async_trait::async_trait;
use pipeagent_core::error::ToolError;
use pipeagent_core::tool::Tool;
use serde_json::Value;
use tracing::debug;

/// Returned when the proxy answers without a `result`.
pub const NO_RESULT: &str = "No result.";

pub struct AiPipeTool {
    client: reqwest::Client,
    endpoint: String,
}

impl AiPipeTool {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Tool for AiPipeTool {
    fn name(&self) -> &str {
        "aipipe"
    }

    fn label(&self) -> &str {
        "AI Pipe"
    }

    fn fallback(&self) -> &str {
        "AI Pipe failed."
    }

    fn description(&self) -> &str {
        "Send a JSON payload to the AI Pipe proxy and return its result."
    }

    async fn execute(&self, payload: Value) -> Result<String, ToolError> {
        debug!(endpoint = %self.endpoint, "Calling AI Pipe proxy");

        let body: Value = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ToolError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        Ok(match body.get("result") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => NO_RESULT.to_string(),
            Some(other) => other.to_string(),
        })
    }
}
