//! Built-in tool implementations for PipeAgent.
//!
//! Three tools give the agent a way out of the conversation:
//! look something up on the web, evaluate a JavaScript expression in a
//! sandbox, and hand a payload to the AI Pipe proxy.

pub mod aipipe;
pub mod run_js;
pub mod search;

use std::time::Duration;

use pipeagent_config::ToolsConfig;
use pipeagent_core::error::ToolError;
use pipeagent_core::tool::ToolRegistry;
use serde_json::Value;

pub use aipipe::AiPipeTool;
pub use run_js::{JsPolicy, JsSandbox, RunJsTool};
pub use search::SearchTool;

/// Create the registry with every built-in tool, wired from config.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let client = http_client(Duration::from_secs(config.timeout_secs))?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchTool::new(
        client.clone(),
        config.search_endpoint.clone(),
    )));
    registry.register(Box::new(RunJsTool::new(JsPolicy::from(&config.js))));
    registry.register(Box::new(AiPipeTool::new(
        client,
        config.aipipe_endpoint.clone(),
    )));
    Ok(registry)
}

/// Shared HTTP client for the network-backed tools.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ToolError::Request(format!("failed to create HTTP client: {e}")))
}

/// Pull a text argument out of either a bare string or `{"<key>": "..."}`.
///
/// Pattern-matched calls pass strings; structured calls pass objects.
pub(crate) fn text_argument(argument: &Value, key: &str) -> Result<String, ToolError> {
    match argument {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}' argument"))),
        other => Err(ToolError::InvalidArguments(format!(
            "expected a string or an object with '{key}', got {other}"
        ))),
    }
}
