//! Response interpreter.
//!
//! Turns a raw HTTP exchange into a [`ProviderResponse`] the same way for
//! both wire shapes, and classifies everything else into a
//! [`ProviderError`] whose text is shown to the user.

use pipeagent_core::error::ProviderError;
use pipeagent_core::provider::{ProviderResponse, ToolCall};
use serde::Deserialize;
use serde_json::Value;

use crate::wire::WireShape;

/// Reply text used when the provider returned none.
pub const NO_RESPONSE: &str = "No response.";

/// The parts of an HTTP response the interpreter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Interpret a raw response for the given shape.
pub fn interpret(shape: WireShape, raw: &RawResponse) -> Result<ProviderResponse, ProviderError> {
    match shape {
        WireShape::Chat => interpret_chat(raw),
        WireShape::Generative => interpret_generative(raw),
    }
}

fn interpret_chat(raw: &RawResponse) -> Result<ProviderResponse, ProviderError> {
    // The body is decoded before the status is looked at, so an HTML error
    // page surfaces as a decode failure.
    let value: Value =
        serde_json::from_str(&raw.body).map_err(|e| ProviderError::NotJson(e.to_string()))?;

    if !raw.is_success() {
        return Err(api_error(raw, &value));
    }

    let response: ChatResponse =
        serde_json::from_value(value).map_err(|e| ProviderError::NotJson(e.to_string()))?;

    let message = response
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.message);
    let Some(message) = message else {
        return Ok(ProviderResponse::text(NO_RESPONSE));
    };

    let reply_text = message
        .content
        .as_ref()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_RESPONSE)
        .to_string();

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .iter()
        .filter_map(tool_call)
        .collect();

    Ok(ProviderResponse {
        reply_text,
        tool_calls,
    })
}

fn interpret_generative(raw: &RawResponse) -> Result<ProviderResponse, ProviderError> {
    // This shape assumes a decodable body; a failure here is treated like a
    // broken exchange rather than a protocol answer.
    let value: Value =
        serde_json::from_str(&raw.body).map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !raw.is_success() {
        return Err(api_error(raw, &value));
    }

    let reply_text = value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_RESPONSE)
        .to_string();

    Ok(ProviderResponse::text(reply_text))
}

/// One `tool_calls` entry. Entries without a function name are skipped so a
/// malformed call never hides the reply text.
fn tool_call(entry: &Value) -> Option<ToolCall> {
    let name = entry
        .pointer("/function/name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;

    let arguments = match entry.pointer("/function/arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Some(ToolCall {
        id: entry
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: name.to_string(),
        arguments,
    })
}

/// `error.message` when present, otherwise `"<status> <status text>"`.
fn api_error(raw: &RawResponse, body: &Value) -> ProviderError {
    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", raw.status, raw.status_text).trim_end().to_string());

    ProviderError::Api {
        status_code: raw.status,
        message,
    }
}

// --- Chat-completions response types (internal) ---

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<Value>>,
}
