//! Provider trait: the abstraction over language-model backends.
//!
//! A Provider knows how to send the conversation to an LLM endpoint and
//! interpret the reply into a [`ProviderResponse`], whichever wire shape the
//! endpoint speaks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::session::Settings;

/// Everything needed for one outbound model call.
#[derive(Clone)]
pub struct ProviderRequest {
    /// Endpoint and model, as read at the top of this iteration
    pub settings: Settings,

    /// Bearer token for the `Authorization` header
    pub token: String,

    /// The full history; the provider decides how much of it to send
    pub messages: Vec<Message>,
}

impl std::fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("settings", &self.settings)
            .field("token", &"[REDACTED]")
            .field("messages", &self.messages.len())
            .finish()
    }
}

/// A tool call supplied by the provider in structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID (may be empty)
    #[serde(default)]
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a raw JSON string
    #[serde(default)]
    pub arguments: String,
}

/// A successfully interpreted provider reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The assistant's text, or `"No response."` when the provider sent none
    pub reply_text: String,

    /// Structured tool calls (chat-completions shape only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ProviderResponse {
    pub fn text(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` once per iteration without knowing
/// which wire shape is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get the interpreted reply.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
