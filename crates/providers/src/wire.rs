//! Provider request builder.
//!
//! Given the current settings and the whole history, produce exactly one
//! outbound request. The two shapes differ in how much history they carry:
//! chat-completions replays every message, generative-content sends only the
//! most recent one. That asymmetry mirrors the two provider contracts and is
//! kept as is.

use pipeagent_core::message::{Message, Role};
use pipeagent_core::session::Settings;
use serde::Serialize;

/// Model prefixes served by the generative-content shape.
pub const GENERATIVE_MODEL_PREFIXES: &[&str] = &["google/gemini"];

/// Base URL fragments that identify a generative-content endpoint.
pub const GENERATIVE_URL_FRAGMENTS: &[&str] = &["geminiv1beta"];

/// The two request/response shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// `POST {base}/chat/completions` with `{model, messages}`
    Chat,
    /// `POST {base}` with `{contents: [{parts: [{text}]}]}`
    Generative,
}

impl WireShape {
    /// Pick the shape for these settings.
    pub fn select(settings: &Settings) -> Self {
        let generative_model = GENERATIVE_MODEL_PREFIXES
            .iter()
            .any(|prefix| settings.model.starts_with(prefix));
        let generative_url = GENERATIVE_URL_FRAGMENTS
            .iter()
            .any(|fragment| settings.base_url.contains(fragment));

        if generative_model || generative_url {
            WireShape::Generative
        } else {
            WireShape::Chat
        }
    }
}

impl std::fmt::Display for WireShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireShape::Chat => write!(f, "chat"),
            WireShape::Generative => write!(f, "generative"),
        }
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub shape: WireShape,
    pub url: String,
    pub body: serde_json::Value,
}

/// Build the outbound request for the current settings and history.
pub fn build_request(settings: &Settings, messages: &[Message]) -> OutboundRequest {
    match WireShape::select(settings) {
        WireShape::Chat => OutboundRequest {
            shape: WireShape::Chat,
            url: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            body: serde_json::json!({
                "model": settings.model,
                "messages": to_chat_messages(messages),
            }),
        },
        WireShape::Generative => {
            let text = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            let contents = vec![GenerativeContent {
                parts: vec![GenerativePart { text }],
            }];
            OutboundRequest {
                shape: WireShape::Generative,
                url: settings.base_url.clone(),
                body: serde_json::json!({ "contents": contents }),
            }
        }
    }
}

/// Map history onto chat-completions roles. The protocol has no `tool`
/// role here, so everything that isn't the user is the assistant.
fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: match m.role {
                Role::User => "user",
                Role::Agent | Role::Tool => "assistant",
            },
            content: &m.content,
        })
        .collect()
}

// --- Wire types (outbound) ---

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerativeContent<'a> {
    parts: Vec<GenerativePart<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerativePart<'a> {
    text: &'a str,
}
