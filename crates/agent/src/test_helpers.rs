//! Shared test helpers for loop tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipeagent_core::error::{ProviderError, ToolError};
use pipeagent_core::message::{Conversation, Role};
use pipeagent_core::observer::AlertSink;
use pipeagent_core::provider::{Provider, ProviderRequest, ProviderResponse};
use pipeagent_core::session::{AuthCollaborator, AuthProfile, SessionContext, Settings};
use pipeagent_core::tool::{Tool, ToolRegistry};
use pipeagent_tools::{JsPolicy, RunJsTool};

/// A provider that returns a sequence of scripted results and records every
/// request it receives.
///
/// Panics if more calls are made than results provided, unless built with
/// [`ScriptedProvider::repeating`].
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    repeat: Option<ProviderResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain text replies, in order.
    pub fn texts(replies: &[&str]) -> Self {
        Self::new(
            replies
                .iter()
                .map(|r| Ok(ProviderResponse::text(*r)))
                .collect(),
        )
    }

    /// Answer every call with the same text.
    pub fn repeating(reply: &str) -> Self {
        Self {
            repeat: Some(ProviderResponse::text(reply)),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reply) = &self.repeat {
            return Ok(reply.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no result scripted for call #{call}"))
    }
}

/// Records every alert.
#[derive(Default)]
pub struct RecordingAlerts(Mutex<Vec<String>>);

impl RecordingAlerts {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

/// An auth collaborator with a fixed profile that records login hand-offs.
pub struct StaticAuth {
    token: Option<String>,
    logins: Mutex<Vec<String>>,
}

impl StaticAuth {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(String::from),
            logins: Mutex::new(Vec::new()),
        }
    }

    pub fn login_requests(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }
}

impl AuthCollaborator for StaticAuth {
    fn profile(&self) -> AuthProfile {
        AuthProfile {
            token: self.token.clone(),
        }
    }

    fn request_login(&self, login_url: &str) {
        self.logins.lock().unwrap().push(login_url.to_string());
    }
}

/// Offline stand-in for the web search tool. The query `explode` fails.
pub struct FakeSearch;

#[async_trait]
impl Tool for FakeSearch {
    fn name(&self) -> &str {
        "search"
    }
    fn label(&self) -> &str {
        "Search"
    }
    fn fallback(&self) -> &str {
        "Search failed."
    }
    fn description(&self) -> &str {
        "Offline search"
    }
    async fn execute(&self, argument: serde_json::Value) -> Result<String, ToolError> {
        let query = match &argument {
            serde_json::Value::String(s) => s.clone(),
            other => other["query"].as_str().unwrap_or_default().to_string(),
        };
        if query == "explode" {
            return Err(ToolError::Request("exploded".into()));
        }
        Ok(format!("searched: {query}"))
    }
}

/// Fake search plus the real JavaScript sandbox.
pub fn test_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FakeSearch));
    registry.register(Box::new(RunJsTool::new(JsPolicy::default())));
    registry
}

pub fn test_settings() -> Settings {
    Settings::new("https://llm.test/v1", "openai/gpt-4.1-nano")
}

/// A session context whose collaborator always has `token`.
pub fn session_with_token(token: &str) -> (SessionContext, Arc<StaticAuth>) {
    let auth = Arc::new(StaticAuth::new(Some(token)));
    let ctx = SessionContext::new(Arc::new(test_settings()), auth.clone(), "https://login.test/");
    (ctx, auth)
}

pub fn user_conversation(text: &str) -> Conversation {
    let mut conv = Conversation::new();
    conv.add_message(Role::User, text);
    conv
}
