//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeagent_config::AgentConfig;
use pipeagent_core::error::{AgentError, AuthError};
use pipeagent_core::message::{Conversation, Role};
use pipeagent_core::observer::{AlertSink, LogAlertSink};
use pipeagent_core::provider::{Provider, ProviderRequest, ToolCall};
use pipeagent_core::session::SessionContext;
use pipeagent_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::invocation::{self, ToolInvocation};

/// What a turn produced when it ended with an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The final reply text
    pub answer: String,

    /// Number of provider calls made
    pub iterations: u32,

    /// Every tool action taken, in order
    pub actions: Vec<ToolInvocation>,

    /// Structured tool calls the provider asked for that were not executed
    pub pending_tool_calls: Vec<ToolCall>,
}

/// The core agent loop that orchestrates provider calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Where recoverable failures are reported
    alerts: Arc<dyn AlertSink>,

    /// Maximum provider calls per turn
    max_iterations: u32,

    /// Wall-clock budget per turn
    turn_timeout: Duration,

    /// Execute provider-supplied structured tool calls
    dispatch_structured: bool,
}

impl AgentLoop {
    /// Create a new agent loop with default budgets.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            tools,
            alerts: Arc::new(LogAlertSink),
            max_iterations: defaults.max_iterations,
            turn_timeout: Duration::from_secs(defaults.turn_timeout_secs),
            dispatch_structured: defaults.dispatch_structured_tool_calls,
        }
    }

    /// Apply the `[agent]` section of the config.
    pub fn with_config(self, config: &AgentConfig) -> Self {
        self.with_max_iterations(config.max_iterations)
            .with_turn_timeout(Duration::from_secs(config.turn_timeout_secs))
            .with_structured_dispatch(config.dispatch_structured_tool_calls)
    }

    /// Set the maximum number of provider calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the wall-clock budget per turn.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Execute structured tool calls instead of only reporting them.
    pub fn with_structured_dispatch(mut self, enabled: bool) -> Self {
        self.dispatch_structured = enabled;
        self
    }

    /// Route alerts to `alerts` instead of the log.
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Run one turn over the conversation.
    ///
    /// Each iteration reads the settings afresh, makes sure a token is
    /// available, sends the whole history and appends the reply. If the
    /// reply calls for a tool, exactly one is executed, its result is
    /// appended as a `tool` message and the loop goes around again.
    /// Otherwise the reply is the answer.
    ///
    /// Errors are alerted and, except for a missing token, appended to the
    /// conversation as the final `agent` message before being returned.
    pub async fn process(
        &self,
        session: &mut SessionContext,
        conversation: &mut Conversation,
    ) -> Result<TurnOutcome, AgentError> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Processing conversation"
        );

        let started = Instant::now();
        let mut iterations: u32 = 0;
        let mut actions = Vec::new();
        let mut pending_tool_calls = Vec::new();

        loop {
            if iterations >= self.max_iterations {
                return Err(self.terminate(
                    conversation,
                    AgentError::LoopBudgetExceeded {
                        iterations,
                        reason: format!("no final answer after {iterations} provider calls"),
                    },
                ));
            }
            let Some(remaining) = self.turn_timeout.checked_sub(started.elapsed()) else {
                return Err(self.terminate(conversation, self.timed_out(iterations)));
            };

            let settings = session.settings();
            let token = match session.ensure_token() {
                Ok(token) => token,
                Err(e) => {
                    warn!(
                        conversation_id = %conversation.id,
                        error = %e,
                        "Turn aborted before sending"
                    );
                    return Err(e.into());
                }
            };

            iterations += 1;
            debug!(
                conversation_id = %conversation.id,
                iteration = iterations,
                model = %settings.model,
                "Agent loop iteration"
            );

            let request = ProviderRequest {
                settings,
                token,
                messages: conversation.messages().to_vec(),
            };

            let reply = tokio::time::timeout(remaining, self.provider.complete(request)).await;
            let response = match reply {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(self.terminate(conversation, e.into())),
                Err(_) => return Err(self.terminate(conversation, self.timed_out(iterations))),
            };

            conversation.add_message(Role::Agent, response.reply_text.as_str());

            let selected = invocation::select(&response, conversation, self.dispatch_structured);

            let skip = match &selected {
                Some(ToolInvocation::Structured { .. }) => 1,
                _ => 0,
            };
            if !self.dispatch_structured && !response.tool_calls.is_empty() {
                let names: Vec<&str> =
                    response.tool_calls.iter().map(|c| c.name.as_str()).collect();
                info!(
                    count = response.tool_calls.len(),
                    names = ?names,
                    "Structured tool calls not dispatched"
                );
            }
            pending_tool_calls.extend(response.tool_calls.iter().skip(skip).cloned());

            let Some(action) = selected else {
                info!(
                    conversation_id = %conversation.id,
                    iterations,
                    "Turn complete"
                );
                return Ok(TurnOutcome {
                    answer: response.reply_text,
                    iterations,
                    actions,
                    pending_tool_calls,
                });
            };

            debug!(tool = %action.tool_name(), "Executing tool invocation");
            let result = self
                .tools
                .execute(action.tool_name(), action.argument(), self.alerts.as_ref())
                .await;
            let prefix = action.result_prefix(&self.tools.label(action.tool_name()));
            conversation.add_message(Role::Tool, format!("{prefix}{result}"));
            actions.push(action);
        }
    }

    fn timed_out(&self, iterations: u32) -> AgentError {
        AgentError::LoopBudgetExceeded {
            iterations,
            reason: format!(
                "no final answer within {}s",
                self.turn_timeout.as_secs_f64()
            ),
        }
    }

    /// Report a terminal error and mirror it into the transcript.
    fn terminate(&self, conversation: &mut Conversation, error: AgentError) -> AgentError {
        warn!(conversation_id = %conversation.id, error = %error, "Turn terminated");
        let text = error.to_string();
        self.alerts.alert(&text);
        if error.is_transcript_visible() {
            conversation.add_message(Role::Agent, text);
        }
        error
    }
}

/// A running chat session: the injected context plus its history.
pub struct Session {
    context: SessionContext,
    conversation: Conversation,
}

impl Session {
    pub fn new(context: SessionContext, conversation: Conversation) -> Self {
        Self {
            context,
            conversation,
        }
    }

    /// Make sure a token is available and post the greeting.
    ///
    /// An empty greeting posts nothing. Without a token the login hand-off
    /// has already been triggered and nothing is appended.
    pub fn start(&mut self, greeting: &str) -> Result<(), AuthError> {
        self.context.ensure_token()?;
        if !greeting.trim().is_empty() {
            self.conversation.add_message(Role::Agent, greeting);
        }
        Ok(())
    }

    /// Append a user message and run a turn.
    pub async fn send(
        &mut self,
        agent: &AgentLoop,
        text: &str,
    ) -> Result<TurnOutcome, AgentError> {
        self.conversation.add_message(Role::User, text.trim());
        agent.process(&mut self.context, &mut self.conversation).await
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use pipeagent_core::error::ProviderError;
    use pipeagent_core::provider::ProviderResponse;
    use pipeagent_core::session::{Settings, SettingsSource, SharedSettings};
    use std::sync::Mutex;

    fn agent(provider: Arc<ScriptedProvider>, alerts: Arc<RecordingAlerts>) -> AgentLoop {
        AgentLoop::new(provider, Arc::new(test_registry())).with_alerts(alerts)
    }

    fn roles(conv: &Conversation) -> Vec<Role> {
        conv.messages().iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn plain_reply_ends_turn() {
        let provider = Arc::new(ScriptedProvider::texts(&["Paris is the capital of France."]));
        let alerts = Arc::new(RecordingAlerts::default());
        let agent = agent(provider.clone(), alerts.clone());
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("capital of France?");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(outcome.answer, "Paris is the capital of France.");
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.actions.is_empty());
        assert_eq!(roles(&conv), vec![Role::User, Role::Agent]);
        assert_eq!(provider.call_count(), 1);
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn request_carries_token_settings_and_history() {
        let provider = Arc::new(ScriptedProvider::texts(&["ok"]));
        let agent = agent(provider.clone(), Arc::new(RecordingAlerts::default()));
        let (mut ctx, _auth) = session_with_token("tok-xyz");
        let mut conv = user_conversation("hello");

        agent.process(&mut ctx, &mut conv).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].token, "tok-xyz");
        assert_eq!(requests[0].settings, test_settings());
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].content, "hello");
    }

    #[tokio::test]
    async fn staleness_reply_triggers_auto_search() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            "I do not have information beyond 2023.",
            "It is sunny in Paris.",
        ]));
        let agent = agent(provider.clone(), Arc::new(RecordingAlerts::default()));
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("weather in Paris today?");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(
            outcome.actions,
            vec![ToolInvocation::StalenessSearch {
                query: "weather in Paris today?".into()
            }]
        );
        assert_eq!(
            roles(&conv),
            vec![Role::User, Role::Agent, Role::Tool, Role::Agent]
        );
        assert_eq!(
            conv.messages()[2].content,
            "Auto-search result: searched: weather in Paris today?"
        );
        assert_eq!(outcome.answer, "It is sunny in Paris.");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn search_pattern_runs_search_tool() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            r#"Let me check: search("current weather Paris")"#,
            "Sunny.",
        ]));
        let agent = agent(provider.clone(), Arc::new(RecordingAlerts::default()));
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("weather?");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(
            outcome.actions,
            vec![ToolInvocation::PatternMatched {
                name: "search".into(),
                argument: "current weather Paris".into()
            }]
        );
        assert_eq!(
            conv.messages()[2].content,
            "Search result: searched: current weather Paris"
        );
        // The tool result is part of the next request's history.
        let second = &provider.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[2].role, Role::Tool);
    }

    #[tokio::test]
    async fn run_js_pattern_runs_js_tool() {
        let provider = Arc::new(ScriptedProvider::texts(&[r#"run_js("2+2")"#, "The answer is 4."]));
        let agent = agent(provider, Arc::new(RecordingAlerts::default()));
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("what is 2+2?");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(conv.messages()[2].content, "JS result: 4");
        assert_eq!(outcome.answer, "The answer is 4.");
    }

    #[tokio::test]
    async fn api_error_terminates_with_agent_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Api {
            status_code: 401,
            message: "bad key".into(),
        })]));
        let alerts = Arc::new(RecordingAlerts::default());
        let agent = agent(provider.clone(), alerts.clone());
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("hi");

        let err = agent.process(&mut ctx, &mut conv).await.unwrap_err();

        assert_eq!(err.to_string(), "API error: bad key");
        assert_eq!(roles(&conv), vec![Role::User, Role::Agent]);
        assert_eq!(conv.messages()[1].content, "API error: bad key");
        assert_eq!(alerts.messages(), vec!["API error: bad key".to_string()]);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn transport_and_decode_errors_terminate_with_agent_message() {
        let cases = [
            (
                ProviderError::Transport("connection refused".into()),
                "LLM error: connection refused",
            ),
            (
                ProviderError::NotJson("expected value at line 1".into()),
                "Response not JSON: expected value at line 1",
            ),
        ];

        for (error, expected) in cases {
            let provider = Arc::new(ScriptedProvider::new(vec![Err(error)]));
            let alerts = Arc::new(RecordingAlerts::default());
            let agent = agent(provider.clone(), alerts.clone());
            let (mut ctx, _auth) = session_with_token("tok");
            let mut conv = user_conversation("hi");

            let err = agent.process(&mut ctx, &mut conv).await.unwrap_err();

            assert_eq!(err.to_string(), expected);
            assert_eq!(roles(&conv), vec![Role::User, Role::Agent]);
            assert_eq!(conv.messages()[1].content, expected);
            assert_eq!(alerts.messages(), vec![expected.to_string()]);
            assert_eq!(provider.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn failing_tool_continues_exactly_once_more() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            r#"search("explode")"#,
            "I could not find anything.",
        ]));
        let alerts = Arc::new(RecordingAlerts::default());
        let agent = agent(provider.clone(), alerts.clone());
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("find it");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(conv.messages()[2].role, Role::Tool);
        assert_eq!(conv.messages()[2].content, "Search result: Search failed.");
        assert_eq!(alerts.messages(), vec!["Search error: exploded".to_string()]);
    }

    #[tokio::test]
    async fn missing_token_sends_and_appends_nothing() {
        let provider = Arc::new(ScriptedProvider::texts(&["never"]));
        let alerts = Arc::new(RecordingAlerts::default());
        let agent = agent(provider.clone(), alerts.clone());
        let auth = Arc::new(StaticAuth::new(None));
        let mut ctx = SessionContext::new(
            Arc::new(test_settings()),
            auth.clone(),
            "https://login.test/?redirect=x",
        );
        let mut conv = user_conversation("hi");

        let err = agent.process(&mut ctx, &mut conv).await.unwrap_err();

        assert!(matches!(err, AgentError::Auth(AuthError::TokenMissing)));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(conv.len(), 1);
        assert_eq!(auth.login_requests(), vec!["https://login.test/?redirect=x".to_string()]);
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn endless_tool_patterns_exhaust_iteration_budget() {
        let provider = Arc::new(ScriptedProvider::repeating(r#"search("again")"#));
        let alerts = Arc::new(RecordingAlerts::default());
        let agent = agent(provider.clone(), alerts.clone()).with_max_iterations(3);
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("loop forever");

        let err = agent.process(&mut ctx, &mut conv).await.unwrap_err();

        assert!(matches!(
            err,
            AgentError::LoopBudgetExceeded { iterations: 3, .. }
        ));
        assert_eq!(provider.call_count(), 3);
        let last = conv.last().unwrap();
        assert_eq!(last.role, Role::Agent);
        assert!(last.content.starts_with("Loop budget exceeded: "));
        assert_eq!(alerts.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_exhausts_wall_clock_budget() {
        let provider =
            Arc::new(ScriptedProvider::texts(&["too late"]).with_delay(Duration::from_secs(10)));
        let agent = agent(provider, Arc::new(RecordingAlerts::default()))
            .with_turn_timeout(Duration::from_secs(2));
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("hi");

        let err = agent.process(&mut ctx, &mut conv).await.unwrap_err();

        assert!(matches!(
            err,
            AgentError::LoopBudgetExceeded { iterations: 1, .. }
        ));
        assert!(conv.last().unwrap().content.starts_with("Loop budget exceeded: "));
    }

    #[tokio::test]
    async fn structured_calls_are_reported_not_dispatched_by_default() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ProviderResponse {
            reply_text: "Let me look that up.".into(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "search".into(),
                arguments: r#"{"query":"rust"}"#.into(),
            }],
        })]));
        let agent = agent(provider.clone(), Arc::new(RecordingAlerts::default()));
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("what is rust?");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.pending_tool_calls.len(), 1);
        assert_eq!(outcome.pending_tool_calls[0].name, "search");
        assert_eq!(roles(&conv), vec![Role::User, Role::Agent]);
    }

    #[tokio::test]
    async fn structured_calls_are_dispatched_when_enabled() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ProviderResponse {
                reply_text: "No response.".into(),
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "search".into(),
                    arguments: r#"{"query":"rust"}"#.into(),
                }],
            }),
            Ok(ProviderResponse::text("Rust is a language.")),
        ]));
        let agent = agent(provider.clone(), Arc::new(RecordingAlerts::default()))
            .with_structured_dispatch(true);
        let (mut ctx, _auth) = session_with_token("tok");
        let mut conv = user_conversation("what is rust?");

        let outcome = agent.process(&mut ctx, &mut conv).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.actions.len(), 1);
        assert!(outcome.pending_tool_calls.is_empty());
        assert_eq!(conv.messages()[2].content, "Search result: searched: rust");
    }

    /// Settings that switch model as soon as the first request is sent.
    struct SwitchingSettings {
        shared: SharedSettings,
        reads: Mutex<u32>,
    }

    impl SettingsSource for SwitchingSettings {
        fn settings(&self) -> Settings {
            let mut reads = self.reads.lock().unwrap();
            *reads += 1;
            if *reads == 2 {
                self.shared.select_model("google/gemini-2.5-flash", None);
            }
            self.shared.settings()
        }
    }

    #[tokio::test]
    async fn settings_are_read_every_iteration() {
        let provider = Arc::new(ScriptedProvider::texts(&[r#"search("x")"#, "done"]));
        let agent = agent(provider.clone(), Arc::new(RecordingAlerts::default()));
        let settings = Arc::new(SwitchingSettings {
            shared: SharedSettings::new(test_settings()),
            reads: Mutex::new(0),
        });
        let mut ctx = SessionContext::new(
            settings,
            Arc::new(StaticAuth::new(Some("tok"))),
            "https://login.test/",
        );
        let mut conv = user_conversation("hi");

        agent.process(&mut ctx, &mut conv).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].settings.model, "openai/gpt-4.1-nano");
        assert_eq!(requests[1].settings.model, "google/gemini-2.5-flash");
    }

    #[tokio::test]
    async fn session_start_greets_after_auth() {
        let (ctx, _auth) = session_with_token("tok");
        let mut session = Session::new(ctx, Conversation::new());

        session.start("Hello! How can I help you today?").unwrap();

        let conv = session.conversation();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::Agent);
        assert_eq!(conv.messages()[0].content, "Hello! How can I help you today?");
    }

    #[tokio::test]
    async fn session_start_without_token_posts_nothing() {
        let auth = Arc::new(StaticAuth::new(None));
        let ctx =
            SessionContext::new(Arc::new(test_settings()), auth.clone(), "https://login.test/");
        let mut session = Session::new(ctx, Conversation::new());

        assert_eq!(session.start("Hello!"), Err(AuthError::TokenMissing));
        assert!(session.conversation().is_empty());
        assert_eq!(auth.login_requests().len(), 1);

        // A pasted key makes the session usable.
        session.context_mut().set_token("manual-key");
        assert!(session.start("").is_ok());
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn session_send_appends_user_message_and_runs_turn() {
        let provider = Arc::new(ScriptedProvider::texts(&["Hi!"]));
        let agent = agent(provider, Arc::new(RecordingAlerts::default()));
        let (ctx, _auth) = session_with_token("tok");
        let mut session = Session::new(ctx, Conversation::new());
        session.start("Hello! How can I help you today?").unwrap();

        let outcome = session.send(&agent, "  hello  ").await.unwrap();

        assert_eq!(outcome.answer, "Hi!");
        let conv = session.conversation();
        assert_eq!(roles(conv), vec![Role::Agent, Role::User, Role::Agent]);
        assert_eq!(conv.messages()[1].content, "hello");
    }
}
