//! Tool-invocation extraction.
//!
//! After each reply the loop picks at most one action. Candidates are tried
//! in a fixed order and the first one that applies wins:
//!
//! 1. staleness auto-search
//! 2. structured provider tool call (only when dispatch is enabled)
//! 3. `search("...")` in the reply text
//! 4. `run_js("...")` in the reply text

use std::sync::LazyLock;

use pipeagent_core::message::Conversation;
use pipeagent_core::provider::{ProviderResponse, ToolCall};
use regex::{Regex, RegexSet};
use serde_json::Value;

/// Phrases that mean the model thinks its knowledge is out of date.
pub const STALENESS_PHRASES: &[&str] = &[
    "I do not have information beyond",
    "cannot provide the current",
    "check a reliable news source",
    "recommend checking",
    "not up to date",
];

static STALENESS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(
        STALENESS_PHRASES
            .iter()
            .map(|phrase| format!("(?i){}", regex::escape(phrase))),
    )
    .expect("staleness phrases are valid regexes")
});

static SEARCH_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"search\(["'](.+?)["']\)"#).expect("search pattern is a valid regex")
});

static RUN_JS_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"run_js\(["']([\s\S]+?)["']\)"#).expect("run_js pattern is a valid regex")
});

/// One action selected from a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    /// A tool call the provider supplied in structured form.
    Structured { name: String, argument: Value },
    /// A call written into the reply text.
    PatternMatched { name: String, argument: String },
    /// A search for the latest user message, triggered by a stale-knowledge reply.
    StalenessSearch { query: String },
}

impl ToolInvocation {
    /// Registry name of the tool to run.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolInvocation::Structured { name, .. }
            | ToolInvocation::PatternMatched { name, .. } => name,
            ToolInvocation::StalenessSearch { .. } => "search",
        }
    }

    /// The argument handed to the executor.
    pub fn argument(&self) -> Value {
        match self {
            ToolInvocation::Structured { argument, .. } => argument.clone(),
            ToolInvocation::PatternMatched { argument, .. } => Value::String(argument.clone()),
            ToolInvocation::StalenessSearch { query } => Value::String(query.clone()),
        }
    }

    /// Prefix of the `tool` message carrying the result.
    pub fn result_prefix(&self, label: &str) -> String {
        match self {
            ToolInvocation::StalenessSearch { .. } => "Auto-search result: ".to_string(),
            _ => format!("{label} result: "),
        }
    }
}

/// Whether the reply admits to stale knowledge.
pub fn is_stale(reply: &str) -> bool {
    STALENESS.is_match(reply)
}

/// First `search("...")` in the text.
pub fn find_search_call(reply: &str) -> Option<String> {
    SEARCH_CALL.captures(reply).map(|c| c[1].to_string())
}

/// First `run_js("...")` in the text; the code may span lines.
pub fn find_run_js_call(reply: &str) -> Option<String> {
    RUN_JS_CALL.captures(reply).map(|c| c[1].to_string())
}

/// Decode a structured call's raw arguments. Anything that isn't JSON is
/// passed through as a plain string.
pub fn structured_argument(call: &ToolCall) -> Value {
    if call.arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(&call.arguments).unwrap_or_else(|_| Value::String(call.arguments.clone()))
}

/// Pick the action for this reply, if any.
///
/// `conversation` must already contain the reply; the staleness query is
/// taken from its latest `user` message.
pub fn select(
    response: &ProviderResponse,
    conversation: &Conversation,
    dispatch_structured: bool,
) -> Option<ToolInvocation> {
    let reply = response.reply_text.as_str();

    if is_stale(reply) {
        if let Some(user) = conversation.last_user_message() {
            return Some(ToolInvocation::StalenessSearch {
                query: user.content.clone(),
            });
        }
    }

    if dispatch_structured {
        if let Some(call) = response.tool_calls.first() {
            return Some(ToolInvocation::Structured {
                name: call.name.clone(),
                argument: structured_argument(call),
            });
        }
    }

    if let Some(query) = find_search_call(reply) {
        return Some(ToolInvocation::PatternMatched {
            name: "search".into(),
            argument: query,
        });
    }

    find_run_js_call(reply).map(|code| ToolInvocation::PatternMatched {
        name: "run_js".into(),
        argument: code,
    })
}
