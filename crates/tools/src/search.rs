//! Web search tool backed by the DuckDuckGo Instant Answer API.

use async_trait::async_trait;
use pipeagent_core::error::ToolError;
use pipeagent_core::tool::Tool;
use serde::Deserialize;
use tracing::debug;

use crate::text_argument;

/// Returned when the answer carries no related topics.
pub const NO_RESULTS: &str = "No results.";

pub struct SearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl SearchTool {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
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
        "Search the web. Returns the first related topic of an instant answer."
    }

    async fn execute(&self, argument: serde_json::Value) -> Result<String, ToolError> {
        let query = text_argument(&argument, "query")?;
        debug!(query = %query, "Running web search");

        let answer: InstantAnswer = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str()), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ToolError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        Ok(answer
            .related_topics
            .into_iter()
            .next()
            .and_then(|topic| topic.text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_RESULTS.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: Option<String>,
}
