//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent reach outside the conversation: look
//! something up, evaluate an expression, call the proxy.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::observer::AlertSink;

/// The core Tool trait.
///
/// An executor takes a single argument (a plain string for pattern-matched
/// calls, any JSON value for structured ones) and returns text. Failures are
/// returned as [`ToolError`]; the [`ToolRegistry`] turns them into the tool's
/// fallback text.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model uses (e.g. "search", "run_js").
    fn name(&self) -> &str;

    /// Display label used in transcript and alert prefixes (e.g. "Search").
    fn label(&self) -> &str;

    /// What the model gets back when execution fails.
    fn fallback(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// Execute the tool with the given argument.
    async fn execute(&self, argument: serde_json::Value) -> Result<String, ToolError>;
}

/// A registry of available tools.
///
/// [`ToolRegistry::execute`] is total: it always yields a string, so the
/// agent loop never has to handle a tool failure.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Display label for a tool, falling back to its name.
    pub fn label(&self, name: &str) -> String {
        self.get(name)
            .map(|t| t.label().to_string())
            .unwrap_or_else(|| name.to_string())
    }

    /// Execute a tool by name. Never fails.
    ///
    /// Errors are reported to `alerts` as `"<Label> error: <reason>"` and the
    /// tool's fallback text is returned instead.
    pub async fn execute(
        &self,
        name: &str,
        argument: serde_json::Value,
        alerts: &dyn AlertSink,
    ) -> String {
        let Some(tool) = self.tools.get(name) else {
            let err = ToolError::NotFound(name.to_string());
            warn!(tool = %name, "Model requested an unregistered tool");
            alerts.alert(&err.to_string());
            return err.to_string();
        };

        let start = std::time::Instant::now();
        let result = tool.execute(argument).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                debug!(tool = %name, duration_ms, "Tool executed");
                output
            }
            Err(e) => {
                warn!(tool = %name, duration_ms, error = %e, "Tool execution failed");
                alerts.alert(&format!("{} error: {e}", tool.label()));
                tool.fallback().to_string()
            }
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// `(name, description)` for every registered tool, sorted by name.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        entries.sort_unstable_by_key(|(name, _)| *name);
        entries
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
