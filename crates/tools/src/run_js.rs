//! Sandboxed JavaScript evaluation tool.
//!
//! Model-supplied code is untrusted. Every call gets:
//! - a fresh QuickJS runtime and context, dropped afterwards
//! - no host bindings (no filesystem, network, process, or timers)
//! - a memory limit and a stack limit
//! - a wall-clock deadline enforced by the interrupt handler
//!
//! Evaluation runs on a blocking thread so the agent loop is never stalled
//! by a long-running script.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pipeagent_config::JsConfig;
use pipeagent_core::error::ToolError;
use pipeagent_core::tool::Tool;
use rquickjs::{Context, Runtime};
use tracing::{debug, warn};

use crate::text_argument;

/// Source is handed over through a global that is removed before the user
/// expression runs, so the expression cannot observe it.
const SOURCE_GLOBAL: &str = "__source";

const WRAPPER: &str = r#"(() => {
    const src = globalThis.__source;
    delete globalThis.__source;
    return String(Function('"use strict";return (' + src + ')')());
})()"#;

/// Resource limits and the capability gate for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsPolicy {
    /// When false, every evaluation is refused.
    pub enabled: bool,
    pub memory_limit_bytes: usize,
    pub max_stack_bytes: usize,
    pub timeout: Duration,
    pub max_source_len: usize,
}

impl From<&JsConfig> for JsPolicy {
    fn from(config: &JsConfig) -> Self {
        Self {
            enabled: config.enabled,
            memory_limit_bytes: config.memory_limit_bytes,
            max_stack_bytes: config.max_stack_bytes,
            timeout: Duration::from_millis(config.timeout_ms),
            max_source_len: config.max_source_len,
        }
    }
}

impl Default for JsPolicy {
    fn default() -> Self {
        Self::from(&JsConfig::default())
    }
}

/// Evaluates a single expression under a [`JsPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct JsSandbox {
    policy: JsPolicy,
}

impl JsSandbox {
    pub fn new(policy: JsPolicy) -> Self {
        Self { policy }
    }

    /// Check the gate and size limit without evaluating anything.
    pub fn admit(&self, source: &str) -> Result<(), ToolError> {
        if !self.policy.enabled {
            return Err(ToolError::PermissionDenied(
                "JavaScript evaluation is disabled".into(),
            ));
        }
        if source.len() > self.policy.max_source_len {
            return Err(ToolError::InvalidArguments(format!(
                "source is {} bytes, limit is {}",
                source.len(),
                self.policy.max_source_len
            )));
        }
        Ok(())
    }

    /// Evaluate `source` as an expression and return `String(result)`.
    ///
    /// Blocks the calling thread until the script finishes or the deadline
    /// interrupts it.
    pub fn evaluate(&self, source: &str) -> Result<String, ToolError> {
        self.admit(source)?;

        let runtime = Runtime::new().map_err(|e| ToolError::Evaluation(e.to_string()))?;
        runtime.set_memory_limit(self.policy.memory_limit_bytes);
        runtime.set_max_stack_size(self.policy.max_stack_bytes);

        let deadline = Instant::now() + self.policy.timeout;
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            let expired = Instant::now() >= deadline;
            if expired {
                flag.store(true, Ordering::Relaxed);
            }
            expired
        })));

        let context = Context::full(&runtime).map_err(|e| ToolError::Evaluation(e.to_string()))?;

        let outcome = context.with(|ctx| -> Result<String, ToolError> {
            ctx.globals()
                .set(SOURCE_GLOBAL, source)
                .map_err(|e| ToolError::Evaluation(e.to_string()))?;

            match ctx.eval::<String, _>(WRAPPER) {
                Ok(value) => Ok(value),
                Err(rquickjs::Error::Exception) => {
                    let thrown = ctx.catch();
                    let message = if let Some(exception) = thrown.as_exception() {
                        exception
                            .message()
                            .unwrap_or_else(|| "uncaught exception".to_string())
                    } else if let Some(text) = thrown.as_string() {
                        text.to_string()
                            .unwrap_or_else(|_| "uncaught exception".to_string())
                    } else {
                        "uncaught exception".to_string()
                    };
                    Err(ToolError::Evaluation(message))
                }
                Err(e) => Err(ToolError::Evaluation(e.to_string())),
            }
        });

        if outcome.is_err() && interrupted.load(Ordering::Relaxed) {
            return Err(ToolError::Timeout {
                timeout_ms: self.policy.timeout.as_millis() as u64,
            });
        }
        outcome
    }
}

/// The `run_js` tool.
pub struct RunJsTool {
    sandbox: JsSandbox,
}

impl RunJsTool {
    pub fn new(policy: JsPolicy) -> Self {
        Self {
            sandbox: JsSandbox::new(policy),
        }
    }
}

#[async_trait]
impl Tool for RunJsTool {
    fn name(&self) -> &str {
        "run_js"
    }

    fn label(&self) -> &str {
        "JS"
    }

    fn fallback(&self) -> &str {
        "JS execution failed."
    }

    fn description(&self) -> &str {
        "Evaluate a JavaScript expression in an isolated sandbox and return the result as text."
    }

    async fn execute(&self, argument: serde_json::Value) -> Result<String, ToolError> {
        let source = text_argument(&argument, "code")?;
        self.sandbox.admit(&source)?;

        debug!(len = source.len(), "Evaluating JavaScript");
        let sandbox = self.sandbox;
        tokio::task::spawn_blocking(move || sandbox.evaluate(&source))
            .await
            .map_err(|e| {
                warn!(error = %e, "JavaScript worker did not complete");
                ToolError::Evaluation(e.to_string())
            })?
    }
}
