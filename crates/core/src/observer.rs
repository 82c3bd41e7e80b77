//! Presentation hooks.
//!
//! The agent loop never renders anything itself. It appends to the
//! conversation (which notifies [`TranscriptObserver`]s) and reports
//! recoverable failures to an [`AlertSink`].

use crate::message::Message;

/// Receives every message the moment it is appended to the history.
///
/// Implementations must render `user`, `agent` and `tool` distinctly.
pub trait TranscriptObserver: Send + Sync {
    fn message_appended(&self, message: &Message);
}

/// Receives a short, user-facing description of every recoverable failure.
///
/// Must not block: the loop continues (or terminates) right after calling it.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

/// An alert sink that only logs. Useful as a default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, message: &str) {
        tracing::warn!(alert = %message, "Alert raised");
    }
}
