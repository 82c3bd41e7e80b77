//! Terminal presentation: transcript rendering, alerts, and the login
//! hand-off.

use std::io::Write;

use pipeagent_core::message::{Message, Role};
use pipeagent_core::observer::{AlertSink, TranscriptObserver};
use pipeagent_core::session::{AuthCollaborator, AuthProfile};

/// Prints agent and tool messages as they are appended, alerts to stderr.
///
/// User messages are not echoed; the user just typed them.
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    /// One rendered line per content line, prefixed by the role.
    pub fn format(message: &Message) -> String {
        let prefix = match message.role {
            Role::User => "  You   > ",
            Role::Agent => "  Agent > ",
            Role::Tool => "  Tool  > ",
        };
        message
            .content
            .lines()
            .map(|line| format!("{prefix}{line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TranscriptObserver for ConsoleRenderer {
    fn message_appended(&self, message: &Message) {
        if message.role == Role::User {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", Self::format(message));
        let _ = out.flush();
    }
}

impl AlertSink for ConsoleRenderer {
    fn alert(&self, message: &str) {
        eprintln!("  [!] {message}");
    }
}

/// Auth collaborator backed by the configured token.
///
/// There is no browser to redirect, so the login hand-off prints the URL.
pub struct ConfigAuth {
    token: Option<String>,
}

impl ConfigAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl AuthCollaborator for ConfigAuth {
    fn profile(&self) -> AuthProfile {
        AuthProfile {
            token: self.token.clone(),
        }
    }

    fn request_login(&self, login_url: &str) {
        eprintln!();
        eprintln!("  No token available. Sign in at:");
        eprintln!("    {login_url}");
        eprintln!();
        eprintln!("  Then set PIPEAGENT_TOKEN, add `token` to the config file,");
        eprintln!("  or paste it here with /token <value>.");
        eprintln!();
    }
}
