//! `pipeagent agent`: Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use pipeagent_agent::{AgentLoop, Session};
use pipeagent_config::AppConfig;
use pipeagent_core::message::Conversation;
use pipeagent_core::session::{SessionContext, SettingsSource, SharedSettings};
use pipeagent_core::tool::ToolRegistry;
use pipeagent_providers::HttpProvider;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::console::{ConfigAuth, ConsoleRenderer};

/// A line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Chat(String),
    Model(String),
    BaseUrl(String),
    Token(String),
    Models,
    History,
    Help,
    Exit,
    Empty,
    Invalid(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplInput::Empty;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return ReplInput::Exit;
        }
        if !line.starts_with('/') {
            return ReplInput::Chat(line.to_string());
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        let needs_arg = |make: fn(String) -> ReplInput| {
            if arg.is_empty() {
                ReplInput::Invalid(format!("{command} needs a value"))
            } else {
                make(arg.to_string())
            }
        };

        match command {
            "/model" => needs_arg(ReplInput::Model),
            "/base-url" => needs_arg(ReplInput::BaseUrl),
            "/token" => needs_arg(ReplInput::Token),
            "/models" => ReplInput::Models,
            "/history" => ReplInput::History,
            "/help" => ReplInput::Help,
            other => ReplInput::Invalid(format!("Unknown command: {other}")),
        }
    }
}

/// Everything a chat needs, built from config.
struct Chat {
    config: AppConfig,
    settings: SharedSettings,
    tools: Arc<ToolRegistry>,
    agent: AgentLoop,
    session: Session,
}

impl Chat {
    fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let console = Arc::new(ConsoleRenderer);
        let settings = SharedSettings::new(config.settings());

        let provider = Arc::new(HttpProvider::new(
            "aipipe",
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let tools = Arc::new(pipeagent_tools::default_registry(&config.tools)?);
        let agent = AgentLoop::new(provider, tools.clone())
            .with_config(&config.agent)
            .with_alerts(console.clone());

        let context = SessionContext::new(
            Arc::new(settings.clone()),
            Arc::new(ConfigAuth::new(config.token.clone())),
            config.auth.login_redirect_url(),
        );
        let session = Session::new(context, Conversation::new().with_observer(console));

        Ok(Self {
            config,
            settings,
            tools,
            agent,
            session,
        })
    }

    /// Handle one prompt line. Returns false when the user wants to leave.
    async fn handle(&mut self, input: ReplInput) -> bool {
        match input {
            ReplInput::Empty => {}
            ReplInput::Exit => return false,
            ReplInput::Chat(text) => {
                // Failures were already alerted and appended.
                let _ = self.session.send(&self.agent, &text).await;
            }
            ReplInput::Model(id) => match self.config.find_model(&id) {
                Some(entry) => {
                    self.settings.select_model(&entry.id, entry.base_url.as_deref());
                    let current = self.settings.settings();
                    println!("  Model: {} ({})", current.model, current.base_url);
                }
                None => {
                    self.settings.select_model(&id, None);
                    println!("  Model: {id} (not in catalog, base URL unchanged)");
                }
            },
            ReplInput::BaseUrl(url) => {
                self.settings.set_base_url(&url);
                println!("  Base URL: {}", self.settings.settings().base_url);
            }
            ReplInput::Token(token) => {
                self.session.context_mut().set_token(token);
                println!("  Token set.");
                if self.session.conversation().is_empty() {
                    let _ = self.session.start(&self.config.agent.greeting);
                }
            }
            ReplInput::Models => print_catalog(&self.config, &self.settings.settings().model),
            ReplInput::History => {
                for message in self.session.conversation().messages() {
                    println!("{}", ConsoleRenderer::format(message));
                }
            }
            ReplInput::Help => print_help(&self.tools),
            ReplInput::Invalid(reason) => eprintln!("  [!] {reason}"),
        }
        true
    }
}

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    tracing::debug!(?config, "Loaded configuration");
    let mut chat = Chat::build(config)?;

    if let Some(msg) = message {
        // Single message mode
        chat.session
            .start("")
            .map_err(|e| format!("{e}. See above for how to sign in."))?;
        chat.session.send(&chat.agent, &msg).await?;
        return Ok(());
    }

    // Interactive mode
    let current = chat.settings.settings();
    println!();
    println!("  PipeAgent: Interactive Mode");
    println!();
    println!("  Model:     {}", current.model);
    println!("  Endpoint:  {}", current.base_url);
    println!("  Tools:     {}", chat.tools.names().join(", "));
    println!();
    println!("  Type your message and press Enter. /help lists commands.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let greeting = chat.config.agent.greeting.clone();
    let _ = chat.session.start(&greeting);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You   > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !chat.handle(ReplInput::parse(&line)).await {
            break;
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn print_catalog(config: &AppConfig, current_model: &str) {
    for entry in &config.models {
        let marker = if entry.id == current_model { "*" } else { " " };
        match &entry.base_url {
            Some(url) => println!("  {marker} {:<28} {url}", entry.id),
            None => println!("  {marker} {}", entry.id),
        }
    }
}

fn print_help(tools: &ToolRegistry) {
    println!("  /model <id>       switch model (catalog entries also switch endpoint)");
    println!("  /base-url <url>   set the provider endpoint");
    println!("  /token <value>    use this API token");
    println!("  /models           list the model catalog");
    println!("  /history          show the conversation so far");
    println!("  exit | quit       leave");
    println!();
    for line in tool_lines(tools) {
        println!("{line}");
    }
}

/// One line per tool the model can call.
fn tool_lines(tools: &ToolRegistry) -> Vec<String> {
    tools
        .descriptions()
        .into_iter()
        .map(|(name, description)| format!("  {name:<17} {description}"))
        .collect()
}
