//! # PipeAgent Core
//!
//! Domain types, traits, and error definitions for the PipeAgent
//! conversational agent. This crate has **no HTTP or runtime dependencies**;
//! it defines the domain model that the provider, tool, and agent crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the agent loop talks to is a trait here:
//! - [`Provider`]: sends the conversation to a language model
//! - [`Tool`]: an executor the model can invoke
//! - [`SettingsSource`] / [`AuthCollaborator`]: session state owned by the front-end
//! - [`TranscriptObserver`] / [`AlertSink`]: presentation hooks
//!
//! Implementations live in their respective crates, so the loop can be
//! exercised with in-memory stand-ins.

pub mod error;
pub mod message;
pub mod observer;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, AuthError, Error, ProviderError, Result, ToolError};
pub use message::{Conversation, ConversationId, Message, Role};
pub use observer::{AlertSink, LogAlertSink, TranscriptObserver};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolCall};
pub use session::{
    AuthCollaborator, AuthProfile, SessionContext, Settings, SettingsSource, SharedSettings,
};
pub use tool::{Tool, ToolRegistry};
