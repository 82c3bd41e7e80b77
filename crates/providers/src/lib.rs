//! LLM provider implementation for PipeAgent.
//!
//! Two wire shapes are spoken: an OpenAI-style chat-completions shape and a
//! Gemini-style generative-content shape. [`wire`] builds the outbound
//! request, [`interpreter`] turns the raw HTTP exchange back into a
//! [`pipeagent_core::ProviderResponse`], and [`HttpProvider`] ties them to
//! `reqwest`.

pub mod http;
pub mod interpreter;
pub mod wire;

pub use http::HttpProvider;
pub use interpreter::{RawResponse, interpret};
pub use wire::{OutboundRequest, WireShape, build_request};
