//! HTTP provider.
//!
//! One `reqwest` client, two wire shapes. The shape is picked per request
//! from the settings carried in the [`ProviderRequest`], so a model switch
//! between iterations takes effect on the very next send.

use std::time::Duration;

use async_trait::async_trait;
use pipeagent_core::error::ProviderError;
use pipeagent_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::{debug, warn};

use crate::interpreter::{RawResponse, interpret};
use crate::wire::build_request;

/// Sends provider requests over HTTP with bearer authentication.
pub struct HttpProvider {
    name: String,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Create a provider whose requests give up after `timeout`.
    pub fn new(name: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            client,
        })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let outbound = build_request(&request.settings, &request.messages);

        debug!(
            provider = %self.name,
            shape = %outbound.shape,
            model = %request.settings.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&outbound.url)
            .header("Authorization", format!("Bearer {}", request.token))
            .header("Content-Type", "application/json")
            .json(&outbound.body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let raw = RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        };

        if !raw.is_success() {
            warn!(provider = %self.name, status = raw.status, "Provider returned error status");
        }

        interpret(outbound.shape, &raw)
    }
}
