// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a local Ollama server.

use std::time::Duration;

use tollgate_core::{Tier, TollgateError};
use tracing::debug;

use crate::types::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse};

/// Thin wrapper over `POST {base_url}/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Result<Self, TollgateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TollgateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a single-turn chat and waits for the whole answer.
    pub async fn chat(&self, prompt: &str) -> Result<ChatResponse, TollgateError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "ollama response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => format!("Ollama error ({status}): {}", err.error),
                Err(_) => format!("Ollama returned {status}: {body}"),
            };
            return Err(TollgateError::backend(Tier::Local, message));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| TollgateError::BackendFailure {
            tier: Tier::Local,
            message: format!("failed to parse Ollama response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Probes the server via `GET /api/tags`.
    pub async fn ping(&self) -> Result<(), TollgateError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TollgateError::backend(
                Tier::Local,
                format!("Ollama health probe returned {}", response.status()),
            ))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> TollgateError {
        if e.is_timeout() {
            return TollgateError::Timeout {
                duration: self.timeout,
            };
        }
        TollgateError::BackendFailure {
            tier: Tier::Local,
            message: format!("HTTP request to Ollama failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}
