// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic adapter serving the cloud tiers.
//!
//! Each cloud tier maps to its own configured model. The adapter checks the
//! classification of every request itself and refuses anything the gate
//! would keep on the machine.

pub mod client;
pub mod types;

use async_trait::async_trait;
use tollgate_config::model::CloudConfig;
use tollgate_core::{
    AdapterType, HealthStatus, InferenceAdapter, InferenceRequest, InferenceResponse,
    PluginAdapter, Tier, TollgateError,
};
use tollgate_security::permitted_tiers;
use tracing::{debug, info, warn};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Cloud inference backend implementing [`InferenceAdapter`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicAdapter {
    client: AnthropicClient,
    config: CloudConfig,
}

impl AnthropicAdapter {
    pub fn new(config: &CloudConfig) -> Result<Self, TollgateError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = AnthropicClient::new(&api_key, &config.api_version)?;
        info!(
            fast = %config.fast_model,
            balanced = %config.balanced_model,
            best = %config.best_model,
            "Anthropic adapter initialized"
        );
        Ok(Self::with_client(client, config.clone()))
    }

    /// Builds an adapter around an existing client.
    pub fn with_client(client: AnthropicClient, config: CloudConfig) -> Self {
        Self { client, config }
    }

    fn to_message_request(&self, model: &str, prompt: &str) -> MessageRequest {
        MessageRequest {
            model: model.to_string(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inference
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        // No probe call: it would spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TollgateError> {
        debug!("Anthropic adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl InferenceAdapter for AnthropicAdapter {
    fn supports(&self, tier: Tier) -> bool {
        tier.is_cloud()
    }

    async fn execute(&self, request: InferenceRequest) -> Result<InferenceResponse, TollgateError> {
        if !permitted_tiers(request.classification).contains(request.tier) {
            warn!(
                tier = %request.tier,
                classification = %request.classification,
                "refusing to send controlled data to the cloud"
            );
            return Err(TollgateError::PolicyViolation {
                classification: request.classification,
                tier: request.tier,
            });
        }
        let Some(model) = self.config.model_for(request.tier) else {
            return Err(TollgateError::backend(
                request.tier,
                "the Anthropic adapter only serves cloud tiers",
            ));
        };

        let api_request = self.to_message_request(model, &request.prompt);
        let response = self.client.complete_message(&api_request, request.tier).await?;
        debug!(
            tier = %request.tier,
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "cloud inference complete"
        );

        Ok(InferenceResponse {
            text: response.text(),
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            model: Some(response.model),
        })
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, TollgateError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            TollgateError::Config(
                "Anthropic API key not found. Set cloud.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
            )
        })
}
