// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama adapter serving the local tier.
//!
//! Speaks the native `/api/chat` protocol with streaming off. Data sent here
//! never leaves the machine, so every classification level is accepted.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use tollgate_config::model::LocalConfig;
use tollgate_core::{
    AdapterType, HealthStatus, InferenceAdapter, InferenceRequest, InferenceResponse,
    PluginAdapter, Tier, TollgateError,
};
use tracing::{debug, info};

use crate::client::OllamaClient;

/// Local inference backend implementing [`InferenceAdapter`] for [`Tier::Local`].
pub struct OllamaAdapter {
    client: OllamaClient,
}

impl OllamaAdapter {
    pub fn new(config: &LocalConfig) -> Result<Self, TollgateError> {
        let client = OllamaClient::new(
            &config.base_url,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(base_url = %config.base_url, model = %config.model, "Ollama adapter initialized");
        Ok(Self { client })
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }
}

#[async_trait]
impl PluginAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inference
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        match self.client.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), TollgateError> {
        debug!("Ollama adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl InferenceAdapter for OllamaAdapter {
    fn supports(&self, tier: Tier) -> bool {
        tier == Tier::Local
    }

    async fn execute(&self, request: InferenceRequest) -> Result<InferenceResponse, TollgateError> {
        if !self.supports(request.tier) {
            return Err(TollgateError::backend(
                request.tier,
                "the Ollama adapter only serves the local tier",
            ));
        }
        let response = self.client.chat(&request.prompt).await?;
        debug!(
            model = %response.model,
            input_tokens = response.prompt_eval_count,
            output_tokens = response.eval_count,
            "local inference complete"
        );
        Ok(InferenceResponse {
            text: response.message.content,
            input_tokens: response.prompt_eval_count,
            output_tokens: response.eval_count,
            model: Some(response.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::ClassificationLevel;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(uri: &str) -> OllamaAdapter {
        OllamaAdapter::new(&LocalConfig {
            base_url: uri.to_string(),
            model: "qwen2.5-coder:7b".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn request(tier: Tier) -> InferenceRequest {
        InferenceRequest {
            tier,
            prompt: "summarize the memo".into(),
            classification: ClassificationLevel::TopSecret,
        }
    }

    #[test]
    fn serves_only_the_local_tier() {
        let a = adapter("http://localhost:11434");
        assert!(a.supports(Tier::Local));
        for tier in [Tier::Cache, Tier::CloudFast, Tier::CloudBalanced, Tier::CloudBest] {
            assert!(!a.supports(tier), "{tier}");
        }
        assert_eq!(a.name(), "ollama");
        assert_eq!(a.adapter_type(), AdapterType::Inference);
    }

    #[tokio::test]
    async fn execute_maps_eval_counts_to_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "qwen2.5-coder:7b",
                "message": {"role": "assistant", "content": "The memo says..."},
                "done": true,
                "prompt_eval_count": 42,
                "eval_count": 17
            })))
            .mount(&server)
            .await;

        let resp = adapter(&server.uri()).execute(request(Tier::Local)).await.unwrap();
        assert_eq!(resp.text, "The memo says...");
        assert_eq!(resp.input_tokens, 42);
        assert_eq!(resp.output_tokens, 17);
        assert_eq!(resp.model.as_deref(), Some("qwen2.5-coder:7b"));
    }

    #[tokio::test]
    async fn cloud_tier_request_is_rejected_without_a_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = adapter(&server.uri())
            .execute(request(Tier::CloudBest))
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::BackendFailure { tier: Tier::CloudBest, .. }));
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let status = adapter(&server.uri()).health_check().await.unwrap();
        assert!(matches!(status, HealthStatus::Unhealthy(_)));
    }
}
