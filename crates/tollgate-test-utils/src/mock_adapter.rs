// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted inference backend for deterministic testing.
//!
//! `MockAdapter` implements `InferenceAdapter` by replaying a queue of
//! [`Scripted`] steps and recording every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tollgate_core::{
    AdapterType, HealthStatus, InferenceAdapter, InferenceRequest, InferenceResponse,
    PluginAdapter, Tier, TierSet, TollgateError,
};

/// One scripted reaction to an `execute` call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    /// Fails with a backend failure carrying this message.
    Fail(String),
    /// Sleeps, then replies.
    Delayed(Duration, String),
}

/// Backend that answers from a FIFO script.
///
/// When the script runs out, calls reply with `"mock response"`. Token
/// counts are fixed at 10 in and 20 out.
#[derive(Clone)]
pub struct MockAdapter {
    name: String,
    tiers: TierSet,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<InferenceRequest>>>,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, tiers: TierSet) -> Self {
        Self {
            name: name.into(),
            tiers,
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend serving only [`Tier::Local`].
    pub fn local() -> Self {
        Self::new("mock-local", [Tier::Local].into_iter().collect())
    }

    /// A backend serving every cloud tier.
    pub fn cloud() -> Self {
        Self::new(
            "mock-cloud",
            [Tier::CloudFast, Tier::CloudBalanced, Tier::CloudBest]
                .into_iter()
                .collect(),
        )
    }

    pub fn push(&self, step: Scripted) {
        self.script.lock().push_back(step);
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.push(Scripted::Reply(text.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Scripted::Fail(message.into()));
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl PluginAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inference
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TollgateError> {
        Ok(())
    }
}

#[async_trait]
impl InferenceAdapter for MockAdapter {
    fn supports(&self, tier: Tier) -> bool {
        self.tiers.contains(tier)
    }

    async fn execute(&self, request: InferenceRequest) -> Result<InferenceResponse, TollgateError> {
        let tier = request.tier;
        self.requests.lock().push(request);
        let step = self.script.lock().pop_front();

        let text = match step {
            None => "mock response".to_string(),
            Some(Scripted::Reply(text)) => text,
            Some(Scripted::Fail(message)) => return Err(TollgateError::backend(tier, message)),
            Some(Scripted::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                text
            }
        };
        Ok(InferenceResponse {
            text,
            input_tokens: 10,
            output_tokens: 20,
            model: Some(self.name.clone()),
        })
    }
}
