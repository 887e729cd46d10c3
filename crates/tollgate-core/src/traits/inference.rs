// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inference backend trait.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InferenceRequest, InferenceResponse, Tier};

/// Executes a prompt on one or more tiers.
///
/// The core treats the call as opaque. Failures and timeouts must be reported
/// as [`TollgateError::BackendFailure`] or [`TollgateError::Timeout`].
#[async_trait]
pub trait InferenceAdapter: PluginAdapter {
    /// Whether this adapter can serve calls routed to `tier`.
    fn supports(&self, tier: Tier) -> bool;

    /// Runs one prompt to completion.
    async fn execute(&self, request: InferenceRequest) -> Result<InferenceResponse, TollgateError>;
}
