// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tollgate dispatch layer.

use thiserror::Error;

use crate::types::{ClassificationLevel, Tier};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Tollgate adapter traits and core operations.
///
/// Only [`TollgateError::BackendFailure`] is meant to reach the user. Every
/// other kind is recovered inside the core: policy violations become forced
/// downgrades, cache failures become misses, and persistence failures are
/// queued for the next flush.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// A tier outside the permitted set was requested for a classification.
    #[error("policy violation: {tier} is not permitted for {classification} data")]
    PolicyViolation {
        classification: ClassificationLevel,
        tier: Tier,
    },

    /// Cache storage layer failed on lookup or store.
    #[error("cache unavailable: {source}")]
    CacheUnavailable { source: BoxError },

    /// Inference backend errored or timed out.
    #[error("backend failure on {tier}: {message}")]
    BackendFailure {
        tier: Tier,
        message: String,
        source: Option<BoxError>,
    },

    /// A cost record or audit event could not be written.
    #[error("persistence failure: {source}")]
    PersistenceFailure { source: BoxError },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TollgateError {
    /// Builds a [`TollgateError::BackendFailure`] without an underlying source.
    pub fn backend(tier: Tier, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            tier,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a [`TollgateError::PersistenceFailure`].
    pub fn persistence(source: impl Into<BoxError>) -> Self {
        Self::PersistenceFailure {
            source: source.into(),
        }
    }

    /// Wraps any error as a [`TollgateError::CacheUnavailable`].
    pub fn cache(source: impl Into<BoxError>) -> Self {
        Self::CacheUnavailable {
            source: source.into(),
        }
    }

    /// Whether this error is allowed to surface to the interactive user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::BackendFailure { .. })
    }
}
