// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tollgate dispatch layer.
//!
//! This crate provides the foundational types every other crate agrees on:
//! the ordered [`ClassificationLevel`] and [`Tier`] enums with the tier cost
//! model, persisted record shapes, the error taxonomy, identifier generators,
//! and the adapter traits for inference backends and persistence.

pub mod error;
pub mod ids;
pub mod records;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TollgateError;
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use records::{
    AuditEvent, AuditKind, CacheOutcome, Decision, QueryCost, SessionCostRecord,
    StoredCacheEntry, TierUsage, TokenCounts, TOP_QUERIES_LIMIT,
};
pub use types::{
    AdapterType, ClassificationLevel, HealthStatus, HitType, InferenceRequest,
    InferenceResponse, SessionId, Tier, TierRates, TierSet,
};

pub use traits::{AuditSink, CacheStore, CostStore, InferenceAdapter, PluginAdapter};
