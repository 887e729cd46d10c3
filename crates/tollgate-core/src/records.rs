// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted record shapes: session cost records, cache rows and audit events.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ClassificationLevel, HitType, Tier};

/// Maximum number of entries kept in [`SessionCostRecord::top_queries`].
pub const TOP_QUERIES_LIMIT: usize = 10;

/// Input/output token pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
}

impl TokenCounts {
    pub fn add(&mut self, input: u64, output: u64) {
        self.input += input;
        self.output += output;
    }

    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// Accumulated usage of one tier within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierUsage {
    pub queries: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub savings: f64,
}

/// One entry of the most-expensive-queries list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCost {
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub tier: Tier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

/// Cost and token accounting for one interactive session.
///
/// `total_cost` always equals the sum of `tiers[*].cost`, and `top_queries`
/// is sorted by cost descending with at most [`TOP_QUERIES_LIMIT`] entries.
/// The ledger is the only writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCostRecord {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub cache_tokens: TokenCounts,
    pub local_tokens: TokenCounts,
    pub cloud_tokens: TokenCounts,
    #[serde(default)]
    pub tiers: BTreeMap<Tier, TierUsage>,
    #[serde(default)]
    pub query_count: u64,
    pub total_cost: f64,
    pub savings: f64,
    pub top_queries: Vec<QueryCost>,
}

impl SessionCostRecord {
    pub fn new(id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            cache_tokens: TokenCounts::default(),
            local_tokens: TokenCounts::default(),
            cloud_tokens: TokenCounts::default(),
            tiers: BTreeMap::new(),
            query_count: 0,
            total_cost: 0.0,
            savings: 0.0,
            top_queries: Vec::new(),
        }
    }

    /// Sum of the per-tier costs. Equal to `total_cost` up to float rounding.
    pub fn tier_cost_sum(&self) -> f64 {
        self.tiers.values().map(|u| u.cost).sum()
    }

    /// Token bucket a tier's usage is reported under.
    pub fn bucket_mut(&mut self, tier: Tier) -> &mut TokenCounts {
        match tier {
            Tier::Cache => &mut self.cache_tokens,
            Tier::Local => &mut self.local_tokens,
            Tier::CloudFast | Tier::CloudBalanced | Tier::CloudBest => &mut self.cloud_tokens,
        }
    }
}

/// A cache entry as written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCacheEntry {
    pub fingerprint: String,
    pub classification: ClassificationLevel,
    /// Normalized query text, kept for semantic matching after a restart.
    pub query: String,
    pub payload: String,
    pub tier: Tier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub created_at: DateTime<Utc>,
    /// Zero means the entry never expires.
    pub ttl_secs: u64,
}

/// Cache result attached to an audited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    HitExact,
    HitSemantic,
    Miss,
    /// Lookup skipped because the caller forced a re-fetch.
    Bypass,
}

impl From<HitType> for CacheOutcome {
    fn from(hit: HitType) -> Self {
        match hit {
            HitType::Exact => Self::HitExact,
            HitType::Semantic => Self::HitSemantic,
        }
    }
}

/// What an audit event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditKind {
    CacheHit,
    Routed,
    Retried,
    BackendFailure,
}

/// Tier and cache decision recorded for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub tier: Tier,
    pub cache_outcome: CacheOutcome,
    pub forced_downgrade: bool,
}

/// Append-only compliance record. Never mutated after it is chained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    pub classification: ClassificationLevel,
    pub session_id: String,
    pub decision: Decision,
    pub cost: f64,
    pub tokens: TokenCounts,
    pub success: bool,
    pub query_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub prev_hash: String,
    pub hash: String,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
