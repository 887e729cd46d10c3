// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence seams for cost records, cache entries and audit events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TollgateError;
use crate::records::{AuditEvent, SessionCostRecord, StoredCacheEntry};

/// Durable key-value store for session cost records, keyed by session id.
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Inserts or replaces the record with the same id.
    async fn save(&self, record: &SessionCostRecord) -> Result<(), TollgateError>;

    async fn load(&self, id: &str) -> Result<Option<SessionCostRecord>, TollgateError>;

    /// Records whose start time falls in `[from, to]`, oldest first.
    async fn list(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionCostRecord>, TollgateError>;

    async fn delete(&self, id: &str) -> Result<(), TollgateError>;

    /// Deletes every record that started before `before`. Returns how many went.
    async fn delete_before(&self, before: DateTime<Utc>) -> Result<usize, TollgateError>;

    async fn count(&self) -> Result<usize, TollgateError>;
}

/// Write-through backing store for the result cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn put(&self, entry: &StoredCacheEntry) -> Result<(), TollgateError>;

    async fn remove(&self, fingerprint: &str) -> Result<(), TollgateError>;

    /// Every persisted entry, expired ones included.
    async fn load_all(&self) -> Result<Vec<StoredCacheEntry>, TollgateError>;
}

/// Append-only destination for audit events. The core never reads back.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), TollgateError>;
}
