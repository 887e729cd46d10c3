// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the persistence traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use tollgate_config::model::StorageConfig;
use tollgate_core::{
    AdapterType, AuditEvent, AuditSink, CacheStore, CostStore, HealthStatus, PluginAdapter,
    SessionCostRecord, StoredCacheEntry, TollgateError,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed store for cost records, cache entries and audit events.
///
/// Clones share one connection. Hand the same instance to the ledger, the
/// cache and the audit log.
#[derive(Clone)]
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    /// Opens the database named by `config`, creating it if needed.
    pub async fn open(config: &StorageConfig) -> Result<Self, TollgateError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite storage initialized");
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Hash of the newest audit event, if any.
    pub async fn last_audit_hash(&self) -> Result<Option<String>, TollgateError> {
        queries::audit::last_hash(&self.db).await
    }

    /// The complete audit trail in chain order.
    pub async fn audit_events(&self) -> Result<Vec<AuditEvent>, TollgateError> {
        queries::audit::load_all(&self.db).await
    }

    pub async fn audit_event_count(&self) -> Result<usize, TollgateError> {
        queries::audit::count(&self.db).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TollgateError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl CostStore for SqliteStorage {
    async fn save(&self, record: &SessionCostRecord) -> Result<(), TollgateError> {
        queries::cost::save(&self.db, record).await
    }

    async fn load(&self, id: &str) -> Result<Option<SessionCostRecord>, TollgateError> {
        queries::cost::load(&self.db, id).await
    }

    async fn list(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionCostRecord>, TollgateError> {
        queries::cost::list(&self.db, from, to).await
    }

    async fn delete(&self, id: &str) -> Result<(), TollgateError> {
        queries::cost::delete(&self.db, id).await
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<usize, TollgateError> {
        queries::cost::delete_before(&self.db, before).await
    }

    async fn count(&self) -> Result<usize, TollgateError> {
        queries::cost::count(&self.db).await
    }
}

#[async_trait]
impl CacheStore for SqliteStorage {
    async fn put(&self, entry: &StoredCacheEntry) -> Result<(), TollgateError> {
        queries::cache::put(&self.db, entry).await
    }

    async fn remove(&self, fingerprint: &str) -> Result<(), TollgateError> {
        queries::cache::remove(&self.db, fingerprint).await
    }

    async fn load_all(&self) -> Result<Vec<StoredCacheEntry>, TollgateError> {
        queries::cache::load_all(&self.db).await
    }
}

#[async_trait]
impl AuditSink for SqliteStorage {
    async fn append(&self, event: &AuditEvent) -> Result<(), TollgateError> {
        queries::audit::append(&self.db, event).await
    }
}
