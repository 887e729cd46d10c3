// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementations of the persistence traits.
//!
//! Each store is `Clone` and clones share state, so a test can hand one
//! copy to the component under test and inspect the other.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tollgate_core::{
    AuditEvent, AuditSink, CacheStore, CostStore, SessionCostRecord, StoredCacheEntry,
    TollgateError,
};

fn injected(what: &str) -> std::io::Error {
    std::io::Error::other(format!("injected {what} failure"))
}

/// Cost records keyed by session id.
#[derive(Clone, Default)]
pub struct MemoryCostStore {
    records: Arc<Mutex<BTreeMap<String, SessionCostRecord>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryCostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `save` returns a persistence failure.
    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<SessionCostRecord> {
        self.records.lock().get(id).cloned()
    }

    pub fn records(&self) -> Vec<SessionCostRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Inserts directly, bypassing the failure switch.
    pub fn seed(&self, record: SessionCostRecord) {
        self.records.lock().insert(record.id.clone(), record);
    }
}

#[async_trait]
impl CostStore for MemoryCostStore {
    async fn save(&self, record: &SessionCostRecord) -> Result<(), TollgateError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TollgateError::persistence(injected("save")));
        }
        self.records.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SessionCostRecord>, TollgateError> {
        Ok(self.get(id))
    }

    async fn list(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionCostRecord>, TollgateError> {
        let mut listed: Vec<_> = self
            .records
            .lock()
            .values()
            .filter(|r| r.start_time >= from && r.start_time <= to)
            .cloned()
            .collect();
        listed.sort_by_key(|r| r.start_time);
        Ok(listed)
    }

    async fn delete(&self, id: &str) -> Result<(), TollgateError> {
        self.records.lock().remove(id);
        Ok(())
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<usize, TollgateError> {
        let mut records = self.records.lock();
        let start = records.len();
        records.retain(|_, r| r.start_time >= before);
        Ok(start - records.len())
    }

    async fn count(&self) -> Result<usize, TollgateError> {
        Ok(self.records.lock().len())
    }
}

/// Cache rows keyed by fingerprint.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<Mutex<BTreeMap<String, StoredCacheEntry>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `put` and `remove` return a cache failure.
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<StoredCacheEntry> {
        self.entries.lock().values().cloned().collect()
    }

    /// Moves every entry's creation time `by` into the past.
    pub fn age_all(&self, by: chrono::Duration) {
        for entry in self.entries.lock().values_mut() {
            entry.created_at -= by;
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn put(&self, entry: &StoredCacheEntry) -> Result<(), TollgateError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TollgateError::cache(injected("cache put")));
        }
        self.entries
            .lock()
            .insert(entry.fingerprint.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<(), TollgateError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TollgateError::cache(injected("cache remove")));
        }
        self.entries.lock().remove(fingerprint);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StoredCacheEntry>, TollgateError> {
        Ok(self.entries())
    }
}

/// Audit events in append order.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `append` returns a persistence failure.
    pub fn fail_appends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<(), TollgateError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TollgateError::persistence(injected("audit append")));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}
