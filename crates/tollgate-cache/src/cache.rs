// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory result cache with optional write-through persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tollgate_config::model::CacheConfig;
use tollgate_core::{
    CacheStore, ClassificationLevel, HitType, StoredCacheEntry, Tier, TollgateError,
};
use tracing::{debug, warn};

use crate::fingerprint::{fingerprint_normalized, normalize, Fingerprint};
use crate::similarity::{jaccard, token_set};

/// An answer worth keeping, with what it originally cost to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
    pub payload: String,
    /// Tier that produced the answer.
    pub tier: Tier,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub answer: CachedAnswer,
    pub hit_type: HitType,
    pub age: Duration,
}

/// Counters since construction (or the last `clear`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits_exact: u64,
    pub hits_semantic: u64,
    pub misses: u64,
    /// Entries dropped for expiry or capacity.
    pub evictions: u64,
}

/// Runtime knobs, usually built from [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub semantic_enabled: bool,
    pub semantic_threshold: f64,
    pub max_entries: usize,
    pub default_ttl: Duration,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            semantic_enabled: config.semantic_enabled,
            semantic_threshold: config.semantic_threshold,
            max_entries: config.max_entries,
            default_ttl: config.ttl(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

struct Entry {
    query: String,
    tokens: BTreeSet<String>,
    answer: CachedAnswer,
    created_at: DateTime<Utc>,
    ttl: Duration,
    seq: u64,
}

impl Entry {
    /// `ttl == 0` never expires.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let age = now.signed_duration_since(self.created_at);
        age.to_std().is_ok_and(|age| age > self.ttl)
    }

    fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default()
    }
}

type TokenIndex = HashMap<String, HashSet<Fingerprint>>;

#[derive(Default)]
struct Inner {
    partitions: HashMap<ClassificationLevel, HashMap<Fingerprint, Entry>>,
    /// Per-partition postings: token -> entries containing it.
    tokens: HashMap<ClassificationLevel, TokenIndex>,
    /// Insertion order across all partitions, oldest first.
    order: BTreeMap<u64, (ClassificationLevel, Fingerprint)>,
    next_seq: u64,
    stats: CacheStats,
}

impl Inner {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn remove(&mut self, level: ClassificationLevel, fp: &Fingerprint) -> Option<Entry> {
        let partition = self.partitions.get_mut(&level)?;
        let entry = partition.remove(fp)?;
        self.order.remove(&entry.seq);
        if let Some(index) = self.tokens.get_mut(&level) {
            for token in &entry.tokens {
                if let Some(postings) = index.get_mut(token) {
                    postings.remove(fp);
                    if postings.is_empty() {
                        index.remove(token);
                    }
                }
            }
        }
        Some(entry)
    }

    fn insert(&mut self, level: ClassificationLevel, fp: Fingerprint, mut entry: Entry) {
        self.remove(level, &fp);
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(entry.seq, (level, fp.clone()));
        let index = self.tokens.entry(level).or_default();
        for token in &entry.tokens {
            index.entry(token.clone()).or_default().insert(fp.clone());
        }
        self.partitions.entry(level).or_default().insert(fp, entry);
    }

    /// Drops oldest entries until at most `max` remain.
    fn enforce_capacity(&mut self, max: usize) -> Vec<Fingerprint> {
        let mut evicted = Vec::new();
        while self.len() > max {
            let Some((&seq, (level, fp))) = self.order.first_key_value() else {
                break;
            };
            let (level, fp) = (*level, fp.clone());
            if self.remove(level, &fp).is_none() {
                self.order.remove(&seq);
            }
            self.stats.evictions += 1;
            evicted.push(fp);
        }
        evicted
    }
}

/// Classification-partitioned result cache.
///
/// All state sits behind a single lock. Store I/O runs after it is released,
/// and store failures are logged and swallowed.
pub struct ResultCache {
    settings: CacheSettings,
    inner: Mutex<Inner>,
    store: Option<Arc<dyn CacheStore>>,
}

impl ResultCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner::default()),
            store: None,
        }
    }

    /// Persists every store and removal through `store`.
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn lookup(&self, query: &str, level: ClassificationLevel) -> Option<CacheHit> {
        self.lookup_at(query, level, Utc::now())
    }

    fn lookup_at(
        &self,
        query: &str,
        level: ClassificationLevel,
        now: DateTime<Utc>,
    ) -> Option<CacheHit> {
        if !self.settings.enabled {
            return None;
        }
        let normalized = normalize(query);
        let fp = fingerprint_normalized(&normalized, level);

        let mut inner = self.inner.lock();

        let exact = inner
            .partitions
            .get(&level)
            .and_then(|p| p.get(&fp))
            .map(|e| (e.is_expired(now), e.answer.clone(), e.age(now)));
        match exact {
            Some((false, answer, age)) => {
                inner.stats.hits_exact += 1;
                return Some(CacheHit {
                    answer,
                    hit_type: HitType::Exact,
                    age,
                });
            }
            Some((true, _, _)) => {
                inner.remove(level, &fp);
                inner.stats.evictions += 1;
                debug!(fingerprint = %fp, "evicted expired cache entry");
            }
            None => {}
        }

        if self.settings.semantic_enabled
            && let Some(hit) = semantic_probe(&inner, level, &normalized, self.settings.semantic_threshold, now)
        {
            inner.stats.hits_semantic += 1;
            return Some(hit);
        }

        inner.stats.misses += 1;
        None
    }

    /// Stores `answer` for `query` under `level`, replacing any existing entry.
    ///
    /// `ttl` of `None` uses the configured default; zero never expires.
    pub async fn store(
        &self,
        query: &str,
        level: ClassificationLevel,
        answer: CachedAnswer,
        ttl: Option<Duration>,
    ) {
        if !self.settings.enabled {
            return;
        }
        let ttl = ttl.unwrap_or(self.settings.default_ttl);
        let created_at = Utc::now();
        let normalized = normalize(query);
        let fp = fingerprint_normalized(&normalized, level);

        let persisted = StoredCacheEntry {
            fingerprint: fp.to_string(),
            classification: level,
            query: normalized.clone(),
            payload: answer.payload.clone(),
            tier: answer.tier,
            input_tokens: answer.input_tokens,
            output_tokens: answer.output_tokens,
            created_at,
            ttl_secs: ttl.as_secs(),
        };

        let evicted = {
            let mut inner = self.inner.lock();
            let entry = Entry {
                tokens: token_set(&normalized),
                query: normalized,
                answer,
                created_at,
                ttl,
                seq: 0,
            };
            inner.insert(level, fp, entry);
            inner.enforce_capacity(self.settings.max_entries)
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.put(&persisted).await {
                warn!(error = %TollgateError::cache(e), "cache write-through failed, entry kept in memory only");
            }
            for fp in evicted {
                if let Err(e) = store.remove(fp.as_str()).await {
                    warn!(error = %TollgateError::cache(e), "failed to remove evicted cache entry");
                }
            }
        }
    }

    /// Removes the entry for `query` under `level`. Returns whether one existed.
    pub async fn invalidate(&self, query: &str, level: ClassificationLevel) -> bool {
        let fp = fingerprint_normalized(&normalize(query), level);
        let removed = self.inner.lock().remove(level, &fp).is_some();
        if removed {
            self.remove_persisted(&[fp]).await;
        }
        removed
    }

    /// Evicts every expired entry. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let expired = {
            let mut inner = self.inner.lock();
            let doomed: Vec<(ClassificationLevel, Fingerprint)> = inner
                .partitions
                .iter()
                .flat_map(|(level, partition)| {
                    partition
                        .iter()
                        .filter(|(_, e)| e.is_expired(now))
                        .map(|(fp, _)| (*level, fp.clone()))
                })
                .collect();
            for (level, fp) in &doomed {
                inner.remove(*level, fp);
            }
            inner.stats.evictions += doomed.len() as u64;
            doomed.into_iter().map(|(_, fp)| fp).collect::<Vec<_>>()
        };
        let count = expired.len();
        self.remove_persisted(&expired).await;
        count
    }

    /// Drops every entry and resets the counters.
    pub async fn clear(&self) {
        let all: Vec<Fingerprint> = {
            let mut inner = self.inner.lock();
            let all = inner.order.values().map(|(_, fp)| fp.clone()).collect();
            *inner = Inner::default();
            all
        };
        self.remove_persisted(&all).await;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.len(),
            ..inner.stats
        }
    }

    /// Loads unexpired persisted entries into memory. Returns how many loaded.
    ///
    /// Entries whose fingerprint does not match their own query and level are
    /// skipped.
    pub async fn warm(&self, store: &dyn CacheStore) -> Result<usize, TollgateError> {
        let stored = store.load_all().await?;
        let now = Utc::now();

        let mut inner = self.inner.lock();
        let mut loaded = 0;
        let mut sorted = stored;
        sorted.sort_by_key(|e| e.created_at);
        for record in sorted {
            let normalized = normalize(&record.query);
            let fp = fingerprint_normalized(&normalized, record.classification);
            if fp.as_str() != record.fingerprint {
                warn!(fingerprint = %record.fingerprint, "skipping cache entry with mismatched fingerprint");
                continue;
            }
            let entry = Entry {
                tokens: token_set(&normalized),
                query: normalized,
                answer: CachedAnswer {
                    payload: record.payload,
                    tier: record.tier,
                    input_tokens: record.input_tokens,
                    output_tokens: record.output_tokens,
                },
                created_at: record.created_at,
                ttl: Duration::from_secs(record.ttl_secs),
                seq: 0,
            };
            if entry.is_expired(now) {
                continue;
            }
            inner.insert(record.classification, fp, entry);
            loaded += 1;
        }
        let evicted = inner.enforce_capacity(self.settings.max_entries);
        Ok(loaded - evicted.len().min(loaded))
    }

    async fn remove_persisted(&self, fingerprints: &[Fingerprint]) {
        let Some(store) = &self.store else {
            return;
        };
        for fp in fingerprints {
            if let Err(e) = store.remove(fp.as_str()).await {
                warn!(error = %TollgateError::cache(e), fingerprint = %fp, "failed to remove persisted cache entry");
            }
        }
    }
}

/// Best non-expired match in `level`'s partition at or above `threshold`.
/// Ties go to the most recent entry.
fn semantic_probe(
    inner: &Inner,
    level: ClassificationLevel,
    normalized: &str,
    threshold: f64,
    now: DateTime<Utc>,
) -> Option<CacheHit> {
    let partition = inner.partitions.get(&level)?;
    let index = inner.tokens.get(&level)?;
    let probe = token_set(normalized);

    // A positive threshold needs at least one shared token, so only entries
    // in the probe's postings are scored.
    let candidates: HashSet<&Fingerprint> = probe
        .iter()
        .filter_map(|token| index.get(token))
        .flatten()
        .collect();

    candidates
        .into_iter()
        .filter_map(|fp| partition.get(fp))
        .filter(|e| !e.is_expired(now) && e.query != normalized)
        .map(|e| (jaccard(&probe, &e.tokens), e))
        .filter(|(score, _)| *score >= threshold)
        .max_by(|a, b| a.0.total_cmp(&b.0).then(a.1.seq.cmp(&b.1.seq)))
        .map(|(_, e)| CacheHit {
            answer: e.answer.clone(),
            hit_type: HitType::Semantic,
            age: e.age(now),
        })
}
