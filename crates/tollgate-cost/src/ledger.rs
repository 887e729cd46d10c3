// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The live session cost ledger.
//!
//! Every mutation of the live record happens under one lock and completes
//! before it is released. Store I/O always runs on a snapshot taken under
//! the lock, never while holding it. Store writes are serialized by a
//! separate async lock and snapshot only once they hold it, so a slow flush
//! can never land on top of the record `end_session` wrote after it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Mutex as WriteLock;
use tollgate_core::{
    CostStore, IdGenerator, QueryCost, SessionCostRecord, Tier, TollgateError, TOP_QUERIES_LIMIT,
};
use tracing::{debug, info, warn};

use crate::pricing::{charge, truncate_prompt};
use crate::trends::CostTrends;

struct Inner {
    live: SessionCostRecord,
    /// Snapshots whose write failed, oldest first, at most one per id.
    pending: VecDeque<SessionCostRecord>,
}

impl Inner {
    fn enqueue(&mut self, record: SessionCostRecord) {
        match self.pending.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => self.pending.push_back(record),
        }
    }
}

/// Owns and prices the active session's [`SessionCostRecord`].
pub struct CostLedger {
    inner: Mutex<Inner>,
    writes: WriteLock<()>,
    store: Option<Arc<dyn CostStore>>,
    ids: Arc<dyn IdGenerator>,
}

impl CostLedger {
    /// Starts a fresh session record with an id from `ids`.
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        let live = SessionCostRecord::new(ids.next_id(), Utc::now());
        Self {
            inner: Mutex::new(Inner {
                live,
                pending: VecDeque::new(),
            }),
            writes: WriteLock::new(()),
            store: None,
            ids,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CostStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn session_id(&self) -> String {
        self.inner.lock().live.id.clone()
    }

    /// Prices one executed query and folds it into the live record.
    pub fn record(
        &self,
        tier: Tier,
        input_tokens: u64,
        output_tokens: u64,
        duration: Duration,
        prompt: &str,
    ) -> QueryCost {
        let priced = charge(tier, input_tokens, output_tokens);
        let entry = QueryCost {
            timestamp: Utc::now(),
            prompt: truncate_prompt(prompt),
            tier,
            input_tokens,
            output_tokens,
            cost: priced.cost,
            duration,
        };

        let (session_id, total_cost) = {
            let mut inner = self.inner.lock();
            let live = &mut inner.live;

            live.bucket_mut(tier).add(input_tokens, output_tokens);
            let usage = live.tiers.entry(tier).or_default();
            usage.queries += 1;
            usage.input_tokens += input_tokens;
            usage.output_tokens += output_tokens;
            usage.cost += priced.cost;
            usage.savings += priced.savings;

            live.query_count += 1;
            live.total_cost += priced.cost;
            live.savings += priced.savings;

            live.top_queries.push(entry.clone());
            live.top_queries
                .sort_by(|a, b| b.cost.total_cmp(&a.cost));
            live.top_queries.truncate(TOP_QUERIES_LIMIT);

            (live.id.clone(), live.total_cost)
        };

        info!(
            session_id = %session_id,
            tier = %tier,
            cost = entry.cost,
            savings = priced.savings,
            total_cost,
            "cost recorded"
        );
        entry
    }

    /// Deep copy of the live record.
    pub fn current_session(&self) -> SessionCostRecord {
        self.inner.lock().live.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Persists a snapshot of the live record.
    ///
    /// On failure the snapshot is queued for [`flush`](Self::flush) and the
    /// error is returned for the caller to log.
    pub async fn save(&self) -> Result<(), TollgateError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _write = self.writes.lock().await;
        let snapshot = self.current_session();
        match store.save(&snapshot).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(session_id = %snapshot.id, error = %e, "cost record save failed, queued for retry");
                self.inner.lock().enqueue(snapshot);
                Err(e)
            }
        }
    }

    /// Closes the live session and starts a new one.
    ///
    /// Returns the ended record. A failed write is queued, not returned.
    pub async fn end_session(&self) -> SessionCostRecord {
        let _write = self.writes.lock().await;
        let new_id = self.ids.next_id();
        let ended = {
            let mut inner = self.inner.lock();
            let mut fresh = SessionCostRecord::new(new_id, Utc::now());
            std::mem::swap(&mut inner.live, &mut fresh);
            fresh.end_time = Some(Utc::now());
            fresh
        };

        info!(
            session_id = %ended.id,
            queries = ended.query_count,
            total_cost = ended.total_cost,
            savings = ended.savings,
            "session ended"
        );

        if let Some(store) = &self.store
            && let Err(e) = store.save(&ended).await
        {
            warn!(session_id = %ended.id, error = %e, "ended session save failed, queued for retry");
            self.inner.lock().enqueue(ended.clone());
        }
        ended
    }

    /// Retries every queued write, then saves the live record.
    ///
    /// Returns how many records were written. Anything that fails again stays
    /// queued.
    pub async fn flush(&self) -> Result<usize, TollgateError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let _write = self.writes.lock().await;
        let snapshot = self.current_session();
        // A queued copy of the live record is superseded by the fresh snapshot.
        let queued: Vec<SessionCostRecord> = self
            .inner
            .lock()
            .pending
            .drain(..)
            .filter(|r| r.id != snapshot.id)
            .collect();
        let mut written = 0;
        let mut first_error = None;
        let mut failed = Vec::new();

        for record in queued {
            match store.save(&record).await {
                Ok(()) => written += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                    failed.push(record);
                }
            }
        }

        match store.save(&snapshot).await {
            Ok(()) => written += 1,
            Err(e) => {
                first_error.get_or_insert(e);
                failed.push(snapshot);
            }
        }

        if !failed.is_empty() {
            let mut inner = self.inner.lock();
            // Older failures go back ahead of anything queued meanwhile.
            for record in failed.into_iter().rev() {
                if !inner.pending.iter().any(|r| r.id == record.id) {
                    inner.pending.push_front(record);
                }
            }
        }

        match first_error {
            Some(e) => {
                warn!(error = %e, pending = self.pending_count(), "cost flush incomplete");
                Err(e)
            }
            None => {
                debug!(written, "cost ledger flushed");
                Ok(written)
            }
        }
    }

    /// Spend over the trailing `days`, live session included.
    pub async fn trends(&self, days: u32) -> Result<CostTrends, TollgateError> {
        let now = Utc::now();
        let from = now - chrono::Duration::days(i64::from(days));
        let live = self.current_session();

        let mut records = match &self.store {
            Some(store) => store.list(from, now).await?,
            None => Vec::new(),
        };
        records.retain(|r| r.id != live.id);
        if live.start_time >= from {
            records.push(live);
        }
        Ok(CostTrends::aggregate(days, &records))
    }

    /// A persisted record, or the live one if `id` names it.
    pub async fn load_session(&self, id: &str) -> Result<Option<SessionCostRecord>, TollgateError> {
        let live = self.current_session();
        if live.id == id {
            return Ok(Some(live));
        }
        match &self.store {
            Some(store) => store.load(id).await,
            None => Ok(None),
        }
    }

    pub async fn list_sessions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionCostRecord>, TollgateError> {
        match &self.store {
            Some(store) => store.list(from, to).await,
            None => Ok(Vec::new()),
        }
    }

    /// Deletes persisted sessions that started before `before`.
    pub async fn purge_before(&self, before: DateTime<Utc>) -> Result<usize, TollgateError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let removed = store.delete_before(before).await?;
        if removed > 0 {
            info!(removed, before = %before, "purged old cost records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::SequentialIds;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;
    use tollgate_test_utils::MemoryCostStore;
    use tracing_test::traced_test;

    fn ledger() -> CostLedger {
        CostLedger::new(Arc::new(SequentialIds::new("session")))
    }

    #[test]
    fn best_then_local_scenario() {
        let ledger = ledger();
        ledger.record(Tier::CloudBest, 500, 1500, Duration::from_millis(900), "deep question");
        ledger.record(Tier::Local, 200, 600, Duration::from_millis(300), "small question");

        let s = ledger.current_session();
        assert!((s.total_cost - 0.12).abs() < 1e-12);
        assert_eq!(s.top_queries[0].tier, Tier::CloudBest);
        assert_eq!(s.query_count, 2);
        assert_eq!(s.cloud_tokens.input, 500);
        assert_eq!(s.local_tokens.output, 600);
        assert!((s.savings - 0.048).abs() < 1e-12);
        assert!((s.total_cost - s.tier_cost_sum()).abs() < 1e-12);
    }

    #[test]
    fn cache_hits_cost_nothing_and_save_the_reference() {
        let ledger = ledger();
        let q = ledger.record(Tier::Cache, 500, 1500, Duration::ZERO, "repeat");
        assert_eq!(q.cost, 0.0);
        let s = ledger.current_session();
        assert!((s.savings - 0.12).abs() < 1e-12);
        assert_eq!(s.cache_tokens.output, 1500);
    }

    #[test]
    fn top_queries_keep_ten_most_expensive() {
        let ledger = ledger();
        for i in 1..=15u64 {
            ledger.record(Tier::CloudFast, i * 100, i * 100, Duration::ZERO, &format!("q{i}"));
        }
        let s = ledger.current_session();
        assert_eq!(s.top_queries.len(), 10);
        assert_eq!(s.top_queries[0].prompt, "q15");
        assert_eq!(s.top_queries[9].prompt, "q6");
        assert_eq!(s.query_count, 15);
    }

    #[test]
    fn current_session_is_a_snapshot() {
        let ledger = ledger();
        let before = ledger.current_session();
        ledger.record(Tier::CloudFast, 10, 10, Duration::ZERO, "x");
        assert_eq!(before.query_count, 0);
        assert_eq!(ledger.current_session().query_count, 1);
    }

    #[tokio::test]
    async fn end_session_persists_and_rotates_id() {
        let store = Arc::new(MemoryCostStore::new());
        let ledger = ledger().with_store(store.clone());
        assert_eq!(ledger.session_id(), "session-1");
        ledger.record(Tier::CloudFast, 100, 100, Duration::ZERO, "x");

        let ended = ledger.end_session().await;
        assert_eq!(ended.id, "session-1");
        assert!(ended.end_time.is_some());
        assert_eq!(ledger.session_id(), "session-2");
        assert_eq!(ledger.current_session().query_count, 0);

        let saved = store.get("session-1").expect("ended session persisted");
        assert_eq!(saved.query_count, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_save_is_queued_and_flushed_later() {
        let store = Arc::new(MemoryCostStore::new());
        let ledger = ledger().with_store(store.clone());
        ledger.record(Tier::CloudBalanced, 100, 100, Duration::ZERO, "x");

        store.fail_saves(true);
        assert!(ledger.save().await.is_err());
        ledger.end_session().await;
        assert_eq!(ledger.pending_count(), 1);
        assert!(logs_contain("queued for retry"));

        assert!(ledger.flush().await.is_err());
        assert!(ledger.pending_count() >= 1);

        store.fail_saves(false);
        let written = ledger.flush().await.expect("flush should succeed");
        assert_eq!(written, 2);
        assert_eq!(ledger.pending_count(), 0);
        assert!(store.get("session-1").is_some());
        assert!(store.get("session-2").is_some());
    }

    /// Parks the first save until released.
    #[derive(Default)]
    struct SlowFirstSave {
        records: MemoryCostStore,
        started: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl CostStore for SlowFirstSave {
        async fn save(&self, record: &SessionCostRecord) -> Result<(), TollgateError> {
            if !self.started.swap(true, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.records.save(record).await
        }

        async fn load(&self, id: &str) -> Result<Option<SessionCostRecord>, TollgateError> {
            self.records.load(id).await
        }

        async fn list(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<SessionCostRecord>, TollgateError> {
            self.records.list(from, to).await
        }

        async fn delete(&self, id: &str) -> Result<(), TollgateError> {
            self.records.delete(id).await
        }

        async fn delete_before(&self, before: DateTime<Utc>) -> Result<usize, TollgateError> {
            self.records.delete_before(before).await
        }

        async fn count(&self) -> Result<usize, TollgateError> {
            self.records.count().await
        }
    }

    #[tokio::test]
    async fn slow_flush_cannot_overwrite_the_ended_record() {
        let store = Arc::new(SlowFirstSave::default());
        let ledger = Arc::new(ledger().with_store(store.clone()));
        ledger.record(Tier::CloudFast, 100, 100, Duration::ZERO, "x");

        let flushing = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.flush().await }
        });
        store.entered.notified().await;

        let ending = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.end_session().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.release.notify_one();

        flushing.await.unwrap().unwrap();
        let ended = ending.await.unwrap();
        let saved = store.records.get(&ended.id).unwrap();
        assert!(saved.end_time.is_some());
        assert_eq!(saved.query_count, 1);
    }

    #[tokio::test]
    async fn trends_include_live_session() {
        let store = Arc::new(MemoryCostStore::new());
        let ledger = ledger().with_store(store.clone());
        ledger.record(Tier::CloudFast, 1000, 1000, Duration::ZERO, "a");
        ledger.end_session().await;
        ledger.record(Tier::CloudFast, 1000, 1000, Duration::ZERO, "b");
        ledger.save().await.expect("save");

        let trends = ledger.trends(7).await.expect("trends");
        assert_eq!(trends.total_queries, 2);
        assert!((trends.total_cost - 2.0 * Tier::CloudFast.cost(1000, 1000)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn load_list_and_purge() {
        let store = Arc::new(MemoryCostStore::new());
        let ledger = ledger().with_store(store.clone());
        ledger.end_session().await;

        assert!(ledger.load_session("session-1").await.unwrap().is_some());
        assert_eq!(
            ledger.load_session("session-2").await.unwrap().map(|r| r.id),
            Some("session-2".to_string())
        );
        let listed = ledger
            .list_sessions(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let removed = ledger
            .purge_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn tier() -> impl Strategy<Value = Tier> {
            prop::sample::select(Tier::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn invariants_hold_after_any_sequence(
                calls in prop::collection::vec((tier(), 0u64..5000, 0u64..5000), 0..40)
            ) {
                let ledger = ledger();
                let mut expected_cost = 0.0;
                let mut expected_savings = 0.0;
                for (tier, input, output) in &calls {
                    let q = ledger.record(*tier, *input, *output, Duration::ZERO, "p");
                    let exact = tier.rates().input_per_1k * *input as f64 / 1000.0
                        + tier.rates().output_per_1k * *output as f64 / 1000.0;
                    prop_assert!((q.cost - exact).abs() < 1e-12);
                    expected_cost += exact;
                    expected_savings += Tier::reference_cost(*input, *output) - exact;
                }
                let s = ledger.current_session();
                prop_assert!(s.top_queries.len() <= TOP_QUERIES_LIMIT);
                prop_assert!(s.top_queries.windows(2).all(|w| w[0].cost >= w[1].cost));
                prop_assert!((s.total_cost - expected_cost).abs() < 1e-9);
                prop_assert!((s.savings - expected_savings).abs() < 1e-9);
                prop_assert!((s.total_cost - s.tier_cost_sum()).abs() < 1e-9);
                prop_assert_eq!(s.query_count, calls.len() as u64);
            }
        }
    }
}
