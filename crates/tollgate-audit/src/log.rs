// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The audit log: chaining under one lock, sink writes in `flush`.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tollgate_core::{
    AuditEvent, AuditKind, AuditSink, CacheOutcome, ClassificationLevel, Decision, HitType,
    IdGenerator, Tier, TokenCounts, TollgateError,
};
use tracing::{debug, warn};

use crate::chain::{compute_hash, GENESIS_HASH};

/// Characters of the (redacted) query kept in each event.
pub const QUERY_PREVIEW_CHARS: usize = 50;

/// Per-query facts shared by every event about that query.
#[derive(Debug, Clone, Copy)]
pub struct AuditContext<'a> {
    pub classification: ClassificationLevel,
    pub session_id: &'a str,
    pub query: &'a str,
}

struct ChainState {
    prev_hash: String,
    pending: VecDeque<AuditEvent>,
}

/// Hash-chained audit log with a retrying write queue.
pub struct AuditLog {
    state: Mutex<ChainState>,
    /// Serializes sink writes so events land in chain order.
    writer: tokio::sync::Mutex<()>,
    sink: Arc<dyn AuditSink>,
    ids: Arc<dyn IdGenerator>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(ChainState {
                prev_hash: GENESIS_HASH.to_string(),
                pending: VecDeque::new(),
            }),
            writer: tokio::sync::Mutex::new(()),
            sink,
            ids,
        }
    }

    /// Continues an existing chain whose last persisted hash is `last_hash`.
    pub fn resume_after(self, last_hash: impl Into<String>) -> Self {
        self.state.lock().prev_hash = last_hash.into();
        self
    }

    pub fn last_hash(&self) -> String {
        self.state.lock().prev_hash.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// A query answered from the cache at zero cost.
    pub fn record_cache_hit(
        &self,
        ctx: &AuditContext<'_>,
        hit: HitType,
        tokens: TokenCounts,
    ) -> AuditEvent {
        let decision = Decision {
            tier: Tier::Cache,
            cache_outcome: CacheOutcome::from(hit),
            forced_downgrade: false,
        };
        self.append(ctx, AuditKind::CacheHit, decision, 0.0, tokens, true, None)
    }

    /// A query that ran on a backend and succeeded.
    pub fn record_decision(
        &self,
        ctx: &AuditContext<'_>,
        decision: Decision,
        cost: f64,
        tokens: TokenCounts,
    ) -> AuditEvent {
        self.append(ctx, AuditKind::Routed, decision, cost, tokens, true, None)
    }

    /// A failed attempt on `decision.tier` that is about to be retried on
    /// `retry_tier`.
    pub fn record_retry(
        &self,
        ctx: &AuditContext<'_>,
        decision: Decision,
        retry_tier: Tier,
        error: &str,
    ) -> AuditEvent {
        let detail = format!("retrying on {retry_tier}: {error}");
        self.append(ctx, AuditKind::Retried, decision, 0.0, TokenCounts::default(), false, Some(detail))
    }

    /// A query that failed with no retry left.
    pub fn record_backend_failure(
        &self,
        ctx: &AuditContext<'_>,
        decision: Decision,
        error: &str,
    ) -> AuditEvent {
        self.append(
            ctx,
            AuditKind::BackendFailure,
            decision,
            0.0,
            TokenCounts::default(),
            false,
            Some(error.to_string()),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &self,
        ctx: &AuditContext<'_>,
        kind: AuditKind,
        decision: Decision,
        cost: f64,
        tokens: TokenCounts,
        success: bool,
        detail: Option<String>,
    ) -> AuditEvent {
        let mut event = AuditEvent {
            event_id: self.ids.next_id(),
            timestamp: Utc::now(),
            kind,
            classification: ctx.classification,
            session_id: ctx.session_id.to_string(),
            decision,
            cost,
            tokens,
            success,
            query_preview: tollgate_security::preview(ctx.query, QUERY_PREVIEW_CHARS),
            detail: detail.map(|d| tollgate_security::redact(&d, &[])),
            prev_hash: String::new(),
            hash: String::new(),
        };

        let mut state = self.state.lock();
        event.prev_hash = state.prev_hash.clone();
        event.hash = match compute_hash(&event) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, event_id = %event.event_id, "audit event hashed without body");
                bodyless_hash(&event.prev_hash, &event.event_id)
            }
        };
        state.prev_hash = event.hash.clone();
        state.pending.push_back(event.clone());
        drop(state);

        debug!(
            kind = %kind,
            tier = %decision.tier,
            classification = %ctx.classification,
            forced_downgrade = decision.forced_downgrade,
            "audit event chained"
        );
        event
    }

    /// Writes queued events to the sink in chain order.
    ///
    /// On a sink failure the unwritten events go back to the front of the
    /// queue and the error is returned. Returns how many were written.
    pub async fn flush(&self) -> Result<usize, TollgateError> {
        let _writer = self.writer.lock().await;
        let batch: Vec<AuditEvent> = self.state.lock().pending.drain(..).collect();

        for (written, event) in batch.iter().enumerate() {
            if let Err(e) = self.sink.append(event).await {
                let mut state = self.state.lock();
                for unwritten in batch[written..].iter().rev() {
                    state.pending.push_front(unwritten.clone());
                }
                let pending = state.pending.len();
                drop(state);
                warn!(error = %e, written, pending, "audit flush failed, events re-queued");
                return Err(TollgateError::persistence(e));
            }
        }
        Ok(batch.len())
    }
}

fn bodyless_hash(prev_hash: &str, event_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(event_id.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::verify_chain;
    use tollgate_core::SequentialIds;
    use tollgate_test_utils::MemoryAuditSink;
    use tracing_test::traced_test;

    fn ctx(query: &str) -> AuditContext<'_> {
        AuditContext {
            classification: ClassificationLevel::Cui,
            session_id: "session-1",
            query,
        }
    }

    fn log(sink: Arc<MemoryAuditSink>) -> AuditLog {
        AuditLog::new(sink, Arc::new(SequentialIds::new("evt")))
    }

    fn downgraded() -> Decision {
        Decision {
            tier: Tier::Local,
            cache_outcome: CacheOutcome::Miss,
            forced_downgrade: true,
        }
    }

    #[tokio::test]
    async fn events_chain_and_flush_in_order() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = log(sink.clone());

        let first = log.record_decision(&ctx("a"), downgraded(), 0.0, TokenCounts::default());
        let second = log.record_cache_hit(&ctx("a"), HitType::Exact, TokenCounts { input: 5, output: 9 });
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(second.decision.tier, Tier::Cache);
        assert_eq!(second.cost, 0.0);

        assert_eq!(log.flush().await.unwrap(), 2);
        let written = sink.events();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].event_id, "evt-1");
        assert!(written[0].decision.forced_downgrade);
        assert_eq!(verify_chain(&written), Ok(()));
    }

    #[test]
    fn previews_are_redacted_and_truncated() {
        let log = log(Arc::new(MemoryAuditSink::new()));
        let long = format!("my key is sk-ant-api03-{} and {}", "a".repeat(30), "x ".repeat(60));
        let event = log.record_decision(&ctx(&long), downgraded(), 0.0, TokenCounts::default());
        assert!(!event.query_preview.contains("sk-ant"));
        assert!(event.query_preview.chars().count() <= QUERY_PREVIEW_CHARS);
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_flush_requeues_in_front() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = log(sink.clone());
        log.record_decision(&ctx("a"), downgraded(), 0.0, TokenCounts::default());
        log.record_retry(&ctx("a"), downgraded(), Tier::Local, "timeout");

        sink.fail_appends(true);
        assert!(log.flush().await.is_err());
        assert_eq!(log.pending_count(), 2);
        assert!(logs_contain("audit flush failed"));

        log.record_backend_failure(&ctx("b"), downgraded(), "connection refused");
        sink.fail_appends(false);
        assert_eq!(log.flush().await.unwrap(), 3);

        let written = sink.events();
        assert_eq!(written[1].kind, AuditKind::Retried);
        assert_eq!(written[2].kind, AuditKind::BackendFailure);
        assert!(!written[2].success);
        assert_eq!(verify_chain(&written), Ok(()));
    }

    #[test]
    fn resume_continues_a_persisted_chain() {
        let log = log(Arc::new(MemoryAuditSink::new())).resume_after("abc");
        let event = log.record_decision(&ctx("a"), downgraded(), 0.0, TokenCounts::default());
        assert_eq!(event.prev_hash, "abc");
        assert_eq!(log.last_hash(), event.hash);
    }
}
