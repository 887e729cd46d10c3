// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixture for dispatch tests.
//!
//! `TestHarness` bundles one in-memory store of each kind with a local and a
//! cloud [`MockAdapter`]. Components under test receive `Arc` handles from
//! it while the test keeps its own clones for inspection.

use std::sync::Arc;

use tollgate_core::{
    AuditSink, CacheStore, CostStore, IdGenerator, InferenceAdapter, SequentialIds,
};

use crate::mock_adapter::MockAdapter;
use crate::stores::{MemoryAuditSink, MemoryCacheStore, MemoryCostStore};

/// In-memory collaborators for one dispatch stack.
#[derive(Clone)]
pub struct TestHarness {
    pub cost_store: MemoryCostStore,
    pub cache_store: MemoryCacheStore,
    pub audit_sink: MemoryAuditSink,
    pub local: MockAdapter,
    pub cloud: MockAdapter,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            cost_store: MemoryCostStore::new(),
            cache_store: MemoryCacheStore::new(),
            audit_sink: MemoryAuditSink::new(),
            local: MockAdapter::local(),
            cloud: MockAdapter::cloud(),
        }
    }

    /// Local adapter first, then cloud.
    pub fn adapters(&self) -> Vec<Arc<dyn InferenceAdapter>> {
        vec![Arc::new(self.local.clone()), Arc::new(self.cloud.clone())]
    }

    pub fn cost_store(&self) -> Arc<dyn CostStore> {
        Arc::new(self.cost_store.clone())
    }

    pub fn cache_store(&self) -> Arc<dyn CacheStore> {
        Arc::new(self.cache_store.clone())
    }

    pub fn audit_sink(&self) -> Arc<dyn AuditSink> {
        Arc::new(self.audit_sink.clone())
    }

    /// Deterministic `session-N` identifiers.
    pub fn session_ids(&self) -> Arc<dyn IdGenerator> {
        Arc::new(SequentialIds::new("session"))
    }

    /// Deterministic `event-N` identifiers.
    pub fn event_ids(&self) -> Arc<dyn IdGenerator> {
        Arc::new(SequentialIds::new("event"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::Tier;

    #[test]
    fn adapters_cover_every_executable_tier() {
        let harness = TestHarness::new();
        let adapters = harness.adapters();
        for tier in [Tier::Local, Tier::CloudFast, Tier::CloudBalanced, Tier::CloudBest] {
            assert!(adapters.iter().any(|a| a.supports(tier)), "{tier} unserved");
        }
        assert!(!adapters.iter().any(|a| a.supports(Tier::Cache)));
    }

    #[test]
    fn handles_share_state_with_the_harness() {
        let harness = TestHarness::new();
        let sink = harness.audit_sink();
        drop(sink);
        assert!(harness.audit_sink.events().is_empty());
        assert!(harness.cache_store.is_empty());
    }
}
