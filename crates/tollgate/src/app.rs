// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring: one SQLite store behind the cache, the ledger and the audit log,
//! plus the dispatcher and session lifetime built on top of them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tollgate_agent::{
    spawn_lifetime_ticker, spawn_persistence_flusher, AutosaveOutcome, DispatchOptions,
    DispatchOutcome, Dispatcher, LifetimeEvent, LifetimeManager, LifetimeObserver,
    LifetimeSettings,
};
use tollgate_audit::{verify_chain, AuditLog, ChainError};
use tollgate_cache::{CacheSettings, ResultCache};
use tollgate_config::TollgateConfig;
use tollgate_core::{
    ClassificationLevel, InferenceAdapter, PluginAdapter, SessionCostRecord, TollgateError,
    UuidGenerator,
};
use tollgate_cost::CostLedger;
use tollgate_security::ClassificationGate;
use tollgate_storage::SqliteStorage;
use tracing::{debug, info, warn};

/// Capacity of the lifetime notification channel read by the shell.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Forwards warnings and timeouts to the shell and performs autosaves.
struct SessionObserver {
    ledger: Arc<CostLedger>,
    audit: Arc<AuditLog>,
    events: mpsc::Sender<LifetimeEvent>,
}

impl SessionObserver {
    fn forward(&self, event: LifetimeEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(error = %e, "lifetime event not delivered");
        }
    }
}

#[async_trait]
impl LifetimeObserver for SessionObserver {
    async fn on_warning(&self, session_id: &str, remaining: Duration) {
        self.forward(LifetimeEvent::Warning {
            session_id: session_id.to_string(),
            remaining,
        });
    }

    async fn on_timeout(&self, session_id: &str, idle: Duration) {
        self.forward(LifetimeEvent::Timeout {
            session_id: session_id.to_string(),
            idle,
        });
    }

    async fn on_autosave(&self, session_id: &str) -> Result<AutosaveOutcome, TollgateError> {
        self.ledger.save().await?;
        self.audit.flush().await?;
        debug!(session_id, "session autosaved");
        Ok(AutosaveOutcome::Saved)
    }
}

/// Result of checking the persisted audit trail.
#[derive(Debug)]
pub struct AuditReport {
    pub events: usize,
    pub verdict: Result<(), ChainError>,
}

/// A fully wired Tollgate instance.
pub struct App {
    config: TollgateConfig,
    storage: SqliteStorage,
    dispatcher: Dispatcher,
    ledger: Arc<CostLedger>,
    audit: Arc<AuditLog>,
    cache: Arc<ResultCache>,
    lifetime: Arc<LifetimeManager>,
    events: Option<mpsc::Receiver<LifetimeEvent>>,
}

impl App {
    /// Opens storage and connects the backends enabled at build time.
    pub async fn open(config: TollgateConfig) -> Result<Self, TollgateError> {
        let adapters = default_adapters(&config)?;
        Self::open_with(config, adapters).await
    }

    /// Opens storage and wires `adapters` as the inference backends.
    pub async fn open_with(
        config: TollgateConfig,
        adapters: Vec<Arc<dyn InferenceAdapter>>,
    ) -> Result<Self, TollgateError> {
        let storage = SqliteStorage::open(&config.storage).await?;
        let store = Arc::new(storage.clone());

        let cache = ResultCache::new(CacheSettings::from(&config.cache)).with_store(store.clone());
        match cache.warm(&storage).await {
            Ok(loaded) => debug!(loaded, "result cache warmed"),
            Err(e) => warn!(error = %e, "cache warm-up failed, starting empty"),
        }
        let purged = cache.purge_expired().await;
        if purged > 0 {
            debug!(purged, "expired cache entries removed");
        }
        let cache = Arc::new(cache);

        let ledger = Arc::new(CostLedger::new(Arc::new(UuidGenerator)).with_store(store.clone()));
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(config.cost.retention_days));
        if let Err(e) = ledger.purge_before(cutoff).await {
            warn!(error = %e, "cost retention purge failed");
        }

        let mut audit = AuditLog::new(store, Arc::new(UuidGenerator));
        if let Some(last) = storage.last_audit_hash().await? {
            audit = audit.resume_after(last);
        }
        let audit = Arc::new(audit);

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let observer = SessionObserver {
            ledger: ledger.clone(),
            audit: audit.clone(),
            events: tx,
        };
        let lifetime = Arc::new(
            LifetimeManager::new(ledger.session_id(), LifetimeSettings::from(&config.session))
                .with_observer(Arc::new(observer)),
        );

        let dispatcher = Dispatcher::builder()
            .gate(ClassificationGate::from_config(&config.classification))
            .cache(cache.clone())
            .ledger(ledger.clone())
            .audit(audit.clone())
            .lifetime(lifetime.clone())
            .adapters(adapters)
            .build()?;

        info!(
            session_id = %ledger.session_id(),
            database = %config.storage.database_path,
            "tollgate ready"
        );

        Ok(Self {
            config,
            storage,
            dispatcher,
            ledger,
            audit,
            cache,
            lifetime,
            events: Some(rx),
        })
    }

    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    pub fn default_level(&self) -> ClassificationLevel {
        self.config.classification.default_level
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn lifetime(&self) -> &Arc<LifetimeManager> {
        &self.lifetime
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Lifetime notifications. Only the first call returns the receiver.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<LifetimeEvent>> {
        self.events.take()
    }

    pub async fn ask(
        &self,
        query: &str,
        classification: ClassificationLevel,
        options: DispatchOptions,
    ) -> Result<DispatchOutcome, TollgateError> {
        self.dispatcher
            .dispatch_with(query, classification, options)
            .await
    }

    /// Starts the lifetime ticker and the persistence flusher.
    pub fn spawn_background(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            spawn_lifetime_ticker(
                self.lifetime.clone(),
                self.config.session.check_interval(),
                cancel.clone(),
            ),
            spawn_persistence_flusher(
                self.ledger.clone(),
                self.audit.clone(),
                Duration::from_secs(self.config.cost.flush_interval_secs),
                cancel.clone(),
            ),
        ]
    }

    /// Flushes the audit log and checks the whole persisted chain.
    pub async fn verify_audit(&self) -> Result<AuditReport, TollgateError> {
        if let Err(e) = self.audit.flush().await {
            warn!(error = %e, "audit flush before verification failed");
        }
        let events = self.storage.audit_events().await?;
        Ok(AuditReport {
            events: events.len(),
            verdict: verify_chain(&events),
        })
    }

    /// Persists everything, closes the session and checkpoints storage.
    ///
    /// Returns the closed session's record. A session without queries is
    /// not written.
    pub async fn shutdown(self) -> SessionCostRecord {
        let ended = if self.ledger.current_session().query_count == 0 {
            debug!("no queries this session, nothing to record");
            self.ledger.current_session()
        } else {
            if let Err(e) = self.ledger.flush().await {
                warn!(error = %e, "final cost flush failed");
            }
            self.ledger.end_session().await
        };
        if let Err(e) = self.audit.flush().await {
            warn!(error = %e, pending = self.audit.pending_count(), "final audit flush failed");
        }
        if let Err(e) = self.storage.shutdown().await {
            warn!(error = %e, "storage shutdown failed");
        }
        ended
    }
}

/// Backends compiled into this binary, local first.
///
/// A missing cloud API key leaves the cloud tiers unserved; queries routed
/// there fall back to the local tier.
pub fn default_adapters(config: &TollgateConfig) -> Result<Vec<Arc<dyn InferenceAdapter>>, TollgateError> {
    let mut adapters: Vec<Arc<dyn InferenceAdapter>> = Vec::new();

    #[cfg(feature = "ollama")]
    adapters.push(Arc::new(tollgate_ollama::OllamaAdapter::new(&config.local)?));

    #[cfg(feature = "anthropic")]
    match tollgate_anthropic::AnthropicAdapter::new(&config.cloud) {
        Ok(adapter) => adapters.push(Arc::new(adapter)),
        Err(e) => warn!(error = %e, "cloud tiers unavailable"),
    }

    if adapters.is_empty() {
        warn!(config = %config.agent.name, "no inference backends compiled in");
    }
    for adapter in &adapters {
        debug!(name = adapter.name(), version = %adapter.version(), "backend registered");
    }
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use serial_test::serial;
    use tollgate_core::{CostStore, Tier};
    use tollgate_test_utils::TestHarness;

    fn config(dir: &TempDir) -> TollgateConfig {
        let mut config = TollgateConfig::default();
        config.storage.database_path = dir.path().join("t.db").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn autosave_observer_persists_and_reports_saved() {
        let dir = tempfile::tempdir().unwrap();
        let harness = TestHarness::new();
        let app = App::open_with(config(&dir), harness.adapters()).await.unwrap();

        app.ask("hi", ClassificationLevel::Cui, DispatchOptions::default())
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let observer = SessionObserver {
            ledger: app.ledger.clone(),
            audit: app.audit.clone(),
            events: tx,
        };
        let outcome = observer.on_autosave("s").await.unwrap();
        assert_eq!(outcome, AutosaveOutcome::Saved);
        assert_eq!(app.storage.audit_event_count().await.unwrap(), 1);
        let id = app.ledger.session_id();
        assert!(CostStore::load(&app.storage, &id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn full_event_channel_drops_instead_of_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open_with(config(&dir), Vec::new()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let observer = SessionObserver {
            ledger: app.ledger.clone(),
            audit: app.audit.clone(),
            events: tx,
        };
        observer.on_warning("s", Duration::from_secs(5)).await;
        observer.on_timeout("s", Duration::from_secs(60)).await;
        assert!(matches!(rx.recv().await, Some(LifetimeEvent::Warning { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[cfg(all(feature = "ollama", feature = "anthropic"))]
    #[test]
    #[serial]
    fn cloud_backend_is_skipped_without_a_key() {
        unsafe { std::env::remove_var("ANTHROPIC_API_KEY") };
        let adapters = default_adapters(&TollgateConfig::default()).unwrap();
        assert_eq!(adapters.len(), 1);
        assert!(adapters[0].supports(Tier::Local));
    }

    #[cfg(all(feature = "ollama", feature = "anthropic"))]
    #[test]
    #[serial]
    fn configured_key_enables_cloud_tiers() {
        let mut config = TollgateConfig::default();
        config.cloud.api_key = Some("sk-test-key".into());
        let adapters = default_adapters(&config).unwrap();
        assert_eq!(adapters.len(), 2);
        assert!(adapters[1].supports(Tier::CloudBest));
        assert!(!adapters[1].supports(Tier::Local));
    }
}
