// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idle-timeout state machine for the interactive session.
//!
//! States go Active -> WarningIssued -> Expired as idle time grows. Activity
//! returns the session to Active. What activity does after expiry depends
//! on the configured [`ExpiryPolicy`].
//!
//! A background tick calls [`LifetimeManager::check`]. Notifications go to a
//! [`LifetimeObserver`] after the internal lock is released.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tollgate_config::model::SessionConfig;
use tollgate_config::ExpiryPolicy;
use tollgate_core::TollgateError;
use tracing::{debug, info, warn};

/// States in the lifetime FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifetimeState {
    Active,
    /// The expiry warning has fired for the current idle period.
    WarningIssued,
    Expired,
}

/// A notification produced by [`LifetimeManager::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifetimeEvent {
    Warning { session_id: String, remaining: Duration },
    Timeout { session_id: String, idle: Duration },
    AutosaveDue { session_id: String },
}

/// What an observer did with an autosave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    /// State was persisted; the session is clean again.
    Saved,
    /// Handed off. The caller will save and call `mark_clean` itself.
    Deferred,
}

/// Receives lifetime notifications. Every method has a no-op default.
#[async_trait]
pub trait LifetimeObserver: Send + Sync {
    async fn on_warning(&self, _session_id: &str, _remaining: Duration) {}

    async fn on_timeout(&self, _session_id: &str, _idle: Duration) {}

    async fn on_autosave(&self, _session_id: &str) -> Result<AutosaveOutcome, TollgateError> {
        Ok(AutosaveOutcome::Deferred)
    }
}

/// Forwards every notification into an mpsc channel.
pub struct ChannelObserver {
    tx: mpsc::Sender<LifetimeEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LifetimeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn forward(&self, event: LifetimeEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("lifetime event dropped, receiver closed");
        }
    }
}

#[async_trait]
impl LifetimeObserver for ChannelObserver {
    async fn on_warning(&self, session_id: &str, remaining: Duration) {
        self.forward(LifetimeEvent::Warning {
            session_id: session_id.to_string(),
            remaining,
        })
        .await;
    }

    async fn on_timeout(&self, session_id: &str, idle: Duration) {
        self.forward(LifetimeEvent::Timeout {
            session_id: session_id.to_string(),
            idle,
        })
        .await;
    }

    async fn on_autosave(&self, session_id: &str) -> Result<AutosaveOutcome, TollgateError> {
        self.forward(LifetimeEvent::AutosaveDue {
            session_id: session_id.to_string(),
        })
        .await;
        Ok(AutosaveOutcome::Deferred)
    }
}

/// Timing knobs, usually built from [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct LifetimeSettings {
    pub timeout: Duration,
    pub warning_lead: Duration,
    pub autosave_enabled: bool,
    pub autosave_interval: Duration,
    pub expiry_policy: ExpiryPolicy,
}

impl From<&SessionConfig> for LifetimeSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            warning_lead: config.warning_lead(),
            autosave_enabled: config.autosave_enabled,
            autosave_interval: config.autosave_interval(),
            expiry_policy: config.expiry_policy,
        }
    }
}

impl Default for LifetimeSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Consistent snapshot of the session's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct LifetimeStatus {
    pub session_id: String,
    pub state: LifetimeState,
    pub start: DateTime<Utc>,
    pub duration: Duration,
    pub idle: Duration,
    pub remaining: Duration,
    pub dirty: bool,
    pub expired: bool,
}

struct State {
    session_id: String,
    state: LifetimeState,
    started: Instant,
    started_at: DateTime<Utc>,
    last_activity: Instant,
    last_autosave: Instant,
    dirty: bool,
    /// Bumped by every `mark_dirty`, so a save only clears what it saw.
    dirty_generation: u64,
}

impl State {
    fn fresh(session_id: String) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            state: LifetimeState::Active,
            started: now,
            started_at: Utc::now(),
            last_activity: now,
            last_autosave: now,
            dirty: false,
            dirty_generation: 0,
        }
    }

    fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    fn is_expired(&self, settings: &LifetimeSettings, now: Instant) -> bool {
        self.state == LifetimeState::Expired || self.idle(now) >= settings.timeout
    }

    fn remaining(&self, settings: &LifetimeSettings, now: Instant) -> Duration {
        if self.state == LifetimeState::Expired {
            return Duration::ZERO;
        }
        settings.timeout.saturating_sub(self.idle(now))
    }
}

/// Tracks idle time, warnings, expiry and autosave for one session.
pub struct LifetimeManager {
    settings: LifetimeSettings,
    state: Mutex<State>,
    observer: Option<Arc<dyn LifetimeObserver>>,
}

impl LifetimeManager {
    pub fn new(session_id: impl Into<String>, settings: LifetimeSettings) -> Self {
        let session_id = session_id.into();
        info!(session_id = %session_id, timeout = ?settings.timeout, "session started");
        Self {
            settings,
            state: Mutex::new(State::fresh(session_id)),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LifetimeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn settings(&self) -> &LifetimeSettings {
        &self.settings
    }

    pub fn session_id(&self) -> String {
        self.state.lock().session_id.clone()
    }

    /// Resets the idle clock. Returns the resulting state.
    ///
    /// An expired session stays expired under [`ExpiryPolicy::Terminate`].
    pub fn record_activity(&self) -> LifetimeState {
        let mut s = self.state.lock();
        match (s.state, self.settings.expiry_policy) {
            (LifetimeState::Expired, ExpiryPolicy::Terminate) => {}
            (LifetimeState::Expired, ExpiryPolicy::Resume) => {
                s.state = LifetimeState::Active;
                s.last_activity = Instant::now();
                debug!(session_id = %s.session_id, "expired session resumed");
            }
            _ => {
                s.state = LifetimeState::Active;
                s.last_activity = Instant::now();
            }
        }
        s.state
    }

    /// Flags unsaved changes for the next autosave.
    pub fn mark_dirty(&self) {
        let mut s = self.state.lock();
        s.dirty = true;
        s.dirty_generation += 1;
    }

    /// Records an explicit save. The autosave interval restarts from now.
    pub fn mark_clean(&self) {
        let mut s = self.state.lock();
        s.dirty = false;
        s.last_autosave = Instant::now();
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Starts a new session under `session_id` with fresh clocks.
    pub fn reset(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        info!(session_id = %session_id, "session started");
        *self.state.lock() = State::fresh(session_id);
    }

    pub fn state(&self) -> LifetimeState {
        self.state.lock().state
    }

    /// Whether idle time has reached the timeout, ticked or not.
    pub fn is_expired(&self) -> bool {
        self.state.lock().is_expired(&self.settings, Instant::now())
    }

    /// True inside `[timeout - lead, timeout)` until the warning has fired.
    pub fn should_show_warning(&self) -> bool {
        let s = self.state.lock();
        if s.state != LifetimeState::Active {
            return false;
        }
        let idle = s.idle(Instant::now());
        idle >= self.warning_threshold() && idle < self.settings.timeout
    }

    pub fn should_autosave(&self) -> bool {
        let s = self.state.lock();
        self.autosave_due(&s, Instant::now())
    }

    pub fn idle_time(&self) -> Duration {
        self.state.lock().idle(Instant::now())
    }

    pub fn remaining_time(&self) -> Duration {
        self.state.lock().remaining(&self.settings, Instant::now())
    }

    pub fn status(&self) -> LifetimeStatus {
        let now = Instant::now();
        let s = self.state.lock();
        LifetimeStatus {
            session_id: s.session_id.clone(),
            state: s.state,
            start: s.started_at,
            duration: now.saturating_duration_since(s.started),
            idle: s.idle(now),
            remaining: s.remaining(&self.settings, now),
            dirty: s.dirty,
            expired: s.is_expired(&self.settings, now),
        }
    }

    fn warning_threshold(&self) -> Duration {
        self.settings.timeout.saturating_sub(self.settings.warning_lead)
    }

    fn autosave_due(&self, s: &State, now: Instant) -> bool {
        self.settings.autosave_enabled
            && s.dirty
            && now.saturating_duration_since(s.last_autosave) >= self.settings.autosave_interval
    }

    /// Advances the state machine. Returns the notifications it fired.
    pub async fn check(&self) -> Vec<LifetimeEvent> {
        let mut fired = Vec::new();
        let autosave = {
            let now = Instant::now();
            let mut s = self.state.lock();
            let idle = s.idle(now);

            if s.state != LifetimeState::Expired {
                if idle >= self.settings.timeout {
                    s.state = LifetimeState::Expired;
                    fired.push(LifetimeEvent::Timeout {
                        session_id: s.session_id.clone(),
                        idle,
                    });
                } else if s.state == LifetimeState::Active && idle >= self.warning_threshold() {
                    s.state = LifetimeState::WarningIssued;
                    fired.push(LifetimeEvent::Warning {
                        session_id: s.session_id.clone(),
                        remaining: self.settings.timeout - idle,
                    });
                }
            }

            let due = self.autosave_due(&s, now);
            if due {
                s.last_autosave = now;
                fired.push(LifetimeEvent::AutosaveDue {
                    session_id: s.session_id.clone(),
                });
            }
            due.then_some(s.dirty_generation)
        };

        for event in &fired {
            match event {
                LifetimeEvent::Warning { session_id, remaining } => {
                    warn!(
                        session_id = %session_id,
                        remaining = %format_duration(*remaining),
                        "session expiring soon"
                    );
                    if let Some(observer) = &self.observer {
                        observer.on_warning(session_id, *remaining).await;
                    }
                }
                LifetimeEvent::Timeout { session_id, idle } => {
                    info!(session_id = %session_id, idle = %format_duration(*idle), "session expired");
                    if let Some(observer) = &self.observer {
                        observer.on_timeout(session_id, *idle).await;
                    }
                }
                LifetimeEvent::AutosaveDue { session_id } => {
                    if let Some(generation) = autosave {
                        self.run_autosave(session_id, generation).await;
                    }
                }
            }
        }
        fired
    }

    async fn run_autosave(&self, session_id: &str, generation: u64) {
        let Some(observer) = &self.observer else {
            return;
        };
        match observer.on_autosave(session_id).await {
            Ok(AutosaveOutcome::Saved) => {
                let mut s = self.state.lock();
                if s.dirty_generation == generation {
                    s.dirty = false;
                }
                debug!(session_id = %session_id, still_dirty = s.dirty, "autosave complete");
            }
            Ok(AutosaveOutcome::Deferred) => {}
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "autosave failed, will retry next interval");
            }
        }
    }
}

/// Compact human form: `45s`, `2m`, `2m 5s`, `1h 3m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m, s) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, 0, _) => format!("{h}h"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;
    use tracing_test::traced_test;

    fn settings(timeout_ms: u64, lead_ms: u64) -> LifetimeSettings {
        LifetimeSettings {
            timeout: Duration::from_millis(timeout_ms),
            warning_lead: Duration::from_millis(lead_ms),
            autosave_enabled: true,
            autosave_interval: Duration::from_millis(20),
            expiry_policy: ExpiryPolicy::Terminate,
        }
    }

    #[derive(Default)]
    struct Counting {
        warnings: AtomicUsize,
        timeouts: AtomicUsize,
        autosaves: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LifetimeObserver for Counting {
        async fn on_warning(&self, _: &str, _: Duration) {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_timeout(&self, _: &str, _: Duration) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_autosave(&self, _: &str) -> Result<AutosaveOutcome, TollgateError> {
            self.autosaves.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TollgateError::persistence(std::io::Error::other("disk full")))
            } else {
                Ok(AutosaveOutcome::Saved)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn warning_then_expiry_without_ticks() {
        let m = LifetimeManager::new("s-1", settings(100, 30));

        advance(Duration::from_millis(75)).await;
        assert!(m.should_show_warning());
        assert!(!m.is_expired());

        advance(Duration::from_millis(35)).await;
        assert!(m.is_expired());
        assert!(!m.should_show_warning());
        assert_eq!(m.remaining_time(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn never_expires_early() {
        let m = LifetimeManager::new("s-1", settings(100, 30));
        advance(Duration::from_millis(99)).await;
        m.check().await;
        assert_ne!(m.state(), LifetimeState::Expired);
        advance(Duration::from_millis(1)).await;
        m.check().await;
        assert_eq!(m.state(), LifetimeState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_and_timeout_fire_once() {
        let observer = Arc::new(Counting::default());
        let m = LifetimeManager::new("s-1", settings(100, 30)).with_observer(observer.clone());

        advance(Duration::from_millis(80)).await;
        let fired = m.check().await;
        assert_eq!(
            fired,
            vec![LifetimeEvent::Warning {
                session_id: "s-1".into(),
                remaining: Duration::from_millis(20),
            }]
        );
        m.check().await;
        assert_eq!(observer.warnings.load(Ordering::SeqCst), 1);
        assert_eq!(m.state(), LifetimeState::WarningIssued);

        advance(Duration::from_millis(30)).await;
        m.check().await;
        m.check().await;
        assert_eq!(observer.timeouts.load(Ordering::SeqCst), 1);
        assert_eq!(observer.warnings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_rearms_the_warning() {
        let observer = Arc::new(Counting::default());
        let m = LifetimeManager::new("s-1", settings(100, 30)).with_observer(observer.clone());

        advance(Duration::from_millis(80)).await;
        m.check().await;
        assert_eq!(m.record_activity(), LifetimeState::Active);
        assert_eq!(m.idle_time(), Duration::ZERO);

        advance(Duration::from_millis(80)).await;
        m.check().await;
        assert_eq!(observer.warnings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_policy_decides_revival() {
        let m = LifetimeManager::new("s-1", settings(100, 30));
        advance(Duration::from_millis(150)).await;
        m.check().await;
        assert_eq!(m.record_activity(), LifetimeState::Expired);
        assert!(m.is_expired());

        let mut resumable = settings(100, 30);
        resumable.expiry_policy = ExpiryPolicy::Resume;
        let m = LifetimeManager::new("s-2", resumable);
        advance(Duration::from_millis(150)).await;
        m.check().await;
        assert_eq!(m.record_activity(), LifetimeState::Active);
        assert!(!m.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_needs_dirty_and_interval() {
        let observer = Arc::new(Counting::default());
        let m = LifetimeManager::new("s-1", settings(10_000, 1_000)).with_observer(observer.clone());

        advance(Duration::from_millis(25)).await;
        m.check().await;
        assert_eq!(observer.autosaves.load(Ordering::SeqCst), 0, "clean session");

        m.mark_dirty();
        assert!(m.should_autosave());
        m.check().await;
        assert_eq!(observer.autosaves.load(Ordering::SeqCst), 1);
        assert!(!m.is_dirty());

        m.mark_dirty();
        advance(Duration::from_millis(10)).await;
        m.check().await;
        assert_eq!(observer.autosaves.load(Ordering::SeqCst), 1, "interval not elapsed");
        advance(Duration::from_millis(10)).await;
        m.check().await;
        assert_eq!(observer.autosaves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_save_restarts_the_autosave_interval() {
        let observer = Arc::new(Counting::default());
        let m = LifetimeManager::new("s-1", settings(10_000, 1_000)).with_observer(observer.clone());

        advance(Duration::from_millis(25)).await;
        m.mark_dirty();
        m.mark_clean();
        m.mark_dirty();
        m.check().await;
        assert_eq!(observer.autosaves.load(Ordering::SeqCst), 0);
        assert!(m.is_dirty());

        advance(Duration::from_millis(20)).await;
        m.check().await;
        assert_eq!(observer.autosaves.load(Ordering::SeqCst), 1);
    }

    /// Simulates a query landing while the save is in flight.
    #[derive(Default)]
    struct DirtiesDuringSave {
        manager: std::sync::OnceLock<std::sync::Weak<LifetimeManager>>,
    }

    #[async_trait]
    impl LifetimeObserver for DirtiesDuringSave {
        async fn on_autosave(&self, _: &str) -> Result<AutosaveOutcome, TollgateError> {
            if let Some(m) = self.manager.get().and_then(std::sync::Weak::upgrade) {
                m.mark_dirty();
            }
            Ok(AutosaveOutcome::Saved)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn change_during_autosave_stays_dirty() {
        let observer = Arc::new(DirtiesDuringSave::default());
        let m = Arc::new(
            LifetimeManager::new("s-1", settings(10_000, 1_000)).with_observer(observer.clone()),
        );
        observer.manager.set(Arc::downgrade(&m)).unwrap();

        m.mark_dirty();
        advance(Duration::from_millis(25)).await;
        m.check().await;
        assert!(m.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn failed_autosave_stays_dirty() {
        let observer = Arc::new(Counting {
            fail: true,
            ..Counting::default()
        });
        let m = LifetimeManager::new("s-1", settings(10_000, 1_000)).with_observer(observer);
        m.mark_dirty();
        advance(Duration::from_millis(25)).await;
        m.check().await;
        assert!(m.is_dirty());
        assert!(logs_contain("autosave failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new(8);
        let m = LifetimeManager::new("s-1", settings(100, 30)).with_observer(Arc::new(observer));
        m.mark_dirty();

        advance(Duration::from_millis(75)).await;
        m.check().await;
        assert!(matches!(rx.recv().await, Some(LifetimeEvent::Warning { .. })));
        assert!(matches!(rx.recv().await, Some(LifetimeEvent::AutosaveDue { .. })));
        assert!(m.is_dirty(), "deferred autosave leaves the flag to the caller");
    }

    #[tokio::test(start_paused = true)]
    async fn status_and_reset() {
        let m = LifetimeManager::new("s-1", settings(100, 30));
        m.mark_dirty();
        advance(Duration::from_millis(40)).await;

        let status = m.status();
        assert_eq!(status.session_id, "s-1");
        assert_eq!(status.state, LifetimeState::Active);
        assert_eq!(status.idle, Duration::from_millis(40));
        assert_eq!(status.remaining, Duration::from_millis(60));
        assert_eq!(status.duration, Duration::from_millis(40));
        assert!(status.dirty);
        assert!(!status.expired);

        m.reset("s-2");
        let status = m.status();
        assert_eq!(status.session_id, "s-2");
        assert_eq!(status.idle, Duration::ZERO);
        assert!(!status.dirty);
    }

    #[test]
    fn durations_format_compactly() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3780)), "1h 3m");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
