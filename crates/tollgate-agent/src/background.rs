// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic tasks that run beside the interactive loop.
//!
//! Both tasks stop when their [`CancellationToken`] is cancelled. The
//! persistence flusher does one last flush on the way out.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tollgate_audit::AuditLog;
use tollgate_config::ExpiryPolicy;
use tollgate_cost::CostLedger;
use tracing::{debug, info, warn};

use crate::lifetime::{LifetimeEvent, LifetimeManager};

/// Drives [`LifetimeManager::check`] every `period`.
///
/// Under [`ExpiryPolicy::Terminate`] an expiry cancels `cancel` and ends the
/// task. Under [`ExpiryPolicy::Resume`] the task keeps ticking so the session
/// can warn and expire again after it resumes.
pub fn spawn_lifetime_ticker(
    lifetime: Arc<LifetimeManager>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("lifetime ticker stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let events = lifetime.check().await;
            let timed_out = events
                .iter()
                .any(|e| matches!(e, LifetimeEvent::Timeout { .. }));
            if timed_out && lifetime.settings().expiry_policy == ExpiryPolicy::Terminate {
                info!(session_id = %lifetime.session_id(), "session expired, shutting down");
                cancel.cancel();
                return;
            }
        }
    })
}

/// Flushes the cost ledger and the audit log every `period`, and once more
/// when `cancel` fires.
pub fn spawn_persistence_flusher(
    ledger: Arc<CostLedger>,
    audit: Arc<AuditLog>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => flush_all(&ledger, &audit).await,
            }
        }

        flush_all(&ledger, &audit).await;
        debug!("persistence flusher stopped");
    })
}

async fn flush_all(ledger: &CostLedger, audit: &AuditLog) {
    if let Err(e) = ledger.flush().await {
        warn!(error = %e, pending = ledger.pending_count(), "periodic flush failed for cost records");
    }
    match audit.flush().await {
        Ok(0) => {}
        Ok(written) => debug!(written, "audit events persisted"),
        Err(e) => {
            warn!(error = %e, pending = audit.pending_count(), "periodic flush failed for audit events")
        }
    }
}
