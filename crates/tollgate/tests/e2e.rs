// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete Tollgate pipeline.
//!
//! Each test opens the full app against a temp SQLite file with mock
//! backends. Restarts reopen the same file with fresh mocks.

use tempfile::TempDir;
use tollgate::App;
use tollgate_agent::{DispatchOptions, ResponseSource};
use tollgate_config::TollgateConfig;
use tollgate_core::{AuditKind, ClassificationLevel, HitType, Tier};
use tollgate_test_utils::TestHarness;

fn config(dir: &TempDir) -> TollgateConfig {
    let mut config = TollgateConfig::default();
    config.storage.database_path = dir.path().join("tollgate.db").to_string_lossy().into_owned();
    config
}

async fn open(dir: &TempDir, harness: &TestHarness) -> App {
    App::open_with(config(dir), harness.adapters()).await.unwrap()
}

fn backend_calls(harness: &TestHarness) -> usize {
    harness.local.call_count() + harness.cloud.call_count()
}

// ---- Cache ----

#[tokio::test]
async fn cached_answer_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = TestHarness::new();
    first.local.push_reply("Paris");
    first.cloud.push_reply("Paris");
    let app = open(&dir, &first).await;
    let outcome = app
        .ask("what is the capital of france", ClassificationLevel::Unclassified, DispatchOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.source, ResponseSource::Backend);
    app.shutdown().await;

    let second = TestHarness::new();
    let app = open(&dir, &second).await;
    let outcome = app
        .ask("What is the  capital of France", ClassificationLevel::Unclassified, DispatchOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.source, ResponseSource::Cache(HitType::Exact));
    assert_eq!(outcome.text, "Paris");
    assert_eq!(outcome.cost, 0.0);
    assert_eq!(backend_calls(&second), 0);
    app.shutdown().await;
}

#[tokio::test]
async fn cache_never_crosses_classification_levels() {
    let dir = tempfile::tempdir().unwrap();
    let harness = TestHarness::new();
    let app = open(&dir, &harness).await;

    app.ask("list the project milestones", ClassificationLevel::Secret, DispatchOptions::default())
        .await
        .unwrap();
    let outcome = app
        .ask("list the project milestones", ClassificationLevel::Unclassified, DispatchOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.source, ResponseSource::Backend);
    assert_eq!(backend_calls(&harness), 2);
    app.shutdown().await;
}

// ---- Classification ----

#[tokio::test]
async fn controlled_data_never_reaches_the_cloud() {
    let dir = tempfile::tempdir().unwrap();
    let harness = TestHarness::new();
    let app = open(&dir, &harness).await;

    for level in [
        ClassificationLevel::Cui,
        ClassificationLevel::Confidential,
        ClassificationLevel::Secret,
        ClassificationLevel::TopSecret,
    ] {
        let outcome = app
            .ask(
                &format!("/best analyze the architecture trade-offs for {level}"),
                level,
                DispatchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.tier, Tier::Local, "{level}");
        assert!(outcome.forced_downgrade, "{level}");
    }
    assert_eq!(harness.cloud.call_count(), 0);

    let report = app.verify_audit().await.unwrap();
    assert!(report.verdict.is_ok());
    let events = app.storage().audit_events().await.unwrap();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.decision.tier == Tier::Local && e.decision.forced_downgrade));
    app.shutdown().await;
}

// ---- Audit ----

#[tokio::test]
async fn audit_chain_links_across_restarts() {
    let dir = tempfile::tempdir().unwrap();

    for query in ["first question", "second question"] {
        let harness = TestHarness::new();
        let app = open(&dir, &harness).await;
        app.ask(query, ClassificationLevel::Cui, DispatchOptions::default())
            .await
            .unwrap();
        app.shutdown().await;
    }

    let app = open(&dir, &TestHarness::new()).await;
    let report = app.verify_audit().await.unwrap();
    assert_eq!(report.events, 2);
    assert_eq!(report.verdict, Ok(()));

    let events = app.storage().audit_events().await.unwrap();
    assert_eq!(events[1].prev_hash, events[0].hash);
    assert!(events.iter().all(|e| e.kind == AuditKind::Routed));
    app.shutdown().await;
}

#[tokio::test]
async fn failed_backend_is_audited_and_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let harness = TestHarness::new();
    harness.local.push_failure("connection refused");
    let app = open(&dir, &harness).await;

    let err = app
        .ask("/local summarize the memo", ClassificationLevel::TopSecret, DispatchOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_user_facing());

    let report = app.verify_audit().await.unwrap();
    assert_eq!(report.events, 1);
    let events = app.storage().audit_events().await.unwrap();
    assert_eq!(events[0].kind, AuditKind::BackendFailure);
    assert!(!events[0].success);
    assert!(app.cache().stats().entries == 0);
    app.shutdown().await;
}

// ---- Cost ----

#[tokio::test]
async fn session_cost_is_persisted_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let harness = TestHarness::new();
    let app = open(&dir, &harness).await;

    app.ask("explain borrowing", ClassificationLevel::Unclassified, DispatchOptions::default())
        .await
        .unwrap();
    app.ask("explain borrowing", ClassificationLevel::Unclassified, DispatchOptions::default())
        .await
        .unwrap();
    let ended = app.shutdown().await;
    assert_eq!(ended.query_count, 2);
    assert!(ended.end_time.is_some());
    assert_eq!(ended.tiers[&Tier::Cache].queries, 1);

    let app = open(&dir, &TestHarness::new()).await;
    let trends = app.ledger().trends(1).await.unwrap();
    assert_eq!(trends.total_queries, 2);
    assert!((trends.total_cost - ended.total_cost).abs() < 1e-12);
    app.shutdown().await;
}

#[tokio::test]
async fn idle_session_leaves_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let app = open(&dir, &TestHarness::new()).await;
    let ended = app.shutdown().await;
    assert_eq!(ended.query_count, 0);

    let app = open(&dir, &TestHarness::new()).await;
    let now = chrono::Utc::now();
    let sessions = app
        .ledger()
        .list_sessions(now - chrono::Duration::days(1), now)
        .await
        .unwrap();
    assert!(sessions.is_empty());
    app.shutdown().await;
}
