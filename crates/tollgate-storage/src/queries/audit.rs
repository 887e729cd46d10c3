// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit event operations. Rows are only ever inserted.

use rusqlite::params;
use tollgate_core::{AuditEvent, TollgateError};

use super::{conversion_error, timestamp};
use crate::database::{map_tr_err, Database};

pub async fn append(db: &Database, event: &AuditEvent) -> Result<(), TollgateError> {
    let body = serde_json::to_string(event).map_err(TollgateError::persistence)?;
    let event_id = event.event_id.clone();
    let at = timestamp(event.timestamp);
    let classification = event.classification.to_string();
    let session_id = event.session_id.clone();
    let hash = event.hash.clone();

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO audit_events
                    (event_id, timestamp, classification, session_id, event, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![event_id, at, classification, session_id, body, hash],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Hash of the newest event, to continue the chain after a restart.
pub async fn last_hash(db: &Database) -> Result<Option<String>, TollgateError> {
    db.connection()
        .call(|conn| -> Result<Option<String>, rusqlite::Error> {
            let result = conn.query_row(
                "SELECT hash FROM audit_events ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            );
            match result {
                Ok(hash) => Ok(Some(hash)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Every event in chain order, for offline verification.
pub async fn load_all(db: &Database) -> Result<Vec<AuditEvent>, TollgateError> {
    db.connection()
        .call(|conn| -> Result<Vec<AuditEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT event FROM audit_events ORDER BY seq ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut events = Vec::new();
            for raw in rows {
                let raw = raw?;
                events.push(serde_json::from_str(&raw).map_err(|e| conversion_error(0, e))?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<usize, TollgateError> {
    db.connection()
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))
        })
        .await
        .map(|n| usize::try_from(n).unwrap_or(0))
        .map_err(map_tr_err)
}
