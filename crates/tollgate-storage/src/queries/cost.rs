// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session cost record operations.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tollgate_core::{SessionCostRecord, TollgateError};

use super::{conversion_error, timestamp};
use crate::database::{map_tr_err, Database};

fn decode(raw: &str) -> Result<SessionCostRecord, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| conversion_error(0, e))
}

/// Insert or replace a record by id.
pub async fn save(db: &Database, record: &SessionCostRecord) -> Result<(), TollgateError> {
    let id = record.id.clone();
    let start_time = timestamp(record.start_time);
    let end_time = record.end_time.map(timestamp);
    let body = serde_json::to_string(record).map_err(TollgateError::persistence)?;

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO cost_sessions (id, start_time, end_time, record)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    start_time = excluded.start_time,
                    end_time = excluded.end_time,
                    record = excluded.record",
                params![id, start_time, end_time, body],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn load(db: &Database, id: &str) -> Result<Option<SessionCostRecord>, TollgateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SessionCostRecord>, rusqlite::Error> {
            let result = conn.query_row(
                "SELECT record FROM cost_sessions WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(raw) => decode(&raw).map(Some),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Records that started in `[from, to]`, oldest first.
pub async fn list(
    db: &Database,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<SessionCostRecord>, TollgateError> {
    let (from, to) = (timestamp(from), timestamp(to));
    db.connection()
        .call(move |conn| -> Result<Vec<SessionCostRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT record FROM cost_sessions
                 WHERE start_time >= ?1 AND start_time <= ?2
                 ORDER BY start_time ASC",
            )?;
            let rows = stmt.query_map(params![from, to], |row| row.get::<_, String>(0))?;
            let mut records = Vec::new();
            for raw in rows {
                records.push(decode(&raw?)?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(db: &Database, id: &str) -> Result<(), TollgateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM cost_sessions WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes records that started before `before`. Returns how many went.
pub async fn delete_before(db: &Database, before: DateTime<Utc>) -> Result<usize, TollgateError> {
    let before = timestamp(before);
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("DELETE FROM cost_sessions WHERE start_time < ?1", params![before])
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<usize, TollgateError> {
    db.connection()
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM cost_sessions", [], |row| row.get(0))
        })
        .await
        .map(|n| usize::try_from(n).unwrap_or(0))
        .map_err(map_tr_err)
}
