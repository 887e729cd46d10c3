// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache entry operations.

use rusqlite::params;
use tollgate_core::{ClassificationLevel, StoredCacheEntry, Tier, TollgateError};

use super::{conversion_error, parse_timestamp, timestamp};
use crate::database::{map_tr_err, Database};

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Insert or replace an entry by fingerprint.
pub async fn put(db: &Database, entry: &StoredCacheEntry) -> Result<(), TollgateError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR REPLACE INTO cache_entries
                    (fingerprint, classification, query, payload, tier,
                     input_tokens, output_tokens, created_at, ttl_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.fingerprint,
                    entry.classification.to_string(),
                    entry.query,
                    entry.payload,
                    entry.tier.to_string(),
                    to_i64(entry.input_tokens),
                    to_i64(entry.output_tokens),
                    timestamp(entry.created_at),
                    to_i64(entry.ttl_secs),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove(db: &Database, fingerprint: &str) -> Result<(), TollgateError> {
    let fingerprint = fingerprint.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "DELETE FROM cache_entries WHERE fingerprint = ?1",
                params![fingerprint],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Every row, oldest first.
pub async fn load_all(db: &Database) -> Result<Vec<StoredCacheEntry>, TollgateError> {
    db.connection()
        .call(|conn| -> Result<Vec<StoredCacheEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT fingerprint, classification, query, payload, tier,
                        input_tokens, output_tokens, created_at, ttl_secs
                 FROM cache_entries ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let classification: String = row.get(1)?;
                let tier: String = row.get(4)?;
                let created_at: String = row.get(7)?;
                Ok(StoredCacheEntry {
                    fingerprint: row.get(0)?,
                    classification: classification
                        .parse::<ClassificationLevel>()
                        .map_err(|e| conversion_error(1, e))?,
                    query: row.get(2)?,
                    payload: row.get(3)?,
                    tier: tier.parse::<Tier>().map_err(|e| conversion_error(4, e))?,
                    input_tokens: row.get::<_, i64>(5)?.max(0) as u64,
                    output_tokens: row.get::<_, i64>(6)?.max(0) as u64,
                    created_at: parse_timestamp(7, &created_at)?,
                    ttl_secs: row.get::<_, i64>(8)?.max(0) as u64,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
