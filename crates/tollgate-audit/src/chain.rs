// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SHA-256 hash chain over audit events.
//!
//! `hash = SHA-256(prev_hash || json(event with empty hash))`, hex-encoded.

use sha2::{Digest, Sha256};
use thiserror::Error;
use tollgate_core::AuditEvent;

/// `prev_hash` of the first event ever written.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Where a chain stops verifying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("event {index} ({event_id}): stored hash does not match its contents")]
    HashMismatch { index: usize, event_id: String },

    #[error("event {index} ({event_id}): prev_hash does not link to the previous event")]
    BrokenLink { index: usize, event_id: String },

    #[error("event {index}: could not be encoded for hashing: {message}")]
    Encoding { index: usize, message: String },
}

/// Hash `event` would carry, given its own `prev_hash`.
pub fn compute_hash(event: &AuditEvent) -> Result<String, serde_json::Error> {
    let mut unsealed = event.clone();
    unsealed.hash = String::new();
    let body = serde_json::to_vec(&unsealed)?;

    let mut hasher = Sha256::new();
    hasher.update(event.prev_hash.as_bytes());
    hasher.update(&body);
    Ok(hex::encode(hasher.finalize()))
}

/// Verifies a complete log, starting from [`GENESIS_HASH`].
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), ChainError> {
    verify_segment(events, GENESIS_HASH)
}

/// Verifies a contiguous run of events whose first `prev_hash` should be
/// `expected_prev`.
pub fn verify_segment(events: &[AuditEvent], expected_prev: &str) -> Result<(), ChainError> {
    let mut prev = expected_prev;
    for (index, event) in events.iter().enumerate() {
        if event.prev_hash != prev {
            return Err(ChainError::BrokenLink {
                index,
                event_id: event.event_id.clone(),
            });
        }
        let recomputed = compute_hash(event).map_err(|e| ChainError::Encoding {
            index,
            message: e.to_string(),
        })?;
        if recomputed != event.hash {
            return Err(ChainError::HashMismatch {
                index,
                event_id: event.event_id.clone(),
            });
        }
        prev = &event.hash;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tollgate_core::{AuditKind, CacheOutcome, ClassificationLevel, Decision, Tier, TokenCounts};

    fn sealed(id: &str, prev: &str) -> AuditEvent {
        let mut event = AuditEvent {
            event_id: id.to_string(),
            timestamp: Utc::now(),
            kind: AuditKind::Routed,
            classification: ClassificationLevel::Unclassified,
            session_id: "s".into(),
            decision: Decision {
                tier: Tier::Local,
                cache_outcome: CacheOutcome::Miss,
                forced_downgrade: false,
            },
            cost: 0.0,
            tokens: TokenCounts::default(),
            success: true,
            query_preview: "q".into(),
            detail: None,
            prev_hash: prev.to_string(),
            hash: String::new(),
        };
        event.hash = compute_hash(&event).unwrap();
        event
    }

    fn chain(n: usize) -> Vec<AuditEvent> {
        let mut events: Vec<AuditEvent> = Vec::new();
        for i in 0..n {
            let prev = events.last().map_or(GENESIS_HASH.to_string(), |e| e.hash.clone());
            events.push(sealed(&format!("e{i}"), &prev));
        }
        events
    }

    #[test]
    fn intact_chain_verifies() {
        assert_eq!(verify_chain(&chain(5)), Ok(()));
        assert_eq!(verify_chain(&[]), Ok(()));
    }

    #[test]
    fn edited_event_is_detected() {
        let mut events = chain(4);
        events[2].cost = 99.0;
        assert_eq!(
            verify_chain(&events),
            Err(ChainError::HashMismatch { index: 2, event_id: "e2".into() })
        );
    }

    #[test]
    fn removed_event_breaks_the_link() {
        let mut events = chain(4);
        events.remove(1);
        assert!(matches!(
            verify_chain(&events),
            Err(ChainError::BrokenLink { index: 1, .. })
        ));
    }

    #[test]
    fn segment_verifies_from_its_anchor() {
        let events = chain(6);
        assert_eq!(verify_segment(&events[3..], &events[2].hash), Ok(()));
        assert!(verify_chain(&events[3..]).is_err());
    }
}
