// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only, hash-chained audit trail for Tollgate.
//!
//! Every dispatch decision becomes an [`AuditEvent`] whose `hash` covers the
//! previous event's hash, so removing or editing any event breaks every
//! later link. Events are chained synchronously and written to the sink
//! later by [`AuditLog::flush`].
//!
//! [`AuditEvent`]: tollgate_core::AuditEvent

pub mod chain;
pub mod log;

pub use chain::{compute_hash, verify_chain, verify_segment, ChainError, GENESIS_HASH};
pub use log::{AuditContext, AuditLog, QUERY_PREVIEW_CHARS};
