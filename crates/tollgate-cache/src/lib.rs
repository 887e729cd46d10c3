// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result cache for the Tollgate dispatch layer.
//!
//! Entries are partitioned by classification level and keyed by a
//! classification-scoped fingerprint, so an answer produced for one level is
//! structurally unreachable from another. Exact misses may fall back to a
//! token-set similarity probe inside the same partition.

pub mod cache;
pub mod fingerprint;
pub mod similarity;

pub use cache::{CacheHit, CacheSettings, CacheStats, CachedAnswer, ResultCache};
pub use fingerprint::{fingerprint, normalize, Fingerprint};
