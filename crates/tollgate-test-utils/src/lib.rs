// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tollgate.
//!
//! Provides in-memory persistence and scripted inference backends so the
//! dispatch path can be exercised without SQLite or a network.
//!
//! # Components
//!
//! - [`MemoryCostStore`], [`MemoryCacheStore`], [`MemoryAuditSink`] - stores
//!   with switchable write failures
//! - [`MockAdapter`] - inference backend that replays a script
//! - [`TestHarness`] - one of each, wired with a local and a cloud backend

pub mod harness;
pub mod mock_adapter;
pub mod stores;

pub use harness::TestHarness;
pub use mock_adapter::{MockAdapter, Scripted};
pub use stores::{MemoryAuditSink, MemoryCacheStore, MemoryCostStore};
