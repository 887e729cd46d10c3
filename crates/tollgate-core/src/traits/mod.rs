// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators the core calls out to.
//!
//! Adapters that own a connection extend [`PluginAdapter`]. All traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod inference;
pub mod storage;

pub use adapter::PluginAdapter;
pub use inference::InferenceAdapter;
pub use storage::{AuditSink, CacheStore, CostStore};
