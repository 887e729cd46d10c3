// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query dispatch and session management for Tollgate.
//!
//! The [`Dispatcher`] is the central coordinator that, for each query:
//! - Gates the classification to a permitted tier set
//! - Answers from the result cache when it can
//! - Routes misses to the cheapest sufficient tier and runs them
//! - Retries once on a lower tier after a backend failure
//! - Records cost, caches the answer and appends to the audit trail
//!
//! The [`LifetimeManager`] tracks idle time for the interactive session, and
//! the [`background`] tasks drive it and periodic persistence.

pub mod background;
pub mod dispatch;
pub mod lifetime;
pub mod shutdown;

pub use background::{spawn_lifetime_ticker, spawn_persistence_flusher};
pub use dispatch::{
    DispatchOptions, DispatchOutcome, Dispatcher, DispatcherBuilder, ResponseSource,
};
pub use lifetime::{
    format_duration, AutosaveOutcome, ChannelObserver, LifetimeEvent, LifetimeManager,
    LifetimeObserver, LifetimeSettings, LifetimeState, LifetimeStatus,
};
pub use shutdown::install_signal_handler;
pub use tollgate_config::ExpiryPolicy;
