// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate application layer: wiring, the interactive shell and reports.

pub mod app;
pub mod report;
pub mod shell;
pub mod telemetry;

pub use app::{default_adapters, App, AuditReport};
