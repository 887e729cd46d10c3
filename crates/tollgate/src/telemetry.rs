// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber setup.

use std::sync::{Arc, RwLock};

use tollgate_security::RedactingWriter;
use tracing_subscriber::EnvFilter;

/// Shared list of exact values scrubbed from every log line.
pub type RedactionList = Arc<RwLock<Vec<String>>>;

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(log_level: &str) -> String {
    format!("tollgate={log_level},warn")
}

/// Installs a stderr subscriber whose output passes through the redactor.
///
/// Values added to the returned list later are redacted from then on.
pub fn init_tracing(log_level: &str) -> RedactionList {
    let literals: RedactionList = Arc::new(RwLock::new(Vec::new()));
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    let writer_literals = literals.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), writer_literals.clone()))
        .init();

    literals
}

/// Registers credentials from config and the environment for redaction.
pub fn register_secrets(literals: &RedactionList, api_key: Option<&str>) {
    if let Some(key) = api_key {
        RedactingWriter::<std::io::Stderr>::add_literal(literals, key.to_string());
    }
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        RedactingWriter::<std::io::Stderr>::add_literal(literals, key);
    }
}
