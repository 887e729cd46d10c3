// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction for audit previews and log output.
//!
//! Regex patterns catch well-known credential shapes. Exact literal values
//! (the configured cloud API key, for instance) can be added at runtime.

use std::io::Write;
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;

/// The redaction placeholder.
pub const REDACTED: &str = "[REDACTED]";

/// Credential shapes, most specific first so a generic rule never eats the
/// prefix of a specific one.
const PATTERN_SOURCES: &[&str] = &[
    // Anthropic: sk-ant-api03-...
    r"sk-ant-[a-zA-Z0-9_\-]{20,}",
    // OpenRouter: sk-or-v1-...
    r"sk-or-[a-zA-Z0-9\-]{20,}",
    // OpenAI style
    r"sk-[a-zA-Z0-9]{20,}",
    // AWS access key id
    r"AKIA[0-9A-Z]{16}",
    // GitHub personal, oauth, user, server and refresh tokens
    r"gh[pousr]_[a-zA-Z0-9]{36,}",
    r"(?i)\b(?:password|passwd|pwd)\s*[=:]\s*\S+",
    r"Bearer\s+[a-zA-Z0-9._~+/\-]{10,}=*",
    // Long opaque keys
    r"\b[A-Za-z0-9]{32,}\b",
];

static REDACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PATTERN_SOURCES
        .iter()
        .filter_map(|source| Regex::new(source).ok())
        .collect()
});

/// Replaces every known secret in `input` with [`REDACTED`].
///
/// `literals` are exact values to strip as well, longest first so a value
/// that contains another is removed whole.
pub fn redact(input: &str, literals: &[String]) -> String {
    let mut result = input.to_string();

    for pattern in REDACTION_PATTERNS.iter() {
        if pattern.is_match(&result) {
            result = pattern.replace_all(&result, REDACTED).into_owned();
        }
    }

    let mut sorted: Vec<&String> = literals.iter().filter(|v| !v.is_empty()).collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in sorted {
        result = result.replace(value.as_str(), REDACTED);
    }

    result
}

/// Redacted single-line preview of `text`, at most `max_chars` characters.
///
/// Whitespace runs (newlines included) collapse to one space. A cut preview
/// ends in `...` within the limit.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cleaned = redact(text, &[])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = cleaned.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// A writer that redacts secrets before forwarding bytes.
///
/// Used as the tracing subscriber's writer so credentials never reach stderr.
pub struct RedactingWriter<W> {
    inner: W,
    literals: Arc<RwLock<Vec<String>>>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, literals: Arc<RwLock<Vec<String>>>) -> Self {
        Self { inner, literals }
    }

    /// Adds an exact value to the shared redaction list, ignoring duplicates.
    pub fn add_literal(literals: &Arc<RwLock<Vec<String>>>, value: String) {
        if value.is_empty() {
            return;
        }
        if let Ok(mut values) = literals.write()
            && !values.contains(&value)
        {
            values.push(value);
        }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let input = String::from_utf8_lossy(buf);
        let literals = self
            .literals
            .read()
            .map(|v| v.clone())
            .unwrap_or_default();
        self.inner.write_all(redact(&input, &literals).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
