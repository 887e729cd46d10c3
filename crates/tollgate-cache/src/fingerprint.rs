// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification-scoped query fingerprints.

use std::fmt;

use sha2::{Digest, Sha256};
use tollgate_core::ClassificationLevel;

/// Hex SHA-256 identifying one (level, normalized query) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims, lowercases and collapses internal whitespace to single spaces.
pub fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fingerprint of `query` under `level`.
///
/// The level marking is hashed ahead of the text with a NUL separator, so the
/// same text under two levels never shares a key.
pub fn fingerprint(query: &str, level: ClassificationLevel) -> Fingerprint {
    fingerprint_normalized(&normalize(query), level)
}

pub(crate) fn fingerprint_normalized(normalized: &str, level: ClassificationLevel) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(level.marking().as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(normalize("  What IS\tRust?\n"), "what is rust?");
        assert_eq!(
            fingerprint("What is Rust?", ClassificationLevel::Unclassified),
            fingerprint("  what   is rust?  ", ClassificationLevel::Unclassified)
        );
    }

    #[test]
    fn level_is_key_material() {
        let q = "summarize the incident report";
        assert_ne!(
            fingerprint(q, ClassificationLevel::Unclassified),
            fingerprint(q, ClassificationLevel::Cui)
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint("x", ClassificationLevel::Secret);
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
