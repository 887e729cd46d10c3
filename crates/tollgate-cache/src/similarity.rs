// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-set similarity used by the semantic cache probe.

use std::collections::BTreeSet;

/// Distinct whitespace-separated tokens of already-normalized text.
pub fn token_set(normalized: &str) -> BTreeSet<String> {
    normalized.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Jaccard index `|a ∩ b| / |a ∪ b|`. Two empty sets score 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
