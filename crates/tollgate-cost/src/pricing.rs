// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-query pricing against the static tier cost model.

use tollgate_core::Tier;

/// Characters of a prompt kept in the top-queries list.
pub const PROMPT_PREVIEW_CHARS: usize = 100;

/// Price of one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Charge {
    pub cost: f64,
    /// What the same call would have cost on the reference tier.
    pub reference: f64,
    /// `reference - cost`. Never floored.
    pub savings: f64,
}

pub fn charge(tier: Tier, input_tokens: u64, output_tokens: u64) -> Charge {
    let cost = tier.cost(input_tokens, output_tokens);
    let reference = Tier::reference_cost(input_tokens, output_tokens);
    Charge {
        cost,
        reference,
        savings: reference - cost,
    }
}

/// First [`PROMPT_PREVIEW_CHARS`] characters of `prompt`, plus `...` when cut.
pub fn truncate_prompt(prompt: &str) -> String {
    match prompt.char_indices().nth(PROMPT_PREVIEW_CHARS) {
        Some((byte_idx, _)) => format!("{}...", &prompt[..byte_idx]),
        None => prompt.to_string(),
    }
}
