// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier selection for the Tollgate dispatch layer.
//!
//! A zero-cost heuristic scores each query's complexity, which maps to the
//! tier it would ideally run on. The router then picks the cheapest tier the
//! classification gate permits that is at least that capable, or the most
//! capable permitted tier when policy forbids the ideal one.

pub mod classifier;
pub mod router;

pub use classifier::{Complexity, QueryClassifier, QueryType, Score};
pub use router::{parse_tier_override, RoutingDecision, TierRouter, ESTIMATE_INPUT_TOKENS, ESTIMATE_OUTPUT_TOKENS};
