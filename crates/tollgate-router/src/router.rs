// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier selection under classification policy.
//!
//! Priority: per-query override prefix, then the complexity heuristic. Either
//! way the result is confined to what the classification gate permits.

use tollgate_core::{ClassificationLevel, Tier, TierSet, TollgateError};
use tollgate_security::{permitted_tiers, PermittedTiers};
use tracing::debug;

use crate::classifier::{Complexity, QueryClassifier, QueryType};

/// Token counts assumed when estimating a query's cost up front.
pub const ESTIMATE_INPUT_TOKENS: u64 = 500;
pub const ESTIMATE_OUTPUT_TOKENS: u64 = 1000;

/// Where a query will run, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// Tier chosen to execute the query.
    pub tier: Tier,
    /// Tier the query would have used without policy limits.
    pub desired: Tier,
    /// Policy, not cost or quality, picked a tier below `desired`.
    pub forced_downgrade: bool,
    pub complexity: Complexity,
    pub query_type: QueryType,
    /// Dollar cost of `tier` at the assumed token counts.
    pub estimated_cost: f64,
    pub reason: String,
}

/// Deterministic cost-aware router. Holds no mutable state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierRouter {
    classifier: QueryClassifier,
}

impl TierRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chooses a tier for `query`.
    ///
    /// The candidate set is the executable part of `permitted`, intersected
    /// again with the classification rule for `classification`. Errors only
    /// when that leaves nothing to run on.
    pub fn select(
        &self,
        query: &str,
        classification: ClassificationLevel,
        permitted: &PermittedTiers,
    ) -> Result<RoutingDecision, TollgateError> {
        let (override_tier, text) = parse_tier_override(query);
        let score = self.classifier.classify(text);
        let desired = override_tier.unwrap_or_else(|| score.complexity.desired_tier());

        let candidates = executable_candidates(permitted.tiers(), classification);

        let (tier, forced_downgrade) = match candidates.cheapest_at_least(desired) {
            Some(tier) => (tier, false),
            None => match candidates.highest() {
                Some(tier) => (tier, true),
                None => {
                    return Err(TollgateError::PolicyViolation {
                        classification,
                        tier: desired,
                    });
                }
            },
        };

        let mut reason = format!(
            "{} complexity ({}) -> {}",
            score.complexity, score.query_type, tier
        );
        if override_tier.is_some() {
            reason.push_str(" [override]");
        }
        if forced_downgrade {
            let cause = permitted
                .restriction_for(desired)
                .map(|r| r.to_string())
                .unwrap_or_else(|| "policy".to_string());
            reason.push_str(&format!(" (forced: {cause} blocks {desired})"));
        }

        debug!(
            tier = %tier,
            desired = %desired,
            classification = %classification,
            score = score.value,
            forced_downgrade,
            "tier selected"
        );

        Ok(RoutingDecision {
            tier,
            desired,
            forced_downgrade,
            complexity: score.complexity,
            query_type: score.query_type,
            estimated_cost: tier.cost(ESTIMATE_INPUT_TOKENS, ESTIMATE_OUTPUT_TOKENS),
            reason,
        })
    }

    /// Next tier below `tier` to retry on after a backend failure.
    pub fn fallback(&self, tier: Tier, permitted: TierSet) -> Option<Tier> {
        permitted.executable().below(tier)
    }
}

fn executable_candidates(permitted: TierSet, classification: ClassificationLevel) -> TierSet {
    let allowed = permitted_tiers(classification);
    permitted
        .iter()
        .filter(|t| allowed.contains(*t) && t.is_executable())
        .collect()
}

/// Splits a leading `/local`, `/fast`, `/balanced` or `/best` off `text`.
///
/// Returns the requested tier and the remaining prompt. Text without a
/// recognized prefix comes back unchanged.
pub fn parse_tier_override(text: &str) -> (Option<Tier>, &str) {
    const PREFIXES: [(&str, Tier); 4] = [
        ("/local", Tier::Local),
        ("/fast", Tier::CloudFast),
        ("/balanced", Tier::CloudBalanced),
        ("/best", Tier::CloudBest),
    ];

    let trimmed = text.trim_start();
    for (prefix, tier) in PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix)
            && rest.starts_with(char::is_whitespace)
        {
            return (Some(tier), rest.trim_start());
        }
    }
    (None, text)
}
