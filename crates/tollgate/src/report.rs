// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable renderings for the shell and one-shot commands.

use std::fmt::Write;

use colored::Colorize;
use tollgate_agent::{format_duration, DispatchOutcome, LifetimeStatus, ResponseSource};
use tollgate_cache::CacheStats;
use tollgate_core::{SessionCostRecord, Tier};
use tollgate_cost::{cache_hit_rate, local_rate, CostTrends};
use tollgate_security::PermittedTiers;

/// One dimmed line describing where an answer came from and what it cost.
pub fn outcome_footer(outcome: &DispatchOutcome) -> String {
    let source = match outcome.source {
        ResponseSource::Cache(hit) => format!("cache ({hit})"),
        ResponseSource::Backend => match &outcome.model {
            Some(model) => format!("{} via {model}", outcome.tier),
            None => outcome.tier.to_string(),
        },
    };
    let mut line = format!(
        "[{source} | {} in / {} out | ${:.4} | saved ${:.4} | {}ms]",
        outcome.input_tokens,
        outcome.output_tokens,
        outcome.cost,
        outcome.savings,
        outcome.duration.as_millis()
    );
    if outcome.forced_downgrade {
        line.push_str(" downgraded by policy");
    }
    if outcome.retried {
        line.push_str(" after retry");
    }
    line
}

/// Session totals printed by `/cost` and on exit.
pub fn session_summary(record: &SessionCostRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "session".bold(), record.id);
    let _ = writeln!(
        out,
        "  queries: {}  cost: ${:.4}  saved: ${:.4}",
        record.query_count, record.total_cost, record.savings
    );
    let _ = writeln!(
        out,
        "  cache hit rate: {:.0}%  kept local: {:.0}%",
        cache_hit_rate(record) * 100.0,
        local_rate(record) * 100.0
    );
    for (tier, usage) in &record.tiers {
        let _ = writeln!(
            out,
            "  {:<15} {:>4} queries {:>8} tokens  ${:.4}",
            tier.to_string(),
            usage.queries,
            usage.input_tokens + usage.output_tokens,
            usage.cost
        );
    }
    if !record.top_queries.is_empty() {
        let _ = writeln!(out, "  most expensive:");
        for q in record.top_queries.iter().take(3) {
            let _ = writeln!(out, "    ${:.4} {} {}", q.cost, q.tier, q.prompt.dimmed());
        }
    }
    out
}

/// Multi-day cost report.
pub fn trends_report(trends: &CostTrends) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("last {} days", trends.days).bold());
    let _ = writeln!(
        out,
        "  queries: {}  cost: ${:.4}  saved: ${:.4}",
        trends.total_queries, trends.total_cost, trends.total_saved
    );
    if trends.daily_breakdown.is_empty() {
        let _ = writeln!(out, "  {}", "no sessions recorded".dimmed());
        return out;
    }
    for day in &trends.daily_breakdown {
        let _ = writeln!(
            out,
            "  {}  {:>4} queries  ${:.4}  saved ${:.4}",
            day.date, day.query_count, day.cost, day.saved
        );
    }
    let cloud: f64 = trends
        .tier_breakdown
        .iter()
        .filter(|(tier, _)| tier.is_cloud())
        .map(|(_, cost)| cost)
        .sum();
    let _ = writeln!(out, "  cloud spend: ${cloud:.4}");
    out
}

/// Output of `/status`.
pub fn status_report(
    lifetime: &LifetimeStatus,
    permitted: &PermittedTiers,
    cache: &CacheStats,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "session".bold(), lifetime.session_id);
    let _ = writeln!(
        out,
        "  state: {}  active for: {}  idle: {}  expires in: {}",
        lifetime.state,
        format_duration(lifetime.duration),
        format_duration(lifetime.idle),
        format_duration(lifetime.remaining)
    );
    let _ = writeln!(
        out,
        "  classification: {}  permitted tiers: {}",
        permitted.level(),
        permitted.tiers()
    );
    if let Some(restriction) = permitted.restriction_for(Tier::CloudBest) {
        let _ = writeln!(out, "  cloud restricted: {restriction}");
    }
    let _ = writeln!(
        out,
        "  cache: {} entries, {} exact hits, {} semantic hits, {} misses",
        cache.entries, cache.hits_exact, cache.hits_semantic, cache.misses
    );
    out
}
