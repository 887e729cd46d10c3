// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost trends aggregated over session records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tollgate_core::{SessionCostRecord, Tier};

/// Spend and savings for one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCost {
    pub date: NaiveDate,
    pub cost: f64,
    pub saved: f64,
    pub query_count: u64,
}

/// Aggregate over a trailing window of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostTrends {
    pub days: u32,
    pub total_cost: f64,
    pub total_saved: f64,
    pub total_queries: u64,
    /// Oldest day first. Days without sessions are omitted.
    pub daily_breakdown: Vec<DailyCost>,
    pub tier_breakdown: BTreeMap<Tier, f64>,
}

impl CostTrends {
    /// Sums `records`, attributing each session to the UTC date it started.
    pub fn aggregate<'a>(days: u32, records: impl IntoIterator<Item = &'a SessionCostRecord>) -> Self {
        let mut daily: BTreeMap<NaiveDate, DailyCost> = BTreeMap::new();
        let mut tier_breakdown = BTreeMap::new();
        let mut total_cost = 0.0;
        let mut total_saved = 0.0;
        let mut total_queries = 0;

        for record in records {
            let date = record.start_time.date_naive();
            let day = daily.entry(date).or_insert_with(|| DailyCost {
                date,
                cost: 0.0,
                saved: 0.0,
                query_count: 0,
            });
            day.cost += record.total_cost;
            day.saved += record.savings;
            day.query_count += record.query_count;

            total_cost += record.total_cost;
            total_saved += record.savings;
            total_queries += record.query_count;

            for (tier, usage) in &record.tiers {
                *tier_breakdown.entry(*tier).or_insert(0.0) += usage.cost;
            }
        }

        Self {
            days,
            total_cost,
            total_saved,
            total_queries,
            daily_breakdown: daily.into_values().collect(),
            tier_breakdown,
        }
    }
}

/// Share of a session's queries answered from the cache.
pub fn cache_hit_rate(record: &SessionCostRecord) -> f64 {
    share(record, |t| t == Tier::Cache)
}

/// Share of a session's queries that never left the machine.
pub fn local_rate(record: &SessionCostRecord) -> f64 {
    share(record, |t| !t.is_cloud())
}

fn share(record: &SessionCostRecord, pick: impl Fn(Tier) -> bool) -> f64 {
    if record.query_count == 0 {
        return 0.0;
    }
    let picked: u64 = record
        .tiers
        .iter()
        .filter(|(tier, _)| pick(**tier))
        .map(|(_, usage)| usage.queries)
        .sum();
    picked as f64 / record.query_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tollgate_core::TierUsage;

    fn session(id: &str, day: u32, hour: u32, cost: f64, queries: u64) -> SessionCostRecord {
        let mut r = SessionCostRecord::new(id, Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap());
        r.total_cost = cost;
        r.savings = 1.0 - cost;
        r.query_count = queries;
        r.tiers.insert(
            Tier::CloudFast,
            TierUsage {
                queries,
                cost,
                ..TierUsage::default()
            },
        );
        r
    }

    #[test]
    fn groups_by_start_date_in_order() {
        let records = [
            session("b", 5, 23, 0.5, 2),
            session("a", 4, 1, 0.25, 1),
            session("c", 5, 2, 0.25, 3),
        ];
        let trends = CostTrends::aggregate(7, &records);
        assert_eq!(trends.daily_breakdown.len(), 2);
        assert_eq!(trends.daily_breakdown[0].date, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert_eq!(trends.daily_breakdown[1].query_count, 5);
        assert!((trends.daily_breakdown[1].cost - 0.75).abs() < 1e-12);
        assert!((trends.total_cost - 1.0).abs() < 1e-12);
        assert_eq!(trends.total_queries, 6);
        assert!((trends.tier_breakdown[&Tier::CloudFast] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_window() {
        let trends = CostTrends::aggregate(30, std::iter::empty());
        assert_eq!(trends.days, 30);
        assert!(trends.daily_breakdown.is_empty());
        assert_eq!(trends.total_cost, 0.0);
    }

    #[test]
    fn rates_over_tier_usage() {
        let mut r = SessionCostRecord::new("s", Utc::now());
        r.query_count = 4;
        r.tiers.insert(Tier::Cache, TierUsage { queries: 1, ..TierUsage::default() });
        r.tiers.insert(Tier::Local, TierUsage { queries: 2, ..TierUsage::default() });
        r.tiers.insert(Tier::CloudBest, TierUsage { queries: 1, ..TierUsage::default() });
        assert!((cache_hit_rate(&r) - 0.25).abs() < 1e-12);
        assert!((local_rate(&r) - 0.75).abs() < 1e-12);
        assert_eq!(cache_hit_rate(&SessionCostRecord::new("e", Utc::now())), 0.0);
    }
}
