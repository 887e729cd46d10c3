// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the gate, router, cache, ledger and adapters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

/// Sensitivity tag attached to a query.
///
/// Variants are declared in ascending order of restriction and the derived
/// [`Ord`] is the policy order: `a >= b` reads "a is at least as restrictive
/// as b". Policy thresholds are always compared with `>=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClassificationLevel {
    #[default]
    Unclassified,
    Cui,
    Confidential,
    Secret,
    TopSecret,
}

impl ClassificationLevel {
    /// All levels, least restrictive first.
    pub const ALL: [ClassificationLevel; 5] = [
        Self::Unclassified,
        Self::Cui,
        Self::Confidential,
        Self::Secret,
        Self::TopSecret,
    ];

    /// Banner marking text for this level.
    pub fn marking(&self) -> &'static str {
        match self {
            Self::Unclassified => "UNCLASSIFIED",
            Self::Cui => "CUI",
            Self::Confidential => "CONFIDENTIAL",
            Self::Secret => "SECRET",
            Self::TopSecret => "TOP SECRET",
        }
    }
}

impl fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marking())
    }
}

/// Error returned when a classification marking cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown classification level: {0}")]
pub struct ParseClassificationError(pub String);

impl FromStr for ClassificationLevel {
    type Err = ParseClassificationError;

    /// Parses a marking such as `CUI`, `ts` or `SECRET//NOFORN`.
    ///
    /// Anything after the first `//` is a caveat and does not affect the level.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = s.split("//").next().unwrap_or_default().trim();
        let normalized = level.to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "" | "U" | "UNCLASSIFIED" => Ok(Self::Unclassified),
            "CUI" | "CONTROLLED UNCLASSIFIED INFORMATION" => Ok(Self::Cui),
            "C" | "CONFIDENTIAL" => Ok(Self::Confidential),
            "S" | "SECRET" => Ok(Self::Secret),
            "TS" | "TOP SECRET" | "TOPSECRET" => Ok(Self::TopSecret),
            _ => Err(ParseClassificationError(s.to_string())),
        }
    }
}

impl Serialize for ClassificationLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassificationLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-1000-token dollar rates for one tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierRates {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl TierRates {
    /// Dollar cost of a call with the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.input_per_1k * input_tokens as f64 / 1000.0
            + self.output_per_1k * output_tokens as f64 / 1000.0
    }
}

/// An execution option, ordered by capability and cost.
///
/// The derived [`Ord`] is the capability order: `a >= b` reads "a is at least
/// as capable as b". Rates never decrease along that order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Cache,
    Local,
    CloudFast,
    CloudBalanced,
    CloudBest,
}

impl Tier {
    /// All tiers, cheapest first.
    pub const ALL: [Tier; 5] = [
        Self::Cache,
        Self::Local,
        Self::CloudFast,
        Self::CloudBalanced,
        Self::CloudBest,
    ];

    /// The most expensive defined tier. Savings are measured against it.
    pub const REFERENCE: Tier = Tier::CloudBest;

    /// Static cost model for this tier.
    pub fn rates(&self) -> TierRates {
        let (input_per_1k, output_per_1k) = match self {
            Self::Cache | Self::Local => (0.0, 0.0),
            Self::CloudFast => (0.000_25, 0.001_25),
            Self::CloudBalanced => (0.003, 0.015),
            Self::CloudBest => (0.015, 0.075),
        };
        TierRates {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Dollar cost of a call on this tier.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.rates().cost(input_tokens, output_tokens)
    }

    /// Cost of the same call on [`Tier::REFERENCE`].
    pub fn reference_cost(input_tokens: u64, output_tokens: u64) -> f64 {
        Self::REFERENCE.cost(input_tokens, output_tokens)
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::CloudFast | Self::CloudBalanced | Self::CloudBest)
    }

    /// Whether a backend can run a query on this tier. The cache only replays.
    pub fn is_executable(&self) -> bool {
        !matches!(self, Self::Cache)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// An ordered set of tiers, iterated cheapest first.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TierSet(u8);

impl TierSet {
    pub const EMPTY: TierSet = TierSet(0);

    /// Every defined tier.
    pub fn all() -> Self {
        Tier::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, tier: Tier) {
        self.0 |= tier.bit();
    }

    pub fn remove(&mut self, tier: Tier) {
        self.0 &= !tier.bit();
    }

    pub fn contains(&self, tier: Tier) -> bool {
        self.0 & tier.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Tier> + '_ {
        Tier::ALL.into_iter().filter(|t| self.contains(*t))
    }

    pub fn lowest(&self) -> Option<Tier> {
        self.iter().next()
    }

    pub fn highest(&self) -> Option<Tier> {
        self.iter().next_back()
    }

    /// Cheapest member at least as capable as `tier`.
    pub fn cheapest_at_least(&self, tier: Tier) -> Option<Tier> {
        self.iter().find(|t| *t >= tier)
    }

    /// Most capable member strictly below `tier`.
    pub fn below(&self, tier: Tier) -> Option<Tier> {
        self.iter().rev().find(|t| *t < tier)
    }

    /// Members no more capable than `cap`.
    pub fn capped_at(&self, cap: Tier) -> TierSet {
        self.iter().filter(|t| *t <= cap).collect()
    }

    pub fn without_cloud(&self) -> TierSet {
        self.iter().filter(|t| !t.is_cloud()).collect()
    }

    /// Members a backend can run.
    pub fn executable(&self) -> TierSet {
        self.iter().filter(Tier::is_executable).collect()
    }

    pub fn has_cloud(&self) -> bool {
        self.iter().any(|t| t.is_cloud())
    }
}

impl FromIterator<Tier> for TierSet {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        let mut set = TierSet::EMPTY;
        for tier in iter {
            set.insert(tier);
        }
        set
    }
}

impl fmt::Debug for TierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for TierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// How a cached answer was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HitType {
    Exact,
    Semantic,
}

/// Unique identifier for an interactive session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter plugged into the core.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Inference,
    Storage,
}

/// A single call handed to an inference backend.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub tier: Tier,
    pub prompt: String,
    pub classification: ClassificationLevel,
}

/// What an inference backend returns for a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Concrete model that served the call, when the backend reports one.
    pub model: Option<String>,
}
