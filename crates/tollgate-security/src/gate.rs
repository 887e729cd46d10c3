// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification gate: which tiers a query may legally run on.

use serde::Serialize;
use strum::Display;
use tollgate_config::model::ClassificationConfig;
use tollgate_core::{ClassificationLevel, Tier, TierSet};

/// Lowest level whose data must never leave the machine.
pub const CLOUD_PROHIBITED_AT: ClassificationLevel = ClassificationLevel::Cui;

/// Tiers legally usable for data at `level`.
///
/// At or above [`CLOUD_PROHIBITED_AT`] every cloud tier is removed, leaving
/// `{cache, local}`. Below it every tier is allowed.
pub fn permitted_tiers(level: ClassificationLevel) -> TierSet {
    let all = TierSet::all();
    if level >= CLOUD_PROHIBITED_AT {
        all.without_cloud()
    } else {
        all
    }
}

/// Why a tier was removed from the permitted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    /// The classification level forbids cloud tiers.
    Classification,
    /// Paranoid mode forbids cloud tiers for every level.
    Paranoid,
    /// The tier is above the deployment's configured cap.
    TierCap,
}

/// Result of gating one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermittedTiers {
    level: ClassificationLevel,
    tiers: TierSet,
    paranoid: bool,
    cap: Option<Tier>,
}

impl PermittedTiers {
    pub fn level(&self) -> ClassificationLevel {
        self.level
    }

    pub fn tiers(&self) -> TierSet {
        self.tiers
    }

    pub fn contains(&self, tier: Tier) -> bool {
        self.tiers.contains(tier)
    }

    /// The policy that excludes `tier`, or `None` if it is permitted.
    ///
    /// Classification outranks paranoid mode, which outranks the cap.
    pub fn restriction_for(&self, tier: Tier) -> Option<Restriction> {
        if self.tiers.contains(tier) {
            return None;
        }
        if tier.is_cloud() && self.level >= CLOUD_PROHIBITED_AT {
            Some(Restriction::Classification)
        } else if tier.is_cloud() && self.paranoid {
            Some(Restriction::Paranoid)
        } else if self.cap.is_some_and(|cap| tier > cap) {
            Some(Restriction::TierCap)
        } else {
            None
        }
    }
}

/// Deployment policy layered over [`permitted_tiers`].
///
/// Settings only ever narrow the classification result. Nothing here can
/// re-admit a cloud tier for data at or above [`CLOUD_PROHIBITED_AT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationGate {
    paranoid: bool,
    max_tier: Option<Tier>,
}

impl ClassificationGate {
    pub fn new(paranoid: bool, max_tier: Option<Tier>) -> Self {
        Self { paranoid, max_tier }
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(config.paranoid, config.max_tier)
    }

    pub fn is_paranoid(&self) -> bool {
        self.paranoid
    }

    pub fn permitted(&self, level: ClassificationLevel) -> PermittedTiers {
        let mut tiers = permitted_tiers(level);
        if self.paranoid {
            tiers = tiers.without_cloud();
        }
        if let Some(cap) = self.max_tier {
            // The local tier always survives a cap so a query can still run.
            tiers = tiers.capped_at(cap.max(Tier::Local));
        }
        PermittedTiers {
            level,
            tiers,
            paranoid: self.paranoid,
            cap: self.max_tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unclassified_permits_everything() {
        assert_eq!(permitted_tiers(ClassificationLevel::Unclassified), TierSet::all());
    }

    #[test]
    fn cui_and_above_keep_only_cache_and_local() {
        let expected: TierSet = [Tier::Cache, Tier::Local].into_iter().collect();
        for level in ClassificationLevel::ALL {
            if level >= ClassificationLevel::Cui {
                assert_eq!(permitted_tiers(level), expected, "{level}");
            }
        }
    }

    #[test]
    fn paranoid_removes_cloud_for_unclassified() {
        let gate = ClassificationGate::new(true, None);
        let permitted = gate.permitted(ClassificationLevel::Unclassified);
        assert!(!permitted.tiers().has_cloud());
        assert_eq!(
            permitted.restriction_for(Tier::CloudFast),
            Some(Restriction::Paranoid)
        );
    }

    #[test]
    fn classification_outranks_paranoid_in_reason() {
        let gate = ClassificationGate::new(true, None);
        let permitted = gate.permitted(ClassificationLevel::Secret);
        assert_eq!(
            permitted.restriction_for(Tier::CloudBest),
            Some(Restriction::Classification)
        );
        assert_eq!(permitted.restriction_for(Tier::Local), None);
    }

    #[test]
    fn cap_limits_cloud_but_keeps_local() {
        let gate = ClassificationGate::new(false, Some(Tier::CloudFast));
        let permitted = gate.permitted(ClassificationLevel::Unclassified);
        assert!(permitted.contains(Tier::CloudFast));
        assert!(!permitted.contains(Tier::CloudBalanced));
        assert_eq!(
            permitted.restriction_for(Tier::CloudBest),
            Some(Restriction::TierCap)
        );

        let cache_only = ClassificationGate::new(false, Some(Tier::Cache));
        assert!(cache_only
            .permitted(ClassificationLevel::Unclassified)
            .contains(Tier::Local));
    }

    fn level() -> impl Strategy<Value = ClassificationLevel> {
        prop::sample::select(ClassificationLevel::ALL.to_vec())
    }

    fn cap() -> impl Strategy<Value = Option<Tier>> {
        prop::option::of(prop::sample::select(Tier::ALL.to_vec()))
    }

    proptest! {
        #[test]
        fn gate_never_permits_cloud_at_or_above_threshold(
            level in level(),
            paranoid in any::<bool>(),
            cap in cap(),
        ) {
            let permitted = ClassificationGate::new(paranoid, cap).permitted(level);
            if level >= CLOUD_PROHIBITED_AT {
                prop_assert!(!permitted.tiers().has_cloud());
            }
            prop_assert!(permitted.contains(Tier::Local));
        }
    }
}
