//! Group-based storage entitlements.
//!
//! Administrators grant quota to unix groups, per tier. A user's
//! entitlement in a tier is the largest single grant among the groups they
//! belong to, never the sum: membership in ten groups that each carry 1 TB
//! still entitles the user to 1 TB.

use std::collections::HashMap;

use serde::Deserialize;

/// One grant: a byte ceiling in a named tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Allocation {
    /// Tier the grant applies to.
    pub tier: String,
    /// Byte ceiling granted.
    pub max_bytes: i64,
}

/// The full grant table, keyed by unix group name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct AllocationPolicy {
    grants: HashMap<String, Vec<Allocation>>,
}

impl AllocationPolicy {
    /// Creates a policy from a grant table.
    #[must_use]
    pub fn new(grants: HashMap<String, Vec<Allocation>>) -> Self {
        Self { grants }
    }

    /// Computes per-tier entitlements for a user in `groups`.
    ///
    /// Tiers with no grant for any of the groups are absent from the
    /// result; within a tier the largest grant wins.
    #[must_use]
    pub fn entitlements(&self, groups: &[String]) -> HashMap<String, i64> {
        let mut ceilings: HashMap<String, i64> = HashMap::new();
        for group in groups {
            let Some(grants) = self.grants.get(group) else {
                continue;
            };
            for grant in grants {
                let ceiling = ceilings.entry(grant.tier.clone()).or_insert(0);
                *ceiling = (*ceiling).max(grant.max_bytes);
            }
        }
        ceilings
    }

    /// Entitlement for one tier, 0 when no group carries a grant there.
    #[must_use]
    pub fn entitlement_for(&self, groups: &[String], tier: &str) -> i64 {
        let mut ceiling = 0;
        for group in groups {
            let Some(grants) = self.grants.get(group) else {
                continue;
            };
            for grant in grants {
                if grant.tier == tier {
                    ceiling = ceiling.max(grant.max_bytes);
                }
            }
        }
        ceiling
    }

    /// Iterates the raw grant table.
    pub fn grants(&self) -> impl Iterator<Item = (&str, &[Allocation])> {
        self.grants
            .iter()
            .map(|(group, grants)| (group.as_str(), grants.as_slice()))
    }
}
