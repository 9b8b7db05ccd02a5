//! Trust scoring
//!
//! The trust level of an identity is the weighted count of its distinct valid
//! proofs. With the default policy every service weighs 1, so the level is
//! simply the number of verified accounts.

use serde::{Deserialize, Serialize};
use stackid_ledger::Verification;
use std::collections::{BTreeMap, BTreeSet};

/// Per-service weights and an optional ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    #[serde(default = "default_weight")]
    pub default_weight: u32,
    #[serde(default)]
    pub service_weights: BTreeMap<String, u32>,
    #[serde(default)]
    pub max_level: Option<u32>,
}

fn default_weight() -> u32 {
    1
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            default_weight: default_weight(),
            service_weights: BTreeMap::new(),
            max_level: None,
        }
    }
}

impl TrustPolicy {
    pub fn weight(&self, service: &str) -> u32 {
        self.service_weights
            .get(service)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Score a set of verifications.
    ///
    /// Duplicate (service, identifier) pairs count once. Unchecked and
    /// invalid entries count zero.
    pub fn trust_level(&self, verifications: &[Verification]) -> u32 {
        let distinct: BTreeSet<(&str, &str)> = verifications
            .iter()
            .filter(|v| v.valid)
            .map(|v| (v.service.as_str(), v.identifier.as_str()))
            .collect();

        let level = distinct
            .iter()
            .fold(0u32, |acc, (service, _)| acc.saturating_add(self.weight(service)));

        match self.max_level {
            Some(max) => level.min(max),
            None => level,
        }
    }
}

/// Trust level under the default policy
pub fn trust_level(verifications: &[Verification]) -> u32 {
    TrustPolicy::default().trust_level(verifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(service: &str, id: &str) -> Verification {
        Verification::valid(service, id, None)
    }

    #[test]
    fn test_counts_valid_only() {
        let verifications = vec![
            valid("twitter", "alice"),
            Verification::invalid("github", "alice", None),
            Verification::unchecked("facebook", "alice", None, "timeout"),
            valid("hackernews", "alice"),
        ];
        assert_eq!(trust_level(&verifications), 2);
        assert_eq!(trust_level(&[]), 0);
    }

    #[test]
    fn test_duplicates_count_once() {
        let verifications = vec![valid("twitter", "alice"), valid("twitter", "alice")];
        assert_eq!(trust_level(&verifications), 1);
    }

    #[test]
    fn test_adding_valid_never_decreases() {
        let policy = TrustPolicy {
            default_weight: 2,
            service_weights: [("twitter".to_string(), 0)].into_iter().collect(),
            max_level: Some(5),
        };
        let mut verifications = Vec::new();
        let mut last = policy.trust_level(&verifications);
        for (service, id) in [
            ("twitter", "a"),
            ("github", "a"),
            ("github", "a"),
            ("facebook", "a"),
            ("hackernews", "a"),
        ] {
            verifications.push(valid(service, id));
            let level = policy.trust_level(&verifications);
            assert!(level >= last);
            last = level;
        }
        assert_eq!(last, 5);
    }

    #[test]
    fn test_saturates() {
        let policy = TrustPolicy {
            default_weight: u32::MAX,
            ..Default::default()
        };
        let verifications = vec![valid("a", "x"), valid("b", "x")];
        assert_eq!(policy.trust_level(&verifications), u32::MAX);
    }
}
