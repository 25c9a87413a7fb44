//! Access policy and group activation gate.
//!
//! Both are built once from configuration at startup and never mutated.

use std::collections::HashSet;

use rand::Rng;

/// Allow/deny lists of chat IDs.
///
/// The blacklist is consulted first. A present whitelist denies every ID it does
/// not contain. With neither list present every chat is allowed.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    whitelist: Option<HashSet<i64>>,
    blacklist: Option<HashSet<i64>>,
}

impl AccessPolicy {
    pub fn new(whitelist: Option<Vec<i64>>, blacklist: Option<Vec<i64>>) -> Self {
        Self {
            whitelist: whitelist.map(|ids| ids.into_iter().collect()),
            blacklist: blacklist.map(|ids| ids.into_iter().collect()),
        }
    }

    pub fn is_allowed(&self, chat_id: i64) -> bool {
        if let Some(blacklist) = &self.blacklist {
            if blacklist.contains(&chat_id) {
                return false;
            }
        }

        match &self.whitelist {
            Some(whitelist) => whitelist.contains(&chat_id),
            None => true,
        }
    }
}

/// Decides whether a group-chat photo gets captioned.
#[derive(Debug, Clone, Default)]
pub struct GroupGate {
    pub enabled: bool,
    /// Exact caption that always unlocks processing. `None` means every group photo passes.
    pub activation_phrase: Option<String>,
    /// Chance of processing a group photo whose caption does not match the phrase.
    pub activation_probability: f64,
}

impl GroupGate {
    pub fn admits<R: Rng>(&self, caption: Option<&str>, rng: &mut R) -> bool {
        if !self.enabled {
            return false;
        }

        let Some(phrase) = self.activation_phrase.as_deref() else {
            return true;
        };

        if caption == Some(phrase) {
            return true;
        }

        rng.gen_bool(self.activation_probability.clamp(0.0, 1.0))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    // ── access policy ───────────────────────────────────────────────────────

    #[test]
    fn test_no_lists_allows_everyone() {
        let policy = AccessPolicy::new(None, None);
        assert!(policy.is_allowed(1));
        assert!(policy.is_allowed(-100_123));
    }

    #[test]
    fn test_blacklist_only_denies_listed() {
        let policy = AccessPolicy::new(None, Some(vec![42]));
        assert!(!policy.is_allowed(42));
        assert!(policy.is_allowed(43));
    }

    #[test]
    fn test_whitelist_only_denies_absent() {
        let policy = AccessPolicy::new(Some(vec![1, 2]), None);
        assert!(policy.is_allowed(1));
        assert!(!policy.is_allowed(3));
    }

    #[test]
    fn test_blacklist_wins_over_whitelist() {
        let policy = AccessPolicy::new(Some(vec![5]), Some(vec![5]));
        assert!(!policy.is_allowed(5));
    }

    #[test]
    fn test_empty_whitelist_denies_everyone() {
        let policy = AccessPolicy::new(Some(vec![]), None);
        assert!(!policy.is_allowed(1));
    }

    // ── group gate ──────────────────────────────────────────────────────────

    #[test]
    fn test_disabled_gate_always_skips() {
        let gate = GroupGate {
            enabled: false,
            activation_phrase: Some("go".to_string()),
            activation_probability: 1.0,
        };
        let mut rng = rng();
        assert!(!gate.admits(Some("go"), &mut rng));
        assert!(!gate.admits(None, &mut rng));
    }

    #[test]
    fn test_no_phrase_full_probability_always_admits() {
        let gate = GroupGate {
            enabled: true,
            activation_phrase: None,
            activation_probability: 1.0,
        };
        let mut rng = rng();
        for _ in 0..100 {
            assert!(gate.admits(None, &mut rng));
        }
    }

    #[test]
    fn test_no_phrase_admits_regardless_of_probability() {
        let gate = GroupGate {
            enabled: true,
            activation_phrase: None,
            activation_probability: 0.0,
        };
        assert!(gate.admits(Some("anything"), &mut rng()));
    }

    #[test]
    fn test_phrase_match_bypasses_zero_probability() {
        let gate = GroupGate {
            enabled: true,
            activation_phrase: Some("caption this".to_string()),
            activation_probability: 0.0,
        };
        assert!(gate.admits(Some("caption this"), &mut rng()));
    }

    #[test]
    fn test_phrase_must_match_exactly() {
        let gate = GroupGate {
            enabled: true,
            activation_phrase: Some("caption this".to_string()),
            activation_probability: 0.0,
        };
        let mut rng = rng();
        for _ in 0..100 {
            assert!(!gate.admits(Some("Caption this"), &mut rng));
            assert!(!gate.admits(Some("caption this "), &mut rng));
            assert!(!gate.admits(None, &mut rng));
        }
    }

    #[test]
    fn test_probability_unlocks_without_phrase_match() {
        let gate = GroupGate {
            enabled: true,
            activation_phrase: Some("go".to_string()),
            activation_probability: 1.0,
        };
        assert!(gate.admits(Some("nope"), &mut rng()));
    }

    #[test]
    fn test_probability_is_roughly_respected() {
        let gate = GroupGate {
            enabled: true,
            activation_phrase: Some("go".to_string()),
            activation_probability: 0.25,
        };
        let mut rng = rng();
        let admitted = (0..4000).filter(|_| gate.admits(None, &mut rng)).count();
        assert!((800..1200).contains(&admitted), "admitted {admitted} of 4000");
    }
}
