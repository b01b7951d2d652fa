//! User-configured targeting rules.
//!
//! A rule maps a species name to an engagement policy: how badly the user
//! wants it attacked (`priority`), from how far (`max_distance`), and the
//! flags controlling chase/AoE/pull behavior. Rules are loaded once and
//! never mutated; many entities can match the same rule.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

bitflags! {
    /// Per-rule behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct RuleFlags: u8 {
        /// Follow the target when it moves out of reach.
        const CHASE = 0b0000_0001;
        /// Prefer targets that line up area attacks on clustered hostiles.
        const AOE = 0b0000_0010;
        /// Never take an action that would pull additional unengaged
        /// hostiles into the fight.
        const RP_SAFE = 0b0000_0100;
    }
}

/// One immutable targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    /// Species name this rule matches, case-insensitive. `"*"` matches any.
    pub name: String,
    /// User-configured priority weight. Dominant term in scoring: a higher
    /// priority rule always beats a lower one regardless of heuristics.
    pub priority: i32,
    /// Maximum engagement distance in tiles.
    pub max_distance: i32,
    /// Static danger rating (0-10) used until a learned profile exists.
    pub danger: u8,
    pub flags: RuleFlags,
}

impl TargetingRule {
    pub fn new(name: impl Into<String>, priority: i32, max_distance: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            max_distance,
            danger: 0,
            flags: RuleFlags::empty(),
        }
    }

    pub fn with_danger(mut self, danger: u8) -> Self {
        self.danger = danger;
        self
    }

    pub fn with_flags(mut self, flags: RuleFlags) -> Self {
        self.flags = flags;
        self
    }

    fn matches(&self, species_name: &str) -> bool {
        self.name == "*" || self.name.eq_ignore_ascii_case(species_name)
    }
}

/// Ordered collection of targeting rules.
///
/// Lookup is first-match in declaration order, so a specific rule placed
/// before a wildcard wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<TargetingRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<TargetingRule>) -> Result<Self> {
        for rule in &rules {
            if rule.name.is_empty() {
                return Err(CoreError::InvalidRule {
                    name: rule.name.clone(),
                    reason: "empty species name".into(),
                });
            }
            if rule.max_distance <= 0 {
                return Err(CoreError::InvalidRule {
                    name: rule.name.clone(),
                    reason: format!("non-positive max_distance {}", rule.max_distance),
                });
            }
        }
        Ok(Self { rules })
    }

    /// First rule matching the species name, if any.
    pub fn rule_for(&self, species_name: &str) -> Option<&TargetingRule> {
        self.rules.iter().find(|r| r.matches(species_name))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetingRule> {
        self.rules.iter()
    }
}
