//! Engine configuration and tunable parameters.
//!
//! Every weight and threshold used by the decision pipeline lives here,
//! grouped per component and bundled into [`EngineConfig`]. None of these
//! numbers is a contract: they have been retuned repeatedly in the field,
//! and deployments are expected to ship their own values via serde.
//!
//! The one structural guarantee the defaults encode: user-configured rule
//! priority dominates scoring. `priority_scale` is sized so one priority
//! step outweighs the sum of every heuristic bonus, and lowering it is the
//! supported way to let heuristics compete with rule order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::intent::IntentKind;
use crate::types::Millis;

/// Top-level configuration for the whole engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    pub arbiter: ArbiterConfig,
    pub executor: ExecutorConfig,
    pub classifier: ClassifierConfig,
}

// ============================================================================
// ObservationCache
// ============================================================================

/// Bounds and freshness windows for the observation cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of tracked entities. Exceeding this evicts the
    /// least-recently-touched entry.
    pub capacity: usize,
    /// Entities beyond this Chebyshev distance are evicted instead of
    /// inserted.
    pub distance_cutoff: i32,
    /// Cached paths older than this are considered stale and recomputed on
    /// next read.
    pub path_ttl_ms: Millis,
    /// Entries not touched within this window are removed by the sweep.
    pub stale_after_ms: Millis,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            distance_cutoff: 14,
            path_ttl_ms: 900,
            stale_after_ms: 8_000,
        }
    }
}

// ============================================================================
// PriorityScorer
// ============================================================================

/// Weights for the target-priority score composition.
///
/// Tier tables are `(max_health_pct, value)` pairs evaluated first-match in
/// order, so they must be sorted ascending by health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Multiplier applied to `TargetingRule::priority`. Sized so one
    /// priority step beats every heuristic term combined.
    pub priority_scale: f64,

    /// "Finish the kill" bonus per health tier.
    pub health_tiers: Vec<(u8, f64)>,

    /// Flat bonus for being the currently engaged target.
    pub stickiness_base: f64,
    /// Extra stickiness per current-target health tier. Grows as the target
    /// weakens so a nearly-dead engaged target is numerically hard to drop.
    pub stickiness_tiers: Vec<(u8, f64)>,
    /// Penalty applied to challengers while the current target is wounded,
    /// per current-target health tier.
    pub switch_penalty_tiers: Vec<(u8, f64)>,

    /// Distance weight indexed by path length in tiles. Paths longer than
    /// the table score zero.
    pub distance_weights: Vec<f64>,
    /// Extra path length tolerated for the near-dead escape exception.
    pub out_of_range_grace: i32,
    /// Fraction of the closest-distance weight retained by a nearly-dead
    /// entity slightly beyond range.
    pub out_of_range_critical_factor: f64,
    /// Health percent at or below which an entity counts as nearly dead.
    pub critical_health_pct: u8,

    /// AoE cluster bonus per extra hostile within `aoe_radius`.
    pub aoe_bonus_per_target: f64,
    pub aoe_radius: i32,
    /// Pull penalty per unengaged hostile within `pull_radius`.
    pub pull_penalty_per_target: f64,
    pub pull_radius: i32,
    /// With the rp-safe flag set, more than this many would-be pulls zeroes
    /// the candidate outright.
    pub rp_safe_max_pulls: u32,

    /// Weight per learned danger level.
    pub danger_weight: f64,
    /// Bonus scale for a predicted imminent wave attack; scaled by
    /// prediction confidence and urgency.
    pub wave_urgency_weight: f64,
    /// Horizon (ms) over which a predicted wave attack ramps from no
    /// urgency to full urgency.
    pub wave_horizon_ms: f64,
    /// Bonus for sustained facing toward the actor.
    pub facing_bonus: f64,
    /// Weight per estimated damage-per-second point, and its cap.
    pub dps_weight: f64,
    pub dps_cap: f64,
    /// Bonus when the entity's attack cooldown is estimated ready.
    pub cooldown_ready_bonus: f64,

    /// Path-search length multiplier for the current target. The engaged
    /// target is searched more permissively than challengers; losing it
    /// mid-fight is the failure mode this asymmetry exists to prevent.
    pub current_target_path_factor: f64,
    /// With no path at all, the current target is still retained (at
    /// reduced confidence) when within this distance.
    pub current_target_fallback_distance: i32,
    /// Minimum score delta a challenger needs over a healthy current
    /// target before the selector switches.
    pub switch_margin_base: f64,
    /// Larger required deltas as the current target weakens, keyed by its
    /// health tier.
    pub switch_margin_tiers: Vec<(u8, f64)>,

    /// Reliability adjustments: predictable attackers can be anticipated,
    /// erratic ones demand caution. Both bounded and small.
    pub low_variance_bonus: f64,
    pub high_variance_bonus: f64,
    /// Attack-interval variance (ms) below which timing counts as low
    /// variance, and above which it counts as high variance.
    pub low_variance_ms: f64,
    pub high_variance_ms: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            priority_scale: 1_000.0,
            health_tiers: vec![
                (5, 800.0),
                (10, 600.0),
                (20, 400.0),
                (30, 250.0),
                (50, 120.0),
                (70, 50.0),
            ],
            stickiness_base: 200.0,
            stickiness_tiers: vec![(10, 500.0), (20, 300.0), (30, 150.0), (50, 75.0)],
            switch_penalty_tiers: vec![(10, 400.0), (20, 250.0), (30, 120.0), (50, 60.0)],
            distance_weights: vec![
                100.0, 100.0, 90.0, 80.0, 65.0, 50.0, 35.0, 25.0, 15.0, 10.0, 5.0,
            ],
            out_of_range_grace: 2,
            out_of_range_critical_factor: 0.25,
            critical_health_pct: 10,
            aoe_bonus_per_target: 40.0,
            aoe_radius: 1,
            pull_penalty_per_target: 60.0,
            pull_radius: 3,
            rp_safe_max_pulls: 0,
            danger_weight: 20.0,
            wave_urgency_weight: 80.0,
            wave_horizon_ms: 5_000.0,
            facing_bonus: 30.0,
            dps_weight: 2.0,
            dps_cap: 50.0,
            cooldown_ready_bonus: 25.0,
            current_target_path_factor: 2.0,
            current_target_fallback_distance: 3,
            switch_margin_base: 25.0,
            switch_margin_tiers: vec![(10, 150.0), (20, 100.0), (30, 75.0), (50, 50.0)],
            low_variance_bonus: 15.0,
            high_variance_bonus: 10.0,
            low_variance_ms: 150.0,
            high_variance_ms: 900.0,
        }
    }
}

impl ScoringConfig {
    /// Longest path length that still carries a distance weight.
    pub fn max_path_length(&self) -> i32 {
        self.distance_weights.len() as i32 - 1
    }

    /// First-match tier lookup: smallest tier whose bound covers `health`.
    pub fn tier_value(tiers: &[(u8, f64)], health_pct: u8) -> f64 {
        tiers
            .iter()
            .find(|(max, _)| health_pct <= *max)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }
}

// ============================================================================
// IntentArbiter
// ============================================================================

/// Thresholds and guards for movement arbitration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Intents whose targets are within this Chebyshev tolerance (same
    /// floor) form one arbitration group.
    pub group_tolerance: i32,
    /// Multiplicative confidence discount applied to the lower-priority
    /// group of an opposing-direction pair.
    pub conflict_discount: f64,
    /// Vote boost: `1 + step * (votes - 1)`, capped.
    pub vote_boost_step: f64,
    pub vote_boost_cap: f64,

    /// Per-kind base confidence threshold overrides. Kinds not listed use
    /// [`IntentKind::base_threshold`].
    pub threshold_overrides: HashMap<IntentKind, f64>,
    /// Density scaling steps as `(min_hostiles, factor)`, checked in order;
    /// densities below every step use factor 1.0. More hostiles lower the
    /// bar to move.
    pub density_steps: Vec<(u32, f64)>,
    /// Radius (tiles) over which hostiles are counted for density scaling.
    pub density_radius: i32,

    /// Extra confidence margin required to leave a known-safe position.
    /// Scaled by the same density factor as the base threshold.
    pub hysteresis_margin: f64,
    /// How long a position stays "safe" after being marked.
    pub safe_position_window_ms: Millis,

    /// Oscillation guard: executed moves tracked within this window.
    pub oscillation_window_ms: Millis,
    /// Minimum executed moves in the window before the guard can trip.
    pub max_oscillation_moves: usize,
    /// The guard trips when the window collapses to at most this many
    /// unique tiles...
    pub max_unique_tiles: usize,
    /// ...or when any single tile was revisited this many times.
    pub revisit_limit: usize,

    /// Minimum interval between approved decisions.
    pub decision_cooldown_ms: Millis,
    /// Intents older than this are expired by the registry cleanup.
    pub intent_ttl_ms: Millis,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            group_tolerance: 1,
            conflict_discount: 0.6,
            vote_boost_step: 0.1,
            vote_boost_cap: 1.5,
            threshold_overrides: HashMap::new(),
            density_steps: vec![(7, 0.55), (5, 0.7), (3, 0.85)],
            density_radius: 8,
            hysteresis_margin: 0.15,
            safe_position_window_ms: 4_000,
            oscillation_window_ms: 10_000,
            max_oscillation_moves: 6,
            max_unique_tiles: 2,
            revisit_limit: 3,
            decision_cooldown_ms: 400,
            intent_ttl_ms: 2_000,
        }
    }
}

impl ArbiterConfig {
    /// Base confidence threshold for an intent kind, honoring overrides.
    pub fn threshold_for(&self, kind: IntentKind) -> f64 {
        self.threshold_overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.base_threshold())
    }

    /// Threshold scaling factor for the given hostile density.
    pub fn density_factor(&self, hostile_count: u32) -> f64 {
        self.density_steps
            .iter()
            .find(|(min, _)| hostile_count >= *min)
            .map(|(_, f)| *f)
            .unwrap_or(1.0)
    }
}

// ============================================================================
// MovementExecutor
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Minimum interval between execution attempts, independent of the
    /// arbiter's decision cooldown.
    pub execution_cooldown_ms: Millis,
    /// Tile tolerance passed to the move primitive for standard movement.
    pub move_tolerance: i32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            execution_cooldown_ms: 600,
            move_tolerance: 0,
        }
    }
}

// ============================================================================
// BehaviorClassifier / Auto-Tuner
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Cadence of the classification pass. Much slower than the tick.
    pub interval_ms: Millis,
    /// Below this many samples, classification returns the previous result
    /// unchanged.
    pub min_samples: u32,

    /// Fraction of stationary samples above which a species is Static.
    pub stationary_threshold: f64,
    /// Fraction of closing-distance samples above which a species chases.
    pub chase_threshold: f64,
    /// Fraction of retreat-while-attacking samples above which it kites.
    pub kite_threshold: f64,
    /// Fraction of direction changes above which movement is Erratic.
    pub erratic_threshold: f64,
    /// Fraction of samples facing the actor above which it is aggressive.
    pub facing_threshold: f64,
    /// Tiles/second bounds for the fast/slow flags.
    pub fast_speed: f64,
    pub slow_speed: f64,
    /// Average attack range (tiles) above which a species counts as ranged.
    pub ranged_distance: f64,

    /// Danger estimate: base plus capped additive bonuses.
    pub base_danger: u8,
    /// DPS tier table as `(min_dps, bonus)` pairs, checked in order.
    pub dps_danger_tiers: Vec<(f64, u8)>,
    pub wave_attacker_bonus: u8,
    pub fast_bonus: u8,
    pub aggressive_bonus: u8,
    pub danger_cap: u8,

    /// Confidence grows linearly with samples up to this count, then caps.
    pub samples_for_full_confidence: u32,
    pub confidence_cap: f64,

    /// Auto-apply gates for danger suggestions.
    pub auto_apply_confidence: f64,
    pub auto_apply_min_delta: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            min_samples: 10,
            stationary_threshold: 0.7,
            chase_threshold: 0.6,
            kite_threshold: 0.4,
            erratic_threshold: 0.5,
            facing_threshold: 0.6,
            fast_speed: 1.5,
            slow_speed: 0.7,
            ranged_distance: 3.0,
            base_danger: 2,
            dps_danger_tiers: vec![(40.0, 4), (25.0, 3), (12.0, 2), (5.0, 1)],
            wave_attacker_bonus: 2,
            fast_bonus: 1,
            aggressive_bonus: 1,
            danger_cap: 10,
            samples_for_full_confidence: 200,
            confidence_cap: 0.95,
            auto_apply_confidence: 0.75,
            auto_apply_min_delta: 2,
        }
    }
}
