//! Target-priority scoring.
//!
//! [`score`] is a pure function from one observed entity (plus its matched
//! rule, learned signals, and the current engagement context) to a
//! [`ScoreBreakdown`]. Nothing here mutates state or does I/O; given the
//! same inputs the same score always comes out, which is what makes the
//! selector's tie-breaking deterministic.
//!
//! # Composition
//!
//! The score is a sum of independent terms, each visible in the breakdown:
//!
//! - **base**: rule priority × `priority_scale`. Dominant by construction;
//!   user-configured priority order is never overridden by heuristics.
//! - **health**: stepped "finish the kill" bonus as health falls.
//! - **stickiness**: bonus for the currently engaged target, growing as it
//!   weakens; a heavily wounded current target is numerically very hard to
//!   abandon.
//! - **switch penalty**: charged to challengers while the current target
//!   is wounded.
//! - **distance**: non-increasing lookup by path length, zero out of range
//!   except for the near-dead escape exception.
//! - **cluster**: AoE bonus for packed hostiles, pull penalty for
//!   unengaged ones, hard zero under the rp-safe flag.
//! - **threat**: learned danger, wave-attack prediction urgency, sustained
//!   facing, capped DPS, cooldown readiness.
//! - **reliability**: small bounded bonus for both very predictable and
//!   very erratic attack timing.

use std::collections::HashSet;

use crate::behavior::ThreatSignals;
use crate::config::ScoringConfig;
use crate::observation::{ObservationCache, ObservedEntity};
use crate::rules::{RuleFlags, TargetingRule};
use crate::types::{EntityId, Millis};

/// Engagement context shared by every candidate scored in one evaluation.
pub struct ScoreContext<'a> {
    pub cache: &'a ObservationCache,
    pub config: &'a ScoringConfig,
    /// The currently engaged target, if any.
    pub current_target: Option<EntityId>,
    /// Health of the current target, when it is still observed.
    pub current_target_health: Option<u8>,
    /// Entities already fighting the actor. Hitting these with a pull
    /// pattern costs nothing; hitting bystanders does.
    pub engaged: &'a HashSet<EntityId>,
    pub now: Millis,
}

impl<'a> ScoreContext<'a> {
    pub fn is_current(&self, id: EntityId) -> bool {
        self.current_target == Some(id)
    }
}

/// Per-term contributions of one scored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub health: f64,
    pub stickiness: f64,
    pub switch_penalty: f64,
    pub distance: f64,
    pub cluster: f64,
    pub threat: f64,
    pub reliability: f64,
    /// False when the candidate must not be engaged at all (out of range
    /// with no exception, or rp-safe violation).
    pub viable: bool,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        if !self.viable {
            return 0.0;
        }
        self.base
            + self.health
            + self.stickiness
            - self.switch_penalty
            + self.distance
            + self.cluster
            + self.threat
            + self.reliability
    }
}

/// One candidate with its computed score. Transient: recomputed every
/// evaluation, never stored across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub entity: EntityId,
    pub rule_name: String,
    pub score: f64,
    pub path_length: i32,
    pub breakdown: ScoreBreakdown,
    /// Set when the current target was retained through the reachability
    /// fallback rather than a real path.
    pub reduced_confidence: bool,
}

impl ScoredCandidate {
    /// Deterministic ordering: higher score, then shorter path, then lower
    /// entity id.
    pub fn beats(&self, other: &ScoredCandidate) -> bool {
        if self.score != other.score {
            return self.score > other.score;
        }
        if self.path_length != other.path_length {
            return self.path_length < other.path_length;
        }
        self.entity < other.entity
    }
}

/// Scores one entity against its matched rule.
///
/// `path_length` is the length of the path the selector resolved for this
/// candidate (tiles; 0 or 1 for adjacency).
pub fn score(
    entity: &ObservedEntity,
    rule: &TargetingRule,
    path_length: i32,
    signals: &ThreatSignals,
    ctx: &ScoreContext<'_>,
) -> ScoreBreakdown {
    let cfg = ctx.config;
    let is_current = ctx.is_current(entity.id);

    let mut breakdown = ScoreBreakdown {
        base: rule.priority as f64 * cfg.priority_scale,
        viable: true,
        ..ScoreBreakdown::default()
    };

    breakdown.health = ScoringConfig::tier_value(&cfg.health_tiers, entity.health_pct);

    if is_current {
        breakdown.stickiness = cfg.stickiness_base
            + ScoringConfig::tier_value(&cfg.stickiness_tiers, entity.health_pct);
    } else if let Some(current_hp) = ctx.current_target_health {
        breakdown.switch_penalty =
            ScoringConfig::tier_value(&cfg.switch_penalty_tiers, current_hp);
    }

    breakdown.distance = distance_term(entity, path_length, cfg, &mut breakdown.viable);
    breakdown.cluster = cluster_term(entity, rule, ctx, &mut breakdown.viable);
    breakdown.threat = threat_term(rule, signals, cfg);
    breakdown.reliability = reliability_term(signals, cfg);

    tracing::debug!(
        "score {}: total={:.1} (base={:.0} health={:.0} stick={:.0} switch=-{:.0} \
         dist={:.0} cluster={:.0} threat={:.1} rel={:.0} viable={})",
        entity.id,
        breakdown.total(),
        breakdown.base,
        breakdown.health,
        breakdown.stickiness,
        breakdown.switch_penalty,
        breakdown.distance,
        breakdown.cluster,
        breakdown.threat,
        breakdown.reliability,
        breakdown.viable,
    );

    breakdown
}

fn distance_term(
    entity: &ObservedEntity,
    path_length: i32,
    cfg: &ScoringConfig,
    viable: &mut bool,
) -> f64 {
    let max_len = cfg.max_path_length();
    if path_length >= 0 && path_length <= max_len {
        return cfg.distance_weights[path_length as usize];
    }

    // A guaranteed kill does not get to walk away: nearly-dead entities
    // slightly beyond range keep a reduced weight instead of dropping out.
    let nearly_dead = entity.health_pct <= cfg.critical_health_pct;
    if nearly_dead && path_length <= max_len + cfg.out_of_range_grace {
        return cfg.distance_weights.first().copied().unwrap_or(0.0)
            * cfg.out_of_range_critical_factor;
    }

    *viable = false;
    0.0
}

fn cluster_term(
    entity: &ObservedEntity,
    rule: &TargetingRule,
    ctx: &ScoreContext<'_>,
    viable: &mut bool,
) -> f64 {
    let cfg = ctx.config;
    let mut term = 0.0;

    if rule.flags.contains(RuleFlags::AOE) {
        let packed = ctx
            .cache
            .count_near(entity.position, cfg.aoe_radius, entity.id);
        term += packed as f64 * cfg.aoe_bonus_per_target;

        let pulls = unengaged_near(entity, ctx, cfg.pull_radius);
        term -= pulls as f64 * cfg.pull_penalty_per_target;
    }

    if rule.flags.contains(RuleFlags::RP_SAFE) {
        let pulls = unengaged_near(entity, ctx, cfg.pull_radius);
        if pulls > cfg.rp_safe_max_pulls {
            tracing::debug!(
                "score {}: rp-safe veto ({} unengaged hostiles in pull range)",
                entity.id,
                pulls
            );
            *viable = false;
        }
    }

    term
}

fn unengaged_near(entity: &ObservedEntity, ctx: &ScoreContext<'_>, radius: i32) -> u32 {
    ctx.cache
        .iter()
        .filter(|e| {
            e.alive
                && e.id != entity.id
                && e.position.within(&entity.position, radius)
                && !ctx.engaged.contains(&e.id)
        })
        .count() as u32
}

fn threat_term(rule: &TargetingRule, signals: &ThreatSignals, cfg: &ScoringConfig) -> f64 {
    let mut term = 0.0;

    let danger = signals.danger.unwrap_or(rule.danger);
    term += danger as f64 * cfg.danger_weight;

    if let Some(prediction) = signals.wave_prediction {
        let urgency = if prediction.eta_ms <= 0 {
            1.0
        } else {
            (1.0 - prediction.eta_ms as f64 / cfg.wave_horizon_ms).clamp(0.0, 1.0)
        };
        term += cfg.wave_urgency_weight * prediction.confidence.clamp(0.0, 1.0) * urgency;
    }

    term += cfg.facing_bonus * signals.facing_ratio.clamp(0.0, 1.0);
    term += (cfg.dps_weight * signals.dps_estimate).min(cfg.dps_cap);

    if signals.cooldown_ready {
        term += cfg.cooldown_ready_bonus;
    }

    term
}

fn reliability_term(signals: &ThreatSignals, cfg: &ScoringConfig) -> f64 {
    match signals.attack_variance_ms {
        Some(v) if v <= cfg.low_variance_ms => cfg.low_variance_bonus,
        Some(v) if v >= cfg.high_variance_ms => cfg.high_variance_bonus,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::WavePrediction;
    use crate::config::CacheConfig;
    use crate::types::{Position, SpeciesId};

    fn entity(id: u64, x: i32, health: u8) -> ObservedEntity {
        ObservedEntity::new(EntityId(id), SpeciesId(1), "Spider", Position::new(x, 0, 0))
            .with_health(health)
    }

    fn rule() -> TargetingRule {
        TargetingRule::new("Spider", 3, 8)
    }

    struct Fixture {
        cache: ObservationCache,
        engaged: HashSet<EntityId>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cache: ObservationCache::new(CacheConfig::default()),
                engaged: HashSet::new(),
            }
        }

        fn ctx<'a>(&'a self, cfg: &'a ScoringConfig) -> ScoreContext<'a> {
            ScoreContext {
                cache: &self.cache,
                config: cfg,
                current_target: None,
                current_target_health: None,
                engaged: &self.engaged,
                now: 1_000,
            }
        }
    }

    #[test]
    fn health_bonus_never_rises_with_health() {
        let cfg = ScoringConfig::default();
        let fx = Fixture::new();
        let ctx = fx.ctx(&cfg);
        let signals = ThreatSignals::default();

        let mut prev = f64::INFINITY;
        for hp in (0..=100).step_by(5) {
            let b = score(&entity(1, 3, hp as u8), &rule(), 3, &signals, &ctx);
            assert!(b.health <= prev, "health bonus rose at {hp}%");
            prev = b.health;
        }
    }

    #[test]
    fn rule_priority_dominates_heuristics() {
        let cfg = ScoringConfig::default();
        let fx = Fixture::new();
        let ctx = fx.ctx(&cfg);
        let signals = ThreatSignals::default();

        // Worst case for the high-priority rule, best case for the low one.
        let low_rule = TargetingRule::new("Spider", 2, 8);
        let high_rule = TargetingRule::new("Spider", 3, 8);

        let strong = score(&entity(1, 1, 5), &low_rule, 1, &signals, &ctx);
        let weak = score(&entity(2, 8, 100), &high_rule, 8, &signals, &ctx);
        assert!(weak.total() > strong.total());
    }

    #[test]
    fn current_target_gains_stickiness_challenger_pays_penalty() {
        let cfg = ScoringConfig::default();
        let mut fx = Fixture::new();
        fx.cache.upsert(entity(1, 2, 15), 0);
        let mut ctx = fx.ctx(&cfg);
        ctx.current_target = Some(EntityId(1));
        ctx.current_target_health = Some(15);
        let signals = ThreatSignals::default();

        let current = score(&entity(1, 2, 15), &rule(), 2, &signals, &ctx);
        assert_eq!(current.stickiness, 200.0 + 300.0);
        assert_eq!(current.switch_penalty, 0.0);

        let challenger = score(&entity(2, 2, 100), &rule(), 2, &signals, &ctx);
        assert_eq!(challenger.stickiness, 0.0);
        assert_eq!(challenger.switch_penalty, 250.0);
    }

    #[test]
    fn out_of_range_is_dropped_unless_nearly_dead() {
        let cfg = ScoringConfig::default();
        let fx = Fixture::new();
        let ctx = fx.ctx(&cfg);
        let signals = ThreatSignals::default();

        let healthy = score(&entity(1, 12, 80), &rule(), 12, &signals, &ctx);
        assert!(!healthy.viable);
        assert_eq!(healthy.total(), 0.0);

        let dying = score(&entity(2, 12, 8), &rule(), 12, &signals, &ctx);
        assert!(dying.viable);
        assert_eq!(dying.distance, 25.0);
    }

    #[test]
    fn aoe_bonus_counts_cluster_and_pull_penalty_counts_bystanders() {
        let cfg = ScoringConfig::default();
        let mut fx = Fixture::new();
        for (id, x) in [(1, 3), (2, 3), (3, 4)] {
            fx.cache.upsert(entity(id, x, 100), 0);
        }
        // Entities 2 and 3 are engaged; no pull risk from them.
        fx.engaged.insert(EntityId(2));
        fx.engaged.insert(EntityId(3));
        let ctx = fx.ctx(&cfg);
        let signals = ThreatSignals::default();

        let aoe_rule = rule().with_flags(RuleFlags::AOE);
        let b = score(&entity(1, 3, 100), &aoe_rule, 3, &signals, &ctx);
        // Two hostiles within the 1-tile pattern, no unengaged pulls.
        assert_eq!(b.cluster, 2.0 * cfg.aoe_bonus_per_target);
    }

    #[test]
    fn rp_safe_zeroes_score_when_pull_would_engage_bystanders() {
        let cfg = ScoringConfig::default();
        let mut fx = Fixture::new();
        fx.cache.upsert(entity(2, 4, 100), 0);
        let ctx = fx.ctx(&cfg);
        let signals = ThreatSignals::default();

        let safe_rule = rule().with_flags(RuleFlags::RP_SAFE);
        let b = score(&entity(1, 3, 100), &safe_rule, 3, &signals, &ctx);
        assert!(!b.viable);
        assert_eq!(b.total(), 0.0);
    }

    #[test]
    fn imminent_wave_outranks_distant_wave() {
        let cfg = ScoringConfig::default();
        let fx = Fixture::new();
        let ctx = fx.ctx(&cfg);

        let soon = ThreatSignals {
            wave_prediction: Some(WavePrediction {
                confidence: 0.8,
                eta_ms: 500,
            }),
            ..ThreatSignals::default()
        };
        let later = ThreatSignals {
            wave_prediction: Some(WavePrediction {
                confidence: 0.8,
                eta_ms: 4_000,
            }),
            ..ThreatSignals::default()
        };

        let b_soon = score(&entity(1, 3, 100), &rule(), 3, &soon, &ctx);
        let b_later = score(&entity(1, 3, 100), &rule(), 3, &later, &ctx);
        assert!(b_soon.threat > b_later.threat);
    }

    #[test]
    fn reliability_bonus_applies_at_both_extremes_and_is_bounded() {
        let cfg = ScoringConfig::default();
        let fx = Fixture::new();
        let ctx = fx.ctx(&cfg);

        let steady = ThreatSignals {
            attack_variance_ms: Some(50.0),
            ..ThreatSignals::default()
        };
        let wild = ThreatSignals {
            attack_variance_ms: Some(2_000.0),
            ..ThreatSignals::default()
        };
        let middling = ThreatSignals {
            attack_variance_ms: Some(400.0),
            ..ThreatSignals::default()
        };

        assert_eq!(
            score(&entity(1, 3, 100), &rule(), 3, &steady, &ctx).reliability,
            cfg.low_variance_bonus
        );
        assert_eq!(
            score(&entity(1, 3, 100), &rule(), 3, &wild, &ctx).reliability,
            cfg.high_variance_bonus
        );
        assert_eq!(
            score(&entity(1, 3, 100), &rule(), 3, &middling, &ctx).reliability,
            0.0
        );
    }

    #[test]
    fn tie_break_is_path_then_id() {
        let make = |id: u64, score_val: f64, path: i32| ScoredCandidate {
            entity: EntityId(id),
            rule_name: "Spider".into(),
            score: score_val,
            path_length: path,
            breakdown: ScoreBreakdown::default(),
            reduced_confidence: false,
        };

        assert!(make(1, 10.0, 5).beats(&make(2, 9.0, 1)));
        assert!(make(1, 10.0, 2).beats(&make(2, 10.0, 5)));
        assert!(make(1, 10.0, 3).beats(&make(2, 10.0, 3)));
        assert!(!make(2, 10.0, 3).beats(&make(1, 10.0, 3)));
    }
}
