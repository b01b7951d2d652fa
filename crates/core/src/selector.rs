//! Target selection over the observation cache.
//!
//! [`TargetSelector::select_best`] scores every reachable candidate and
//! returns at most one winner. Two policies beyond raw scoring live here:
//!
//! - **Reachability leniency** (deliberate asymmetry): the current target
//!   is path-searched with a longer budget than challengers, and when no
//!   path is found at all it is still retained at reduced confidence if it
//!   is nearly adjacent. Challengers get the strict search. This prevents
//!   the "lost the target mid-fight" failure mode; see DESIGN.md.
//! - **Switch margin**: a challenger must beat the current target's score
//!   by a delta that grows as the current target weakens, on top of the
//!   scorer's own switch penalty.
//!
//! Edge conditions follow the degrade-not-fail rule: a candidate whose
//! entry vanished mid-evaluation, has no matching rule, or has no path is
//! skipped for this cycle only.

use std::collections::HashSet;

use crate::behavior::ThreatSignals;
use crate::config::ScoringConfig;
use crate::env::{PathOptions, Pathfinder};
use crate::observation::{CachedPath, ObservationCache, ObservedEntity};
use crate::rules::RuleSet;
use crate::scoring::{self, ScoreContext, ScoredCandidate};
use crate::types::{EntityId, Millis};

pub struct TargetSelector<'a> {
    config: &'a ScoringConfig,
}

impl<'a> TargetSelector<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Picks the best target, or `None` when nothing is worth engaging.
    ///
    /// `signals_for` supplies the learned threat signals per entity;
    /// `engaged` is the set of hostiles already fighting the actor.
    #[allow(clippy::too_many_arguments)]
    pub fn select_best(
        &self,
        cache: &mut ObservationCache,
        rules: &RuleSet,
        current_target: Option<EntityId>,
        engaged: &HashSet<EntityId>,
        signals_for: &dyn Fn(&ObservedEntity) -> ThreatSignals,
        pathfinder: &dyn Pathfinder,
        now: Millis,
    ) -> Option<ScoredCandidate> {
        let current_target_health = current_target
            .and_then(|id| cache.get(id))
            .filter(|e| e.alive)
            .map(|e| e.health_pct);
        // A dead or vanished current target is no target at all.
        let current_target = current_target.filter(|_| current_target_health.is_some());

        let ids: Vec<EntityId> = cache.iter().map(|e| e.id).collect();
        let mut best: Option<ScoredCandidate> = None;
        let mut current_candidate: Option<ScoredCandidate> = None;

        for id in ids {
            // Entry may have been evicted between snapshot and evaluation;
            // skip, never fail the batch.
            let Some(entity) = cache.get(id).cloned() else {
                continue;
            };
            if !entity.alive {
                continue;
            }
            let Some(rule) = rules.rule_for(&entity.species_name) else {
                continue;
            };
            let is_current = current_target == Some(id);

            let Some((path_length, reduced_confidence)) =
                self.resolve_path(cache, &entity, rule.max_distance, is_current, pathfinder, now)
            else {
                tracing::debug!("selector: {} unreachable this cycle", id);
                continue;
            };

            let ctx = ScoreContext {
                cache,
                config: self.config,
                current_target,
                current_target_health,
                engaged,
                now,
            };
            let signals = signals_for(&entity);
            let breakdown = scoring::score(&entity, rule, path_length, &signals, &ctx);
            if !breakdown.viable {
                continue;
            }

            let candidate = ScoredCandidate {
                entity: id,
                rule_name: rule.name.clone(),
                score: breakdown.total(),
                path_length,
                breakdown,
                reduced_confidence,
            };
            if is_current {
                current_candidate = Some(candidate.clone());
            }
            if best.as_ref().is_none_or(|b| candidate.beats(b)) {
                best = Some(candidate);
            }
        }

        // Stickiness gate: leaving a valid current target requires a
        // margin that grows as that target weakens.
        if let (Some(best_candidate), Some(current_candidate)) = (&best, &current_candidate)
            && best_candidate.entity != current_candidate.entity
        {
            let margin = self.switch_margin(current_target_health.unwrap_or(100));
            if best_candidate.score <= current_candidate.score + margin {
                tracing::debug!(
                    "selector: keeping current target {} ({:.1} vs {:.1}, margin {:.0})",
                    current_candidate.entity,
                    current_candidate.score,
                    best_candidate.score,
                    margin
                );
                return Some(current_candidate.clone());
            }
            tracing::debug!(
                "selector: switching {} -> {} ({:.1} beats {:.1} + {:.0})",
                current_candidate.entity,
                best_candidate.entity,
                best_candidate.score,
                current_candidate.score,
                margin
            );
        }

        best
    }

    /// Resolves a usable path length for a candidate, lazily refreshing the
    /// cached path. Returns `(length, reduced_confidence)`, or `None` when
    /// the candidate is unreachable this cycle.
    fn resolve_path(
        &self,
        cache: &mut ObservationCache,
        entity: &ObservedEntity,
        max_distance: i32,
        is_current: bool,
        pathfinder: &dyn Pathfinder,
        now: Millis,
    ) -> Option<(i32, bool)> {
        // Adjacency implies reachability; no path needed.
        if entity.distance <= 1 {
            return Some((entity.distance.max(0), false));
        }

        if let Some(path) = cache.path_if_fresh(entity.id, now) {
            return Some((path.len(), false));
        }

        let budget = if is_current {
            (max_distance as f64 * self.config.current_target_path_factor) as i32
        } else {
            max_distance
        };
        if let Some(tiles) =
            pathfinder.find_path(cache.actor_position(), entity.position, budget, PathOptions::default())
        {
            let length = tiles.len() as i32;
            cache.set_path(entity.id, CachedPath::new(tiles, now));
            return Some((length, false));
        }

        // No path. The current target is retained anyway when close enough,
        // at reduced confidence, rather than dropped mid-fight.
        if is_current && entity.distance <= self.config.current_target_fallback_distance {
            tracing::debug!(
                "selector: no path to current target {}, retaining at distance {}",
                entity.id,
                entity.distance
            );
            return Some((entity.distance, true));
        }

        None
    }

    fn switch_margin(&self, current_health_pct: u8) -> f64 {
        let tiered =
            ScoringConfig::tier_value(&self.config.switch_margin_tiers, current_health_pct);
        if tiered > 0.0 {
            tiered
        } else {
            self.config.switch_margin_base
        }
    }
}
