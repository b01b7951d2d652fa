//! Kites melee threats that get too close.

use super::{Advisor, AdvisorContext, IntentProposal, step_toward};
use skirmish_core::{IntentKind, ObservedEntity};

/// Proposes stepping away from the nearest melee threat inside the
/// preferred range.
///
/// Species without a learned profile are assumed melee; being wrong about
/// a ranged attacker costs a wasted step, being wrong the other way costs
/// health.
pub struct KeepDistanceAdvisor {
    preferred_range: i32,
}

impl KeepDistanceAdvisor {
    pub fn new(preferred_range: i32) -> Self {
        Self {
            preferred_range: preferred_range.max(1),
        }
    }

    fn is_melee(&self, ctx: &AdvisorContext<'_>, entity: &ObservedEntity) -> bool {
        ctx.behavior
            .profile(entity.species)
            .map(|p| p.is_melee)
            .unwrap_or(true)
    }
}

impl Default for KeepDistanceAdvisor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Advisor for KeepDistanceAdvisor {
    fn source_key(&self) -> &'static str {
        "keep-distance"
    }

    fn advise(&mut self, ctx: &AdvisorContext<'_>) -> Option<IntentProposal> {
        let threat = ctx
            .cache
            .get_nearby(self.preferred_range - 1)
            .into_iter()
            .filter(|e| self.is_melee(ctx, e))
            .min_by_key(|e| (e.distance, e.id.0))?;

        // Step directly away, far enough to restore the preferred range.
        let deficit = (self.preferred_range - threat.distance).max(1);
        let (dx, dy) = step_toward(threat.position, ctx.actor);
        if dx == 0 && dy == 0 {
            // Sharing a tile; any direction restores distance.
            return Some(IntentProposal::new(
                IntentKind::KeepDistance,
                ctx.actor.offset(self.preferred_range, 0),
                0.8,
            ));
        }
        let retreat = ctx.actor.offset(dx * deficit, dy * deficit);

        let danger = ctx
            .behavior
            .profile(threat.species)
            .map(|p| p.danger as f64)
            .unwrap_or(0.0);
        let confidence =
            (0.45 + 0.15 * deficit as f64 + 0.02 * danger).min(0.9);

        Some(
            IntentProposal::new(IntentKind::KeepDistance, retreat, confidence)
                .with_payload("threat", threat.id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::{
        BehaviorProfile, BehaviorStore, CacheConfig, EntityId, ObservationCache, ObservedEntity,
        Position, SpeciesId, ThreatTracker,
    };

    fn fixture() -> (ObservationCache, BehaviorStore, ThreatTracker) {
        (
            ObservationCache::new(CacheConfig::default()),
            BehaviorStore::new(),
            ThreatTracker::new(),
        )
    }

    fn ctx<'a>(
        cache: &'a ObservationCache,
        behavior: &'a BehaviorStore,
        threat: &'a ThreatTracker,
    ) -> AdvisorContext<'a> {
        AdvisorContext {
            cache,
            behavior,
            threat,
            actor: cache.actor_position(),
            target: None,
            candidate: None,
            now: 1_000,
        }
    }

    #[test]
    fn retreats_from_close_melee_threat() {
        let (mut cache, behavior, threat) = fixture();
        cache.upsert(
            ObservedEntity::new(EntityId(1), SpeciesId(1), "Rat", Position::new(1, 0, 0)),
            100,
        );

        let proposal = KeepDistanceAdvisor::new(3)
            .advise(&ctx(&cache, &behavior, &threat))
            .unwrap();
        assert_eq!(proposal.kind, IntentKind::KeepDistance);
        // Threat at +x, so retreat is toward -x.
        assert!(proposal.position.x < 0);
    }

    #[test]
    fn ranged_profile_is_not_kited() {
        let (mut cache, mut behavior, threat) = fixture();
        cache.upsert(
            ObservedEntity::new(EntityId(1), SpeciesId(2), "Archer", Position::new(1, 0, 0)),
            100,
        );
        let mut profile = BehaviorProfile::new(SpeciesId(2));
        profile.is_ranged = true;
        profile.is_melee = false;
        behavior.insert_profile(profile);

        assert!(
            KeepDistanceAdvisor::new(3)
                .advise(&ctx(&cache, &behavior, &threat))
                .is_none()
        );
    }

    #[test]
    fn threat_at_range_is_left_alone() {
        let (mut cache, behavior, threat) = fixture();
        cache.upsert(
            ObservedEntity::new(EntityId(1), SpeciesId(1), "Rat", Position::new(5, 0, 0)),
            100,
        );

        assert!(
            KeepDistanceAdvisor::new(3)
                .advise(&ctx(&cache, &behavior, &threat))
                .is_none()
        );
    }
}
