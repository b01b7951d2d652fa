//! Closes distance to the locked combat target.

use super::{Advisor, AdvisorContext, IntentProposal};
use skirmish_core::IntentKind;

/// Proposes walking toward the locked target whenever it is out of reach.
///
/// Confidence grows with distance (a far target is more clearly worth
/// chasing than one a tile away) and is halved when this tick's selection
/// only retained the target through the no-path fallback.
pub struct ChaseAdvisor {
    /// Don't bother proposing beyond this distance; the selector will have
    /// dropped such targets anyway.
    max_chase_distance: i32,
}

impl ChaseAdvisor {
    pub fn new() -> Self {
        Self {
            max_chase_distance: 12,
        }
    }
}

impl Default for ChaseAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Advisor for ChaseAdvisor {
    fn source_key(&self) -> &'static str {
        "chase"
    }

    fn advise(&mut self, ctx: &AdvisorContext<'_>) -> Option<IntentProposal> {
        let target = ctx.target.filter(|t| t.alive)?;
        if target.distance <= 1 || target.distance > self.max_chase_distance {
            return None;
        }

        let mut confidence = (0.4 + 0.08 * target.distance as f64).min(0.9);
        if ctx.candidate.is_some_and(|c| c.reduced_confidence) {
            confidence *= 0.5;
        }

        Some(
            IntentProposal::new(IntentKind::Chase, target.position, confidence)
                .with_payload("target", target.id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::{
        BehaviorStore, CacheConfig, EntityId, ObservationCache, ObservedEntity, Position,
        SpeciesId, ThreatTracker,
    };

    fn context_fixture(distance: i32) -> (ObservationCache, BehaviorStore, ThreatTracker) {
        let mut cache = ObservationCache::new(CacheConfig::default());
        cache.upsert(
            ObservedEntity::new(
                EntityId(1),
                SpeciesId(1),
                "Spider",
                Position::new(distance, 0, 0),
            ),
            100,
        );
        (cache, BehaviorStore::new(), ThreatTracker::new())
    }

    #[test]
    fn proposes_chase_toward_distant_target() {
        let (cache, behavior, threat) = context_fixture(5);
        let target = cache.get(EntityId(1)).unwrap();
        let ctx = AdvisorContext {
            cache: &cache,
            behavior: &behavior,
            threat: &threat,
            actor: Position::new(0, 0, 0),
            target: Some(target),
            candidate: None,
            now: 1_000,
        };

        let proposal = ChaseAdvisor::new().advise(&ctx).unwrap();
        assert_eq!(proposal.kind, IntentKind::Chase);
        assert_eq!(proposal.position, Position::new(5, 0, 0));
        assert!(proposal.confidence > 0.5);
    }

    #[test]
    fn adjacent_target_needs_no_chase() {
        let (cache, behavior, threat) = context_fixture(1);
        let target = cache.get(EntityId(1)).unwrap();
        let ctx = AdvisorContext {
            cache: &cache,
            behavior: &behavior,
            threat: &threat,
            actor: Position::new(0, 0, 0),
            target: Some(target),
            candidate: None,
            now: 1_000,
        };

        assert!(ChaseAdvisor::new().advise(&ctx).is_none());
    }

    #[test]
    fn no_target_no_proposal() {
        let (cache, behavior, threat) = context_fixture(5);
        let ctx = AdvisorContext {
            cache: &cache,
            behavior: &behavior,
            threat: &threat,
            actor: Position::new(0, 0, 0),
            target: None,
            candidate: None,
            now: 1_000,
        };

        assert!(ChaseAdvisor::new().advise(&ctx).is_none());
    }
}
