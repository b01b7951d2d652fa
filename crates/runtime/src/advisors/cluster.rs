//! Escapes dense hostile clusters.

use super::{Advisor, AdvisorContext, IntentProposal};
use skirmish_core::{EntityId, IntentKind};

/// Eight neighbor offsets, fixed order for deterministic tie-breaks.
const NEIGHBORS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Proposes an emergency step out of a crowd.
///
/// Fires when too many living hostiles stand adjacent; picks the neighbor
/// tile with the fewest hostiles nearby.
pub struct ClusterAvoidanceAdvisor {
    /// Adjacent hostiles at or above this count trigger the escape.
    crowd_threshold: u32,
    /// Radius scanned around each candidate escape tile.
    scan_radius: i32,
}

impl ClusterAvoidanceAdvisor {
    pub fn new(crowd_threshold: u32) -> Self {
        Self {
            crowd_threshold: crowd_threshold.max(1),
            scan_radius: 1,
        }
    }
}

impl Default for ClusterAvoidanceAdvisor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Advisor for ClusterAvoidanceAdvisor {
    fn source_key(&self) -> &'static str {
        "cluster-escape"
    }

    fn advise(&mut self, ctx: &AdvisorContext<'_>) -> Option<IntentProposal> {
        let adjacent = ctx.cache.hostile_density(1);
        if adjacent < self.crowd_threshold {
            return None;
        }

        // Sentinel id: nothing to exclude from the counts.
        let nobody = EntityId(u64::MAX);
        let escape = NEIGHBORS
            .iter()
            .map(|&(dx, dy)| ctx.actor.offset(dx, dy))
            .min_by_key(|tile| ctx.cache.count_near(*tile, self.scan_radius, nobody))?;
        let crowd_at_escape = ctx.cache.count_near(escape, self.scan_radius, nobody);
        let crowd_here = ctx.cache.count_near(ctx.actor, self.scan_radius, nobody);
        if crowd_at_escape >= crowd_here {
            // Every direction is as bad as standing still.
            return None;
        }

        let confidence = (0.4 + 0.15 * adjacent as f64).min(0.95);
        tracing::debug!(
            "cluster advisor: {adjacent} adjacent hostiles, escaping to {escape}"
        );
        Some(
            IntentProposal::new(IntentKind::EmergencyEscape, escape, confidence)
                .with_payload("adjacent", adjacent),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::{
        BehaviorStore, CacheConfig, ObservationCache, ObservedEntity, Position, SpeciesId,
        ThreatTracker,
    };

    fn crowd(positions: &[(i32, i32)]) -> ObservationCache {
        let mut cache = ObservationCache::new(CacheConfig::default());
        for (i, &(x, y)) in positions.iter().enumerate() {
            cache.upsert(
                ObservedEntity::new(
                    EntityId(i as u64 + 1),
                    SpeciesId(1),
                    "Rat",
                    Position::new(x, y, 0),
                ),
                100,
            );
        }
        cache
    }

    fn advise(cache: &ObservationCache) -> Option<IntentProposal> {
        let behavior = BehaviorStore::new();
        let threat = ThreatTracker::new();
        ClusterAvoidanceAdvisor::default().advise(&AdvisorContext {
            cache,
            behavior: &behavior,
            threat: &threat,
            actor: cache.actor_position(),
            target: None,
            candidate: None,
            now: 1_000,
        })
    }

    #[test]
    fn surrounded_actor_escapes_toward_open_ground() {
        // Three hostiles hugging the actor's east side.
        let cache = crowd(&[(1, 0), (1, 1), (1, -1)]);
        let proposal = advise(&cache).unwrap();
        assert_eq!(proposal.kind, IntentKind::EmergencyEscape);
        // Open ground is west.
        assert!(proposal.position.x < 0);
    }

    #[test]
    fn a_pair_of_hostiles_is_not_a_crowd() {
        let cache = crowd(&[(1, 0), (0, 1)]);
        assert!(advise(&cache).is_none());
    }
}
