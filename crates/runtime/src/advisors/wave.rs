//! Sidesteps predicted wave attacks.

use super::{Advisor, AdvisorContext, IntentProposal, step_toward};
use skirmish_core::{IntentKind, Millis};

/// Proposes a perpendicular step when a learned wave attacker is about to
/// fire.
///
/// Depends entirely on the classifier having flagged the species and on
/// the tracker having seen enough waves to predict a cadence; with no
/// prediction this advisor is silent.
pub struct WaveAvoidanceAdvisor {
    /// Only entities within this distance are considered.
    radius: i32,
    /// Predictions further out than this are ignored.
    eta_cutoff_ms: Millis,
    min_prediction_confidence: f64,
    /// Tiles to step perpendicular to the attack line.
    sidestep: i32,
}

impl WaveAvoidanceAdvisor {
    pub fn new() -> Self {
        Self {
            radius: 5,
            eta_cutoff_ms: 1_500,
            min_prediction_confidence: 0.5,
            sidestep: 2,
        }
    }
}

impl Default for WaveAvoidanceAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Advisor for WaveAvoidanceAdvisor {
    fn source_key(&self) -> &'static str {
        "wave-avoidance"
    }

    fn advise(&mut self, ctx: &AdvisorContext<'_>) -> Option<IntentProposal> {
        // Most imminent credible prediction wins.
        let mut imminent: Option<(Millis, f64, skirmish_core::Position)> = None;
        for entity in ctx.cache.get_nearby(self.radius) {
            let signals = ctx.threat.signals(
                entity.id,
                ctx.behavior.profile(entity.species),
                ctx.behavior.samples(entity.species),
                ctx.now,
            );
            let Some(prediction) = signals.wave_prediction else {
                continue;
            };
            if prediction.confidence < self.min_prediction_confidence
                || prediction.eta_ms > self.eta_cutoff_ms
            {
                continue;
            }
            if imminent.is_none_or(|(eta, _, _)| prediction.eta_ms < eta) {
                imminent = Some((prediction.eta_ms, prediction.confidence, entity.position));
            }
        }
        let (eta_ms, confidence, source_pos) = imminent?;

        // Perpendicular to the attacker-actor line; waves travel along it.
        let (dx, dy) = step_toward(source_pos, ctx.actor);
        let (px, py) = if dx == 0 && dy == 0 { (1, 0) } else { (-dy, dx) };
        let dodge = ctx.actor.offset(px * self.sidestep, py * self.sidestep);

        tracing::debug!(
            "wave advisor: predicted wave in {eta_ms}ms, dodging to {dodge}"
        );
        Some(
            IntentProposal::new(IntentKind::WaveAvoidance, dodge, confidence)
                .with_payload("eta_ms", eta_ms),
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

    fn wave_fixture() -> (ObservationCache, BehaviorStore, ThreatTracker) {
        let mut cache = ObservationCache::new(CacheConfig::default());
        cache.upsert(
            ObservedEntity::new(EntityId(1), SpeciesId(9), "Dragon", Position::new(3, 0, 0)),
            100,
        );

        let mut behavior = BehaviorStore::new();
        let mut profile = BehaviorProfile::new(SpeciesId(9));
        profile.is_wave_attacker = true;
        profile.confidence = 0.8;
        behavior.insert_profile(profile);

        // Two waves 4s apart establish the cadence.
        let mut threat = ThreatTracker::new();
        threat.record_attack(EntityId(1), 50.0, 1_000, true);
        behavior.samples_mut(SpeciesId(9)).record_wave(None);
        let interval = threat.record_attack(EntityId(1), 50.0, 5_000, true);
        behavior.samples_mut(SpeciesId(9)).record_wave(interval);

        (cache, behavior, threat)
    }

    #[test]
    fn imminent_wave_triggers_a_perpendicular_dodge() {
        let (cache, behavior, threat) = wave_fixture();
        // Next wave predicted at t=9000; at t=8200 the eta is 800ms.
        let ctx = AdvisorContext {
            cache: &cache,
            behavior: &behavior,
            threat: &threat,
            actor: Position::new(0, 0, 0),
            target: None,
            candidate: None,
            now: 8_200,
        };

        let proposal = WaveAvoidanceAdvisor::new().advise(&ctx).unwrap();
        assert_eq!(proposal.kind, IntentKind::WaveAvoidance);
        // Attacker is due east; the dodge is along the y axis.
        assert_eq!(proposal.position.x, 0);
        assert_ne!(proposal.position.y, 0);
    }

    #[test]
    fn distant_prediction_is_ignored() {
        let (cache, behavior, threat) = wave_fixture();
        // At t=5500 the next wave is 3.5s out.
        let ctx = AdvisorContext {
            cache: &cache,
            behavior: &behavior,
            threat: &threat,
            actor: Position::new(0, 0, 0),
            target: None,
            candidate: None,
            now: 5_500,
        };

        assert!(WaveAvoidanceAdvisor::new().advise(&ctx).is_none());
    }

    #[test]
    fn unprofiled_species_never_triggers() {
        let (cache, _, threat) = wave_fixture();
        let behavior = BehaviorStore::new();
        let ctx = AdvisorContext {
            cache: &cache,
            behavior: &behavior,
            threat: &threat,
            actor: Position::new(0, 0, 0),
            target: None,
            candidate: None,
            now: 8_200,
        };

        assert!(WaveAvoidanceAdvisor::new().advise(&ctx).is_none());
    }
}
