//! The combat engine: event ingestion plus the ordered tick pipeline.
//!
//! One instance owns every piece of decision state. Events mutate the
//! observation cache and telemetry as they arrive; `tick` then runs the
//! full pipeline in a fixed order: sample accumulation, cache sweep,
//! intent expiry, target selection, advisory proposals, arbitration,
//! execution, and (on its own slower cadence) the behavior classifier.
//!
//! Nothing in here panics or aborts a tick. Every failure mode degrades
//! to "skip this candidate" or "try again next tick".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use skirmish_core::{
    BehaviorClassifier, BehaviorStore, BlockReason, Clock, EngineConfig, EntityId,
    IntentArbiter, IntentRegistry, Millis, MovementDecision, ObservationCache, ObservedEntity,
    Position, RuleSet, ScoredCandidate, SpeciesId, TargetSelector, ThreatTracker, TuningRecord,
    direction_dot,
};

use crate::advisors::{
    Advisor, AdvisorContext, ChaseAdvisor, ClusterAvoidanceAdvisor, IntentProposal,
    KeepDistanceAdvisor, WaveAvoidanceAdvisor,
};
use crate::events::WorldEvent;
use crate::executor::{ExecutionOutcome, MovementExecutor};
use crate::oracle::OracleManager;
use crate::store::{decode_profile, encode_profile, profile_key};

/// An entity that stopped attacking this long ago no longer counts as
/// "in combat" for retreat classification.
const COMBAT_RECENCY_MS: Millis = 3_000;

/// What one tick produced.
#[derive(Debug)]
pub struct TickOutcome {
    /// The locked combat target after selection.
    pub target: Option<EntityId>,
    pub decision: MovementDecision,
    /// Execution result, when the decision was approved.
    pub executed: Option<ExecutionOutcome>,
    /// Danger tunings applied by this tick's classifier pass, if it ran.
    pub tuned: Vec<TuningRecord>,
}

/// Owns all decision state and runs the per-tick pipeline.
pub struct CombatEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    oracles: OracleManager,
    rules: RuleSet,

    cache: ObservationCache,
    registry: IntentRegistry,
    arbiter: IntentArbiter,
    executor: MovementExecutor,
    classifier: BehaviorClassifier,
    behavior: BehaviorStore,
    threat: ThreatTracker,
    advisors: Vec<Box<dyn Advisor>>,

    current_target: Option<EntityId>,
    /// Hostiles currently fighting the actor (attacked recently or were
    /// engaged by us).
    engaged: HashSet<EntityId>,

    // Movement sampling state, per tracked entity.
    prev_positions: HashMap<EntityId, Position>,
    last_directions: HashMap<EntityId, (f64, f64)>,
    last_facing: HashMap<EntityId, bool>,
    last_tick_at: Option<Millis>,
    last_classifier_pass: Millis,
}

impl CombatEngine {
    /// Builds an engine with the stock advisor set.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        oracles: OracleManager,
        rules: RuleSet,
    ) -> Self {
        let advisors: Vec<Box<dyn Advisor>> = vec![
            Box::new(ClusterAvoidanceAdvisor::default()),
            Box::new(WaveAvoidanceAdvisor::default()),
            Box::new(KeepDistanceAdvisor::default()),
            Box::new(ChaseAdvisor::default()),
        ];
        Self {
            cache: ObservationCache::new(config.cache.clone()),
            registry: IntentRegistry::new(),
            arbiter: IntentArbiter::new(config.arbiter.clone()),
            executor: MovementExecutor::new(config.executor.clone()),
            classifier: BehaviorClassifier::new(config.classifier.clone()),
            behavior: BehaviorStore::new(),
            threat: ThreatTracker::new(),
            advisors,
            current_target: None,
            engaged: HashSet::new(),
            prev_positions: HashMap::new(),
            last_directions: HashMap::new(),
            last_facing: HashMap::new(),
            last_tick_at: None,
            last_classifier_pass: 0,
            config,
            clock,
            oracles,
            rules,
        }
    }

    /// Replaces the advisor set (testing, host customization).
    pub fn set_advisors(&mut self, advisors: Vec<Box<dyn Advisor>>) {
        self.advisors = advisors;
    }

    pub fn current_target(&self) -> Option<EntityId> {
        self.current_target
    }

    pub fn cache(&self) -> &ObservationCache {
        &self.cache
    }

    pub fn behavior(&self) -> &BehaviorStore {
        &self.behavior
    }

    pub fn classifier(&self) -> &BehaviorClassifier {
        &self.classifier
    }

    /// Seeds the cache from a full spatial scan. Used at startup and after
    /// event-stream gaps (reconnect, floor change).
    pub async fn refresh_from_world(&mut self) {
        let now = self.clock.now_millis();
        let actor = self.oracles.spatial().actor_position().await;
        self.cache.set_actor_position(actor);

        let snapshots = self
            .oracles
            .spatial()
            .hostiles_nearby(self.config.cache.distance_cutoff)
            .await;
        tracing::info!("engine: world refresh found {} hostiles", snapshots.len());
        for snapshot in snapshots {
            self.load_profile_if_unknown(snapshot.species);
            self.cache.upsert(snapshot.into_observed(), now);
        }
    }

    /// Applies one world event to the engine's state.
    pub fn apply_event(&mut self, event: &WorldEvent) {
        let now = self.clock.now_millis();
        match event {
            WorldEvent::EntityAppeared { entity } => {
                self.load_profile_if_unknown(entity.species);
                self.cache.upsert(entity.clone().into_observed(), now);
            }
            WorldEvent::EntityMoved {
                id,
                position,
                facing_actor,
            } => {
                self.threat.record_facing(*id, *facing_actor);
                self.last_facing.insert(*id, *facing_actor);
                self.cache.update_position(*id, *position, now);
            }
            WorldEvent::EntityHealthChanged { id, health_pct } => {
                self.cache.update_health(*id, *health_pct, now);
                if *health_pct == 0 {
                    self.engaged.remove(id);
                }
            }
            WorldEvent::EntityDisappeared { id } => {
                self.forget_entity(*id);
            }
            WorldEvent::EntityAttacked { id, damage, is_wave } => {
                self.record_attack(*id, *damage, *is_wave, now);
            }
            WorldEvent::ActorMoved { position } => {
                self.cache.set_actor_position(*position);
            }
            WorldEvent::CombatTargetChanged { target } => {
                // The world's confirmation wins over our own bookkeeping.
                self.current_target = *target;
                if let Some(id) = target {
                    self.engaged.insert(*id);
                }
            }
        }
    }

    /// Runs one full decision cycle.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now_millis();

        self.accumulate_movement_samples(now);
        self.cache.sweep(now);
        self.registry.cleanup(now, self.config.arbiter.intent_ttl_ms);

        let selected = self.select_target(now);
        self.commit_target(selected.as_ref().map(|c| c.entity));

        self.collect_intents(selected.as_ref(), now);

        let actor = self.cache.actor_position();
        let density = self
            .cache
            .hostile_density(self.config.arbiter.density_radius);
        let decision = self
            .arbiter
            .decide(&self.registry.sorted(), actor, density, now);

        let executed = if decision.should_move {
            let outcome = self
                .executor
                .execute(&decision, actor, now, self.oracles.mover());
            if outcome.success
                && let Some(intent) = &decision.intent
            {
                self.arbiter.record_executed_move(intent.position, now);
            }
            // One shot per cycle: whatever happened, the registry starts
            // fresh next tick.
            self.registry.clear();
            Some(outcome)
        } else {
            if matches!(
                decision.blocked,
                Some(BlockReason::NoIntents) | Some(BlockReason::BelowThreshold { .. })
            ) {
                self.arbiter.mark_position_safe(actor, now);
            }
            None
        };

        let tuned = self.run_classifier_if_due(now);

        TickOutcome {
            target: self.current_target,
            decision,
            executed,
            tuned,
        }
    }

    // ------------------------------------------------------------------------
    // Pipeline stages
    // ------------------------------------------------------------------------

    fn select_target(&mut self, now: Millis) -> Option<ScoredCandidate> {
        let selector = TargetSelector::new(&self.config.scoring);
        let threat = &self.threat;
        let behavior = &self.behavior;
        let signals_for = |entity: &ObservedEntity| {
            threat.signals(
                entity.id,
                behavior.profile(entity.species),
                behavior.samples(entity.species),
                now,
            )
        };
        selector.select_best(
            &mut self.cache,
            &self.rules,
            self.current_target,
            &self.engaged,
            &signals_for,
            self.oracles.paths(),
            now,
        )
    }

    fn commit_target(&mut self, target: Option<EntityId>) {
        if target == self.current_target {
            return;
        }
        match target {
            Some(id) => {
                if self.oracles.attack().set_attack_target(id) {
                    tracing::info!("engine: attacking {id}");
                } else {
                    tracing::warn!("engine: world refused attack on {id}");
                }
                self.engaged.insert(id);
            }
            None => {
                tracing::info!("engine: disengaging");
                self.oracles.attack().cancel_attack();
            }
        }
        self.current_target = target;
    }

    fn collect_intents(&mut self, candidate: Option<&ScoredCandidate>, now: Millis) {
        let mut advisors = std::mem::take(&mut self.advisors);
        let proposals: Vec<(&'static str, IntentProposal)> = {
            let ctx = AdvisorContext {
                cache: &self.cache,
                behavior: &self.behavior,
                threat: &self.threat,
                actor: self.cache.actor_position(),
                target: self.current_target.and_then(|id| self.cache.get(id)),
                candidate,
                now,
            };
            advisors
                .iter_mut()
                .filter_map(|a| a.advise(&ctx).map(|p| (a.source_key(), p)))
                .collect()
        };
        self.advisors = advisors;

        for (source, proposal) in proposals {
            self.registry.register(
                proposal.kind,
                proposal.position,
                proposal.confidence,
                source,
                now,
                proposal.payload,
            );
        }
    }

    fn run_classifier_if_due(&mut self, now: Millis) -> Vec<TuningRecord> {
        if now - self.last_classifier_pass < self.config.classifier.interval_ms {
            return Vec::new();
        }
        self.last_classifier_pass = now;
        let tuned = self.classifier.run_pass(&mut self.behavior, now);
        self.persist_profiles();
        tuned
    }

    // ------------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------------

    fn record_attack(&mut self, id: EntityId, damage: f64, is_wave: bool, now: Millis) {
        let Some(entity) = self.cache.get(id) else {
            // Attacks from unseen entities still mark danger; there is just
            // no species to credit the sample to.
            tracing::debug!("engine: attack from untracked entity {id}");
            return;
        };
        let species = entity.species;
        let distance = entity.distance as f64;
        self.cache.touch(id, now);
        self.engaged.insert(id);

        // Wave cadence must be read before the tracker overwrites the
        // last-wave timestamp.
        let wave_interval = if is_wave {
            self.threat.since_last_wave(id, now).map(|ms| ms as f64)
        } else {
            None
        };
        let interval = self.threat.record_attack(id, damage, now, is_wave);

        let samples = self.behavior.samples_mut(species);
        samples.record_attack(damage, distance, interval);
        if is_wave {
            samples.record_wave(wave_interval);
        }
    }

    /// Converts per-entity position deltas since the previous tick into
    /// species movement samples.
    fn accumulate_movement_samples(&mut self, now: Millis) {
        let elapsed = self.last_tick_at.map(|at| now - at).unwrap_or(0);
        self.last_tick_at = Some(now);
        if elapsed <= 0 {
            return;
        }

        let actor = self.cache.actor_position();
        let snapshot: Vec<(EntityId, SpeciesId, Position, f64)> = self
            .cache
            .iter()
            .filter(|e| e.alive)
            .map(|e| (e.id, e.species, e.position, e.speed))
            .collect();

        for (id, species, position, reported_speed) in snapshot {
            let Some(prev) = self.prev_positions.insert(id, position) else {
                continue;
            };
            let moved = prev != position;
            let closed =
                actor.chebyshev_distance(&position) < actor.chebyshev_distance(&prev);
            let opened =
                actor.chebyshev_distance(&position) > actor.chebyshev_distance(&prev);
            let retreating =
                opened && self.threat.attacked_within(id, now, COMBAT_RECENCY_MS);

            let mut changed_direction = false;
            if moved {
                let direction = prev.direction_to(&position);
                changed_direction = self
                    .last_directions
                    .insert(id, direction)
                    .is_some_and(|last| direction_dot(last, direction) < 0.0);
            }

            let speed = if moved {
                let tiles = prev.chebyshev_distance(&position);
                tiles as f64 * 1_000.0 / elapsed as f64
            } else {
                reported_speed
            };
            let facing = self.last_facing.get(&id).copied().unwrap_or(false);

            self.behavior.samples_mut(species).record_movement(
                moved,
                closed,
                retreating,
                changed_direction,
                facing,
                speed,
                elapsed,
            );
        }

        // Drop sampling state for entities the cache no longer tracks.
        let cache = &self.cache;
        self.prev_positions.retain(|id, _| cache.get(*id).is_some());
        self.last_directions.retain(|id, _| cache.get(*id).is_some());
        self.last_facing.retain(|id, _| cache.get(*id).is_some());
    }

    fn forget_entity(&mut self, id: EntityId) {
        self.cache.remove(id);
        self.threat.forget(id);
        self.engaged.remove(&id);
        self.prev_positions.remove(&id);
        self.last_directions.remove(&id);
        self.last_facing.remove(&id);
        if self.current_target == Some(id) {
            self.current_target = None;
            self.oracles.attack().cancel_attack();
        }
    }

    // ------------------------------------------------------------------------
    // Profile persistence
    // ------------------------------------------------------------------------

    fn load_profile_if_unknown(&mut self, species: SpeciesId) {
        if self.behavior.profile(species).is_some() {
            return;
        }
        let Some(blob) = self.oracles.profiles().get(&profile_key(species)) else {
            return;
        };
        match decode_profile(&blob) {
            Ok(profile) => {
                tracing::debug!(
                    "engine: loaded profile for {species} (danger {}, confidence {:.2})",
                    profile.danger,
                    profile.confidence
                );
                self.behavior.insert_profile(profile);
            }
            Err(err) => {
                // Corrupt blob: start over from live observation.
                tracing::warn!("engine: ignoring corrupt profile for {species}: {err}");
            }
        }
    }

    fn persist_profiles(&self) {
        for profile in self.behavior.profiles() {
            match encode_profile(profile) {
                Ok(blob) => self
                    .oracles
                    .profiles()
                    .set(&profile_key(profile.species), blob),
                Err(err) => {
                    tracing::warn!("engine: failed to encode profile for {}: {err}", profile.species)
                }
            }
        }
    }
}
