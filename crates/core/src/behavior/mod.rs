//! Learned per-species combat behavior.
//!
//! Two timescales live here:
//!
//! - [`BehaviorSamples`] accumulate cheap per-tick observations (did it
//!   move, did it close distance, was it facing us, attack timing) per
//!   species over minutes of play.
//! - [`BehaviorProfile`] is the slow-cadence classification derived from
//!   those samples by [`classifier::BehaviorClassifier`], persisted
//!   indefinitely and read by the scorer every tick.
//!
//! [`ThreatTracker`] sits between them: per-entity live telemetry (facing
//! streaks, damage windows, attack cooldowns) combined with the species
//! profile into the [`ThreatSignals`] the scorer consumes.

pub mod classifier;

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::config::ClassifierConfig;
use crate::types::{EntityId, Millis, SpeciesId};

/// Coarse movement pattern of a species.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, Default,
)]
pub enum MovementPattern {
    /// Barely moves; turret-like.
    Static,
    /// Closes distance toward the actor.
    Chase,
    /// Attacks while keeping or opening distance.
    Kite,
    /// Frequent direction changes with no clear pattern.
    Erratic,
    /// Moves, but neither toward nor away from the actor.
    #[default]
    Patrol,
}

/// Learned classification of one species.
///
/// Created lazily on the first classification attempt, updated
/// incrementally, never deleted by the core. Confidence only rises with
/// sample count and is capped below 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub species: SpeciesId,
    pub sample_count: u32,

    pub is_ranged: bool,
    pub is_melee: bool,
    pub is_wave_attacker: bool,
    pub is_aggressive: bool,
    pub is_fast: bool,
    pub is_slow: bool,
    pub movement_pattern: MovementPattern,

    /// Estimated danger, 0 to the configured cap.
    pub danger: u8,
    /// Classification confidence, [0, confidence_cap].
    pub confidence: f64,
    pub last_updated: Millis,
}

impl BehaviorProfile {
    pub fn new(species: SpeciesId) -> Self {
        Self {
            species,
            sample_count: 0,
            is_ranged: false,
            is_melee: true,
            is_wave_attacker: false,
            is_aggressive: false,
            is_fast: false,
            is_slow: false,
            movement_pattern: MovementPattern::default(),
            danger: 0,
            confidence: 0.0,
            last_updated: 0,
        }
    }
}

// ============================================================================
// Sample accumulation
// ============================================================================

/// Running mean/variance accumulator (Welford).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl IntervalStats {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }
}

/// Long-running observation counters for one species.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSamples {
    pub total: u32,
    /// Samples where the entity did not move.
    pub stationary: u32,
    /// Samples where the entity closed distance to the actor.
    pub closing: u32,
    /// Samples where the entity opened distance while attacking recently.
    pub retreating_in_combat: u32,
    /// Samples where the movement direction flipped.
    pub direction_changes: u32,
    /// Samples where the entity was facing the actor.
    pub facing_actor: u32,

    pub attack_count: u32,
    /// Sum of distances at which attacks landed, for the ranged/melee call.
    pub attack_distance_sum: f64,
    pub damage_total: f64,
    /// Total observed wall time in milliseconds.
    pub observed_ms: Millis,
    /// Observed speed sum (tiles/second) over movement samples.
    pub speed_sum: f64,
    pub speed_samples: u32,

    pub attack_intervals: IntervalStats,
    pub wave_attacks: u32,
    pub wave_intervals: IntervalStats,
}

impl BehaviorSamples {
    /// Records one movement observation.
    pub fn record_movement(
        &mut self,
        moved: bool,
        closed_distance: bool,
        retreating_in_combat: bool,
        changed_direction: bool,
        facing_actor: bool,
        speed: f64,
        elapsed_ms: Millis,
    ) {
        self.total += 1;
        self.observed_ms += elapsed_ms.max(0);
        if !moved {
            self.stationary += 1;
        } else {
            self.speed_sum += speed;
            self.speed_samples += 1;
        }
        if closed_distance {
            self.closing += 1;
        }
        if retreating_in_combat {
            self.retreating_in_combat += 1;
        }
        if changed_direction {
            self.direction_changes += 1;
        }
        if facing_actor {
            self.facing_actor += 1;
        }
    }

    /// Records an attack observation.
    pub fn record_attack(&mut self, damage: f64, distance: f64, interval_ms: Option<f64>) {
        self.attack_count += 1;
        self.damage_total += damage;
        self.attack_distance_sum += distance;
        if let Some(interval) = interval_ms {
            self.attack_intervals.record(interval);
        }
    }

    /// Records a wave (area burst) attack observation.
    pub fn record_wave(&mut self, interval_ms: Option<f64>) {
        self.wave_attacks += 1;
        if let Some(interval) = interval_ms {
            self.wave_intervals.record(interval);
        }
    }

    pub fn stationary_ratio(&self) -> f64 {
        ratio(self.stationary, self.total)
    }

    pub fn chase_ratio(&self) -> f64 {
        ratio(self.closing, self.total)
    }

    pub fn kite_ratio(&self) -> f64 {
        ratio(self.retreating_in_combat, self.total)
    }

    pub fn erratic_ratio(&self) -> f64 {
        ratio(self.direction_changes, self.total)
    }

    pub fn facing_ratio(&self) -> f64 {
        ratio(self.facing_actor, self.total)
    }

    pub fn avg_attack_distance(&self) -> Option<f64> {
        (self.attack_count > 0).then(|| self.attack_distance_sum / self.attack_count as f64)
    }

    pub fn avg_speed(&self) -> Option<f64> {
        (self.speed_samples > 0).then(|| self.speed_sum / self.speed_samples as f64)
    }

    /// Damage per second over the whole observation window.
    pub fn avg_dps(&self) -> f64 {
        if self.observed_ms <= 0 {
            return 0.0;
        }
        self.damage_total / (self.observed_ms as f64 / 1_000.0)
    }
}

fn ratio(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

// ============================================================================
// Live threat telemetry
// ============================================================================

/// Predicted imminent wave attack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavePrediction {
    /// Prediction confidence, [0, 1].
    pub confidence: f64,
    /// Estimated milliseconds until the attack. Non-positive means overdue.
    pub eta_ms: Millis,
}

/// Per-entity threat signals consumed by the scorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreatSignals {
    /// Learned danger level, if a profile exists.
    pub danger: Option<u8>,
    pub wave_prediction: Option<WavePrediction>,
    /// Fraction of recent samples spent facing the actor, [0, 1].
    pub facing_ratio: f64,
    /// Damage per second over the recent damage window.
    pub dps_estimate: f64,
    /// Whether the entity's estimated attack cooldown has elapsed.
    pub cooldown_ready: bool,
    /// Attack-interval variance (ms^2 root), if enough attacks were seen.
    pub attack_variance_ms: Option<f64>,
}

#[derive(Debug, Default)]
struct EntityTelemetry {
    facing_samples: u32,
    facing_hits: u32,
    last_attack_at: Option<Millis>,
    last_wave_at: Option<Millis>,
    /// (timestamp, damage) pairs inside the rolling window.
    damage_events: VecDeque<(Millis, f64)>,
}

/// Tracks live, per-entity combat telemetry.
///
/// Feeds two consumers: [`ThreatSignals`] for the scorer each tick, and
/// species-level [`BehaviorSamples`] for the classifier.
pub struct ThreatTracker {
    entities: HashMap<EntityId, EntityTelemetry>,
    /// Rolling DPS window length.
    window_ms: Millis,
}

impl ThreatTracker {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            window_ms: 10_000,
        }
    }

    /// Records whether the entity was facing the actor this sample.
    pub fn record_facing(&mut self, entity: EntityId, facing: bool) {
        let t = self.entities.entry(entity).or_default();
        t.facing_samples += 1;
        if facing {
            t.facing_hits += 1;
        }
    }

    /// Records an attack by the entity. Returns the interval since its
    /// previous attack, for sample accumulation.
    pub fn record_attack(
        &mut self,
        entity: EntityId,
        damage: f64,
        now: Millis,
        is_wave: bool,
    ) -> Option<f64> {
        let window = self.window_ms;
        let t = self.entities.entry(entity).or_default();
        let interval = t.last_attack_at.map(|prev| (now - prev) as f64);
        t.last_attack_at = Some(now);
        if is_wave {
            t.last_wave_at = Some(now);
        }
        t.damage_events.push_back((now, damage));
        while let Some(&(at, _)) = t.damage_events.front() {
            if now - at > window {
                t.damage_events.pop_front();
            } else {
                break;
            }
        }
        interval
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
    }

    /// Whether this entity attacked within the last `window_ms`.
    pub fn attacked_within(&self, entity: EntityId, now: Millis, window_ms: Millis) -> bool {
        self.entities
            .get(&entity)
            .and_then(|t| t.last_attack_at)
            .is_some_and(|at| now - at <= window_ms)
    }

    /// Milliseconds since this entity's last wave attack, if one was seen.
    pub fn since_last_wave(&self, entity: EntityId, now: Millis) -> Option<Millis> {
        let t = self.entities.get(&entity)?;
        t.last_wave_at.map(|at| now - at)
    }

    /// Assembles the scorer-facing signals for one entity.
    pub fn signals(
        &self,
        entity: EntityId,
        profile: Option<&BehaviorProfile>,
        samples: Option<&BehaviorSamples>,
        now: Millis,
    ) -> ThreatSignals {
        let telemetry = self.entities.get(&entity);

        let facing_ratio = telemetry
            .filter(|t| t.facing_samples > 0)
            .map(|t| t.facing_hits as f64 / t.facing_samples as f64)
            .unwrap_or(0.0);

        let dps_estimate = telemetry
            .map(|t| {
                let total: f64 = t
                    .damage_events
                    .iter()
                    .filter(|(at, _)| now - at <= self.window_ms)
                    .map(|(_, d)| d)
                    .sum();
                total / (self.window_ms as f64 / 1_000.0)
            })
            .unwrap_or(0.0);

        let mean_interval = samples.and_then(|s| s.attack_intervals.mean());
        let cooldown_ready = match (telemetry.and_then(|t| t.last_attack_at), mean_interval) {
            (Some(last), Some(mean)) => (now - last) as f64 >= mean,
            // Never seen attacking: assume it could act at any moment.
            (None, _) => true,
            // No learned cadence yet.
            (Some(_), None) => false,
        };

        let wave_prediction = self.predict_wave(entity, profile, samples, now);

        ThreatSignals {
            danger: profile.map(|p| p.danger),
            wave_prediction,
            facing_ratio,
            dps_estimate,
            cooldown_ready,
            attack_variance_ms: samples
                .and_then(|s| s.attack_intervals.variance())
                .map(f64::sqrt),
        }
    }

    fn predict_wave(
        &self,
        entity: EntityId,
        profile: Option<&BehaviorProfile>,
        samples: Option<&BehaviorSamples>,
        now: Millis,
    ) -> Option<WavePrediction> {
        let profile = profile.filter(|p| p.is_wave_attacker)?;
        let mean = samples?.wave_intervals.mean()?;
        let last = self.entities.get(&entity)?.last_wave_at?;
        let eta_ms = last + mean as Millis - now;
        Some(WavePrediction {
            confidence: profile.confidence,
            eta_ms,
        })
    }
}

impl Default for ThreatTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Profile store
// ============================================================================

/// In-memory store of species profiles and their sample accumulators.
///
/// Persistence of the profile map is the host's concern: the runtime
/// serializes profiles through its opaque blob store and seeds this map on
/// startup.
#[derive(Debug, Default)]
pub struct BehaviorStore {
    profiles: HashMap<SpeciesId, BehaviorProfile>,
    samples: HashMap<SpeciesId, BehaviorSamples>,
}

impl BehaviorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self, species: SpeciesId) -> Option<&BehaviorProfile> {
        self.profiles.get(&species)
    }

    pub fn insert_profile(&mut self, profile: BehaviorProfile) {
        self.profiles.insert(profile.species, profile);
    }

    pub fn samples(&self, species: SpeciesId) -> Option<&BehaviorSamples> {
        self.samples.get(&species)
    }

    pub fn samples_mut(&mut self, species: SpeciesId) -> &mut BehaviorSamples {
        self.samples.entry(species).or_default()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &BehaviorProfile> {
        self.profiles.values()
    }

    /// Species with any accumulated samples, for the classifier pass.
    pub fn tracked_species(&self) -> Vec<SpeciesId> {
        self.samples.keys().copied().collect()
    }

    /// Whether this species has at least `min_samples` observations.
    pub fn has_min_samples(&self, species: SpeciesId, config: &ClassifierConfig) -> bool {
        self.samples
            .get(&species)
            .is_some_and(|s| s.total >= config.min_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_stats_mean_and_variance() {
        let mut stats = IntervalStats::default();
        for v in [800.0, 1_000.0, 1_200.0] {
            stats.record(v);
        }
        assert_eq!(stats.mean(), Some(1_000.0));
        let var = stats.variance().unwrap();
        assert!((var - 40_000.0).abs() < 1e-6);
    }

    #[test]
    fn dps_window_drops_old_damage() {
        let mut tracker = ThreatTracker::new();
        let id = EntityId(1);
        tracker.record_attack(id, 100.0, 1_000, false);
        tracker.record_attack(id, 100.0, 2_000, false);

        let fresh = tracker.signals(id, None, None, 3_000);
        assert!(fresh.dps_estimate > 0.0);

        let late = tracker.signals(id, None, None, 60_000);
        assert_eq!(late.dps_estimate, 0.0);
    }

    #[test]
    fn cooldown_ready_follows_learned_interval() {
        let mut tracker = ThreatTracker::new();
        let mut samples = BehaviorSamples::default();
        let id = EntityId(1);

        let mut last = 0;
        for at in [1_000, 2_000, 3_000] {
            let interval = tracker.record_attack(id, 10.0, at, false);
            samples.record_attack(10.0, 1.0, interval);
            last = at;
        }

        let early = tracker.signals(id, None, Some(&samples), last + 200);
        assert!(!early.cooldown_ready);
        let due = tracker.signals(id, None, Some(&samples), last + 1_100);
        assert!(due.cooldown_ready);
    }

    #[test]
    fn wave_prediction_requires_wave_attacker_profile() {
        let mut tracker = ThreatTracker::new();
        let mut samples = BehaviorSamples::default();
        let id = EntityId(1);

        tracker.record_attack(id, 50.0, 1_000, true);
        samples.record_wave(None);
        let interval = tracker.record_attack(id, 50.0, 5_000, true);
        samples.record_wave(interval);

        let plain = BehaviorProfile::new(SpeciesId(1));
        assert!(
            tracker
                .signals(id, Some(&plain), Some(&samples), 6_000)
                .wave_prediction
                .is_none()
        );

        let mut waver = BehaviorProfile::new(SpeciesId(1));
        waver.is_wave_attacker = true;
        waver.confidence = 0.8;
        let prediction = tracker
            .signals(id, Some(&waver), Some(&samples), 6_000)
            .wave_prediction
            .unwrap();
        assert_eq!(prediction.eta_ms, 3_000);
        assert_eq!(prediction.confidence, 0.8);
    }
}
