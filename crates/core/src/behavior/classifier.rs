//! Slow-cadence behavior classification and danger auto-tuning.
//!
//! The classifier runs on its own interval, far slower than the tick loop.
//! For every species with enough accumulated samples it derives behavior
//! flags and a movement pattern from fixed threshold rules, computes an
//! additive capped danger estimate, and produces a [`DangerSuggestion`]
//! with human-readable reasons. Suggestions are auto-applied only when
//! confidence is high and the change is significant; otherwise they sit in
//! the pending map until the next pass revisits them. Every applied change
//! lands in a bounded [`TuningHistory`] ring.

use std::collections::HashMap;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::{BehaviorProfile, BehaviorSamples, BehaviorStore, MovementPattern};
use crate::config::ClassifierConfig;
use crate::types::{Millis, SpeciesId};

/// Minimum wave attacks observed before a species is called a wave attacker.
const WAVE_ATTACK_MIN: u32 = 2;

/// A proposed danger-level change, with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerSuggestion {
    pub species: SpeciesId,
    pub current: u8,
    pub suggested: u8,
    pub confidence: f64,
    /// Human-readable reasons, e.g. `"dps 31.2 -> +3"`.
    pub reasons: Vec<String>,
    pub created_at: Millis,
}

/// One applied tuning change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningRecord {
    pub species: SpeciesId,
    pub before: u8,
    pub after: u8,
    pub reasons: Vec<String>,
    pub applied_at: Millis,
}

/// Fixed capacity of the tuning history ring.
pub const TUNING_HISTORY_CAP: usize = 50;

/// Bounded ring of applied tuning changes, oldest trimmed first.
#[derive(Debug, Default)]
pub struct TuningHistory {
    records: ArrayVec<TuningRecord, TUNING_HISTORY_CAP>,
}

impl TuningHistory {
    pub fn push(&mut self, record: TuningRecord) {
        if self.records.is_full() {
            self.records.remove(0);
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TuningRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&TuningRecord> {
        self.records.last()
    }
}

/// Classifies tracked species and tunes their danger levels.
pub struct BehaviorClassifier {
    config: ClassifierConfig,
    /// Suggestions that did not clear the auto-apply gate.
    pending: HashMap<SpeciesId, DangerSuggestion>,
    history: TuningHistory,
}

impl BehaviorClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            history: TuningHistory::default(),
        }
    }

    pub fn history(&self) -> &TuningHistory {
        &self.history
    }

    pub fn pending_suggestion(&self, species: SpeciesId) -> Option<&DangerSuggestion> {
        self.pending.get(&species)
    }

    /// Classifies one species from its accumulated samples.
    ///
    /// Below the minimum sample count this returns the previous profile
    /// unchanged, or `None` if none exists yet. The returned profile keeps
    /// the stored danger value; danger changes go through the tuning gate
    /// in [`run_pass`](Self::run_pass).
    pub fn classify(
        &self,
        species: SpeciesId,
        store: &BehaviorStore,
        now: Millis,
    ) -> Option<BehaviorProfile> {
        let previous = store.profile(species);
        let Some(samples) = store.samples(species) else {
            return previous.cloned();
        };
        if samples.total < self.config.min_samples {
            tracing::debug!(
                "classifier: {} has {} samples (< {}), keeping previous",
                species,
                samples.total,
                self.config.min_samples
            );
            return previous.cloned();
        }

        let cfg = &self.config;
        let mut profile = previous
            .cloned()
            .unwrap_or_else(|| BehaviorProfile::new(species));

        let avg_attack_distance = samples.avg_attack_distance();
        profile.is_ranged = avg_attack_distance.is_some_and(|d| d >= cfg.ranged_distance);
        profile.is_melee = !profile.is_ranged;
        profile.is_wave_attacker = samples.wave_attacks >= WAVE_ATTACK_MIN;
        profile.is_aggressive = samples.facing_ratio() >= cfg.facing_threshold;

        let avg_speed = samples.avg_speed().unwrap_or(0.0);
        profile.is_fast = avg_speed >= cfg.fast_speed;
        profile.is_slow = avg_speed > 0.0 && avg_speed <= cfg.slow_speed;

        profile.movement_pattern = Self::movement_pattern(samples, cfg);

        profile.sample_count = samples.total;
        // Confidence only rises, and never reaches 1.0.
        let fresh = (samples.total as f64 / cfg.samples_for_full_confidence as f64)
            .min(cfg.confidence_cap);
        profile.confidence = profile.confidence.max(fresh);
        profile.last_updated = now;

        Some(profile)
    }

    /// Additive capped danger estimate, with reasons.
    pub fn estimate_danger(&self, samples: &BehaviorSamples, profile: &BehaviorProfile) -> (u8, Vec<String>) {
        let cfg = &self.config;
        let mut danger = cfg.base_danger as u32;
        let mut reasons = vec![format!("base {}", cfg.base_danger)];

        let dps = samples.avg_dps();
        if let Some((_, bonus)) = cfg
            .dps_danger_tiers
            .iter()
            .find(|(min_dps, _)| dps >= *min_dps)
        {
            danger += *bonus as u32;
            reasons.push(format!("dps {dps:.1} -> +{bonus}"));
        }
        if profile.is_wave_attacker {
            danger += cfg.wave_attacker_bonus as u32;
            reasons.push(format!("wave attacker -> +{}", cfg.wave_attacker_bonus));
        }
        if profile.is_fast {
            danger += cfg.fast_bonus as u32;
            reasons.push(format!("fast -> +{}", cfg.fast_bonus));
        }
        if profile.is_aggressive {
            danger += cfg.aggressive_bonus as u32;
            reasons.push(format!("aggressive -> +{}", cfg.aggressive_bonus));
        }

        let capped = danger.min(cfg.danger_cap as u32) as u8;
        if capped as u32 != danger {
            reasons.push(format!("capped at {}", cfg.danger_cap));
        }
        (capped, reasons)
    }

    /// Full classification pass over every tracked species.
    ///
    /// Updates stored profiles, gates danger changes, and returns the
    /// records applied this pass.
    pub fn run_pass(&mut self, store: &mut BehaviorStore, now: Millis) -> Vec<TuningRecord> {
        let mut applied = Vec::new();

        for species in store.tracked_species() {
            let Some(mut profile) = self.classify(species, store, now) else {
                continue;
            };
            let Some(samples) = store.samples(species) else {
                continue;
            };
            if samples.total < self.config.min_samples {
                // classify() already returned the previous profile; nothing
                // new to tune from.
                store.insert_profile(profile);
                continue;
            }

            let (suggested, reasons) = self.estimate_danger(samples, &profile);
            let current = profile.danger;
            let delta = suggested.abs_diff(current);

            if delta == 0 {
                self.pending.remove(&species);
            } else if profile.confidence >= self.config.auto_apply_confidence
                && delta >= self.config.auto_apply_min_delta
            {
                tracing::info!(
                    "classifier: {} danger {} -> {} ({})",
                    species,
                    current,
                    suggested,
                    reasons.join(", ")
                );
                profile.danger = suggested;
                let record = TuningRecord {
                    species,
                    before: current,
                    after: suggested,
                    reasons: reasons.clone(),
                    applied_at: now,
                };
                self.history.push(record.clone());
                applied.push(record);
                self.pending.remove(&species);
            } else {
                tracing::debug!(
                    "classifier: {} suggestion {} -> {} held (confidence {:.2}, delta {})",
                    species,
                    current,
                    suggested,
                    profile.confidence,
                    delta
                );
                self.pending.insert(
                    species,
                    DangerSuggestion {
                        species,
                        current,
                        suggested,
                        confidence: profile.confidence,
                        reasons,
                        created_at: now,
                    },
                );
            }

            store.insert_profile(profile);
        }

        applied
    }

    fn movement_pattern(samples: &BehaviorSamples, cfg: &ClassifierConfig) -> MovementPattern {
        if samples.stationary_ratio() > cfg.stationary_threshold {
            MovementPattern::Static
        } else if samples.chase_ratio() > cfg.chase_threshold {
            MovementPattern::Chase
        } else if samples.kite_ratio() > cfg.kite_threshold {
            MovementPattern::Kite
        } else if samples.erratic_ratio() > cfg.erratic_threshold {
            MovementPattern::Erratic
        } else {
            MovementPattern::Patrol
        }
    }
}
