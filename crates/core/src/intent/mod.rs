//! Movement intents and their per-tick registry.
//!
//! Advisory subsystems do not move the actor; they submit typed,
//! confidence-scored [`MovementIntent`]s, and the arbiter resolves them
//! into at most one decision per cycle. The registry is keyed by source so
//! a subsystem replaces its own stale intent instead of accumulating
//! duplicates, and everything expires on a short TTL.

pub mod arbiter;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::types::{Millis, Position};

/// The closed set of movement intent types, in fixed priority order.
///
/// The declaration order here IS the total priority order; nothing at
/// runtime can reorder it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum IntentKind {
    /// Get out now: surrounded, standing in a hazard, about to die.
    EmergencyEscape,
    /// Sidestep a predicted wave/area attack.
    WaveAvoidance,
    /// Step to finish a nearly-dead target before it escapes.
    FinishKill,
    /// Reach a position required by a queued spell or ability.
    SpellPosition,
    /// Keep range from melee threats (kiting).
    KeepDistance,
    /// General tactical repositioning.
    Reposition,
    /// Close distance to the locked target.
    Chase,
    /// Turn/step to face the locked target.
    FaceTarget,
    /// Pull hostiles toward a chosen spot.
    Lure,
    /// Explicit do-nothing proposal.
    Idle,
}

impl IntentKind {
    /// Fixed numeric priority; higher wins. Derived from declaration order
    /// so the enum stays the single source of truth.
    pub fn priority(self) -> i32 {
        let index = IntentKind::iter().position(|k| k == self).unwrap_or(0) as i32;
        (IntentKind::iter().count() as i32 - index) * 10
    }

    /// Default confidence threshold required to act on this kind. Urgent
    /// kinds clear a lower bar.
    pub const fn base_threshold(self) -> f64 {
        match self {
            IntentKind::EmergencyEscape => 0.25,
            IntentKind::WaveAvoidance => 0.35,
            IntentKind::FinishKill => 0.40,
            IntentKind::SpellPosition => 0.45,
            IntentKind::KeepDistance => 0.50,
            IntentKind::Chase => 0.50,
            IntentKind::Reposition => 0.55,
            IntentKind::FaceTarget => 0.60,
            IntentKind::Lure => 0.60,
            IntentKind::Idle => 0.90,
        }
    }

    /// Whether execution may path through movable obstacles.
    pub const fn is_emergency(self) -> bool {
        matches!(self, IntentKind::EmergencyEscape | IntentKind::WaveAvoidance)
    }
}

/// One movement proposal from an advisory subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementIntent {
    pub kind: IntentKind,
    pub position: Position,
    /// Clamped to [0, 1] at registration.
    pub confidence: f64,
    /// Submitting subsystem; at most one live intent per source.
    pub source: String,
    pub created_at: Millis,
    /// Free-form context for the executor (e.g. the entity being chased).
    pub payload: Option<HashMap<String, String>>,
}

impl MovementIntent {
    pub fn priority(&self) -> i32 {
        self.kind.priority()
    }
}

/// Per-tick collection of live intents, keyed by source.
#[derive(Debug, Default)]
pub struct IntentRegistry {
    intents: HashMap<String, MovementIntent>,
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an intent, replacing any prior intent from the same
    /// source. Invalid submissions (empty source, non-finite confidence)
    /// are dropped silently apart from a warning.
    pub fn register(
        &mut self,
        kind: IntentKind,
        position: Position,
        confidence: f64,
        source: impl Into<String>,
        now: Millis,
        payload: Option<HashMap<String, String>>,
    ) {
        let source = source.into();
        if source.is_empty() {
            tracing::warn!("intent registry: dropped {kind} intent with empty source");
            return;
        }
        if !confidence.is_finite() {
            tracing::warn!("intent registry: dropped {kind} intent from '{source}' (confidence {confidence})");
            return;
        }

        let intent = MovementIntent {
            kind,
            position,
            confidence: confidence.clamp(0.0, 1.0),
            source: source.clone(),
            created_at: now,
            payload,
        };
        tracing::debug!(
            "intent registry: {} -> {} at {} (confidence {:.2})",
            source,
            kind,
            position,
            intent.confidence
        );
        self.intents.insert(source, intent);
    }

    /// Drops intents older than `ttl_ms`.
    pub fn cleanup(&mut self, now: Millis, ttl_ms: Millis) {
        self.intents.retain(|_, i| now - i.created_at <= ttl_ms);
    }

    /// Live intents ordered by (priority desc, confidence desc).
    pub fn sorted(&self) -> Vec<MovementIntent> {
        let mut intents: Vec<MovementIntent> = self.intents.values().cloned().collect();
        intents.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
                // Stable final order for determinism.
                .then(a.source.cmp(&b.source))
        });
        intents
    }

    pub fn clear(&mut self) {
        self.intents.clear();
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}
