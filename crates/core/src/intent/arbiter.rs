//! Intent arbitration: many proposals in, at most one decision out.
//!
//! The arbiter is the anti-jitter layer. Raw intents are cheap and often
//! contradictory; what leaves here must survive spatial grouping, conflict
//! discounts, a per-kind confidence threshold that relaxes as the actor
//! gets crowded, hysteresis around known-safe positions, an oscillation
//! guard over recently executed moves, and a decision cooldown.
//!
//! Per cycle the arbiter is a one-shot state machine
//! (idle → aggregating → blocked | approved); the only state carried
//! across cycles is the safe-position memory, the executed-move window,
//! and the last decision timestamp.

use arrayvec::ArrayVec;
use strum::Display;

use crate::config::ArbiterConfig;
use crate::intent::MovementIntent;
use crate::types::{Millis, Position, direction_dot};

/// Capacity of the executed-move ring. Plenty for any sane oscillation
/// window; oldest entries are trimmed first.
const MOVE_RING_CAP: usize = 16;

/// Why a cycle produced no movement.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum BlockReason {
    /// No live intents to arbitrate.
    #[strum(serialize = "no intents")]
    NoIntents,
    /// Winning group's confidence fell short of the effective threshold.
    #[strum(serialize = "below threshold")]
    BelowThreshold { required: f64, actual: f64 },
    /// The oscillation guard tripped on recent executed moves.
    #[strum(serialize = "oscillating")]
    Oscillating,
    /// A decision was approved too recently.
    #[strum(serialize = "decision cooldown")]
    Cooldown,
}

/// The outcome of one arbitration cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementDecision {
    pub should_move: bool,
    pub intent: Option<MovementIntent>,
    /// Effective (post-discount, averaged) confidence of the winning group.
    pub confidence: f64,
    pub blocked: Option<BlockReason>,
}

impl MovementDecision {
    fn blocked(reason: BlockReason, confidence: f64) -> Self {
        Self {
            should_move: false,
            intent: None,
            confidence,
            blocked: Some(reason),
        }
    }

    fn approved(intent: MovementIntent, confidence: f64) -> Self {
        Self {
            should_move: true,
            intent: Some(intent),
            confidence,
            blocked: None,
        }
    }
}

/// A cluster of intents proposing (nearly) the same position.
#[derive(Debug, Clone)]
pub struct ArbitrationGroup {
    /// Highest-priority member; intents arrive pre-sorted so the first
    /// member is the lead.
    pub lead: MovementIntent,
    pub votes: u32,
    pub confidence_sum: f64,
    pub priority_sum: i32,
}

impl ArbitrationGroup {
    fn new(lead: MovementIntent) -> Self {
        let confidence = lead.confidence;
        let priority = lead.priority();
        Self {
            lead,
            votes: 1,
            confidence_sum: confidence,
            priority_sum: priority,
        }
    }

    fn absorb(&mut self, intent: &MovementIntent) {
        self.votes += 1;
        self.confidence_sum += intent.confidence;
        self.priority_sum += intent.priority();
    }

    pub fn avg_confidence(&self) -> f64 {
        if self.votes == 0 {
            0.0
        } else {
            self.confidence_sum / self.votes as f64
        }
    }
}

/// Resolves competing movement intents into at most one decision per cycle.
pub struct IntentArbiter {
    config: ArbiterConfig,
    /// Executed move targets, oldest first.
    recent_moves: ArrayVec<(Millis, Position), MOVE_RING_CAP>,
    safe_position: Option<(Position, Millis)>,
    last_decision_at: Option<Millis>,
}

impl IntentArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            recent_moves: ArrayVec::new(),
            safe_position: None,
            last_decision_at: None,
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Records a move that was actually executed, for the oscillation
    /// window. Rejected decisions do not count.
    pub fn record_executed_move(&mut self, target: Position, now: Millis) {
        if self.recent_moves.is_full() {
            self.recent_moves.remove(0);
        }
        self.recent_moves.push((now, target));
    }

    /// Remembers the actor's position as safe (no movement was needed).
    pub fn mark_position_safe(&mut self, position: Position, now: Millis) {
        self.safe_position = Some((position, now));
    }

    /// Runs one arbitration cycle over pre-sorted intents.
    ///
    /// `intents` must come from [`crate::intent::IntentRegistry::sorted`];
    /// `hostile_density` is the count of nearby living hostiles.
    pub fn decide(
        &mut self,
        intents: &[MovementIntent],
        actor: Position,
        hostile_density: u32,
        now: Millis,
    ) -> MovementDecision {
        if intents.is_empty() {
            return MovementDecision::blocked(BlockReason::NoIntents, 0.0);
        }

        let mut groups = self.build_groups(intents);
        self.apply_conflicts(&mut groups, actor);

        let Some(best) = self.best_group(&groups) else {
            return MovementDecision::blocked(BlockReason::NoIntents, 0.0);
        };
        let confidence = best.avg_confidence();
        let kind = best.lead.kind;

        // Cooldown first: a fresh decision is not due yet, whatever it says.
        if let Some(last) = self.last_decision_at
            && now - last < self.config.decision_cooldown_ms
        {
            return MovementDecision::blocked(BlockReason::Cooldown, confidence);
        }

        // Oscillation guard overrides confidence entirely.
        if self.is_oscillating(now) {
            tracing::debug!("arbiter: oscillation guard blocked {kind} intent");
            return MovementDecision::blocked(BlockReason::Oscillating, confidence);
        }

        let density_factor = self.config.density_factor(hostile_density);
        let mut required = self.config.threshold_for(kind) * density_factor;
        if self.occupies_safe_position(actor, now) {
            // Leaving a position that recently needed no movement costs
            // extra confidence, unless the crowd says otherwise.
            required += self.config.hysteresis_margin * density_factor;
        }

        if confidence < required {
            tracing::debug!(
                "arbiter: {kind} blocked ({confidence:.2} < {required:.2}, density {hostile_density})"
            );
            return MovementDecision::blocked(
                BlockReason::BelowThreshold {
                    required,
                    actual: confidence,
                },
                confidence,
            );
        }

        self.last_decision_at = Some(now);
        tracing::debug!(
            "arbiter: approved {kind} to {} (confidence {confidence:.2} >= {required:.2})",
            best.lead.position
        );
        MovementDecision::approved(best.lead.clone(), confidence)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn build_groups(&self, intents: &[MovementIntent]) -> Vec<ArbitrationGroup> {
        let tolerance = self.config.group_tolerance;
        let mut groups: Vec<ArbitrationGroup> = Vec::new();
        for intent in intents {
            if let Some(group) = groups
                .iter_mut()
                .find(|g| g.lead.position.within(&intent.position, tolerance))
            {
                group.absorb(intent);
            } else {
                groups.push(ArbitrationGroup::new(intent.clone()));
            }
        }
        groups
    }

    /// Opposing-direction conflict: the lower-priority group of each
    /// opposing pair loses confidence.
    fn apply_conflicts(&self, groups: &mut [ArbitrationGroup], actor: Position) {
        let directions: Vec<(f64, f64)> = groups
            .iter()
            .map(|g| actor.direction_to(&g.lead.position))
            .collect();

        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if direction_dot(directions[i], directions[j]) < 0.0 {
                    let loser = if groups[i].lead.priority() >= groups[j].lead.priority() {
                        j
                    } else {
                        i
                    };
                    groups[loser].confidence_sum *= self.config.conflict_discount;
                    tracing::debug!(
                        "arbiter: conflict discount on {} group (opposes {})",
                        groups[loser].lead.kind,
                        groups[if loser == i { j } else { i }].lead.kind
                    );
                }
            }
        }
    }

    fn best_group<'g>(&self, groups: &'g [ArbitrationGroup]) -> Option<&'g ArbitrationGroup> {
        groups.iter().max_by(|a, b| {
            self.group_score(a)
                .partial_cmp(&self.group_score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    fn group_score(&self, group: &ArbitrationGroup) -> f64 {
        let boost = (1.0 + self.config.vote_boost_step * (group.votes.saturating_sub(1)) as f64)
            .min(self.config.vote_boost_cap);
        group.lead.priority() as f64 * group.avg_confidence() * boost
    }

    fn occupies_safe_position(&self, actor: Position, now: Millis) -> bool {
        self.safe_position.is_some_and(|(pos, at)| {
            pos == actor && now - at <= self.config.safe_position_window_ms
        })
    }

    fn is_oscillating(&self, now: Millis) -> bool {
        let window = self.config.oscillation_window_ms;
        let recent: Vec<Position> = self
            .recent_moves
            .iter()
            .filter(|(at, _)| now - at <= window)
            .map(|(_, pos)| *pos)
            .collect();
        if recent.len() < self.config.max_oscillation_moves {
            return false;
        }

        let mut unique: Vec<(Position, usize)> = Vec::new();
        for pos in &recent {
            if let Some(entry) = unique.iter_mut().find(|(p, _)| p == pos) {
                entry.1 += 1;
            } else {
                unique.push((*pos, 1));
            }
        }

        let bouncing = unique.len() <= self.config.max_unique_tiles;
        let revisiting = unique
            .iter()
            .any(|(_, count)| *count >= self.config.revisit_limit);
        bouncing || revisiting
    }
}
