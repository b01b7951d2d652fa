//! Advisory subsystems that propose movement.
//!
//! Advisors are the only writers of the intent registry. Each one looks at
//! the same read-only view of the world and proposes at most one move per
//! tick; none of them ever moves the actor directly, and none of them sees
//! the others' proposals. Contradictions are the arbiter's problem.

mod chase;
mod cluster;
mod keep_distance;
mod wave;

pub use chase::ChaseAdvisor;
pub use cluster::ClusterAvoidanceAdvisor;
pub use keep_distance::KeepDistanceAdvisor;
pub use wave::WaveAvoidanceAdvisor;

use std::collections::HashMap;

use skirmish_core::{
    BehaviorStore, IntentKind, Millis, ObservationCache, ObservedEntity, Position,
    ScoredCandidate, ThreatTracker,
};

/// Read-only world view handed to every advisor each tick.
pub struct AdvisorContext<'a> {
    pub cache: &'a ObservationCache,
    pub behavior: &'a BehaviorStore,
    pub threat: &'a ThreatTracker,
    pub actor: Position,
    /// The locked combat target's cache entry, if any.
    pub target: Option<&'a ObservedEntity>,
    /// This tick's scored selection for the locked target.
    pub candidate: Option<&'a ScoredCandidate>,
    pub now: Millis,
}

/// A movement proposal bound for the intent registry.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentProposal {
    pub kind: IntentKind,
    pub position: Position,
    pub confidence: f64,
    pub payload: Option<HashMap<String, String>>,
}

impl IntentProposal {
    pub fn new(kind: IntentKind, position: Position, confidence: f64) -> Self {
        Self {
            kind,
            position,
            confidence,
            payload: None,
        }
    }

    pub fn with_payload(mut self, key: &str, value: impl ToString) -> Self {
        self.payload
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }
}

/// One advisory subsystem.
pub trait Advisor: Send {
    /// Stable registry key; one live intent per source.
    fn source_key(&self) -> &'static str;

    fn advise(&mut self, ctx: &AdvisorContext<'_>) -> Option<IntentProposal>;
}

/// Unit step toward `to`, per axis. Zero when already aligned.
pub(crate) fn step_toward(from: Position, to: Position) -> (i32, i32) {
    ((to.x - from.x).signum(), (to.y - from.y).signum())
}
