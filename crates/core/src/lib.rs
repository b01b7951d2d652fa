//! Deterministic combat decision logic.
//!
//! `skirmish-core` answers two questions every tick — what to attack, and
//! where to move — from many cheap, independently computed, and sometimes
//! contradictory signals, while guaranteeing the actor neither flickers
//! between targets nor jitters between tiles. All state mutation happens on
//! a single logical thread; time is injected through [`Clock`]; the world
//! is reached only through the seams in [`env`]. The runtime crate wires
//! these pieces to an actual game world.
pub mod behavior;
pub mod clock;
pub mod config;
pub mod env;
pub mod error;
pub mod intent;
pub mod observation;
pub mod rules;
pub mod scoring;
pub mod selector;
pub mod types;

pub use behavior::{
    BehaviorProfile, BehaviorSamples, BehaviorStore, MovementPattern, ThreatSignals,
    ThreatTracker, WavePrediction,
    classifier::{BehaviorClassifier, DangerSuggestion, TuningHistory, TuningRecord},
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ArbiterConfig, CacheConfig, ClassifierConfig, EngineConfig, ExecutorConfig, ScoringConfig,
};
pub use env::{PathOptions, Pathfinder};
pub use error::{CoreError, Result};
pub use intent::{
    IntentKind, IntentRegistry, MovementIntent,
    arbiter::{ArbitrationGroup, BlockReason, IntentArbiter, MovementDecision},
};
pub use observation::{CachedPath, ObservationCache, ObservedEntity};
pub use rules::{RuleFlags, RuleSet, TargetingRule};
pub use scoring::{ScoreBreakdown, ScoreContext, ScoredCandidate};
pub use selector::TargetSelector;
pub use types::{EntityId, Millis, Position, SpeciesId, direction_dot};
