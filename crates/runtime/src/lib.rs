//! Runtime layer for the skirmish combat engine.
//!
//! Wires the deterministic core (`skirmish-core`) to a live game world:
//! a typed event bus feeds the [`engine::CombatEngine`], oracle traits
//! abstract the world's collaborator services, advisors turn world state
//! into movement intents, and a tokio [`worker::TickWorker`] drives the
//! whole pipeline on a fixed cadence with debounced event coalescing.

pub mod advisors;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod oracle;
pub mod store;
pub mod worker;

pub use advisors::{
    Advisor, AdvisorContext, ChaseAdvisor, ClusterAvoidanceAdvisor, IntentProposal,
    KeepDistanceAdvisor, WaveAvoidanceAdvisor,
};
pub use engine::{CombatEngine, TickOutcome};
pub use error::{Result, RuntimeError};
pub use events::{EventBus, EventHandler, Topic, WorldEvent};
pub use executor::{ExecutionOutcome, MovementExecutor};
pub use oracle::{
    AttackOracle, EntitySnapshot, MoveOracle, OracleManager, ProfileStore, SpatialOracle,
};
pub use store::{FileProfileStore, MemoryProfileStore, decode_profile, encode_profile, profile_key};
pub use worker::{TickWorker, WorkerConfig, WorkerHandle};
