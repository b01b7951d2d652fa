//! Adapters to the game world's collaborator services.
//!
//! The engine never touches the world directly. Everything it needs is
//! behind one of these traits: spatial queries, path search, movement and
//! attack primitives, and an opaque blob store for learned profiles.
//! Implementations are host-specific; [`OracleManager`] bundles them so
//! the engine carries a single handle.
//!
//! All oracles must be fast and non-blocking. The spatial scan is the one
//! exception (it may cross a process boundary), so it alone is async.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use skirmish_core::{EntityId, ObservedEntity, Pathfinder, Position, SpeciesId};

/// A point-in-time view of one world entity, as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub species: SpeciesId,
    pub species_name: String,
    pub position: Position,
    pub health_pct: u8,
    /// Tiles per second.
    pub speed: f64,
}

impl EntitySnapshot {
    /// Converts into a cache entry; distance and last-seen are filled in
    /// by the cache on upsert.
    pub fn into_observed(self) -> ObservedEntity {
        ObservedEntity::new(self.id, self.species, self.species_name, self.position)
            .with_health(self.health_pct)
            .with_speed(self.speed)
    }
}

/// Full-range scan of hostile entities around the actor.
///
/// Used to seed the observation cache at startup and to resynchronize
/// after the event stream gaps (reconnect, floor change).
#[async_trait]
pub trait SpatialOracle: Send + Sync {
    async fn hostiles_nearby(&self, radius: i32) -> Vec<EntitySnapshot>;

    /// The actor's current position.
    async fn actor_position(&self) -> Position;
}

/// Movement primitive: walk toward `target`, stopping within `tolerance`
/// tiles. Returns whether the world accepted the request.
pub trait MoveOracle: Send + Sync {
    fn attempt_move(
        &self,
        target: Position,
        tolerance: i32,
        options: skirmish_core::PathOptions,
    ) -> bool;
}

/// Attack primitive.
pub trait AttackOracle: Send + Sync {
    /// Asks the world to engage the given entity. Returns whether the
    /// request was accepted; confirmation arrives later as a
    /// `CombatTargetChanged` event.
    fn set_attack_target(&self, id: EntityId) -> bool;

    fn cancel_attack(&self);
}

/// Opaque keyed blob storage for learned behavior profiles.
///
/// The engine does not care where blobs live; corrupt or missing blobs
/// are treated as absent.
pub trait ProfileStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, blob: Vec<u8>);
}

/// Bundles every oracle implementation behind shared handles.
#[derive(Clone)]
pub struct OracleManager {
    spatial: Arc<dyn SpatialOracle>,
    paths: Arc<dyn Pathfinder + Send + Sync>,
    mover: Arc<dyn MoveOracle>,
    attack: Arc<dyn AttackOracle>,
    profiles: Arc<dyn ProfileStore>,
}

impl OracleManager {
    pub fn new(
        spatial: Arc<dyn SpatialOracle>,
        paths: Arc<dyn Pathfinder + Send + Sync>,
        mover: Arc<dyn MoveOracle>,
        attack: Arc<dyn AttackOracle>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            spatial,
            paths,
            mover,
            attack,
            profiles,
        }
    }

    pub fn spatial(&self) -> &dyn SpatialOracle {
        self.spatial.as_ref()
    }

    pub fn paths(&self) -> &(dyn Pathfinder + Send + Sync) {
        self.paths.as_ref()
    }

    pub fn mover(&self) -> &dyn MoveOracle {
        self.mover.as_ref()
    }

    pub fn attack(&self) -> &dyn AttackOracle {
        self.attack.as_ref()
    }

    pub fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }
}
