//! Event-maintained cache of nearby hostile entities.
//!
//! The [`ObservationCache`] is the engine's working memory: a bounded table
//! of everything hostile seen recently, kept current by world events and
//! trimmed by a periodic sweep. All mutation happens on the single
//! tick/event thread, so there is no internal locking.
//!
//! Bookkeeping per entry: last-seen timestamp (drives the staleness sweep),
//! distance to the actor (recomputed when either side moves), and an
//! optional cached path with a short TTL. Paths are invalidated wholesale
//! whenever the actor moves; the selector lazily recomputes them on the
//! next read.

use std::collections::{HashMap, VecDeque};

use crate::config::CacheConfig;
use crate::types::{EntityId, Millis, Position, SpeciesId};

/// A pathfinder result cached on an observed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPath {
    /// Tiles from the actor to the entity, excluding the starting tile.
    pub tiles: Vec<Position>,
    pub computed_at: Millis,
}

impl CachedPath {
    pub fn new(tiles: Vec<Position>, computed_at: Millis) -> Self {
        Self { tiles, computed_at }
    }

    /// Path length in tiles.
    pub fn len(&self) -> i32 {
        self.tiles.len() as i32
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// One tracked hostile entity.
///
/// Owned exclusively by the cache; the scorer and selector borrow entries
/// for the duration of a tick and never hold them across ticks.
#[derive(Debug, Clone)]
pub struct ObservedEntity {
    pub id: EntityId,
    pub species: SpeciesId,
    pub species_name: String,
    pub position: Position,
    /// 0-100.
    pub health_pct: u8,
    pub alive: bool,
    /// Tiles per second, as reported by the world.
    pub speed: f64,
    pub last_seen: Millis,
    /// Chebyshev distance to the actor, maintained by the cache.
    pub distance: i32,
    /// Cached path from the actor, TTL-bound.
    pub path: Option<CachedPath>,
}

impl ObservedEntity {
    pub fn new(
        id: EntityId,
        species: SpeciesId,
        species_name: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id,
            species,
            species_name: species_name.into(),
            position,
            health_pct: 100,
            alive: true,
            speed: 1.0,
            last_seen: 0,
            distance: i32::MAX,
            path: None,
        }
    }

    pub fn with_health(mut self, health_pct: u8) -> Self {
        self.health_pct = health_pct.min(100);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

/// Bounded LRU table of observed hostiles.
pub struct ObservationCache {
    config: CacheConfig,
    entries: HashMap<EntityId, ObservedEntity>,
    /// Access order, least-recently-touched first.
    access_order: VecDeque<EntityId>,
    actor_position: Position,
}

impl ObservationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            access_order: VecDeque::new(),
            actor_position: Position::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn actor_position(&self) -> Position {
        self.actor_position
    }

    /// Updates the actor's position.
    ///
    /// Every cached path is invalidated (it was computed from the old
    /// position) and entry distances are recomputed.
    pub fn set_actor_position(&mut self, position: Position) {
        if position == self.actor_position {
            return;
        }
        self.actor_position = position;
        for entry in self.entries.values_mut() {
            entry.path = None;
            entry.distance = position.chebyshev_distance(&entry.position);
        }
    }

    /// Inserts or refreshes an entity.
    ///
    /// Entities beyond the distance cutoff are evicted instead of inserted.
    /// Inserting above capacity evicts the least-recently-touched entry.
    pub fn upsert(&mut self, mut entity: ObservedEntity, now: Millis) {
        entity.distance = self.actor_position.chebyshev_distance(&entity.position);
        entity.last_seen = now;

        if entity.distance > self.config.distance_cutoff {
            tracing::debug!(
                "cache: {} beyond cutoff (distance {}), dropping",
                entity.id,
                entity.distance
            );
            self.remove(entity.id);
            return;
        }

        let id = entity.id;
        if let Some(existing) = self.entries.get_mut(&id) {
            // Keep a still-fresh path if the entity did not move.
            if existing.position == entity.position {
                entity.path = existing.path.take();
            }
            *existing = entity;
        } else {
            self.entries.insert(id, entity);
        }
        self.mark_touched(id);

        while self.entries.len() > self.config.capacity {
            if let Some(victim) = self.access_order.pop_front() {
                self.entries.remove(&victim);
                tracing::debug!("cache: evicted LRU entry {}", victim);
            } else {
                break;
            }
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<ObservedEntity> {
        self.access_order.retain(|&other| other != id);
        self.entries.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&ObservedEntity> {
        self.entries.get(&id)
    }

    /// Refreshes the LRU position and last-seen time of an entry.
    pub fn touch(&mut self, id: EntityId, now: Millis) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_seen = now;
            self.mark_touched(id);
        }
    }

    /// Updates position (and distance) for a moved entity, dropping its
    /// stale path.
    pub fn update_position(&mut self, id: EntityId, position: Position, now: Millis) {
        let actor = self.actor_position;
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.position = position;
            entry.distance = actor.chebyshev_distance(&position);
            entry.path = None;
            entry.last_seen = now;
            self.mark_touched(id);
        }
    }

    /// Updates health, marking dead entities for the next sweep.
    pub fn update_health(&mut self, id: EntityId, health_pct: u8, now: Millis) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.health_pct = health_pct.min(100);
            entry.alive = health_pct > 0;
            entry.last_seen = now;
            self.mark_touched(id);
        }
    }

    /// Stores a freshly computed path on an entry.
    pub fn set_path(&mut self, id: EntityId, path: CachedPath) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.path = Some(path);
        }
    }

    /// Returns the cached path if it is younger than the TTL.
    pub fn path_if_fresh(&self, id: EntityId, now: Millis) -> Option<&CachedPath> {
        let path = self.entries.get(&id)?.path.as_ref()?;
        if now - path.computed_at <= self.config.path_ttl_ms {
            Some(path)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservedEntity> {
        self.entries.values()
    }

    /// Living entities within `radius` tiles of the actor.
    pub fn get_nearby(&self, radius: i32) -> Vec<&ObservedEntity> {
        self.entries
            .values()
            .filter(|e| e.alive && e.distance <= radius)
            .collect()
    }

    /// Count of living hostiles within `radius` of the actor. Drives the
    /// arbiter's density-scaled thresholds.
    pub fn hostile_density(&self, radius: i32) -> u32 {
        self.entries
            .values()
            .filter(|e| e.alive && e.distance <= radius)
            .count() as u32
    }

    /// Living entities within `radius` of an arbitrary point, excluding
    /// `exclude`. Used by the AoE cluster terms.
    pub fn count_near(&self, center: Position, radius: i32, exclude: EntityId) -> u32 {
        self.entries
            .values()
            .filter(|e| e.alive && e.id != exclude && e.position.within(&center, radius))
            .count() as u32
    }

    /// Removes dead, vanished, and untouched entries.
    pub fn sweep(&mut self, now: Millis) {
        let stale_after = self.config.stale_after_ms;
        let cutoff = self.config.distance_cutoff;
        let removed: Vec<EntityId> = self
            .entries
            .values()
            .filter(|e| !e.alive || now - e.last_seen > stale_after || e.distance > cutoff)
            .map(|e| e.id)
            .collect();
        for id in removed {
            self.remove(id);
            tracing::debug!("cache: swept entry {}", id);
        }
    }

    fn mark_touched(&mut self, id: EntityId) {
        self.access_order.retain(|&other| other != id);
        self.access_order.push_back(id);
    }
}
