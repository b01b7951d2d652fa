//! Fundamental identifiers and spatial types shared across the engine.
//!
//! Everything here is `Copy`, deterministic, and serialization-friendly so
//! that decision traces and persisted profiles can carry these values
//! verbatim.

use serde::{Deserialize, Serialize};

/// Milliseconds since an arbitrary epoch, as reported by [`crate::Clock`].
pub type Millis = i64;

/// Unique identifier for an observed hostile entity.
///
/// Ids are assigned by the host game world and are stable for the lifetime
/// of the entity. They also serve as the final deterministic tie-breaker in
/// candidate scoring (lower id wins).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for a species (creature kind).
///
/// Behavior profiles are learned per species, not per entity: every spider
/// of the same kind shares one [`crate::BehaviorProfile`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SpeciesId(pub u32);

impl std::fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "species:{}", self.0)
    }
}

/// A tile position in the game world.
///
/// `z` is the floor level; all horizontal distance math ignores `z`, and
/// positions on different floors never compare as "nearby".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chebyshev distance: the number of steps with diagonal movement.
    ///
    /// Returns `i32::MAX` when the positions are on different floors.
    pub fn chebyshev_distance(&self, other: &Position) -> i32 {
        if self.z != other.z {
            return i32::MAX;
        }
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Manhattan distance, ignoring floors (`i32::MAX` across floors).
    pub fn manhattan_distance(&self, other: &Position) -> i32 {
        if self.z != other.z {
            return i32::MAX;
        }
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Euclidean distance on the horizontal plane.
    pub fn euclidean_distance(&self, other: &Position) -> f64 {
        if self.z != other.z {
            return f64::INFINITY;
        }
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether `other` is within `radius` tiles (Chebyshev) on the same floor.
    pub fn within(&self, other: &Position, radius: i32) -> bool {
        self.z == other.z && self.chebyshev_distance(other) <= radius
    }

    /// Normalized horizontal direction vector from `self` toward `other`.
    ///
    /// Returns `(0.0, 0.0)` when the positions coincide or are on different
    /// floors, which dots to zero against everything (neither agreement nor
    /// conflict).
    pub fn direction_to(&self, other: &Position) -> (f64, f64) {
        if self.z != other.z {
            return (0.0, 0.0);
        }
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            return (0.0, 0.0);
        }
        (dx / len, dy / len)
    }

    /// Offset by a tile delta on the same floor.
    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy, self.z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Dot product of two direction vectors.
///
/// Negative values mean the directions oppose; the arbiter uses this to
/// detect conflicting movement groups.
pub fn direction_dot(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.0 + a.1 * b.1
}
