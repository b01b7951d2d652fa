//! Seams to external world services the core consumes.
//!
//! The core never walks a map itself; it asks a [`Pathfinder`] and treats
//! the answer as opaque. Implementations live with the host (the runtime
//! provides adapters and test fakes).

use crate::types::Position;

/// Options forwarded to the host's path search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathOptions {
    /// Path through obstacles that can move out of the way (creatures,
    /// pushable objects). Used by emergency movement.
    pub ignore_soft_obstacles: bool,
    /// Acceptable distance from the requested destination, in tiles.
    pub precision: i32,
}

/// Opaque path search provided by the host world.
///
/// Must be fast and non-blocking; `None` means no path within
/// `max_length`, never an error.
pub trait Pathfinder {
    fn find_path(
        &self,
        from: Position,
        to: Position,
        max_length: i32,
        options: PathOptions,
    ) -> Option<Vec<Position>>;
}
