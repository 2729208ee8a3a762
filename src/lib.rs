//! Grid pathfinding for a 2D platformer
//!
//! This crate provides:
//! - A navigation grid sampled from collision geometry
//! - A* search with fixed-point octile costs
//! - A FIFO request service that runs searches on a background thread
//! - A path follower for agents

pub mod core;
pub mod navigation;
pub mod physics;

// Re-exports for convenience
pub use glam;
pub use rapier3d;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{ConfigError, NavigationSession, PathfindingConfig};
    pub use crate::navigation::{
        CategoryMask, CollisionProbe, Grid, PathFollower, PathRequestService, PathResult,
        PathTicket, ShapeProbe, TicketState,
    };
    pub use crate::physics::CollisionWorld;
    pub use glam::{Vec2, Vec3};
}
