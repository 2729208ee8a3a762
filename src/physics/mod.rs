//! Physics-backed collision queries
//!
//! Built on top of rapier3d

mod world;

pub use world::{ColliderHandle, CollisionWorld};
