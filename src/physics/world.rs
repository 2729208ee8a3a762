//! Static collision geometry backed by rapier3d
//!
//! The game is 2D, so obstacles live on the z = 0 plane. Each collider is
//! tagged with a category bit set that path probes filter against.

use glam::Vec3;
use rapier3d::prelude::*;

use crate::navigation::{CategoryMask, CollisionProbe};

/// Handle to a collider in the collision world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub rapier3d::geometry::ColliderHandle);

/// Groups for a collider belonging to `category`, visible to every query
fn member_groups(category: CategoryMask) -> InteractionGroups {
    InteractionGroups::new(Group::from_bits_truncate(category.0), Group::ALL)
}

/// Groups for a query that only sees colliders in `mask`
fn query_groups(mask: CategoryMask) -> InteractionGroups {
    InteractionGroups::new(Group::ALL, Group::from_bits_truncate(mask.0))
}

/// Static world geometry that answers overlap queries
pub struct CollisionWorld {
    /// Rigid body set (colliders here have no parent body)
    rigid_body_set: RigidBodySet,
    /// Collider set
    collider_set: ColliderSet,
    /// Island manager, needed for removals
    island_manager: IslandManager,
    /// Query pipeline for overlap tests
    query_pipeline: QueryPipeline,
    /// Colliders changed since the last query update
    dirty: bool,
}

impl CollisionWorld {
    /// Create an empty collision world
    pub fn new() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            island_manager: IslandManager::new(),
            query_pipeline: QueryPipeline::new(),
            dirty: false,
        }
    }

    fn insert(&mut self, collider: Collider) -> ColliderHandle {
        self.dirty = true;
        ColliderHandle(self.collider_set.insert(collider))
    }

    /// Add a box obstacle rotated by `angle` radians around Z
    pub fn add_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        angle: f32,
        category: CategoryMask,
    ) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(vector![center.x, center.y, center.z])
            .rotation(vector![0.0, 0.0, angle])
            .collision_groups(member_groups(category))
            .build();
        self.insert(collider)
    }

    /// Add a sphere obstacle
    pub fn add_ball(&mut self, center: Vec3, radius: f32, category: CategoryMask) -> ColliderHandle {
        let collider = ColliderBuilder::ball(radius)
            .translation(vector![center.x, center.y, center.z])
            .collision_groups(member_groups(category))
            .build();
        self.insert(collider)
    }

    /// Add a flat ground strip spanning `width` along X with its top at `top_y`
    pub fn add_platform(
        &mut self,
        center_x: f32,
        top_y: f32,
        width: f32,
        thickness: f32,
        category: CategoryMask,
    ) -> ColliderHandle {
        let half_height = thickness / 2.0;
        self.add_box(
            Vec3::new(center_x, top_y - half_height, 0.0),
            Vec3::new(width / 2.0, half_height, 1.0),
            0.0,
            category,
        )
    }

    /// Remove a collider
    pub fn remove(&mut self, handle: ColliderHandle) {
        let removed = self.collider_set.remove(
            handle.0,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            false,
        );
        if removed.is_some() {
            self.dirty = true;
        }
    }

    /// Number of colliders
    pub fn len(&self) -> usize {
        self.collider_set.len()
    }

    /// Check if the world has no colliders
    pub fn is_empty(&self) -> bool {
        self.collider_set.is_empty()
    }

    /// Refresh the query acceleration structure after adding or removing
    /// colliders. Must be called before probing.
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
        self.dirty = false;
    }

    /// First collider in `mask` overlapping a sphere at `point`
    pub fn overlap_sphere(
        &self,
        point: Vec3,
        radius: f32,
        mask: CategoryMask,
    ) -> Option<ColliderHandle> {
        if self.dirty {
            log::warn!("Collision world queried before update_queries()");
        }
        if mask.is_empty() {
            return None;
        }

        let shape = Ball::new(radius);
        let position = Isometry::translation(point.x, point.y, point.z);
        self.query_pipeline
            .intersection_with_shape(
                &self.rigid_body_set,
                &self.collider_set,
                &position,
                &shape,
                QueryFilter::new().groups(query_groups(mask)),
            )
            .map(ColliderHandle)
    }
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionProbe for CollisionWorld {
    fn is_blocked(&self, point: Vec3, radius: f32, mask: CategoryMask) -> bool {
        self.overlap_sphere(point, radius, mask).is_some()
    }
}

impl std::fmt::Debug for CollisionWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionWorld")
            .field("colliders", &self.collider_set.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::navigation::Grid;

    const GROUND: CategoryMask = CategoryMask::bit(0);
    const HAZARD: CategoryMask = CategoryMask::bit(1);

    #[test]
    fn test_overlap_box() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0), 0.0, GROUND);
        world.update_queries();

        assert!(world.is_blocked(Vec3::ZERO, 0.25, GROUND));
        assert!(world.is_blocked(Vec3::new(1.2, 0.0, 0.0), 0.25, GROUND));
        assert!(!world.is_blocked(Vec3::new(3.0, 0.0, 0.0), 0.25, GROUND));
    }

    #[test]
    fn test_mask_filtering() {
        let mut world = CollisionWorld::new();
        world.add_ball(Vec3::ZERO, 1.0, HAZARD);
        world.update_queries();

        assert!(world.is_blocked(Vec3::ZERO, 0.1, HAZARD));
        assert!(world.is_blocked(Vec3::ZERO, 0.1, GROUND | HAZARD));
        assert!(!world.is_blocked(Vec3::ZERO, 0.1, GROUND));
        assert!(!world.is_blocked(Vec3::ZERO, 0.1, CategoryMask::NONE));
    }

    #[test]
    fn test_remove_collider() {
        let mut world = CollisionWorld::new();
        let handle = world.add_ball(Vec3::ZERO, 1.0, GROUND);
        world.update_queries();
        assert!(world.is_blocked(Vec3::ZERO, 0.1, GROUND));

        world.remove(handle);
        world.update_queries();
        assert!(world.is_empty());
        assert!(!world.is_blocked(Vec3::ZERO, 0.1, GROUND));
    }

    #[test]
    fn test_grid_sampled_from_physics() {
        let mut world = CollisionWorld::new();
        world.add_platform(0.0, -3.0, 10.0, 2.0, GROUND);
        world.update_queries();

        let grid = Grid::new(Vec3::ZERO, Vec2::splat(10.0), 0.5, GROUND, &world).unwrap();

        // Rows below y = -3 are solid ground
        assert!(!grid.node_at(5, 0).unwrap().is_walkable());
        assert!(!grid.node_at(5, 1).unwrap().is_walkable());
        assert!(grid.node_at(5, 5).unwrap().is_walkable());
        assert!(grid.node_at(5, 9).unwrap().is_walkable());
    }
}
