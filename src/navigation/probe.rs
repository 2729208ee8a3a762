//! Collision probes used to sample grid walkability
//!
//! The grid never inspects world geometry directly. It asks a
//! [`CollisionProbe`] whether a circle of a given radius around a point
//! overlaps any geometry in the requested categories.

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Category Mask
// ============================================================================

/// Bit set of geometry categories (layers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMask(pub u32);

impl CategoryMask {
    /// No categories
    pub const NONE: Self = Self(0);
    /// Every category
    pub const ALL: Self = Self(u32::MAX);

    /// Mask with a single category bit set.
    ///
    /// Bits outside `0..32` produce an empty mask.
    #[must_use]
    pub const fn bit(index: u32) -> Self {
        if index < 32 { Self(1 << index) } else { Self::NONE }
    }

    /// Check if no category is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if every category in `other` is also in `self`
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check if the two masks share at least one category
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for CategoryMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ============================================================================
// Probe Trait
// ============================================================================

/// Geometric oracle answering "is this point obstructed?".
pub trait CollisionProbe {
    /// Returns true if a circle of `radius` centered at `point` overlaps any
    /// geometry whose category intersects `mask`.
    fn is_blocked(&self, point: Vec3, radius: f32, mask: CategoryMask) -> bool;
}

impl<F> CollisionProbe for F
where
    F: Fn(Vec3, f32, CategoryMask) -> bool,
{
    fn is_blocked(&self, point: Vec3, radius: f32, mask: CategoryMask) -> bool {
        self(point, radius, mask)
    }
}

// ============================================================================
// Shape Probe
// ============================================================================

/// 2D obstacle shape in the XY plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObstacleShape {
    /// Disc around a center
    Circle { radius: f32 },
    /// Axis-aligned rectangle around a center
    Rectangle { half_extents: Vec2 },
}

impl ObstacleShape {
    /// Check if a probe circle overlaps this shape placed at `center`
    #[must_use]
    pub fn overlaps_circle(&self, center: Vec2, point: Vec2, radius: f32) -> bool {
        match *self {
            Self::Circle { radius: r } => point.distance_squared(center) < (r + radius).powi(2),
            Self::Rectangle { half_extents } => {
                let closest = point.clamp(center - half_extents, center + half_extents);
                point.distance_squared(closest) < radius * radius
                    || (point - center).abs().cmplt(half_extents).all()
            }
        }
    }

    /// Axis-aligned bounds of this shape placed at `center`
    #[must_use]
    pub fn bounds(&self, center: Vec2) -> (Vec2, Vec2) {
        let extent = match *self {
            Self::Circle { radius } => Vec2::splat(radius),
            Self::Rectangle { half_extents } => half_extents,
        };
        (center - extent, center + extent)
    }
}

#[derive(Debug, Clone)]
struct Obstacle {
    center: Vec2,
    shape: ObstacleShape,
    category: CategoryMask,
}

/// In-memory static obstacle set with a uniform spatial hash.
///
/// Useful when no physics world is around, e.g. tools and tests.
#[derive(Debug, Clone)]
pub struct ShapeProbe {
    obstacles: Vec<Obstacle>,
    buckets: FxHashMap<(i32, i32), Vec<usize>>,
    bucket_size: f32,
}

impl ShapeProbe {
    /// Create an empty probe with the given spatial hash bucket size
    #[must_use]
    pub fn new(bucket_size: f32) -> Self {
        Self {
            obstacles: Vec::new(),
            buckets: FxHashMap::default(),
            bucket_size: if bucket_size > 0.0 { bucket_size } else { 1.0 },
        }
    }

    /// Add an obstacle and return its index
    pub fn add(&mut self, center: Vec2, shape: ObstacleShape, category: CategoryMask) -> usize {
        let index = self.obstacles.len();
        let (min, max) = shape.bounds(center);
        let (x0, y0) = self.bucket_of(min);
        let (x1, y1) = self.bucket_of(max);
        for bx in x0..=x1 {
            for by in y0..=y1 {
                self.buckets.entry((bx, by)).or_default().push(index);
            }
        }
        self.obstacles.push(Obstacle {
            center,
            shape,
            category,
        });
        index
    }

    /// Add a circular obstacle
    pub fn add_circle(&mut self, center: Vec2, radius: f32, category: CategoryMask) -> usize {
        self.add(center, ObstacleShape::Circle { radius }, category)
    }

    /// Add an axis-aligned rectangular obstacle
    pub fn add_rectangle(
        &mut self,
        center: Vec2,
        half_extents: Vec2,
        category: CategoryMask,
    ) -> usize {
        self.add(center, ObstacleShape::Rectangle { half_extents }, category)
    }

    /// Number of obstacles
    #[must_use]
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// Check if there are no obstacles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    fn bucket_of(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.bucket_size).floor() as i32,
            (point.y / self.bucket_size).floor() as i32,
        )
    }
}

impl Default for ShapeProbe {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl CollisionProbe for ShapeProbe {
    fn is_blocked(&self, point: Vec3, radius: f32, mask: CategoryMask) -> bool {
        let point = point.truncate();
        let (x0, y0) = self.bucket_of(point - Vec2::splat(radius));
        let (x1, y1) = self.bucket_of(point + Vec2::splat(radius));

        for bx in x0..=x1 {
            for by in y0..=y1 {
                let Some(indices) = self.buckets.get(&(bx, by)) else {
                    continue;
                };
                let hit = indices.iter().any(|&i| {
                    let obstacle = &self.obstacles[i];
                    obstacle.category.intersects(mask)
                        && obstacle.shape.overlaps_circle(obstacle.center, point, radius)
                });
                if hit {
                    return true;
                }
            }
        }
        false
    }
}
