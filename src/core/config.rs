//! Pathfinding configuration and validation

use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::navigation::CategoryMask;

/// Upper bound on the number of grid cells a config may describe
pub const MAX_GRID_CELLS: usize = 1 << 24;

/// Pathfinding configuration
///
/// Usually loaded from a RON file:
///
/// ```ignore
/// (
///     grid_world_size: (50.0, 50.0),
///     node_radius: 0.5,
///     unwalkable_mask: 1,
///     path_update_rate: 0.5,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// World extent covered by the grid
    pub grid_world_size: Vec2,
    /// Half the width of a square cell
    pub node_radius: f32,
    /// World-space center of the grid
    pub center: Vec3,
    /// Geometry categories that block traversal
    pub unwalkable_mask: CategoryMask,
    /// Seconds between an agent's periodic path requests
    pub path_update_rate: f32,
    /// Distance at which an agent considers a waypoint reached
    pub stopping_distance: f32,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            grid_world_size: Vec2::new(50.0, 50.0),
            node_radius: 0.5,
            center: Vec3::ZERO,
            unwalkable_mask: CategoryMask::bit(0),
            path_update_rate: 0.5,
            stopping_distance: 0.5,
        }
    }
}

impl PathfindingConfig {
    /// Set the world extent covered by the grid
    pub fn with_world_size(mut self, width: f32, height: f32) -> Self {
        self.grid_world_size = Vec2::new(width, height);
        self
    }

    /// Set the cell half-size
    pub fn with_node_radius(mut self, radius: f32) -> Self {
        self.node_radius = radius;
        self
    }

    /// Set the grid center
    pub fn with_center(mut self, center: Vec3) -> Self {
        self.center = center;
        self
    }

    /// Set the blocking geometry categories
    pub fn with_unwalkable_mask(mut self, mask: CategoryMask) -> Self {
        self.unwalkable_mask = mask;
        self
    }

    /// Set the agent re-request interval in seconds
    pub fn with_path_update_rate(mut self, seconds: f32) -> Self {
        self.path_update_rate = seconds;
        self
    }

    /// Set the waypoint reach distance
    pub fn with_stopping_distance(mut self, distance: f32) -> Self {
        self.stopping_distance = distance;
        self
    }

    /// Parse a config from RON text and validate it
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a RON file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&text)
    }

    /// Grid dimensions (columns, rows) derived from world size and radius
    #[must_use]
    pub fn grid_dimensions(&self) -> (usize, usize) {
        grid_dimensions(self.grid_world_size, self.node_radius)
    }

    /// Check every option, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_grid(self.grid_world_size, self.node_radius)?;

        if self.unwalkable_mask.is_empty() {
            return Err(ConfigError::EmptyCategoryMask);
        }
        if !(self.path_update_rate.is_finite() && self.path_update_rate > 0.0) {
            return Err(ConfigError::InvalidUpdateRate(self.path_update_rate));
        }
        if !(self.stopping_distance.is_finite() && self.stopping_distance > 0.0) {
            return Err(ConfigError::InvalidStoppingDistance(self.stopping_distance));
        }
        Ok(())
    }
}

/// Columns and rows covering `world_size` with cells of `2 * node_radius`
pub(crate) fn grid_dimensions(world_size: Vec2, node_radius: f32) -> (usize, usize) {
    let diameter = node_radius * 2.0;
    (
        (world_size.x / diameter).round().max(0.0) as usize,
        (world_size.y / diameter).round().max(0.0) as usize,
    )
}

/// Validate the geometric part of a grid configuration
pub(crate) fn validate_grid(world_size: Vec2, node_radius: f32) -> Result<(), ConfigError> {
    if !(world_size.is_finite() && world_size.x > 0.0 && world_size.y > 0.0) {
        return Err(ConfigError::InvalidWorldSize(world_size));
    }
    if !(node_radius.is_finite() && node_radius > 0.0) {
        return Err(ConfigError::InvalidNodeRadius(node_radius));
    }
    let (columns, rows) = grid_dimensions(world_size, node_radius);
    if columns == 0 || rows == 0 {
        return Err(ConfigError::EmptyGrid { columns, rows });
    }
    match columns.checked_mul(rows) {
        Some(cells) if cells <= MAX_GRID_CELLS => Ok(()),
        _ => Err(ConfigError::GridTooLarge { columns, rows }),
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// World size is not strictly positive
    InvalidWorldSize(Vec2),
    /// Node radius is not strictly positive
    InvalidNodeRadius(f32),
    /// Derived grid has no cells
    EmptyGrid { columns: usize, rows: usize },
    /// Derived grid exceeds [`MAX_GRID_CELLS`]
    GridTooLarge { columns: usize, rows: usize },
    /// No blocking category selected
    EmptyCategoryMask,
    /// Path update rate is not strictly positive
    InvalidUpdateRate(f32),
    /// Stopping distance is not strictly positive
    InvalidStoppingDistance(f32),
    /// Error reading a config file
    Io(String),
    /// Error parsing config text
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWorldSize(size) => {
                write!(f, "grid world size must be positive, got {size}")
            }
            Self::InvalidNodeRadius(radius) => {
                write!(f, "node radius must be positive, got {radius}")
            }
            Self::EmptyGrid { columns, rows } => {
                write!(f, "grid would have no cells ({columns}x{rows})")
            }
            Self::GridTooLarge { columns, rows } => write!(
                f,
                "grid of {columns}x{rows} cells exceeds the limit of {MAX_GRID_CELLS}"
            ),
            Self::EmptyCategoryMask => write!(f, "unwalkable category mask is empty"),
            Self::InvalidUpdateRate(rate) => {
                write!(f, "path update rate must be positive, got {rate}")
            }
            Self::InvalidStoppingDistance(distance) => {
                write!(f, "stopping distance must be positive, got {distance}")
            }
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
