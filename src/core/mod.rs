//! Core module
//!
//! Contains the configuration and the navigation session

pub mod config;
mod session;

pub use config::{ConfigError, MAX_GRID_CELLS, PathfindingConfig};
pub use session::NavigationSession;
