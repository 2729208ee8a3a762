//! Navigation session: owns the shared grid and the request service

use std::sync::Arc;

use glam::Vec3;

use crate::core::config::{ConfigError, PathfindingConfig};
use crate::navigation::{
    CollisionProbe, Grid, PathFollower, PathRequestService, PathResult, PathTicket, RequestId,
};

/// Pathfinding state for one world region.
///
/// Created at session start, dropped at teardown. Dropping the session
/// completes any unfinished requests with an empty path.
#[derive(Debug)]
pub struct NavigationSession {
    config: PathfindingConfig,
    grid: Arc<Grid>,
    service: PathRequestService,
}

impl NavigationSession {
    /// Validate `config`, sample the grid and start the request service
    pub fn new(config: PathfindingConfig, probe: &impl CollisionProbe) -> Result<Self, ConfigError> {
        if let Err(e) = config.validate() {
            log::error!("Invalid pathfinding config, navigation disabled: {e}");
            return Err(e);
        }

        let grid = Arc::new(Grid::from_config(&config, probe)?);
        log::info!(
            "Navigation session started: {}x{} grid, {} walkable cells",
            grid.width(),
            grid.height(),
            grid.walkable_count()
        );

        let service = PathRequestService::new(Some(Arc::clone(&grid)));
        Ok(Self {
            config,
            grid,
            service,
        })
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &PathfindingConfig {
        &self.config
    }

    /// Shared navigation grid
    #[must_use]
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// Request service
    #[must_use]
    pub fn service(&self) -> &PathRequestService {
        &self.service
    }

    /// Request service (mutable)
    pub fn service_mut(&mut self) -> &mut PathRequestService {
        &mut self.service
    }

    /// Queue a path request with a completion callback
    pub fn request_path(
        &mut self,
        start: Vec3,
        end: Vec3,
        callback: impl FnOnce(PathResult) + Send + 'static,
    ) -> RequestId {
        self.service.request_path(start, end, callback)
    }

    /// Queue a path request whose result is polled
    pub fn request_path_ticket(&mut self, start: Vec3, end: Vec3) -> PathTicket {
        self.service.request_path_ticket(start, end)
    }

    /// Per-frame tick: deliver finished searches
    pub fn update(&mut self) -> usize {
        self.service.update()
    }

    /// Create a follower using this session's agent settings
    #[must_use]
    pub fn follower(&self) -> PathFollower {
        PathFollower::from_config(&self.config)
    }

    /// Resample the grid after a topology change.
    ///
    /// Requests already in flight finish on the old grid.
    pub fn rebuild_grid(&mut self, probe: &impl CollisionProbe) -> Result<(), ConfigError> {
        let grid = Arc::new(Grid::from_config(&self.config, probe)?);
        log::info!(
            "Navigation grid rebuilt: {} walkable cells",
            grid.walkable_count()
        );
        self.service.set_grid(Some(Arc::clone(&grid)));
        self.grid = grid;
        Ok(())
    }
}
