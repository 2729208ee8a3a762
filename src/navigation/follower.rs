//! Agent-side path consumer
//!
//! Periodically asks the request service for a fresh path to a moving target
//! and walks the returned waypoints.

use glam::Vec3;

use crate::core::config::PathfindingConfig;
use crate::navigation::request::{PathRequestService, PathTicket, TicketState};
use crate::navigation::search::PathResult;

/// Follows waypoints and re-plans on a fixed interval
#[derive(Debug)]
pub struct PathFollower {
    /// Seconds between path requests
    pub update_interval: f32,
    /// Distance at which a waypoint counts as reached
    pub stopping_distance: f32,
    timer: f32,
    waypoints: Vec<Vec3>,
    target_index: usize,
    pending: Option<PathTicket>,
}

impl PathFollower {
    /// Create a follower. The first update requests a path immediately.
    #[must_use]
    pub fn new(update_interval: f32, stopping_distance: f32) -> Self {
        Self {
            update_interval,
            stopping_distance,
            timer: 0.0,
            waypoints: Vec::new(),
            target_index: 0,
            pending: None,
        }
    }

    /// Create a follower from the agent settings of a config
    #[must_use]
    pub fn from_config(config: &PathfindingConfig) -> Self {
        Self::new(config.path_update_rate, config.stopping_distance)
    }

    /// Advance timers, collect delivered paths and pick the next waypoint.
    ///
    /// Returns the normalized XY direction to move in, or zero when there is
    /// nothing to follow.
    pub fn update(
        &mut self,
        dt: f32,
        position: Vec3,
        target: Vec3,
        service: &mut PathRequestService,
    ) -> Vec3 {
        self.poll_pending();

        self.timer -= dt;
        if self.timer <= 0.0 {
            self.timer = self.update_interval;
            // Skip this round if the last request has not come back yet
            if self.pending.is_none() {
                self.pending = Some(service.request_path_ticket(position, target));
            }
        }

        self.advance(position);
        self.move_direction(position)
    }

    /// Request a new path on the next update
    pub fn force_repath(&mut self) {
        self.timer = 0.0;
    }

    /// Replace the followed path
    pub fn set_path(&mut self, path: PathResult) {
        self.waypoints = path.waypoints;
        self.target_index = 0;
    }

    /// Waypoint currently steered towards
    #[must_use]
    pub fn current_waypoint(&self) -> Option<Vec3> {
        self.waypoints.get(self.target_index).copied()
    }

    /// Waypoints not reached yet
    #[must_use]
    pub fn remaining_waypoints(&self) -> &[Vec3] {
        self.waypoints.get(self.target_index..).unwrap_or(&[])
    }

    /// Check if every waypoint has been reached
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.target_index >= self.waypoints.len()
    }

    /// Check if a path request is outstanding
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Normalized XY direction towards the current waypoint
    #[must_use]
    pub fn move_direction(&self, position: Vec3) -> Vec3 {
        self.current_waypoint()
            .map(|waypoint| (waypoint - position).truncate().normalize_or_zero().extend(0.0))
            .unwrap_or(Vec3::ZERO)
    }

    fn poll_pending(&mut self) {
        let Some(ticket) = &self.pending else {
            return;
        };
        match ticket.poll() {
            TicketState::Pending => {}
            TicketState::Ready(path) => {
                self.pending = None;
                if path.is_empty() {
                    log::warn!("No path found, keeping previous waypoints");
                } else {
                    self.set_path(path);
                }
            }
            TicketState::Closed => self.pending = None,
        }
    }

    fn advance(&mut self, position: Vec3) {
        // Standing exactly on a waypoint always reaches it
        let reach = self.stopping_distance.max(f32::EPSILON);
        while let Some(waypoint) = self.current_waypoint() {
            if position.truncate().distance(waypoint.truncate()) > reach {
                break;
            }
            self.target_index += 1;
        }
    }
}
