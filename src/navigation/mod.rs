//! Grid navigation module
//!
//! Provides the navigation grid, A* search, the asynchronous path request
//! service, and the agent-side path follower.

mod follower;
mod grid;
mod node;
mod probe;
mod request;
mod search;

pub use follower::PathFollower;
pub use grid::{Grid, Neighbors};
pub use node::{
    DIAGONAL_COST, GridCoord, Node, NodeIndex, NodeScratch, STRAIGHT_COST, SearchScratch,
    UNVISITED, diagonal_distance,
};
pub use probe::{CategoryMask, CollisionProbe, ObstacleShape, ShapeProbe};
pub use request::{
    PathCallback, PathRequestService, PathTicket, RequestId, SearchFn, ServiceState, TicketState,
};
pub use search::{PathResult, find_path};
