//! Multithreaded voxel-grid A* pathfinding over a union of grid-aligned boxes.
//!
//! The walkability grid is built from world geometry through a
//! [`builder::CollisionSource`], kept current with
//! [`grid::Grid::update_grid`] / [`grid::Grid::update_grid_fast`], and
//! searched asynchronously through a [`pathfinder::Pathfinder`] that delivers
//! waypoint paths to callbacks from its per-frame
//! [`pathfinder::Pathfinder::tick`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use glam::Vec3;
//! use voxstar::prelude::*;
//!
//! let settings = GridSettingsBuilder::new(0.5)
//!     .add_box(Vec3::ZERO, Vec3::new(20.0, 0.0, 20.0))
//!     .unwalkable_mask(LayerMask::single(0))
//!     .obstacle_proximity_penalty(15)
//!     .blur_passes(1)
//!     .build();
//!
//! // The host answers overlap queries from its physics world.
//! let source: Arc<dyn CollisionSource> =
//!     Arc::new(|_center: Vec3, _half_extents: Vec3| -> Option<u32> { None });
//!
//! let grid = Grid::new(settings, source).unwrap();
//! let mut pathfinder = Pathfinder::new(grid);
//!
//! pathfinder.pathfind(
//!     Vec3::new(-8.0, 0.0, -8.0),
//!     Vec3::new(8.0, 0.0, 8.0),
//!     |path, success| {
//!         if success {
//!             println!("{} waypoints", path.len());
//!         }
//!     },
//! );
//!
//! // Once per frame:
//! pathfinder.tick();
//! ```

mod astar;
pub mod builder;
pub mod curve;
pub mod error;
pub mod grid;
mod grid_box;
mod heap;
mod macros;
mod neighbor;
mod node;
pub mod path;
pub mod pathfinder;
mod scheduler;

pub mod prelude {
    pub use crate::builder::{CollisionSource, LayerMask, TerrainType};
    pub use crate::error::GridError;
    pub use crate::grid::{BoxSpec, Grid, GridSettings, GridSettingsBuilder};
    pub use crate::path::Path;
    pub use crate::pathfinder::Pathfinder;
}
