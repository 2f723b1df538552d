//! `Pathfinder`: the owned grid-and-scheduler context collaborators drive.
use crossbeam_channel::bounded;
use glam::Vec3;

use crate::astar;
use crate::grid::Grid;
use crate::path::Path;
use crate::scheduler::RequestScheduler;

/// Owns the voxel [`Grid`] and the request queue.
///
/// The host creates one per grid, calls [`Pathfinder::tick`] once per frame
/// from a single thread, and receives path callbacks on that thread. Searches
/// themselves run on the rayon worker pool against an `Arc` snapshot of the
/// grid arenas, so any number can be in flight at once.
pub struct Pathfinder {
    grid: Grid,
    scheduler: RequestScheduler,
}

impl Pathfinder {
    pub fn new(grid: Grid) -> Self {
        Pathfinder {
            grid,
            scheduler: RequestScheduler::new(),
        }
    }

    /// Schedules an asynchronous search from `start` to `end`.
    ///
    /// The callback is invoked exactly once from a later
    /// [`Pathfinder::tick`], with the waypoints ordered start → target and a
    /// success flag. On failure the path is empty. Requests complete in FIFO
    /// order; a request whose job outlives the scheduler's tick bound is
    /// waited on synchronously.
    pub fn pathfind(
        &mut self,
        start: Vec3,
        end: Vec3,
        callback: impl FnOnce(Path, bool) + Send + 'static,
    ) {
        let (sender, receiver) = bounded(1);
        let (boxes, static_nodes, nodes) = self.grid.buffers();
        let node_size = self.grid.node_size();
        let max_size = self.grid.max_size();

        rayon::spawn(move || {
            let outcome = astar::search(
                &boxes,
                &static_nodes,
                &nodes,
                start,
                end,
                node_size,
                max_size,
            );
            let _ = sender.send(outcome);
        });

        self.scheduler.enqueue(receiver, Box::new(callback));
    }

    /// Polls the request queue once. Call once per frame from the thread that
    /// should receive callbacks.
    pub fn tick(&mut self) {
        self.scheduler.tick();
    }

    /// Requests still awaiting delivery.
    pub fn pending_requests(&self) -> usize {
        self.scheduler.pending()
    }

    /// Re-queries world geometry inside the AABB and rewrites walkability.
    /// Joins every in-flight search first so no worker reads a half-written
    /// grid; their callbacks fire before this returns.
    pub fn update_grid(&mut self, min: Vec3, max: Vec3) {
        self.scheduler.drain();
        self.grid.update_grid(min, max);
    }

    /// Force-sets walkability inside the AABB without a geometry requery.
    /// Joins in-flight searches like [`Pathfinder::update_grid`].
    pub fn update_grid_fast(&mut self, min: Vec3, max: Vec3, walkable: bool) {
        self.scheduler.drain();
        self.grid.update_grid_fast(min, max, walkable);
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl Drop for Pathfinder {
    /// Every request is resolved, even on teardown.
    fn drop(&mut self) {
        self.scheduler.drain();
    }
}
