//! The `Grid`: the arena buffers for the box union, plus incremental updates.
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use rayon::prelude::*;
use tracing::info;

use crate::astar;
use crate::builder::{self, CollisionSource, LayerMask, ResolveParams, TerrainType};
use crate::error::GridError;
use crate::grid_box::{box_at_world_index, GridBox};
use crate::node::{Node, StaticNode};
use crate::path::Path;
use crate::timed;

/// World-space placement of one box, before lattice snapping.
#[derive(Debug, Clone, Copy)]
pub struct BoxSpec {
    pub position: Vec3,
    pub scale: Vec3,
}

impl BoxSpec {
    pub fn new(position: Vec3, scale: Vec3) -> Self {
        BoxSpec { position, scale }
    }
}

/// Holder for validated grid settings. Build one with [`GridSettingsBuilder`].
pub struct GridSettings(pub(crate) GridInternalSettings);

#[derive(Clone)]
pub(crate) struct GridInternalSettings {
    pub(crate) node_size: f32,
    pub(crate) boxes: Vec<BoxSpec>,
    pub(crate) unwalkable_mask: LayerMask,
    pub(crate) terrain_types: Vec<TerrainType>,
    pub(crate) obstacle_proximity_penalty: i32,
    pub(crate) blur_passes: u32,
}

/// Builder for [`GridSettings`].
///
/// ```
/// use glam::Vec3;
/// use voxstar::prelude::*;
///
/// let settings = GridSettingsBuilder::new(0.5)
///     .add_box(Vec3::ZERO, Vec3::new(20.0, 0.0, 20.0))
///     .unwalkable_mask(LayerMask::single(0))
///     .terrain_type(TerrainType::new(LayerMask::single(4), 5))
///     .obstacle_proximity_penalty(15)
///     .blur_passes(1)
///     .build();
/// ```
#[derive(Clone)]
pub struct GridSettingsBuilder {
    node_size: f32,
    boxes: Vec<BoxSpec>,
    unwalkable_mask: LayerMask,
    terrain_types: Vec<TerrainType>,
    obstacle_proximity_penalty: i32,
    blur_passes: u32,
}

impl GridSettingsBuilder {
    /// Starts a settings builder with the given voxel edge length.
    pub fn new(node_size: f32) -> Self {
        GridSettingsBuilder {
            node_size,
            boxes: Vec::new(),
            unwalkable_mask: LayerMask::NONE,
            terrain_types: Vec::new(),
            obstacle_proximity_penalty: 0,
            blur_passes: 0,
        }
    }

    /// Adds one box by world-space center and extent. Both are snapped onto
    /// the voxel lattice at build time.
    pub fn add_box(mut self, position: Vec3, scale: Vec3) -> Self {
        self.boxes.push(BoxSpec::new(position, scale));
        self
    }

    pub fn boxes(mut self, specs: impl IntoIterator<Item = BoxSpec>) -> Self {
        self.boxes.extend(specs);
        self
    }

    /// Layers whose colliders block cells entirely.
    pub fn unwalkable_mask(mut self, mask: LayerMask) -> Self {
        self.unwalkable_mask = mask;
        self
    }

    /// Adds a terrain penalty layer set. May be called multiple times;
    /// penalties for overlapping masks accumulate.
    pub fn terrain_type(mut self, terrain: TerrainType) -> Self {
        self.terrain_types.push(terrain);
        self
    }

    /// Penalty charged to blocked cells and to blur reads past the grid edge.
    pub fn obstacle_proximity_penalty(mut self, penalty: i32) -> Self {
        self.obstacle_proximity_penalty = penalty;
        self
    }

    /// Rounds of penalty blur applied after the initial build.
    pub fn blur_passes(mut self, passes: u32) -> Self {
        self.blur_passes = passes;
        self
    }

    pub fn build(self) -> GridSettings {
        GridSettings(GridInternalSettings {
            node_size: self.node_size,
            boxes: self.boxes,
            unwalkable_mask: self.unwalkable_mask,
            terrain_types: self.terrain_types,
            obstacle_proximity_penalty: self.obstacle_proximity_penalty,
            blur_passes: self.blur_passes,
        })
    }
}

/// The voxel walkability grid over a union of disjoint boxes.
///
/// The arenas are held behind `Arc` so search jobs can read them from worker
/// threads; all mutation goes through `&mut self` methods that the
/// [`crate::pathfinder::Pathfinder`] only calls after joining in-flight
/// searches.
pub struct Grid {
    boxes: Arc<Vec<GridBox>>,
    static_nodes: Arc<Vec<StaticNode>>,
    nodes: Arc<Vec<Node>>,
    max_size: usize,
    node_size: f32,
    unwalkable_mask: LayerMask,
    region_penalties: [i32; 32],
    obstacle_proximity_penalty: i32,
    blur_passes: u32,
    source: Arc<dyn CollisionSource>,
}

impl Grid {
    /// Builds the grid: snaps every box onto the lattice, overlap-queries
    /// every cell in parallel, resolves walkability and penalties, then runs
    /// the configured blur passes.
    pub fn new(settings: GridSettings, source: Arc<dyn CollisionSource>) -> Result<Grid, GridError> {
        let GridInternalSettings {
            node_size,
            boxes: specs,
            unwalkable_mask,
            terrain_types,
            obstacle_proximity_penalty,
            blur_passes,
        } = settings.0;

        if !(node_size > 0.0) {
            return Err(GridError::InvalidNodeSize(node_size));
        }
        if specs.is_empty() {
            return Err(GridError::NoBoxes);
        }

        let mut boxes = Vec::with_capacity(specs.len());
        let mut counter = 0;
        for spec in &specs {
            let grid_box = GridBox::new(counter, spec.position, spec.scale, node_size);
            counter += grid_box.grid_size();
            boxes.push(grid_box);
        }
        let max_size = counter;

        let region_penalties = builder::region_penalties(&terrain_types);
        let params = ResolveParams {
            unwalkable_mask,
            region_penalties: &region_penalties,
            obstacle_proximity_penalty,
        };

        let start = Instant::now();
        let (mut static_nodes, nodes) =
            builder::build_arenas(&boxes, node_size, source.as_ref(), &params);
        info!(cells = max_size, elapsed = ?start.elapsed(), "built walkability grid");

        timed!("penalty blur", {
            for _ in 0..blur_passes {
                builder::blur_penalty_map(&boxes, &mut static_nodes, obstacle_proximity_penalty);
            }
        });

        Ok(Grid {
            boxes: Arc::new(boxes),
            static_nodes: Arc::new(static_nodes),
            nodes: Arc::new(nodes),
            max_size,
            node_size,
            unwalkable_mask,
            region_penalties,
            obstacle_proximity_penalty,
            blur_passes,
            source,
        })
    }

    /// Total cell count across all boxes. Also the search iteration cap.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn node_size(&self) -> f32 {
        self.node_size
    }

    pub fn blur_passes(&self) -> u32 {
        self.blur_passes
    }

    /// Arc handles for a search job's read-only snapshot.
    pub(crate) fn buffers(&self) -> (Arc<Vec<GridBox>>, Arc<Vec<StaticNode>>, Arc<Vec<Node>>) {
        (
            Arc::clone(&self.boxes),
            Arc::clone(&self.static_nodes),
            Arc::clone(&self.nodes),
        )
    }

    /// Walkability at a world position, if it falls inside any box.
    pub fn is_walkable(&self, world_pos: Vec3) -> Option<bool> {
        self.static_node_at(world_pos).map(|node| node.walkable)
    }

    /// Movement penalty at a world position, if it falls inside any box.
    pub fn movement_penalty(&self, world_pos: Vec3) -> Option<i32> {
        self.static_node_at(world_pos).map(|node| node.movement_penalty)
    }

    fn static_node_at(&self, world_pos: Vec3) -> Option<StaticNode> {
        let world_index = (world_pos / self.node_size).round().as_ivec3();
        let (box_index, grid_index) = box_at_world_index(&self.boxes, world_index)?;
        Some(self.boxes[box_index].static_node(&self.static_nodes, grid_index))
    }

    /// Runs a search synchronously on the calling thread. The asynchronous
    /// path goes through [`crate::pathfinder::Pathfinder::pathfind`].
    pub fn find_path(&self, start: Vec3, end: Vec3) -> (Path, bool) {
        let outcome = astar::search(
            &self.boxes,
            &self.static_nodes,
            &self.nodes,
            start,
            end,
            self.node_size,
            self.max_size,
        );
        (outcome.path, outcome.success)
    }

    /// Recomputes walkability for every cell intersecting the world AABB by
    /// re-querying geometry. Blocks the caller until the rewrite is complete.
    ///
    /// Callers must not have searches in flight; the
    /// [`crate::pathfinder::Pathfinder`] drains its queue before delegating
    /// here.
    pub fn update_grid(&mut self, min: Vec3, max: Vec3) {
        let region_penalties = self.region_penalties;
        let params = ResolveParams {
            unwalkable_mask: self.unwalkable_mask,
            region_penalties: &region_penalties,
            obstacle_proximity_penalty: self.obstacle_proximity_penalty,
        };
        let half_extents = Vec3::splat(self.node_size / 2.0);
        let node_size = self.node_size;

        let cells: Vec<(usize, Vec3)> = self
            .boxes
            .iter()
            .filter(|grid_box| grid_box.intersects_aabb(min, max))
            .flat_map(|grid_box| {
                let (min_index, max_index) = builder::update_region(grid_box, min, max, node_size);
                builder::iter_region(min_index, max_index).map(move |grid_index| {
                    (
                        grid_box.linear_index(grid_index),
                        grid_box.cell_world_pos(grid_index, node_size),
                    )
                })
            })
            .collect();

        let source = Arc::clone(&self.source);
        let resolved: Vec<(usize, StaticNode)> = cells
            .par_iter()
            .map(|&(index, center)| {
                (
                    index,
                    builder::resolve_hit(source.overlap_layer(center, half_extents), &params),
                )
            })
            .collect();

        let static_nodes = Arc::make_mut(&mut self.static_nodes);
        for (index, node) in resolved {
            static_nodes[index] = node;
        }
    }

    /// Force-sets walkability for every cell intersecting the world AABB
    /// without re-querying geometry. Penalties and blur are left untouched.
    pub fn update_grid_fast(&mut self, min: Vec3, max: Vec3, walkable: bool) {
        let node_size = self.node_size;
        let indices: Vec<usize> = self
            .boxes
            .iter()
            .filter(|grid_box| grid_box.intersects_aabb(min, max))
            .flat_map(|grid_box| {
                let (min_index, max_index) = builder::update_region(grid_box, min, max, node_size);
                builder::iter_region(min_index, max_index)
                    .map(move |grid_index| grid_box.linear_index(grid_index))
            })
            .collect();

        let static_nodes = Arc::make_mut(&mut self.static_nodes);
        for index in indices {
            static_nodes[index].walkable = walkable;
        }
    }

    /// Reapplies `passes` rounds of penalty blur over the whole grid.
    pub fn blur(&mut self, passes: u32) {
        let boxes = Arc::clone(&self.boxes);
        let obstacle_proximity_penalty = self.obstacle_proximity_penalty;
        let static_nodes = Arc::make_mut(&mut self.static_nodes);
        for _ in 0..passes {
            builder::blur_penalty_map(&boxes, static_nodes, obstacle_proximity_penalty);
        }
    }
}
