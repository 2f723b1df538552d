//! Grid construction: world-geometry queries, walkability resolution, and the
//! movement-penalty blur.
//!
//! Every cell is resolved from one overlap query against the host's
//! [`CollisionSource`]. Queries run in parallel on the rayon pool; the resolve
//! pass that writes the arenas is synchronous.
use glam::{IVec3, Vec3};
use rayon::prelude::*;

use crate::grid_box::{box_at_world_index, GridBox};
use crate::node::{Node, StaticNode};

/// Bit set of geometry layers, one bit per layer id in `0..32`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);

    pub const fn single(layer: u32) -> Self {
        LayerMask(1 << layer)
    }

    pub const fn contains(self, layer: u32) -> bool {
        self.0 & (1 << layer) != 0
    }

    pub const fn union(self, other: LayerMask) -> Self {
        LayerMask(self.0 | other.0)
    }
}

/// Traversal penalty applied to every layer in `mask`.
#[derive(Debug, Clone, Copy)]
pub struct TerrainType {
    pub mask: LayerMask,
    pub penalty: i32,
}

impl TerrainType {
    pub fn new(mask: LayerMask, penalty: i32) -> Self {
        TerrainType { mask, penalty }
    }
}

/// The crate's window onto world geometry.
///
/// Implementations answer axis-aligned overlap queries against whatever
/// physics or scene representation the host uses. Queries are issued from
/// worker threads during builds and updates.
pub trait CollisionSource: Send + Sync {
    /// Layer of the first collider overlapping the cell volume centered at
    /// `center` with the given half-extents, or `None` for empty space.
    fn overlap_layer(&self, center: Vec3, half_extents: Vec3) -> Option<u32>;
}

impl<F> CollisionSource for F
where
    F: Fn(Vec3, Vec3) -> Option<u32> + Send + Sync,
{
    fn overlap_layer(&self, center: Vec3, half_extents: Vec3) -> Option<u32> {
        self(center, half_extents)
    }
}

/// Per-layer penalty lookup, built by summing every [`TerrainType`] whose mask
/// includes the layer.
pub(crate) fn region_penalties(terrain_types: &[TerrainType]) -> [i32; 32] {
    let mut table = [0i32; 32];
    for region in terrain_types {
        for (layer, entry) in table.iter_mut().enumerate() {
            if region.mask.contains(layer as u32) {
                *entry += region.penalty;
            }
        }
    }
    table
}

pub(crate) struct ResolveParams<'a> {
    pub(crate) unwalkable_mask: LayerMask,
    pub(crate) region_penalties: &'a [i32; 32],
    pub(crate) obstacle_proximity_penalty: i32,
}

/// Turns one overlap result into the cell's static state: a hit on an
/// unwalkable layer blocks the cell and charges the proximity penalty, any
/// hit accumulates its layer's terrain penalty.
pub(crate) fn resolve_hit(hit: Option<u32>, params: &ResolveParams) -> StaticNode {
    let Some(layer) = hit else {
        return StaticNode::new(0, true);
    };

    let walkable = !params.unwalkable_mask.contains(layer);
    let mut penalty = 0;
    if !walkable {
        penalty += params.obstacle_proximity_penalty;
    }
    penalty += params.region_penalties[(layer & 31) as usize];

    StaticNode::new(penalty, walkable)
}

/// Queries every cell of every box in parallel, then resolves the results into
/// fresh static and template node arenas.
pub(crate) fn build_arenas(
    boxes: &[GridBox],
    node_size: f32,
    source: &dyn CollisionSource,
    params: &ResolveParams,
) -> (Vec<StaticNode>, Vec<Node>) {
    let half_extents = Vec3::splat(node_size / 2.0);
    let hits = query_cells(boxes, node_size, source, half_extents);

    let mut static_nodes = vec![StaticNode::default(); hits.len()];
    let mut nodes = vec![Node::EMPTY; hits.len()];
    for (box_index, grid_box) in boxes.iter().enumerate() {
        for local in 0..grid_box.grid_size() {
            let index = grid_box.start_index + local;
            static_nodes[index] = resolve_hit(hits[index], params);
            nodes[index] = Node::new(grid_box.cell_from_local(local), box_index as i32);
        }
    }
    (static_nodes, nodes)
}

fn query_cells(
    boxes: &[GridBox],
    node_size: f32,
    source: &dyn CollisionSource,
    half_extents: Vec3,
) -> Vec<Option<u32>> {
    // Boxes occupy consecutive index ranges, so flattening in box order lines
    // the results up with the global arenas.
    let centers: Vec<Vec3> = boxes
        .iter()
        .flat_map(|grid_box| {
            let grid_box = *grid_box;
            (0..grid_box.grid_size())
                .map(move |local| grid_box.cell_world_pos(grid_box.cell_from_local(local), node_size))
        })
        .collect();

    centers
        .par_iter()
        .map(|&center| source.overlap_layer(center, half_extents))
        .collect()
}

/// One full blur pass: a separable box blur along X, then Y, then Z. Each axis
/// sweep reads a snapshot of the previous state so writes never race reads. A
/// neighbor that falls outside every box counts as a wall with
/// `obstacle_proximity_penalty`.
pub(crate) fn blur_penalty_map(
    boxes: &[GridBox],
    static_nodes: &mut [StaticNode],
    obstacle_proximity_penalty: i32,
) {
    for axis in [IVec3::X, IVec3::Y, IVec3::Z] {
        let snapshot = static_nodes.to_vec();

        let cells: Vec<(&GridBox, usize)> = boxes
            .iter()
            .flat_map(|grid_box| (0..grid_box.grid_size()).map(move |local| (grid_box, local)))
            .collect();

        let blurred: Vec<i32> = cells
            .into_par_iter()
            .map(|(grid_box, local)| {
                let grid_index = grid_box.cell_from_local(local);
                let world = grid_box.world_from_grid_index(grid_index);

                let mut sum = grid_box.static_node(&snapshot, grid_index).movement_penalty;
                for step in [-axis, axis] {
                    sum += match box_at_world_index(boxes, world + step) {
                        Some((nb_box, nb_index)) => {
                            boxes[nb_box].static_node(&snapshot, nb_index).movement_penalty
                        }
                        None => obstacle_proximity_penalty,
                    };
                }
                sum / 3
            })
            .collect();

        for (node, penalty) in static_nodes.iter_mut().zip(blurred) {
            node.movement_penalty = penalty;
        }
    }
}

/// Cells of `grid_box` covered by a world AABB, shrunk by half a cell so a
/// volume that only touches a cell boundary does not spill into the next row.
pub(crate) fn update_region(grid_box: &GridBox, min: Vec3, max: Vec3, node_size: f32) -> (IVec3, IVec3) {
    let node_radius = Vec3::splat(node_size / 2.0);
    let min_index = grid_box.clamped_grid_index(min + node_radius, node_size);
    let max_index = grid_box.clamped_grid_index(max - node_radius, node_size);
    (min_index, max_index)
}

/// Iterates an inclusive cell region in the fixed y, z, x nesting order.
pub(crate) fn iter_region(min: IVec3, max: IVec3) -> impl Iterator<Item = IVec3> {
    (min.y..=max.y).flat_map(move |y| {
        (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| IVec3::new(x, y, z)))
    })
}
