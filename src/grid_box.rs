//! `GridBox`, a grid-aligned rectangular sub-region of the global grid.
//!
//! The full grid is a union of disjoint boxes, each owning a contiguous slice
//! of the global arenas starting at `start_index`. Boxes may overlap in world
//! space but never in index range; when a world point falls inside several
//! boxes, the first box found wins.
use glam::{IVec3, Vec3};

use crate::node::{Node, StaticNode};

#[derive(Debug, Clone, Copy)]
pub struct GridBox {
    /// Offset of this box's first cell in the global arenas.
    pub(crate) start_index: usize,
    /// Snapped world-space center.
    pub(crate) position: Vec3,
    /// Snapped world-space extent.
    pub(crate) scale: Vec3,
    pub(crate) min_position_ws: Vec3,
    pub(crate) max_position_ws: Vec3,
    /// Integer world indices of the box corners (world position / node size).
    pub(crate) min_position: IVec3,
    pub(crate) max_position: IVec3,
    pub(crate) x_length: usize,
    pub(crate) y_length: usize,
    pub(crate) z_length: usize,
}

impl GridBox {
    /// Builds a box from a center/extent pair, snapping both onto the voxel
    /// lattice: the center to multiples of `node_size`, the extent to
    /// multiples of `2 * node_size` so the min corner also lands on the
    /// lattice. Cell counts are `ceil(extent / node_size) + 1` per axis.
    pub(crate) fn new(start_index: usize, position: Vec3, scale: Vec3, node_size: f32) -> Self {
        let position = (position / node_size).round() * node_size;
        let scale = (scale / (node_size * 2.0)).round() * (node_size * 2.0);

        let x_length = (scale.x / node_size).ceil() as usize + 1;
        let y_length = (scale.y / node_size).ceil() as usize + 1;
        let z_length = (scale.z / node_size).ceil() as usize + 1;

        let min_position_ws = position - scale / 2.0;
        let max_position_ws = position + scale / 2.0;
        let min_position = (min_position_ws / node_size).round().as_ivec3();
        let max_position = (max_position_ws / node_size).round().as_ivec3();

        GridBox {
            start_index,
            position,
            scale,
            min_position_ws,
            max_position_ws,
            min_position,
            max_position,
            x_length,
            y_length,
            z_length,
        }
    }

    pub(crate) fn y_multiplier(&self) -> usize {
        self.x_length * self.z_length
    }

    /// Total cell count of this box.
    pub fn grid_size(&self) -> usize {
        self.x_length * self.y_length * self.z_length
    }

    /// A box one cell tall uses the 2D (9-neighbor) expansion rule.
    pub(crate) fn is_flat(&self) -> bool {
        self.y_length == 1
    }

    /// Cell `(x, y, z)` packs to `start + x + z*x_len + y*(x_len*z_len)`.
    pub(crate) fn linear_index(&self, index: IVec3) -> usize {
        self.start_index
            + index.x as usize
            + index.z as usize * self.x_length
            + index.y as usize * self.y_multiplier()
    }

    /// Inverse of the packing above, from a box-local offset.
    pub(crate) fn cell_from_local(&self, local: usize) -> IVec3 {
        IVec3::new(
            (local % self.x_length) as i32,
            (local / self.y_multiplier()) as i32,
            (local / self.x_length % self.z_length) as i32,
        )
    }

    pub(crate) fn node(&self, nodes: &[Node], index: IVec3) -> Node {
        nodes[self.linear_index(index)]
    }

    pub(crate) fn static_node(&self, static_nodes: &[StaticNode], index: IVec3) -> StaticNode {
        static_nodes[self.linear_index(index)]
    }

    pub(crate) fn update_node(&self, nodes: &mut [Node], node: Node) {
        nodes[self.linear_index(node.grid_index)] = node;
    }

    pub(crate) fn update_static_node(
        &self,
        static_nodes: &mut [StaticNode],
        index: IVec3,
        node: StaticNode,
    ) {
        static_nodes[self.linear_index(index)] = node;
    }

    /// Inclusive containment test in integer world-index space.
    pub(crate) fn contains_world_index(&self, point: IVec3) -> bool {
        point.cmpge(self.min_position).all() && point.cmple(self.max_position).all()
    }

    pub(crate) fn grid_from_world_index(&self, world: IVec3) -> IVec3 {
        world - self.min_position
    }

    pub(crate) fn world_from_grid_index(&self, index: IVec3) -> IVec3 {
        index + self.min_position
    }

    /// World-space center of a cell.
    pub(crate) fn cell_world_pos(&self, index: IVec3, node_size: f32) -> Vec3 {
        index.as_vec3() * node_size + self.min_position_ws
    }

    pub(crate) fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        min.cmple(self.max_position_ws).all() && max.cmpge(self.min_position_ws).all()
    }

    /// World position to cell index, clamped into the box. Used to bound
    /// update regions that spill past the box edges.
    pub(crate) fn clamped_grid_index(&self, world_pos: Vec3, node_size: f32) -> IVec3 {
        let index = ((world_pos - self.min_position_ws) / node_size)
            .round()
            .as_ivec3();
        index.clamp(
            IVec3::ZERO,
            IVec3::new(
                self.x_length as i32 - 1,
                self.y_length as i32 - 1,
                self.z_length as i32 - 1,
            ),
        )
    }
}

/// Resolves a world index to its owning box and box-local cell. First box
/// found wins; overlap resolution across boxes is the caller's responsibility.
pub(crate) fn box_at_world_index(boxes: &[GridBox], point: IVec3) -> Option<(usize, IVec3)> {
    boxes.iter().enumerate().find_map(|(i, grid_box)| {
        grid_box
            .contains_world_index(point)
            .then(|| (i, grid_box.grid_from_world_index(point)))
    })
}
