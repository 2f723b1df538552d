//! The A* search job run once per pathfinding request.
//!
//! Operates on a read-only snapshot of the box and static-node arenas plus a
//! private clone of the node template, so any number of searches can run in
//! parallel against the same grid.
use glam::{IVec3, Vec3};
use smallvec::SmallVec;

use crate::grid_box::{box_at_world_index, GridBox};
use crate::heap::NodeHeap;
use crate::neighbor::{
    offset_2d, offset_3d, NEIGHBORS_2D, NEIGHBORS_3D, SELF_2D, SELF_3D, WALKABLE_MASK_2D,
    WALKABLE_MASK_3D,
};
use crate::node::{Node, StaticNode};
use crate::path::Path;

/// Cycle-safety cap on parent-link walks; no real path revisits this many cells.
const MAX_RETRACE_STEPS: usize = 1000;

pub(crate) struct SearchOutcome {
    pub(crate) path: Path,
    pub(crate) success: bool,
}

impl SearchOutcome {
    pub(crate) fn failure() -> Self {
        SearchOutcome {
            path: Path::default(),
            success: false,
        }
    }
}

/// Runs one full search. Failures (unresolvable endpoints, exhausted open set,
/// iteration cap) are reported through the outcome's `success` flag, never as
/// an error.
pub(crate) fn search(
    boxes: &[GridBox],
    static_nodes: &[StaticNode],
    node_template: &[Node],
    start_ws: Vec3,
    target_ws: Vec3,
    node_size: f32,
    max_iterations: usize,
) -> SearchOutcome {
    let mut nodes = node_template.to_vec();

    let start_world = (start_ws / node_size).round().as_ivec3();
    let target_world = (target_ws / node_size).round().as_ivec3();

    let Some((start_box, start_index)) =
        resolve_endpoint(boxes, static_nodes, start_world, target_world)
    else {
        return SearchOutcome::failure();
    };
    let Some((target_box, target_index)) =
        resolve_endpoint(boxes, static_nodes, target_world, start_world)
    else {
        return SearchOutcome::failure();
    };

    let start_world_index = boxes[start_box].world_from_grid_index(start_index);
    let target_world_index = boxes[target_box].world_from_grid_index(target_index);

    let mut open = NodeHeap::with_capacity(max_iterations / 2);
    let mut closed: Vec<(IVec3, i32)> = Vec::new();
    let mut neighbours: SmallVec<[Node; NEIGHBORS_3D]> = SmallVec::new();

    let mut start_node = boxes[start_box].node(&nodes, start_index);
    start_node.h_cost = distance(start_world_index, target_world_index);
    open.add(start_node, boxes, &mut nodes);

    let mut iterations = 0;
    while !open.is_empty() && iterations < max_iterations {
        iterations += 1;

        let mut current = open.remove_first(boxes, &mut nodes);
        current.locked = true;
        closed.push((current.grid_index, current.box_index));
        boxes[current.box_index as usize].update_node(&mut nodes, current);

        if current.grid_index == target_index && current.box_index == target_box as i32 {
            let waypoints = retrace(boxes, &nodes, start_node, current, node_size, start_ws, target_ws);
            return SearchOutcome {
                path: Path::new(waypoints, current.g_cost),
                success: true,
            };
        }

        let current_box = &boxes[current.box_index as usize];
        let flat = current_box.is_flat();
        let (slot_count, self_slot) = if flat {
            (NEIGHBORS_2D, SELF_2D)
        } else {
            (NEIGHBORS_3D, SELF_3D)
        };
        let walkable_bits = gather_neighbours(
            boxes,
            static_nodes,
            &nodes,
            current.grid_index,
            current.box_index as usize,
            flat,
            &mut neighbours,
        );
        let current_world_index = current_box.world_from_grid_index(current.grid_index);

        for slot in 0..slot_count {
            if slot == self_slot {
                continue;
            }

            let mut neighbour = neighbours[slot];
            if neighbour.box_index < 0 {
                continue;
            }

            let required = if flat {
                WALKABLE_MASK_2D[slot]
            } else {
                WALKABLE_MASK_3D[slot]
            };
            if walkable_bits & required != required {
                continue;
            }

            let neighbour_box = &boxes[neighbour.box_index as usize];
            // Earlier slots may have reordered the heap; re-read through the
            // arena so heap_index and g_cost are current.
            neighbour = neighbour_box.node(&nodes, neighbour.grid_index);

            if neighbour.locked || closed.contains(&(neighbour.grid_index, neighbour.box_index)) {
                continue;
            }

            let neighbour_world_index = neighbour_box.world_from_grid_index(neighbour.grid_index);
            let penalty = neighbour_box
                .static_node(static_nodes, neighbour.grid_index)
                .movement_penalty;
            let tentative =
                current.g_cost + distance(current_world_index, neighbour_world_index) + penalty as f32;

            let in_open = open.contains(&neighbour);
            if tentative < neighbour.g_cost || !in_open {
                neighbour.g_cost = tentative;
                neighbour.h_cost = distance(target_world_index, neighbour_world_index);
                neighbour.parent_index = current.grid_index;
                neighbour.parent_box_index = current.box_index;
                neighbour_box.update_node(&mut nodes, neighbour);

                if in_open {
                    open.update_item(neighbour, boxes, &mut nodes);
                } else {
                    open.add(neighbour, boxes, &mut nodes);
                }
            }
        }
    }

    SearchOutcome::failure()
}

/// Maps a snapped world index to its box and cell, falling back to the nearest
/// walkable cell in the surrounding 3x3x3 block when the cell itself is
/// blocked. `toward` breaks ties: the fallback prefers the candidate closest
/// to the opposite endpoint.
fn resolve_endpoint(
    boxes: &[GridBox],
    static_nodes: &[StaticNode],
    world_index: IVec3,
    toward: IVec3,
) -> Option<(usize, IVec3)> {
    let (box_index, grid_index) = box_at_world_index(boxes, world_index)?;
    if boxes[box_index]
        .static_node(static_nodes, grid_index)
        .walkable
    {
        return Some((box_index, grid_index));
    }
    closest_walkable(boxes, static_nodes, world_index, toward)
}

fn closest_walkable(
    boxes: &[GridBox],
    static_nodes: &[StaticNode],
    world_index: IVec3,
    toward: IVec3,
) -> Option<(usize, IVec3)> {
    let mut best = None;
    let mut best_distance = f32::MAX;

    for x in -1..=1 {
        for y in -1..=1 {
            for z in -1..=1 {
                let neighbour_world = world_index + IVec3::new(x, y, z);
                let Some((box_index, grid_index)) = box_at_world_index(boxes, neighbour_world)
                else {
                    continue;
                };
                if !boxes[box_index]
                    .static_node(static_nodes, grid_index)
                    .walkable
                {
                    continue;
                }

                let dist = distance(neighbour_world, toward);
                if dist < best_distance {
                    best_distance = dist;
                    best = Some((box_index, grid_index));
                }
            }
        }
    }

    best
}

/// Fills `out` with the nodes around `grid_index`, slot-ordered, resolving
/// neighbors that land in other boxes through their world index. Returns a
/// bitmask of the walkable slots.
fn gather_neighbours(
    boxes: &[GridBox],
    static_nodes: &[StaticNode],
    nodes: &[Node],
    grid_index: IVec3,
    box_index: usize,
    flat: bool,
    out: &mut SmallVec<[Node; NEIGHBORS_3D]>,
) -> u32 {
    out.clear();

    let (slot_count, self_slot) = if flat {
        (NEIGHBORS_2D, SELF_2D)
    } else {
        (NEIGHBORS_3D, SELF_3D)
    };
    let origin_world = boxes[box_index].world_from_grid_index(grid_index);

    let mut walkable_bits = 0u32;
    for slot in 0..slot_count {
        if slot == self_slot {
            out.push(Node::EMPTY);
            continue;
        }

        let offset = if flat { offset_2d(slot) } else { offset_3d(slot) };
        let Some((nb_box, nb_index)) = box_at_world_index(boxes, origin_world + offset) else {
            out.push(Node::EMPTY);
            continue;
        };

        if boxes[nb_box].static_node(static_nodes, nb_index).walkable {
            walkable_bits |= 1 << slot;
            out.push(boxes[nb_box].node(nodes, nb_index));
        } else {
            out.push(Node::EMPTY);
        }
    }

    walkable_bits
}

/// Walks parent links target → start, then reverses so the waypoints run
/// start → target, with the exact unsnapped endpoints substituted at each end.
fn retrace(
    boxes: &[GridBox],
    nodes: &[Node],
    start: Node,
    end: Node,
    node_size: f32,
    start_ws: Vec3,
    target_ws: Vec3,
) -> Vec<Vec3> {
    let mut waypoints = Vec::new();
    let mut current = end;

    let mut steps = 0;
    while !current.same_cell(&start) && steps < MAX_RETRACE_STEPS {
        steps += 1;
        waypoints
            .push(boxes[current.box_index as usize].cell_world_pos(current.grid_index, node_size));
        current = boxes[current.parent_box_index as usize].node(nodes, current.parent_index);
    }
    waypoints.push(boxes[start.box_index as usize].cell_world_pos(start.grid_index, node_size));
    waypoints.reverse();

    waypoints[0] = start_ws;
    let last = waypoints.len() - 1;
    waypoints[last] = target_ws;
    waypoints
}

fn distance(a: IVec3, b: IVec3) -> f32 {
    a.as_vec3().distance(b.as_vec3())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A single flat box spanning world (0,0,0)..(scale,0,scale) with one cell
    /// per unit, all walkable.
    fn flat_grid(scale: f32) -> (Vec<GridBox>, Vec<StaticNode>, Vec<Node>) {
        let half = scale / 2.0;
        let grid_box = GridBox::new(
            0,
            Vec3::new(half, 0.0, half),
            Vec3::new(scale, 0.0, scale),
            1.0,
        );
        arenas(vec![grid_box])
    }

    fn arenas(boxes: Vec<GridBox>) -> (Vec<GridBox>, Vec<StaticNode>, Vec<Node>) {
        let max_size = boxes.iter().map(GridBox::grid_size).sum();
        let mut static_nodes = vec![StaticNode::default(); max_size];
        let mut nodes = vec![Node::EMPTY; max_size];
        for (box_index, grid_box) in boxes.iter().enumerate() {
            for local in 0..grid_box.grid_size() {
                let cell = grid_box.cell_from_local(local);
                static_nodes[grid_box.start_index + local] = StaticNode::default();
                nodes[grid_box.start_index + local] = Node::new(cell, box_index as i32);
            }
        }
        (boxes, static_nodes, nodes)
    }

    fn set_walkable(
        boxes: &[GridBox],
        static_nodes: &mut [StaticNode],
        cell: IVec3,
        walkable: bool,
    ) {
        let mut node = boxes[0].static_node(static_nodes, cell);
        node.walkable = walkable;
        boxes[0].update_static_node(static_nodes, cell, node);
    }

    #[test]
    fn test_open_floor_diagonal() {
        let (boxes, static_nodes, nodes) = flat_grid(10.0);
        let start = Vec3::new(0.0, 0.0, 0.0);
        let target = Vec3::new(9.0, 0.0, 9.0);

        let outcome = search(&boxes, &static_nodes, &nodes, start, target, 1.0, 121);

        assert!(outcome.success);
        assert_eq!(outcome.path.first(), Some(start));
        assert_eq!(outcome.path.last(), Some(target));
        // Pure diagonal: one waypoint per cell on the diagonal.
        assert!(outcome.path.len() <= 11);
        let length = outcome.path.length();
        assert!(length >= 12.0 && length <= 13.0, "length {length}");
    }

    #[test]
    fn test_wall_with_gap_routes_through_gap() {
        let (boxes, mut static_nodes, nodes) = flat_grid(10.0);
        for z in 0..=10 {
            if z != 5 {
                set_walkable(&boxes, &mut static_nodes, IVec3::new(5, 0, z), false);
            }
        }

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(9.0, 0.0, 9.0),
            1.0,
            121,
        );

        assert!(outcome.success);
        assert!(
            outcome
                .path
                .iter()
                .any(|p| *p == Vec3::new(5.0, 0.0, 5.0)),
            "path must pass through the single gap"
        );
    }

    #[test]
    fn test_solid_wall_is_unreachable() {
        let (boxes, mut static_nodes, nodes) = flat_grid(10.0);
        for z in 0..=10 {
            set_walkable(&boxes, &mut static_nodes, IVec3::new(5, 0, z), false);
        }

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(9.0, 0.0, 9.0),
            1.0,
            121,
        );

        assert!(!outcome.success);
        assert!(outcome.path.is_empty());
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let (boxes, mut static_nodes, nodes) = flat_grid(10.0);
        for z in [1, 3, 7] {
            set_walkable(&boxes, &mut static_nodes, IVec3::new(4, 0, z), false);
        }
        let start = Vec3::new(0.2, 0.0, 0.1);
        let target = Vec3::new(8.9, 0.0, 7.6);

        let first = search(&boxes, &static_nodes, &nodes, start, target, 1.0, 121);
        let second = search(&boxes, &static_nodes, &nodes, start, target, 1.0, 121);

        assert!(first.success && second.success);
        assert_eq!(first.path.waypoints(), second.path.waypoints());
    }

    #[test]
    fn test_in_place_request_yields_single_waypoint() {
        let (boxes, static_nodes, nodes) = flat_grid(10.0);
        let pos = Vec3::new(3.2, 0.0, 3.4);

        let outcome = search(&boxes, &static_nodes, &nodes, pos, pos, 1.0, 121);

        assert!(outcome.success);
        assert_eq!(outcome.path.len(), 1);
    }

    #[test]
    fn test_unwalkable_start_falls_back_to_neighbor() {
        let (boxes, mut static_nodes, nodes) = flat_grid(10.0);
        set_walkable(&boxes, &mut static_nodes, IVec3::new(0, 0, 0), false);

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(9.0, 0.0, 9.0),
            1.0,
            121,
        );

        assert!(outcome.success);
        assert_eq!(outcome.path.last(), Some(Vec3::new(9.0, 0.0, 9.0)));
    }

    #[test]
    fn test_endpoint_outside_all_boxes_fails() {
        let (boxes, static_nodes, nodes) = flat_grid(10.0);

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(-50.0, 0.0, 0.0),
            Vec3::new(9.0, 0.0, 9.0),
            1.0,
            121,
        );

        assert!(!outcome.success);
        assert!(outcome.path.is_empty());
    }

    #[test]
    fn test_no_corner_clipping_through_diagonal_gap() {
        // Two walls touching diagonally at (5, 0, 5); the diagonal step
        // between them must be rejected even though both endpoint cells are
        // walkable.
        let (boxes, mut static_nodes, nodes) = flat_grid(10.0);
        for z in 0..=4 {
            set_walkable(&boxes, &mut static_nodes, IVec3::new(5, 0, z), false);
        }
        for z in 5..=10 {
            set_walkable(&boxes, &mut static_nodes, IVec3::new(4, 0, z), false);
        }

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(9.0, 0.0, 9.0),
            1.0,
            121,
        );

        // The only way across would be the corner cut (4,0,4) -> (5,0,5);
        // with both intermediates blocked the grid is split in two.
        assert!(!outcome.success);
    }

    #[test]
    fn test_3d_box_uses_volumetric_diagonals() {
        let grid_box = GridBox::new(0, Vec3::new(2.0, 2.0, 2.0), Vec3::new(4.0, 4.0, 4.0), 1.0);
        assert!(!grid_box.is_flat());
        let (boxes, static_nodes, nodes) = arenas(vec![grid_box]);

        let start = Vec3::new(0.0, 0.0, 0.0);
        let target = Vec3::new(4.0, 4.0, 4.0);
        let outcome = search(&boxes, &static_nodes, &nodes, start, target, 1.0, 125);

        assert!(outcome.success);
        // Pure triple diagonal: five cells corner to corner.
        assert_eq!(outcome.path.len(), 5);
        let length = outcome.path.length();
        let expected = 4.0 * 3.0f32.sqrt();
        assert!((length - expected).abs() < 1e-3, "length {length}");
    }

    #[test]
    fn test_3d_vertical_wall_forces_climb() {
        let grid_box = GridBox::new(0, Vec3::new(2.0, 1.0, 2.0), Vec3::new(4.0, 2.0, 4.0), 1.0);
        let (boxes, mut static_nodes, nodes) = arenas(vec![grid_box]);

        // Block the bottom two layers at x = 2; only y = 2 stays open.
        for y in 0..=1 {
            for z in 0..=4 {
                set_walkable(&boxes, &mut static_nodes, IVec3::new(2, y, z), false);
            }
        }

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(4.0, 0.0, 2.0),
            1.0,
            75,
        );

        assert!(outcome.success);
        assert!(
            outcome.path.iter().any(|p| p.y >= 2.0),
            "path should climb over the wall"
        );
    }

    #[test]
    fn test_path_crosses_box_boundary() {
        let a = GridBox::new(0, Vec3::new(2.0, 0.0, 2.0), Vec3::new(4.0, 0.0, 4.0), 1.0);
        let b = GridBox::new(
            a.grid_size(),
            Vec3::new(6.0, 0.0, 2.0),
            Vec3::new(4.0, 0.0, 4.0),
            1.0,
        );
        let (boxes, static_nodes, nodes) = arenas(vec![a, b]);

        let start = Vec3::new(0.0, 0.0, 2.0);
        let target = Vec3::new(8.0, 0.0, 2.0);
        let outcome = search(&boxes, &static_nodes, &nodes, start, target, 1.0, 50);

        assert!(outcome.success);
        assert_eq!(outcome.path.first(), Some(start));
        assert_eq!(outcome.path.last(), Some(target));
    }

    #[test]
    fn test_penalties_steer_the_path() {
        let (boxes, mut static_nodes, nodes) = flat_grid(10.0);
        // Make the straight lane through z=0 expensive except at the rims.
        for x in 1..=9 {
            for z in 0..=1 {
                let cell = IVec3::new(x, 0, z);
                let mut node = boxes[0].static_node(&static_nodes, cell);
                node.movement_penalty = 50;
                boxes[0].update_static_node(&mut static_nodes, cell, node);
            }
        }

        let outcome = search(
            &boxes,
            &static_nodes,
            &nodes,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            1.0,
            121,
        );

        assert!(outcome.success);
        // The detour around the penalty band is cheaper than the direct lane.
        assert!(outcome
            .path
            .iter()
            .any(|p| p.z >= 2.0), "path should bow away from the penalty band");
    }
}
