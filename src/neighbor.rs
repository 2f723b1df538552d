//! Neighbor slot layout and the diagonal-blocking walkability masks.
//!
//! The cells around a node are numbered by slot: `(x+1) + (z+1)*3 + (y+1)*9`
//! for the full 3x3x3 block, and `(x+1) + (z+1)*3` for the single-layer slice
//! flat boxes use. Slot 13 (3D) / slot 4 (2D) is the node itself.
//!
//! `WALKABLE_MASK_*[slot]` holds the slots that must also be walkable before
//! the neighbor in `slot` may be stepped to: every nonzero offset whose
//! components are each zero or equal to the move's. For an axis move the mask
//! is empty; for a diagonal it contains the axis-aligned intermediates (and,
//! for a triple diagonal, the three face diagonals), which stops paths from
//! clipping through wall corners.
use std::sync::LazyLock;

use glam::IVec3;

pub(crate) const NEIGHBORS_3D: usize = 27;
pub(crate) const NEIGHBORS_2D: usize = 9;

/// Slot of the node itself inside the 3D block.
pub(crate) const SELF_3D: usize = 13;
/// Slot of the node itself inside the 2D slice.
pub(crate) const SELF_2D: usize = 4;

pub(crate) fn offset_3d(slot: usize) -> IVec3 {
    IVec3::new(
        (slot % 3) as i32 - 1,
        (slot / 9) as i32 - 1,
        (slot / 3 % 3) as i32 - 1,
    )
}

pub(crate) fn offset_2d(slot: usize) -> IVec3 {
    IVec3::new((slot % 3) as i32 - 1, 0, (slot / 3) as i32 - 1)
}

fn slot_3d(offset: IVec3) -> usize {
    ((offset.x + 1) + (offset.z + 1) * 3 + (offset.y + 1) * 9) as usize
}

fn slot_2d(offset: IVec3) -> usize {
    ((offset.x + 1) + (offset.z + 1) * 3) as usize
}

fn required_mask(offset: IVec3, slot_of: impl Fn(IVec3) -> usize) -> u32 {
    let mut mask = 0u32;
    for x in [0, offset.x] {
        for y in [0, offset.y] {
            for z in [0, offset.z] {
                let sub = IVec3::new(x, y, z);
                if sub == IVec3::ZERO || sub == offset {
                    continue;
                }
                mask |= 1 << slot_of(sub);
            }
        }
    }
    mask
}

pub(crate) static WALKABLE_MASK_3D: LazyLock<[u32; NEIGHBORS_3D]> = LazyLock::new(|| {
    let mut table = [0u32; NEIGHBORS_3D];
    for (slot, entry) in table.iter_mut().enumerate() {
        if slot == SELF_3D {
            continue;
        }
        *entry = required_mask(offset_3d(slot), slot_3d);
    }
    table
});

pub(crate) static WALKABLE_MASK_2D: LazyLock<[u32; NEIGHBORS_2D]> = LazyLock::new(|| {
    let mut table = [0u32; NEIGHBORS_2D];
    for (slot, entry) in table.iter_mut().enumerate() {
        if slot == SELF_2D {
            continue;
        }
        *entry = required_mask(offset_2d(slot), slot_2d);
    }
    table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_round_trip() {
        assert_eq!(offset_3d(SELF_3D), IVec3::ZERO);
        assert_eq!(offset_2d(SELF_2D), IVec3::ZERO);

        for slot in 0..NEIGHBORS_3D {
            assert_eq!(slot_3d(offset_3d(slot)), slot);
        }
        for slot in 0..NEIGHBORS_2D {
            assert_eq!(slot_2d(offset_2d(slot)), slot);
        }
    }

    #[test]
    fn test_2d_masks() {
        // Corners require their two axis-aligned intermediates; axis moves
        // require nothing.
        let expected: [u32; NEIGHBORS_2D] = [10, 0, 34, 0, 0, 0, 136, 0, 160];
        assert_eq!(*WALKABLE_MASK_2D, expected);
    }

    #[test]
    fn test_axis_moves_are_unconditional() {
        for slot in 0..NEIGHBORS_3D {
            let offset = offset_3d(slot);
            let nonzero_axes =
                (offset.x != 0) as u32 + (offset.y != 0) as u32 + (offset.z != 0) as u32;
            if nonzero_axes == 1 {
                assert_eq!(WALKABLE_MASK_3D[slot], 0, "slot {slot}");
            }
        }
    }

    #[test]
    fn test_3d_masks_match_rule() {
        // Brute-force restatement of the rule: a required slot is any other
        // non-center offset made only of the move's own components.
        for slot in 0..NEIGHBORS_3D {
            if slot == SELF_3D {
                continue;
            }
            let offset = offset_3d(slot);
            let mut expected = 0u32;
            for other in 0..NEIGHBORS_3D {
                if other == SELF_3D || other == slot {
                    continue;
                }
                let sub = offset_3d(other);
                let component_of = |s: i32, o: i32| s == 0 || s == o;
                if component_of(sub.x, offset.x)
                    && component_of(sub.y, offset.y)
                    && component_of(sub.z, offset.z)
                {
                    expected |= 1 << other;
                }
            }
            assert_eq!(WALKABLE_MASK_3D[slot], expected, "slot {slot}");
        }
    }

    #[test]
    fn test_double_diagonal_requires_two_intermediates() {
        // Move (1, 0, 1): requires (1, 0, 0) and (0, 0, 1).
        let slot = slot_3d(IVec3::new(1, 0, 1));
        let expected = (1 << slot_3d(IVec3::new(1, 0, 0))) | (1 << slot_3d(IVec3::new(0, 0, 1)));
        assert_eq!(WALKABLE_MASK_3D[slot], expected);
    }

    #[test]
    fn test_triple_diagonal_requires_six_cells() {
        // A corner-to-corner move needs all three axis moves and all three
        // face diagonals along the way.
        let slot = slot_3d(IVec3::new(1, 1, 1));
        assert_eq!(WALKABLE_MASK_3D[slot].count_ones(), 6);
    }
}
