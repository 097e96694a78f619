//! Occlusion and raycasting against custom world implementations

use std::cell::Cell;
use std::collections::HashSet;
use voxel_acoustics::acoustics::raycast::GridTraversal;
use voxel_acoustics::acoustics::{cast_ray, MaterialTable, OcclusionCalculator};
use voxel_acoustics::config::OcclusionConfig;
use voxel_acoustics::prelude::*;

/// World whose lookups fail everywhere outside a slab, counting calls
struct FlakyWorld {
    calls: Cell<usize>,
}

impl BlockLookup for FlakyWorld {
    fn block(&self, pos: IVec3) -> Result<BlockState, WorldAccessError> {
        self.calls.set(self.calls.get() + 1);
        if pos.x > 5 {
            Err(WorldAccessError::Lookup {
                pos,
                reason: "chunk unavailable".into(),
            })
        } else {
            Ok(BlockState::AIR)
        }
    }
}

fn calculator() -> OcclusionCalculator {
    OcclusionCalculator::new(OcclusionConfig::default(), MaterialTable::default())
}

#[test]
fn test_traversal_visits_each_cell_once() {
    let cells: Vec<IVec3> = GridTraversal::new(Vec3::new(0.2, 0.7, 0.1), Vec3::new(9.6, -4.3, 6.8), 1024)
        .map(|step| step.cell)
        .collect();
    let unique: HashSet<IVec3> = cells.iter().copied().collect();
    assert_eq!(cells.len(), unique.len());
    assert_eq!(cells.first(), Some(&IVec3::new(0, 0, 0)));
    assert_eq!(cells.last(), Some(&IVec3::new(9, -5, 6)));

    // Neighbouring steps share a face
    for pair in cells.windows(2) {
        let diff = (pair[1] - pair[0]).abs();
        assert_eq!(diff.x + diff.y + diff.z, 1);
    }
}

#[test]
fn test_axis_aligned_ray_stays_in_its_row() {
    let cells: Vec<IVec3> = GridTraversal::new(Vec3::new(0.5, 2.5, -3.5), Vec3::new(0.5, 2.5, 4.5), 64)
        .map(|step| step.cell)
        .collect();
    assert_eq!(cells.len(), 9);
    assert!(cells.iter().all(|c| c.x == 0 && c.y == 2));
}

#[test]
fn test_lookup_failures_are_treated_as_solid() {
    let world = FlakyWorld { calls: Cell::new(0) };
    let calc = calculator();
    let sample = calc.calculate(Vec3::splat(0.5), Vec3::new(10.5, 0.5, 0.5), &world);
    assert_eq!(sample.occlusion, calc.config().max_occlusion);
    // The first failing block saturates the sum and stops the ray
    assert_eq!(world.calls.get(), 7);
}

#[test]
fn test_openable_block_occludes_less_when_open() {
    let mut grid = VoxelGrid::new();
    let door = IVec3::new(3, 0, 0);
    grid.set(door, BlockState::openable(Material::Wood, false));
    let calc = calculator();
    let from = Vec3::splat(0.5);
    let to = Vec3::new(6.5, 0.5, 0.5);

    let closed = calc.calculate(from, to, &grid).occlusion;
    grid.toggle_open(door);
    let open = calc.calculate(from, to, &grid).occlusion;
    assert!(open < closed);
    assert!(open > 0.0);
}

#[test]
fn test_more_material_means_more_filtering() {
    let calc = calculator();
    let from = Vec3::splat(0.5);
    let to = Vec3::new(12.5, 0.5, 0.5);
    let mut grid = VoxelGrid::new();
    let mut previous = calc.occlusion_to_filter(calc.calculate(from, to, &grid).occlusion, 0.0);
    assert_eq!(previous, 1.0);

    for x in [2, 4, 6, 8] {
        grid.set(IVec3::new(x, 0, 0), BlockState::solid(Material::Wool));
        let filter = calc.occlusion_to_filter(calc.calculate(from, to, &grid).occlusion, 0.0);
        assert!(filter < previous);
        previous = filter;
    }
    assert!(previous >= calc.config().min_filter);
}

#[test]
fn test_cast_ray_reports_blocks_in_order() {
    let mut grid = VoxelGrid::new();
    grid.set(IVec3::new(5, 0, 0), BlockState::solid(Material::Glass));
    grid.set(IVec3::new(2, 0, 0), BlockState::solid(Material::Stone));
    let hits: Vec<Material> = cast_ray(&grid, Vec3::splat(0.5), Vec3::new(8.5, 0.5, 0.5), 64)
        .map(|hit| hit.block.material)
        .collect();
    assert_eq!(hits, vec![Material::Stone, Material::Glass]);
}
