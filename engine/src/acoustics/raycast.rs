//! Voxel grid raycasting for sound occlusion and room acoustics
//!
//! Implements incremental grid stepping (Amanatides & Woo): the cost of a
//! ray is proportional to the number of cells it crosses, not its length.

use crate::acoustics::voxel::{BlockLookup, BlockState};
use glam::{IVec3, Vec3};
use tracing::{debug, trace};

/// Directions shorter than this are treated as a zero-length ray
const MIN_RAY_LENGTH: f32 = 1e-6;

/// One cell entered by a [`GridTraversal`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStep {
    /// Cell coordinates
    pub cell: IVec3,
    /// Distance along the ray at which the cell was entered
    pub distance: f32,
    /// Outward normal of the face the ray entered through (zero for the start cell)
    pub normal: IVec3,
}

/// Pure geometric walk over every cell a segment crosses
///
/// Yields the start cell first, then each neighbouring cell in strictly
/// non-decreasing distance order. Every cell is yielded at most once. The walk
/// is `Clone`, so a copy taken before iteration replays the same sequence.
#[derive(Debug, Clone)]
pub struct GridTraversal {
    cell: IVec3,
    step: IVec3,
    t_max: Vec3,
    t_delta: Vec3,
    length: f32,
    remaining: usize,
    started: bool,
    finished: bool,
    truncated: bool,
}

impl GridTraversal {
    /// Walk from `start` to `end`, visiting at most `max_cells` cells
    pub fn new(start: Vec3, end: Vec3, max_cells: usize) -> Self {
        let delta = end - start;
        let length = delta.length();
        let direction = if length > MIN_RAY_LENGTH {
            delta / length
        } else {
            Vec3::ZERO
        };
        Self::along(start, direction, length, max_cells)
    }

    /// Walk from `origin` along a normalized `direction` for `max_distance`
    pub fn along(origin: Vec3, direction: Vec3, max_distance: f32, max_cells: usize) -> Self {
        let cell = origin.floor().as_ivec3();
        let mut step = IVec3::ZERO;
        let mut t_max = Vec3::splat(f32::INFINITY);
        let mut t_delta = Vec3::splat(f32::INFINITY);

        // Zero components keep an infinite t_max so that axis is never chosen
        for axis in 0..3 {
            let d = direction[axis];
            if d > f32::EPSILON {
                step[axis] = 1;
                t_max[axis] = ((cell[axis] + 1) as f32 - origin[axis]) / d;
                t_delta[axis] = 1.0 / d;
            } else if d < -f32::EPSILON {
                step[axis] = -1;
                t_max[axis] = (cell[axis] as f32 - origin[axis]) / d;
                t_delta[axis] = -1.0 / d;
            }
        }

        Self {
            cell,
            step,
            t_max,
            t_delta,
            length: max_distance.max(0.0),
            remaining: max_cells,
            started: false,
            finished: max_cells == 0,
            truncated: max_cells == 0,
        }
    }

    /// Whether the walk stopped on the cell budget before reaching its end
    pub fn budget_exceeded(&self) -> bool {
        self.truncated
    }

    fn next_axis(&self) -> usize {
        let mut axis = 0;
        for candidate in 1..3 {
            if self.t_max[candidate] < self.t_max[axis] {
                axis = candidate;
            }
        }
        axis
    }
}

impl Iterator for GridTraversal {
    type Item = GridStep;

    fn next(&mut self) -> Option<GridStep> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.finished = true;
                // Only truncated if the segment actually leaves the start cell
                self.truncated = self.t_max.min_element() <= self.length;
            }
            return Some(GridStep {
                cell: self.cell,
                distance: 0.0,
                normal: IVec3::ZERO,
            });
        }

        let axis = self.next_axis();
        let distance = self.t_max[axis];
        if !distance.is_finite() || distance > self.length {
            self.finished = true;
            return None;
        }

        self.cell[axis] += self.step[axis];
        self.t_max[axis] += self.t_delta[axis];
        let mut normal = IVec3::ZERO;
        normal[axis] = -self.step[axis];

        self.remaining -= 1;
        if self.remaining == 0 {
            self.finished = true;
            self.truncated = self.t_max.min_element() <= self.length;
        }

        Some(GridStep {
            cell: self.cell,
            distance,
            normal,
        })
    }
}

/// A non-air block crossed by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Block coordinates
    pub cell: IVec3,
    /// Block state (the solid fallback if the lookup failed)
    pub block: BlockState,
    /// Distance along the ray at which the block was entered
    pub distance: f32,
    /// Outward normal of the entered face (zero for the start cell)
    pub normal: IVec3,
}

/// Lazy sequence of non-air blocks along a segment
///
/// Failed lookups are reported as [`BlockState::UNKNOWN`], which occludes
/// fully, so a broken world muffles sounds instead of leaking them.
pub struct VoxelRaycast<'w, W: BlockLookup + ?Sized> {
    traversal: GridTraversal,
    world: &'w W,
}

impl<W: BlockLookup + ?Sized> Clone for VoxelRaycast<'_, W> {
    fn clone(&self) -> Self {
        Self {
            traversal: self.traversal.clone(),
            world: self.world,
        }
    }
}

impl<'w, W: BlockLookup + ?Sized> VoxelRaycast<'w, W> {
    pub fn new(world: &'w W, traversal: GridTraversal) -> Self {
        Self { traversal, world }
    }

    /// Whether the cell budget cut the ray short
    pub fn budget_exceeded(&self) -> bool {
        self.traversal.budget_exceeded()
    }

    /// The underlying walk, for replaying the crossed cells
    pub fn traversal(&self) -> &GridTraversal {
        &self.traversal
    }
}

impl<W: BlockLookup + ?Sized> Iterator for VoxelRaycast<'_, W> {
    type Item = RayHit;

    fn next(&mut self) -> Option<RayHit> {
        for step in self.traversal.by_ref() {
            let block = match self.world.block(step.cell) {
                Ok(block) => block,
                Err(e) => {
                    debug!(cell = ?step.cell, error = %e, "Block lookup failed, treating as solid");
                    BlockState::UNKNOWN
                }
            };

            if block.is_air() {
                continue;
            }

            trace!(cell = ?step.cell, distance = step.distance, material = ?block.material, "Ray hit");
            return Some(RayHit {
                cell: step.cell,
                block,
                distance: step.distance,
                normal: step.normal,
            });
        }
        None
    }
}

/// Cast a ray between two points, yielding every non-air block crossed
pub fn cast_ray<W: BlockLookup + ?Sized>(
    world: &W,
    start: Vec3,
    end: Vec3,
    max_cells: usize,
) -> VoxelRaycast<'_, W> {
    VoxelRaycast::new(world, GridTraversal::new(start, end, max_cells))
}

/// First non-air block along a ray, ignoring the cell the ray starts in
pub fn first_hit<W: BlockLookup + ?Sized>(
    world: &W,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    max_cells: usize,
) -> Option<RayHit> {
    let traversal = GridTraversal::along(origin, direction, max_distance, max_cells);
    VoxelRaycast::new(world, traversal).find(|hit| hit.normal != IVec3::ZERO)
}

/// Whether nothing solid lies strictly between the cells of `from` and `to`
pub fn has_line_of_sight<W: BlockLookup + ?Sized>(
    world: &W,
    from: Vec3,
    to: Vec3,
    max_cells: usize,
) -> bool {
    let end_cell = to.floor().as_ivec3();
    let mut ray = cast_ray(world, from, to, max_cells);
    let blocked = ray
        .by_ref()
        .any(|hit| hit.normal != IVec3::ZERO && hit.cell != end_cell);
    !blocked && !ray.budget_exceeded()
}
