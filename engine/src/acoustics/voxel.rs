//! Voxel world capability consumed by the raycasters
//!
//! The host world implements [`BlockLookup`]. [`VoxelGrid`] is a small
//! in-memory world used by tests and the demo binary.

use crate::acoustics::material::Material;
use crate::error::WorldAccessError;
use glam::{IVec3, Vec3};
use std::collections::HashMap;

/// State of one voxel as seen by the acoustics engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockState {
    pub material: Material,
    /// Doors, trapdoors, fence gates and the like
    pub openable: bool,
    /// Current open state; meaningless unless `openable`
    pub open: bool,
}

impl BlockState {
    pub const AIR: BlockState = BlockState {
        material: Material::Air,
        openable: false,
        open: false,
    };

    /// Block reported when the world could not be queried
    pub const UNKNOWN: BlockState = BlockState {
        material: Material::Unknown,
        openable: false,
        open: false,
    };

    pub fn solid(material: Material) -> Self {
        Self {
            material,
            openable: false,
            open: false,
        }
    }

    pub fn openable(material: Material, open: bool) -> Self {
        Self {
            material,
            openable: true,
            open,
        }
    }

    pub fn is_air(&self) -> bool {
        self.material == Material::Air
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::AIR
    }
}

/// Block lookup capability provided by the host world
pub trait BlockLookup {
    /// State of the block at `pos`
    fn block(&self, pos: IVec3) -> Result<BlockState, WorldAccessError>;
}

impl<T: BlockLookup + ?Sized> BlockLookup for &T {
    fn block(&self, pos: IVec3) -> Result<BlockState, WorldAccessError> {
        (**self).block(pos)
    }
}

/// Unit block containing a world position
pub fn cell_of(position: Vec3) -> IVec3 {
    position.floor().as_ivec3()
}

/// Center of a unit block
pub fn cell_center(cell: IVec3) -> Vec3 {
    cell.as_vec3() + Vec3::splat(0.5)
}

/// Sparse in-memory voxel world
///
/// Absent cells are air. When bounds are set, lookups outside them fail with
/// [`WorldAccessError::Unloaded`], which mimics unloaded chunks.
#[derive(Debug, Clone, Default)]
pub struct VoxelGrid {
    blocks: HashMap<IVec3, BlockState>,
    bounds: Option<(IVec3, IVec3)>,
}

impl VoxelGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict lookups to the inclusive box `min..=max`
    pub fn with_bounds(mut self, min: IVec3, max: IVec3) -> Self {
        self.bounds = Some((min.min(max), min.max(max)));
        self
    }

    /// Set a block; air removes the entry
    pub fn set(&mut self, pos: IVec3, state: BlockState) {
        if state.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, state);
        }
    }

    /// Fill the inclusive box `min..=max`
    pub fn fill(&mut self, min: IVec3, max: IVec3, state: BlockState) {
        let (lo, hi) = (min.min(max), min.max(max));
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    self.set(IVec3::new(x, y, z), state);
                }
            }
        }
    }

    /// Build a closed shell of `material` around the inclusive air box `min..=max`
    pub fn hollow_box(&mut self, min: IVec3, max: IVec3, material: Material) {
        let (lo, hi) = (min.min(max) - IVec3::ONE, min.max(max) + IVec3::ONE);
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let on_shell = x == lo.x
                        || x == hi.x
                        || y == lo.y
                        || y == hi.y
                        || z == lo.z
                        || z == hi.z;
                    let state = if on_shell {
                        BlockState::solid(material)
                    } else {
                        BlockState::AIR
                    };
                    self.set(IVec3::new(x, y, z), state);
                }
            }
        }
    }

    /// Flip the open state of an openable block; returns the new state
    pub fn toggle_open(&mut self, pos: IVec3) -> Option<bool> {
        let block = self.blocks.get_mut(&pos)?;
        if !block.openable {
            return None;
        }
        block.open = !block.open;
        Some(block.open)
    }

    /// Number of non-air blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockLookup for VoxelGrid {
    fn block(&self, pos: IVec3) -> Result<BlockState, WorldAccessError> {
        if let Some((min, max)) = self.bounds {
            if pos.cmplt(min).any() || pos.cmpgt(max).any() {
                return Err(WorldAccessError::Unloaded(pos));
            }
        }
        Ok(self.blocks.get(&pos).copied().unwrap_or(BlockState::AIR))
    }
}
