//! Block-based sound occlusion
//!
//! A single grid ray from the sound to the listener accumulates the occlusion
//! of every block it crosses. The sum is then mapped to a lowpass filter value.

use crate::acoustics::material::MaterialTable;
use crate::acoustics::raycast::cast_ray;
use crate::acoustics::voxel::{cell_of, BlockLookup};
use crate::config::OcclusionConfig;
use glam::{IVec3, Vec3};
use tracing::{debug, trace};

/// Result of an occlusion calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcclusionSample {
    /// Occlusion clamped to `[0, max_occlusion]` (0 = unobstructed)
    pub occlusion: f32,
    /// Unclamped sum of block occlusion up to the point the ray stopped
    pub raw_sum: f32,
    /// The ray ran out of cell budget and was treated as fully occluded
    pub saturated: bool,
}

impl OcclusionSample {
    /// Unobstructed path
    pub const CLEAR: OcclusionSample = OcclusionSample {
        occlusion: 0.0,
        raw_sum: 0.0,
        saturated: false,
    };

    /// Fully occluded at the given ceiling
    pub fn saturated(max_occlusion: f32) -> Self {
        Self {
            occlusion: max_occlusion,
            raw_sum: max_occlusion,
            saturated: true,
        }
    }
}

/// Computes occlusion between sounds and the listener
#[derive(Debug, Clone)]
pub struct OcclusionCalculator {
    config: OcclusionConfig,
    materials: MaterialTable,
}

impl OcclusionCalculator {
    pub fn new(config: OcclusionConfig, materials: MaterialTable) -> Self {
        Self { config, materials }
    }

    pub fn config(&self) -> &OcclusionConfig {
        &self.config
    }

    /// Occlusion between a sound and the listener
    pub fn calculate<W: BlockLookup + ?Sized>(
        &self,
        sound_pos: Vec3,
        listener_pos: Vec3,
        world: &W,
    ) -> OcclusionSample {
        self.calculate_with_dependencies(sound_pos, listener_pos, world)
            .0
    }

    /// Occlusion plus every cell the ray crossed, air included
    ///
    /// Any block change in one of the returned cells can change the result.
    pub fn calculate_with_dependencies<W: BlockLookup + ?Sized>(
        &self,
        sound_pos: Vec3,
        listener_pos: Vec3,
        world: &W,
    ) -> (OcclusionSample, Vec<IVec3>) {
        let source_cell = cell_of(sound_pos);
        if sound_pos.distance(listener_pos) < self.config.colocated_epsilon {
            return (OcclusionSample::CLEAR, vec![source_cell]);
        }

        let mut ray = cast_ray(world, sound_pos, listener_pos, self.config.max_ray_cells);
        let dependencies: Vec<IVec3> = ray.traversal().clone().map(|step| step.cell).collect();

        let mut sum = 0.0;
        for hit in ray.by_ref() {
            if self.config.skip_source_block && hit.cell == source_cell {
                continue;
            }

            let block_occlusion = self
                .materials
                .block_occlusion(&hit.block, self.config.open_occlusion_factor);
            sum += block_occlusion;
            trace!(
                cell = ?hit.cell,
                material = ?hit.block.material,
                block_occlusion,
                sum,
                "Occluding block"
            );

            if sum >= self.config.max_occlusion {
                break;
            }
        }

        if ray.budget_exceeded() && sum < self.config.max_occlusion {
            debug!(
                sound = ?sound_pos,
                listener = ?listener_pos,
                max_cells = self.config.max_ray_cells,
                "Occlusion ray exceeded cell budget, treating as fully occluded"
            );
            return (
                OcclusionSample::saturated(self.config.max_occlusion),
                dependencies,
            );
        }

        let sample = OcclusionSample {
            occlusion: sum.clamp(0.0, self.config.max_occlusion),
            raw_sum: sum,
            saturated: false,
        };
        (sample, dependencies)
    }

    /// Map accumulated occlusion to a lowpass value in `[min_filter, 1.0]`
    ///
    /// `variation` in `[-1, 1]` comes from [`variation_for`] and must stay fixed
    /// for a given sound. The mapping is non-increasing in `occlusion` for any
    /// fixed variation and equals 1.0 at zero occlusion.
    pub fn occlusion_to_filter(&self, occlusion: f32, variation: f32) -> f32 {
        let floor = self.config.min_filter;
        let scale = 1.0 + variation.clamp(-1.0, 1.0) * self.config.variation_strength;
        let attenuation = (-occlusion.max(0.0) * self.config.absorption * scale).exp();
        (1.0 - (1.0 - floor) * (1.0 - attenuation)).clamp(floor, 1.0)
    }
}

/// Direct-path gain that accompanies a lowpass value
pub fn direct_gain(filter: f32) -> f32 {
    filter.clamp(0.0, 1.0).powf(0.1)
}

/// Deterministic per-identity variation in `[-1, 1]`
pub fn variation_for(identity: u64) -> f32 {
    // splitmix64 finalizer
    let mut z = identity.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    let unit = (z >> 40) as f32 / (1u64 << 24) as f32;
    unit * 2.0 - 1.0
}
