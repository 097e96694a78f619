//! Voxel acoustic simulation
//!
//! This module computes how sounds are heard inside a voxel world:
//! - Grid raycasting through unit blocks
//! - Material-based occlusion mapped to a lowpass filter
//! - Multi-bounce environment raytracing for reverb
//! - A spatial result cache with per-block invalidation
//! - A per-sound state machine smoothing filters toward their targets

pub mod cache;
pub mod components;
pub mod debug;
pub mod engine;
pub mod listener;
pub mod material;
pub mod occlusion;
pub mod raycast;
pub mod renderer;
pub mod reverb;
pub mod system;
pub mod voxel;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::{CacheStats, CellState, DistanceBand, SpatialCache};
pub use components::{FilterParams, SoundHandle, SoundLifecycle, Submersion, TrackedSoundId};
pub use debug::{AcousticDebugSettings, DebugLine};
pub use engine::AcousticEngine;
pub use listener::ListenerState;
pub use material::{Material, MaterialProperties, MaterialTable};
pub use occlusion::{OcclusionCalculator, OcclusionSample};
pub use raycast::{cast_ray, GridTraversal, RayHit, VoxelRaycast};
pub use renderer::{AudioBinding, SoundRenderer};
pub use reverb::{AcousticRaytracer, ReverbEstimate, ReverbSlot};
pub use system::{AcousticScheduler, AcousticStats};
pub use voxel::{BlockLookup, BlockState, VoxelGrid};
