//! Voxel acoustics engine
//!
//! This crate computes sound occlusion and environmental reverb inside a
//! voxel world and drives a host audio engine's per-source filters with
//! smoothed, cached results.

pub mod acoustics;
pub mod config;
pub mod error;

// Re-export commonly used types
pub mod prelude {
    pub use crate::acoustics::{
        AcousticEngine, AcousticStats, AudioBinding, BlockLookup, BlockState, FilterParams,
        ListenerState, Material, MaterialProperties, ReverbEstimate, ReverbSlot, SoundHandle,
        Submersion, TrackedSoundId, VoxelGrid,
    };
    pub use crate::config::AcousticsConfig;
    pub use crate::error::{AcousticsError, ConfigError, WorldAccessError};

    // Math types
    pub use glam::{IVec3, Vec3};
}

/// Initialize logging for the engine
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,voxel_acoustics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
