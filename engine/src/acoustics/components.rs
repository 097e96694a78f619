//! Per-sound components stored in the renderer registry

use crate::acoustics::occlusion::direct_gain;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Opaque identity of a sound object owned by the audio host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundHandle(pub u64);

/// Registry identity of a tracked sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedSoundId(pub(crate) hecs::Entity);

impl TrackedSoundId {
    pub fn to_bits(self) -> u64 {
        self.0.to_bits().get()
    }
}

/// Lifecycle of a tracked sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundLifecycle {
    /// Waiting for the audio host to create the source
    Registering,
    /// Filter and pitch are being driven every tick
    Active,
    /// Scheduled for removal at the end of the tick
    Disposing,
}

/// Listener medium overriding every sound's filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum Submersion {
    #[default]
    None,
    Water,
    Lava,
}

/// Lowpass parameters pushed to the audio host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Direct-path gain in [0, 1]
    pub gain: f32,
    /// High-frequency gain in [0, 1] (1.0 = unfiltered)
    pub cutoff: f32,
}

impl FilterParams {
    pub const UNFILTERED: FilterParams = FilterParams {
        gain: 1.0,
        cutoff: 1.0,
    };

    /// Parameters for a smoothed filter value
    pub fn from_filter(filter: f32) -> Self {
        Self {
            gain: direct_gain(filter),
            cutoff: filter.clamp(0.0, 1.0),
        }
    }
}

/// Registry record of one sound
#[derive(Debug, Clone)]
pub struct TrackedSound {
    pub handle: SoundHandle,
    pub position: Vec3,
    /// Whether occlusion applies at all
    pub positional: bool,
    pub lifecycle: SoundLifecycle,
    /// Per-sound perturbation of the filter mapping in [-1, 1]
    pub variation: f32,
    /// Filter from the latest occlusion result, before submersion
    pub occlusion_target: f32,
    /// Effective filter target after submersion
    pub target_filter: f32,
    pub current_filter: f32,
    pub target_pitch: f32,
    pub current_pitch: f32,
    /// Values last sent to the host; `None` until the first push
    pub pushed_filter: Option<f32>,
    pub pushed_pitch: Option<f32>,
    /// Tick of registration or of the last host position update
    pub last_update: u64,
    /// Position changed since the last occlusion target was stored
    pub moved: bool,
    /// Position not yet sent to the host
    pub position_dirty: bool,
}

impl TrackedSound {
    pub fn new(handle: SoundHandle, position: Vec3, positional: bool, variation: f32, now: u64) -> Self {
        Self {
            handle,
            position,
            positional,
            lifecycle: SoundLifecycle::Registering,
            variation,
            occlusion_target: 1.0,
            target_filter: 1.0,
            current_filter: 1.0,
            target_pitch: 0.0,
            current_pitch: 0.0,
            pushed_filter: None,
            pushed_pitch: None,
            last_update: now,
            moved: true,
            position_dirty: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == SoundLifecycle::Active
    }
}
