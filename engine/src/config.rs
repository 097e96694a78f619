//! Configuration types for the acoustics engine
//!
//! The configuration is a static structure handed to
//! [`crate::acoustics::AcousticEngine::new`]. It is validated once and never
//! mutated while the engine runs.

use crate::acoustics::material::{Material, MaterialProperties};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Root configuration for the acoustics engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcousticsConfig {
    /// Edge length of a cache cell in world units
    pub cell_size: f32,
    /// Distance thresholds classifying sounds into near/mid/far
    pub bands: DistanceBands,
    pub occlusion: OcclusionConfig,
    pub reverb: ReverbConfig,
    pub cache: CacheConfig,
    pub smoothing: SmoothingConfig,
    pub scheduler: SchedulerConfig,
    pub submersion: SubmersionConfig,
    /// Per-material overrides applied on top of the built-in table
    pub materials: HashMap<Material, MaterialProperties>,
}

impl Default for AcousticsConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            bands: DistanceBands::default(),
            occlusion: OcclusionConfig::default(),
            reverb: ReverbConfig::default(),
            cache: CacheConfig::default(),
            smoothing: SmoothingConfig::default(),
            scheduler: SchedulerConfig::default(),
            submersion: SubmersionConfig::default(),
            materials: HashMap::new(),
        }
    }
}

/// Distance thresholds (world units) for the near/mid/far bands
///
/// Sounds further than `far` are treated as out of range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceBands {
    pub near: f32,
    pub mid: f32,
    pub far: f32,
}

impl Default for DistanceBands {
    fn default() -> Self {
        Self {
            near: 8.0,
            mid: 24.0,
            far: 64.0,
        }
    }
}

/// Occlusion raycast and filter mapping parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    /// Maximum number of cells a single occlusion ray may visit
    pub max_ray_cells: usize,
    /// Ceiling for accumulated occlusion; also the saturation value
    pub max_occlusion: f32,
    /// Scale applied to occlusion inside the exponential filter mapping
    pub absorption: f32,
    /// Lowest filter value an occluded sound can reach
    pub min_filter: f32,
    /// Relative per-sound perturbation of the mapping, in [0, 1)
    pub variation_strength: f32,
    /// Multiplier on an openable block's occlusion while it is open
    pub open_occlusion_factor: f32,
    /// Sound and listener closer than this are never occluded
    pub colocated_epsilon: f32,
    /// Ignore the block the sound is emitted from
    pub skip_source_block: bool,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            max_ray_cells: 256,
            max_occlusion: 10.0,
            absorption: 1.0,
            min_filter: 0.1,
            variation_strength: 0.05,
            open_occlusion_factor: 0.1,
            colocated_epsilon: 0.05,
            skip_source_block: true,
        }
    }
}

/// Environment raytracing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Rays cast per environment sample
    pub ray_count: usize,
    /// Reflections followed per ray
    pub bounce_count: usize,
    /// A segment longer than this escapes into open air
    pub max_ray_distance: f32,
    /// Cell budget per traced segment
    pub max_segment_cells: usize,
    /// Outdoor decay time in seconds
    pub min_decay_time: f32,
    /// Upper bound for the long slot decay time in seconds
    pub max_decay_time: f32,
    /// Medium slot decay as a fraction of the long slot
    pub medium_decay_ratio: f32,
    /// Short slot decay as a fraction of the long slot
    pub short_decay_ratio: f32,
    /// Cumulative path length below which energy lands in the short slot
    pub short_path_length: f32,
    /// Cumulative path length below which energy lands in the medium slot
    pub medium_path_length: f32,
    /// Offset off a struck face before the reflected segment starts
    pub surface_offset: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            ray_count: 32,
            bounce_count: 4,
            max_ray_distance: 64.0,
            max_segment_cells: 128,
            min_decay_time: 0.1,
            max_decay_time: 2.5,
            medium_decay_ratio: 0.45,
            short_decay_ratio: 0.15,
            short_path_length: 8.0,
            medium_path_length: 24.0,
            surface_offset: 0.01,
        }
    }
}

/// Spatial result cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Ticks a near-band result stays fresh
    pub near_refresh_ticks: u64,
    /// Ticks a mid-band result stays fresh
    pub mid_refresh_ticks: u64,
    /// Ticks a far-band result stays fresh
    pub far_refresh_ticks: u64,
    /// Ticks the listener reverb sample stays fresh
    pub reverb_refresh_ticks: u64,
    /// Entries older than this are evicted during maintenance
    pub max_entry_age: u64,
    /// Hard cap on the number of entries per cache
    pub max_entries: usize,
    /// Ticks between maintenance passes
    pub maintenance_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            near_refresh_ticks: 1,
            mid_refresh_ticks: 5,
            far_refresh_ticks: 20,
            reverb_refresh_ticks: 10,
            max_entry_age: 600,
            max_entries: 4096,
            maintenance_interval: 100,
        }
    }
}

/// Filter smoothing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Largest change of the filter value in a single tick
    pub max_filter_step: f32,
    /// Largest change of the pitch offset in a single tick
    pub max_pitch_step: f32,
    /// Minimum change since the last push before the binding is called again
    pub push_epsilon: f32,
    /// Active sounds without an update for this many ticks are disposed (0 disables)
    pub sound_timeout_ticks: u64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            max_filter_step: 0.1,
            max_pitch_step: 0.02,
            push_epsilon: 0.001,
            sound_timeout_ticks: 0,
        }
    }
}

/// Scheduler time-slicing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on occlusion raycasts per tick
    pub max_raycasts_per_tick: usize,
    /// Disable the listener environment sample entirely
    pub reverb_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_raycasts_per_tick: 64,
            reverb_enabled: true,
        }
    }
}

/// Override targets applied while the listener is submerged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmersionConfig {
    pub water_filter: f32,
    pub water_pitch_offset: f32,
    pub lava_filter: f32,
    pub lava_pitch_offset: f32,
}

impl Default for SubmersionConfig {
    fn default() -> Self {
        Self {
            water_filter: 0.25,
            water_pitch_offset: -0.1,
            lava_filter: 0.1,
            lava_pitch_offset: -0.15,
        }
    }
}

impl AcousticsConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = ?path, "Loading acoustics config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Check every value the engine relies on for its invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("cell_size", self.cell_size)?;

        let DistanceBands { near, mid, far } = self.bands;
        if !(near > 0.0 && near < mid && mid < far) {
            return Err(ConfigError::UnorderedBands { near, mid, far });
        }

        let occlusion = &self.occlusion;
        positive("occlusion.max_occlusion", occlusion.max_occlusion)?;
        positive("occlusion.absorption", occlusion.absorption)?;
        unit_open("occlusion.min_filter", occlusion.min_filter)?;
        unit_open("occlusion.variation_strength", occlusion.variation_strength)?;
        unit_closed(
            "occlusion.open_occlusion_factor",
            occlusion.open_occlusion_factor,
        )?;
        if occlusion.max_ray_cells == 0 {
            return Err(ConfigError::OutOfRange {
                field: "occlusion.max_ray_cells",
                expected: "at least 1",
                value: 0.0,
            });
        }

        let reverb = &self.reverb;
        if reverb.ray_count == 0 {
            return Err(ConfigError::OutOfRange {
                field: "reverb.ray_count",
                expected: "at least 1",
                value: 0.0,
            });
        }
        if reverb.bounce_count == 0 {
            return Err(ConfigError::OutOfRange {
                field: "reverb.bounce_count",
                expected: "at least 1",
                value: 0.0,
            });
        }
        positive("reverb.max_ray_distance", reverb.max_ray_distance)?;
        positive("reverb.min_decay_time", reverb.min_decay_time)?;
        if reverb.max_decay_time < reverb.min_decay_time {
            return Err(ConfigError::OutOfRange {
                field: "reverb.max_decay_time",
                expected: "at least reverb.min_decay_time",
                value: reverb.max_decay_time,
            });
        }
        unit_closed("reverb.medium_decay_ratio", reverb.medium_decay_ratio)?;
        unit_closed("reverb.short_decay_ratio", reverb.short_decay_ratio)?;

        positive("smoothing.max_filter_step", self.smoothing.max_filter_step)?;
        positive("smoothing.max_pitch_step", self.smoothing.max_pitch_step)?;

        unit_closed("submersion.water_filter", self.submersion.water_filter)?;
        unit_closed("submersion.lava_filter", self.submersion.lava_filter)?;

        for properties in self.materials.values() {
            unit_closed("materials.reflectivity", properties.reflectivity)?;
            if properties.occlusion < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field: "materials.occlusion",
                    expected: "non-negative",
                    value: properties.occlusion,
                });
            }
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "a positive number",
            value,
        })
    }
}

fn unit_open(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "in [0, 1)",
            value,
        })
    }
}

fn unit_closed(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "in [0, 1]",
            value,
        })
    }
}
