//! Acoustic scheduler
//!
//! Runs once per tick before the renderer: samples the listener's environment
//! reverb, then walks every tracked sound, serving occlusion from the spatial
//! cache and spending the per-tick raycast budget on misses.

use crate::acoustics::cache::{CacheStats, DistanceBand, RefreshPolicy, SpatialCache};
use crate::acoustics::listener::ListenerState;
use crate::acoustics::material::MaterialTable;
use crate::acoustics::occlusion::{OcclusionCalculator, OcclusionSample};
use crate::acoustics::renderer::{AudioBinding, SoundRenderer};
use crate::acoustics::reverb::{AcousticRaytracer, ReverbEstimate};
use crate::acoustics::voxel::BlockLookup;
use crate::config::{AcousticsConfig, DistanceBands, SchedulerConfig};
use glam::{IVec3, Vec3};
use tracing::{debug, trace};

/// Counters describing scheduler activity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcousticStats {
    /// Scheduler passes run so far
    pub ticks: u64,
    /// Sounds tracked at the end of the last tick
    pub tracked_sounds: usize,
    /// Occlusion raycasts spent in the last tick
    pub raycasts_last_tick: usize,
    pub raycasts_total: u64,
    /// Cache misses left for a later tick because the budget ran out
    pub deferred_last_tick: usize,
    /// Sounds beyond the far band in the last tick
    pub out_of_range_last_tick: usize,
    /// Environment samples actually traced
    pub reverb_samples: u64,
    pub occlusion_cache: CacheStats,
    pub reverb_cache: CacheStats,
}

/// Time-sliced driver of occlusion and reverb computation
pub struct AcousticScheduler {
    occlusion: OcclusionCalculator,
    raytracer: AcousticRaytracer,
    occlusion_cache: SpatialCache<OcclusionSample>,
    reverb_cache: SpatialCache<ReverbEstimate>,
    bands: DistanceBands,
    config: SchedulerConfig,
    maintenance_interval: u64,
    cursor: usize,
    last_listener_cell: Option<IVec3>,
    current_reverb: ReverbEstimate,
    reverb_pushed: bool,
    stats: AcousticStats,
}

impl AcousticScheduler {
    pub fn new(config: &AcousticsConfig) -> Self {
        let materials = MaterialTable::with_overrides(&config.materials);
        let cache = &config.cache;
        Self {
            occlusion: OcclusionCalculator::new(config.occlusion.clone(), materials.clone()),
            raytracer: AcousticRaytracer::new(config.reverb.clone(), materials),
            occlusion_cache: SpatialCache::new(
                config.cell_size,
                RefreshPolicy::from(cache),
                cache.max_entries,
                cache.max_entry_age,
            ),
            reverb_cache: SpatialCache::new(
                config.cell_size,
                RefreshPolicy::uniform(cache.reverb_refresh_ticks),
                cache.max_entries,
                cache.max_entry_age,
            ),
            bands: config.bands,
            config: config.scheduler.clone(),
            maintenance_interval: cache.maintenance_interval,
            cursor: 0,
            last_listener_cell: None,
            current_reverb: ReverbEstimate::outdoor(&config.reverb),
            reverb_pushed: false,
            stats: AcousticStats::default(),
        }
    }

    /// One scheduler pass: environment reverb, then every sound's target
    pub fn run<W, B>(
        &mut self,
        listener: &ListenerState,
        world: &W,
        renderer: &mut SoundRenderer,
        binding: &mut B,
        now: u64,
    ) where
        W: BlockLookup + ?Sized,
        B: AudioBinding + ?Sized,
    {
        let listener_cell = self.occlusion_cache.cell_for(listener.position);
        let listener_moved = self.last_listener_cell != Some(listener_cell);
        if listener_moved {
            debug!(cell = ?listener_cell, "Listener entered new cell");
        }
        self.last_listener_cell = Some(listener_cell);

        // Targets were recombined when the medium changed; the occlusion
        // targets below are combined with it as they are written
        renderer.set_submersion(listener.submersion);
        if renderer.take_submersion_changed() {
            debug!(submersion = ?listener.submersion, "Recomputing all targets for new medium");
        }

        if self.config.reverb_enabled {
            self.update_reverb(listener, world, binding, now);
        }

        let sounds = renderer.sounds();
        let count = sounds.len();
        let start = if count == 0 { 0 } else { self.cursor % count };
        let mut raycasts = 0;
        let mut deferred = 0;
        let mut out_of_range = 0;
        let mut first_deferred = None;

        for offset in 0..count {
            let index = (start + offset) % count;
            let sound = &sounds[index];

            if !sound.positional {
                renderer.set_occlusion_target(sound.id, 1.0);
                continue;
            }

            let distance = sound.position.distance(listener.position);
            let Some(band) = DistanceBand::classify(distance, &self.bands) else {
                let max = self.occlusion.config().max_occlusion;
                let filter = self.occlusion.occlusion_to_filter(max, sound.variation);
                renderer.set_occlusion_target(sound.id, filter);
                out_of_range += 1;
                continue;
            };

            let key = self.occlusion_cache.cell_for(sound.position);
            let has_budget = raycasts < self.config.max_raycasts_per_tick;
            // A sound that moved inside its cell recomputes while the budget allows
            let cached = if sound.moved && has_budget {
                None
            } else {
                self.occlusion_cache.get(key, band, listener_cell, now)
            };
            let sample = match cached {
                Some(sample) => sample,
                None if has_budget => {
                    let (sample, dependencies) = self.occlusion.calculate_with_dependencies(
                        sound.position,
                        listener.position,
                        world,
                    );
                    self.occlusion_cache
                        .put(key, band, listener_cell, now, sample, dependencies);
                    raycasts += 1;
                    sample
                }
                None => {
                    deferred += 1;
                    first_deferred.get_or_insert(index);
                    continue;
                }
            };

            let filter = self
                .occlusion
                .occlusion_to_filter(sample.occlusion, sound.variation);
            trace!(
                sound = sound.id.to_bits(),
                band = ?band,
                occlusion = sample.occlusion,
                filter,
                "Occlusion target"
            );
            renderer.set_occlusion_target(sound.id, filter);
        }

        self.cursor = first_deferred.unwrap_or(0);
        if deferred > 0 {
            debug!(deferred, raycasts, "Raycast budget exhausted, deferring sounds");
        }

        if self.maintenance_interval > 0 && now % self.maintenance_interval == 0 {
            self.occlusion_cache.evict_expired(now);
            self.reverb_cache.evict_expired(now);
        }

        self.stats.ticks += 1;
        self.stats.tracked_sounds = count;
        self.stats.raycasts_last_tick = raycasts;
        self.stats.raycasts_total += raycasts as u64;
        self.stats.deferred_last_tick = deferred;
        self.stats.out_of_range_last_tick = out_of_range;
        self.stats.occlusion_cache = self.occlusion_cache.stats();
        self.stats.reverb_cache = self.reverb_cache.stats();
    }

    fn update_reverb<W, B>(&mut self, listener: &ListenerState, world: &W, binding: &mut B, now: u64)
    where
        W: BlockLookup + ?Sized,
        B: AudioBinding + ?Sized,
    {
        let key = self.reverb_cache.cell_for(listener.position);
        let estimate = match self.reverb_cache.get(key, DistanceBand::Near, key, now) {
            Some(estimate) => estimate,
            None => {
                let (estimate, surfaces) = self.raytracer.calculate_with_dependencies(
                    listener.position,
                    listener.position,
                    world,
                );
                self.reverb_cache
                    .put(key, DistanceBand::Near, key, now, estimate, surfaces);
                self.stats.reverb_samples += 1;
                estimate
            }
        };

        if !self.reverb_pushed || estimate != self.current_reverb {
            binding.apply_reverb(&estimate);
            self.reverb_pushed = true;
        }
        self.current_reverb = estimate;
    }

    /// Invalidate cached results depending on a block; returns entries touched
    pub fn invalidate_cell(&mut self, block: IVec3) -> usize {
        self.occlusion_cache.invalidate_cell(block) + self.reverb_cache.invalidate_cell(block)
    }

    /// Uncached environment sample at an arbitrary point
    pub fn reverb_estimate<W: BlockLookup + ?Sized>(&self, position: Vec3, world: &W) -> ReverbEstimate {
        self.raytracer.calculate(position, position, world)
    }

    pub fn current_reverb(&self) -> ReverbEstimate {
        self.current_reverb
    }

    pub fn stats(&self) -> AcousticStats {
        self.stats
    }

    pub fn occlusion(&self) -> &OcclusionCalculator {
        &self.occlusion
    }

    pub fn raytracer(&self) -> &AcousticRaytracer {
        &self.raytracer
    }

    pub fn occlusion_cache(&self) -> &SpatialCache<OcclusionSample> {
        &self.occlusion_cache
    }
}
