//! Engine facade tying the scheduler, caches and renderer together

use crate::acoustics::components::{SoundHandle, Submersion, TrackedSoundId};
use crate::acoustics::debug::{draw_acoustics_debug, AcousticDebugSettings, DebugLine, SoundMarker};
use crate::acoustics::listener::ListenerState;
use crate::acoustics::renderer::{AudioBinding, SoundRenderer};
use crate::acoustics::reverb::ReverbEstimate;
use crate::acoustics::system::{AcousticScheduler, AcousticStats};
use crate::acoustics::voxel::BlockLookup;
use crate::config::AcousticsConfig;
use crate::error::AcousticsError;
use glam::{IVec3, Vec3};
use tracing::{debug, info};

/// Acoustic simulation engine driving an audio host through `B`
///
/// Single-threaded and tick-driven: call [`AcousticEngine::tick`] once per
/// fixed game tick and forward block changes through
/// [`AcousticEngine::invalidate_cell`].
pub struct AcousticEngine<B: AudioBinding> {
    config: AcousticsConfig,
    scheduler: AcousticScheduler,
    renderer: SoundRenderer,
    binding: B,
    last_tick: u64,
}

impl<B: AudioBinding> AcousticEngine<B> {
    /// Validate the configuration and build the engine
    pub fn new(config: AcousticsConfig, binding: B) -> Result<Self, AcousticsError> {
        config.validate()?;
        info!(
            rays = config.reverb.ray_count,
            bounces = config.reverb.bounce_count,
            budget = config.scheduler.max_raycasts_per_tick,
            "Initializing acoustics engine"
        );

        let scheduler = AcousticScheduler::new(&config);
        let renderer = SoundRenderer::new(config.smoothing.clone(), config.submersion.clone());
        Ok(Self {
            config,
            scheduler,
            renderer,
            binding,
            last_tick: 0,
        })
    }

    pub fn register_sound(&mut self, handle: SoundHandle, position: Vec3, positional: bool) -> TrackedSoundId {
        self.renderer.register(handle, position, positional, self.last_tick)
    }

    /// Stop tracking a sound; it is released on the next tick
    pub fn unregister_sound(&mut self, id: TrackedSoundId) -> bool {
        self.renderer.unregister(id)
    }

    pub fn update_position(&mut self, id: TrackedSoundId, position: Vec3) -> bool {
        self.renderer.update_position(id, position, self.last_tick)
    }

    /// Run the scheduler pass, then advance every sound's smoothing by one step
    pub fn tick<W: BlockLookup + ?Sized>(&mut self, listener: &ListenerState, world: &W, now: u64) {
        self.last_tick = now;
        self.scheduler
            .run(listener, world, &mut self.renderer, &mut self.binding, now);
        let render = self.renderer.tick(&mut self.binding, now);
        if render.activated > 0 || render.disposed > 0 {
            debug!(
                activated = render.activated,
                disposed = render.disposed,
                tracked = self.renderer.len(),
                "Acoustics tick"
            );
        }
    }

    /// Forward a block change at `(x, y, z)`
    pub fn invalidate_cell(&mut self, x: i32, y: i32, z: i32) -> usize {
        self.scheduler.invalidate_cell(IVec3::new(x, y, z))
    }

    /// Environment sample at an arbitrary point, bypassing the cache
    pub fn reverb_estimate_for_debug<W: BlockLookup + ?Sized>(
        &self,
        listener_pos: Vec3,
        world: &W,
    ) -> ReverbEstimate {
        self.scheduler.reverb_estimate(listener_pos, world)
    }

    /// Apply a medium override right away instead of waiting for the next tick
    pub fn set_submersion(&mut self, submersion: Submersion) {
        self.renderer.set_submersion(submersion);
    }

    pub fn current_reverb(&self) -> ReverbEstimate {
        self.scheduler.current_reverb()
    }

    pub fn stats(&self) -> AcousticStats {
        let mut stats = self.scheduler.stats();
        stats.tracked_sounds = self.renderer.len();
        stats
    }

    pub fn config(&self) -> &AcousticsConfig {
        &self.config
    }

    pub fn renderer(&self) -> &SoundRenderer {
        &self.renderer
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut B {
        &mut self.binding
    }

    /// Overlay of sound paths and, when enabled, the listener's reverb rays
    pub fn debug_lines<W: BlockLookup + ?Sized>(
        &self,
        listener: &ListenerState,
        world: &W,
        settings: &AcousticDebugSettings,
    ) -> Vec<DebugLine> {
        let markers: Vec<SoundMarker> = self
            .renderer
            .sounds()
            .iter()
            .filter_map(|view| self.renderer.get(view.id))
            .map(|sound| SoundMarker {
                position: sound.position,
                filter: sound.current_filter,
                positional: sound.positional,
            })
            .collect();

        let segments = if settings.show_reverb_rays {
            self.scheduler
                .raytracer()
                .calculate_with_paths(listener.position, listener.position, world)
                .1
        } else {
            Vec::new()
        };

        draw_acoustics_debug(listener.position, &markers, &segments, settings)
    }
}
