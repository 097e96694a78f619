//! Per-sound filter state machine
//!
//! The renderer owns every [`TrackedSound`] in a `hecs` registry. The
//! scheduler writes occlusion targets into it; once per tick the renderer
//! walks each sound through its lifecycle, moves the audible filter and pitch
//! a bounded step toward their targets and pushes changed values to the host
//! through [`AudioBinding`].

use crate::acoustics::components::{
    FilterParams, SoundHandle, SoundLifecycle, Submersion, TrackedSound, TrackedSoundId,
};
use crate::acoustics::occlusion::variation_for;
use crate::acoustics::reverb::ReverbEstimate;
use crate::config::{SmoothingConfig, SubmersionConfig};
use glam::Vec3;
use tracing::{debug, info, trace};

/// Capability the host audio engine provides for driving sound sources
pub trait AudioBinding {
    /// The host has created the source and it accepts parameters
    fn is_playable(&self, handle: SoundHandle) -> bool;

    /// The source finished or was stopped by the host
    fn is_stopped(&self, handle: SoundHandle) -> bool;

    fn set_filter(&mut self, handle: SoundHandle, params: FilterParams);

    /// Pitch offset relative to the sound's own pitch
    fn set_pitch(&mut self, handle: SoundHandle, offset: f32);

    fn set_position(&mut self, handle: SoundHandle, position: Vec3);

    /// Environment reverb around the listener, pushed once per tick
    fn apply_reverb(&mut self, _estimate: &ReverbEstimate) {}
}

/// Read-only view of a sound handed to the scheduler
#[derive(Debug, Clone, Copy)]
pub struct SoundView {
    pub id: TrackedSoundId,
    pub position: Vec3,
    pub positional: bool,
    pub variation: f32,
    /// Position changed since the last occlusion target; cached samples for its cell are stale
    pub moved: bool,
}

/// What happened during one renderer tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTick {
    pub activated: usize,
    pub disposed: usize,
    pub filter_pushes: usize,
    pub pitch_pushes: usize,
}

/// Registry of tracked sounds and their smoothing state
pub struct SoundRenderer {
    registry: hecs::World,
    smoothing: SmoothingConfig,
    submersion_config: SubmersionConfig,
    submersion: Submersion,
    submersion_changed: bool,
}

impl SoundRenderer {
    pub fn new(smoothing: SmoothingConfig, submersion_config: SubmersionConfig) -> Self {
        Self {
            registry: hecs::World::new(),
            smoothing,
            submersion_config,
            submersion: Submersion::None,
            submersion_changed: false,
        }
    }

    /// Start tracking a sound; it stays `Registering` until the host can play it
    pub fn register(
        &mut self,
        handle: SoundHandle,
        position: Vec3,
        positional: bool,
        now: u64,
    ) -> TrackedSoundId {
        let mut sound = TrackedSound::new(handle, position, positional, variation_for(handle.0), now);
        let (filter, pitch) = self.submersion_targets();
        sound.target_filter = sound.occlusion_target.min(filter);
        sound.target_pitch = pitch;

        let entity = self.registry.spawn((sound,));
        debug!(handle = handle.0, ?position, positional, "Registered sound");
        TrackedSoundId(entity)
    }

    /// Schedule a sound for removal at the end of the next tick
    pub fn unregister(&mut self, id: TrackedSoundId) -> bool {
        match self.registry.get::<&mut TrackedSound>(id.0) {
            Ok(mut sound) => {
                sound.lifecycle = SoundLifecycle::Disposing;
                true
            }
            Err(_) => false,
        }
    }

    pub fn update_position(&mut self, id: TrackedSoundId, position: Vec3, now: u64) -> bool {
        let Ok(mut sound) = self.registry.get::<&mut TrackedSound>(id.0) else {
            return false;
        };
        if sound.position != position {
            sound.position = position;
            sound.moved = true;
            sound.position_dirty = true;
        }
        sound.last_update = now;
        true
    }

    /// Store a freshly computed occlusion filter for a sound
    pub fn set_occlusion_target(&mut self, id: TrackedSoundId, filter: f32) {
        let (submersion_filter, pitch) = self.submersion_targets();
        if let Ok(mut sound) = self.registry.get::<&mut TrackedSound>(id.0) {
            sound.occlusion_target = filter.clamp(0.0, 1.0);
            sound.target_filter = sound.occlusion_target.min(submersion_filter);
            sound.target_pitch = pitch;
            sound.moved = false;
        }
    }

    /// Change the listener medium; every target is recombined immediately
    pub fn set_submersion(&mut self, submersion: Submersion) {
        if submersion == self.submersion {
            return;
        }
        info!(from = ?self.submersion, to = ?submersion, "Listener submersion changed");
        self.submersion = submersion;
        self.submersion_changed = true;
        self.refresh_targets();
    }

    pub fn submersion(&self) -> Submersion {
        self.submersion
    }

    /// Whether submersion changed since the last call
    pub fn take_submersion_changed(&mut self) -> bool {
        std::mem::take(&mut self.submersion_changed)
    }

    /// Recombine every target from its occlusion target and the current medium
    pub fn refresh_targets(&mut self) {
        let (filter, pitch) = self.submersion_targets();
        for sound in self.registry.query_mut::<&mut TrackedSound>().into_iter().map(|(_, s)| s) {
            sound.target_filter = sound.occlusion_target.min(filter);
            sound.target_pitch = pitch;
        }
    }

    /// Snapshot of every sound that is not being disposed
    pub fn sounds(&self) -> Vec<SoundView> {
        self.registry
            .query::<&TrackedSound>()
            .iter()
            .filter(|(_, sound)| sound.lifecycle != SoundLifecycle::Disposing)
            .map(|(entity, sound)| SoundView {
                id: TrackedSoundId(entity),
                position: sound.position,
                positional: sound.positional,
                variation: sound.variation,
                moved: sound.moved,
            })
            .collect()
    }

    pub fn get(&self, id: TrackedSoundId) -> Option<TrackedSound> {
        self.registry
            .get::<&TrackedSound>(id.0)
            .ok()
            .map(|sound| (*sound).clone())
    }

    pub fn len(&self) -> usize {
        self.registry.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn count(&self, lifecycle: SoundLifecycle) -> usize {
        self.registry
            .query::<&TrackedSound>()
            .iter()
            .filter(|(_, sound)| sound.lifecycle == lifecycle)
            .count()
    }

    /// Advance every sound by one fixed tick
    pub fn tick<B: AudioBinding + ?Sized>(&mut self, binding: &mut B, now: u64) -> RenderTick {
        let smoothing = &self.smoothing;
        let mut stats = RenderTick::default();
        let mut disposed = Vec::new();

        for (entity, sound) in self.registry.query_mut::<&mut TrackedSound>() {
            if sound.lifecycle == SoundLifecycle::Registering {
                if !binding.is_playable(sound.handle) {
                    trace!(handle = sound.handle.0, "Sound not playable yet, retrying");
                    continue;
                }
                sound.lifecycle = SoundLifecycle::Active;
                // Nothing audible yet, so the first push starts at the target
                sound.current_filter = sound.target_filter;
                sound.current_pitch = sound.target_pitch;
                stats.activated += 1;
                debug!(handle = sound.handle.0, "Sound active");
            }

            if sound.lifecycle == SoundLifecycle::Active {
                let timed_out = smoothing.sound_timeout_ticks > 0
                    && now.saturating_sub(sound.last_update) >= smoothing.sound_timeout_ticks;
                if binding.is_stopped(sound.handle) || timed_out {
                    debug!(handle = sound.handle.0, timed_out, "Sound stopped");
                    sound.lifecycle = SoundLifecycle::Disposing;
                }
            }

            if sound.lifecycle == SoundLifecycle::Disposing {
                disposed.push(entity);
                continue;
            }

            sound.current_filter =
                approach(sound.current_filter, sound.target_filter, smoothing.max_filter_step);
            sound.current_pitch =
                approach(sound.current_pitch, sound.target_pitch, smoothing.max_pitch_step);

            if needs_push(sound.pushed_filter, sound.current_filter, sound.target_filter, smoothing.push_epsilon) {
                binding.set_filter(sound.handle, FilterParams::from_filter(sound.current_filter));
                sound.pushed_filter = Some(sound.current_filter);
                stats.filter_pushes += 1;
            }
            if needs_push(sound.pushed_pitch, sound.current_pitch, sound.target_pitch, smoothing.push_epsilon) {
                binding.set_pitch(sound.handle, sound.current_pitch);
                sound.pushed_pitch = Some(sound.current_pitch);
                stats.pitch_pushes += 1;
            }
            if sound.position_dirty {
                binding.set_position(sound.handle, sound.position);
                sound.position_dirty = false;
            }
        }

        for entity in disposed {
            if self.registry.despawn(entity).is_ok() {
                stats.disposed += 1;
            }
        }
        if stats.disposed > 0 {
            debug!(disposed = stats.disposed, remaining = self.registry.len(), "Disposed sounds");
        }
        stats
    }

    fn submersion_targets(&self) -> (f32, f32) {
        let config = &self.submersion_config;
        match self.submersion {
            Submersion::None => (1.0, 0.0),
            Submersion::Water => (config.water_filter, config.water_pitch_offset),
            Submersion::Lava => (config.lava_filter, config.lava_pitch_offset),
        }
    }
}

/// Move `current` toward `target` by at most `max_step`
pub fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

/// Push on first activation, past the epsilon, or when settling on the target
fn needs_push(pushed: Option<f32>, current: f32, target: f32, epsilon: f32) -> bool {
    match pushed {
        None => true,
        Some(pushed) => {
            (current - pushed).abs() > epsilon || (current == target && pushed != current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct RecordingBinding {
        unplayable: HashSet<SoundHandle>,
        stopped: HashSet<SoundHandle>,
        filters: HashMap<SoundHandle, Vec<FilterParams>>,
        pitches: HashMap<SoundHandle, Vec<f32>>,
        positions: HashMap<SoundHandle, Vec3>,
    }

    impl AudioBinding for RecordingBinding {
        fn is_playable(&self, handle: SoundHandle) -> bool {
            !self.unplayable.contains(&handle)
        }

        fn is_stopped(&self, handle: SoundHandle) -> bool {
            self.stopped.contains(&handle)
        }

        fn set_filter(&mut self, handle: SoundHandle, params: FilterParams) {
            self.filters.entry(handle).or_default().push(params);
        }

        fn set_pitch(&mut self, handle: SoundHandle, offset: f32) {
            self.pitches.entry(handle).or_default().push(offset);
        }

        fn set_position(&mut self, handle: SoundHandle, position: Vec3) {
            self.positions.insert(handle, position);
        }
    }

    fn renderer() -> SoundRenderer {
        SoundRenderer::new(SmoothingConfig::default(), SubmersionConfig::default())
    }

    #[test]
    fn test_approach_is_bounded() {
        assert_eq!(approach(1.0, 0.0, 0.25), 0.75);
        assert_eq!(approach(0.0, 1.0, 0.25), 0.25);
        assert_eq!(approach(0.5, 0.55, 0.25), 0.55);
        assert_eq!(approach(1.0, 0.5, 0.25), 0.75);
        assert_eq!(approach(0.75, 0.5, 0.25), 0.5);
        // Only a remaining distance within the step snaps
        assert_eq!(approach(0.0, 0.250_01, 0.25), 0.25);
    }

    #[test]
    fn test_register_starts_registering() {
        let mut renderer = renderer();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        let sound = renderer.get(id).unwrap();
        assert_eq!(sound.lifecycle, SoundLifecycle::Registering);
        assert_eq!(sound.current_filter, 1.0);
    }

    #[test]
    fn test_unplayable_sound_is_retried_not_dropped() {
        let mut renderer = renderer();
        let mut binding = RecordingBinding::default();
        binding.unplayable.insert(SoundHandle(7));
        let id = renderer.register(SoundHandle(7), Vec3::ZERO, true, 0);

        for now in 0..5 {
            renderer.tick(&mut binding, now);
        }
        assert_eq!(renderer.get(id).unwrap().lifecycle, SoundLifecycle::Registering);
        assert!(binding.filters.is_empty());

        binding.unplayable.clear();
        let stats = renderer.tick(&mut binding, 5);
        assert_eq!(stats.activated, 1);
        assert!(renderer.get(id).unwrap().is_active());
        assert_eq!(binding.positions.get(&SoundHandle(7)), Some(&Vec3::ZERO));
    }

    #[test]
    fn test_first_push_starts_at_target() {
        let mut renderer = renderer();
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        renderer.set_occlusion_target(id, 0.2);
        renderer.set_submersion(Submersion::Lava);

        renderer.tick(&mut binding, 0);
        let config = SubmersionConfig::default();
        let sound = renderer.get(id).unwrap();
        assert_eq!(sound.current_filter, config.lava_filter.min(0.2));
        assert_eq!(binding.filters[&SoundHandle(1)].len(), 1);
        assert_eq!(binding.filters[&SoundHandle(1)][0], FilterParams::from_filter(sound.target_filter));
        assert_eq!(binding.pitches[&SoundHandle(1)], vec![config.lava_pitch_offset]);
    }

    #[test]
    fn test_smoothing_step_is_bounded_and_converges() {
        let smoothing = SmoothingConfig {
            max_filter_step: 0.125,
            ..Default::default()
        };
        let mut renderer = SoundRenderer::new(smoothing, SubmersionConfig::default());
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        renderer.tick(&mut binding, 0);
        assert_eq!(renderer.get(id).unwrap().current_filter, 1.0);

        renderer.set_occlusion_target(id, 0.25);
        let mut previous = 1.0;
        for now in 1..=6 {
            renderer.tick(&mut binding, now);
            let current = renderer.get(id).unwrap().current_filter;
            assert!((previous - current).abs() <= 0.125);
            assert!(current < previous);
            previous = current;
        }
        assert_eq!(renderer.get(id).unwrap().current_filter, 0.25);

        let pushed = binding.filters.get(&SoundHandle(1)).unwrap();
        assert_eq!(pushed.len(), 7);
        assert_eq!(pushed.last().unwrap().cutoff, 0.25);
    }

    #[test]
    fn test_small_changes_are_not_pushed() {
        let mut renderer = renderer();
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        renderer.tick(&mut binding, 0);
        assert_eq!(binding.filters[&SoundHandle(1)].len(), 1);

        // Settled: nothing new to push
        renderer.tick(&mut binding, 1);
        renderer.tick(&mut binding, 2);
        assert_eq!(binding.filters[&SoundHandle(1)].len(), 1);
        assert_eq!(binding.pitches[&SoundHandle(1)].len(), 1);

        renderer.set_occlusion_target(id, 0.5);
        renderer.tick(&mut binding, 3);
        assert_eq!(binding.filters[&SoundHandle(1)].len(), 2);
    }

    #[test]
    fn test_stopped_sound_is_removed() {
        let mut renderer = renderer();
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(3), Vec3::ZERO, true, 0);
        renderer.tick(&mut binding, 0);

        binding.stopped.insert(SoundHandle(3));
        let stats = renderer.tick(&mut binding, 1);
        assert_eq!(stats.disposed, 1);
        assert!(renderer.get(id).is_none());
        assert!(renderer.is_empty());
    }

    #[test]
    fn test_unregister_disposes_on_next_tick() {
        let mut renderer = renderer();
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(3), Vec3::ZERO, true, 0);
        assert!(renderer.unregister(id));
        assert!(renderer.sounds().is_empty());
        renderer.tick(&mut binding, 0);
        assert!(renderer.get(id).is_none());
        assert!(!renderer.unregister(id));
    }

    #[test]
    fn test_timeout_disposes_stale_sounds() {
        let smoothing = SmoothingConfig {
            sound_timeout_ticks: 10,
            ..Default::default()
        };
        let mut renderer = SoundRenderer::new(smoothing, SubmersionConfig::default());
        let mut binding = RecordingBinding::default();
        let fresh = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        let stale = renderer.register(SoundHandle(2), Vec3::ZERO, true, 0);

        renderer.tick(&mut binding, 0);
        renderer.update_position(fresh, Vec3::X, 8);
        renderer.tick(&mut binding, 10);

        assert!(renderer.get(fresh).is_some());
        assert!(renderer.get(stale).is_none());
    }

    #[test]
    fn test_new_occlusion_target_does_not_refresh_timeout() {
        let smoothing = SmoothingConfig {
            sound_timeout_ticks: 10,
            ..Default::default()
        };
        let mut renderer = SoundRenderer::new(smoothing, SubmersionConfig::default());
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);

        for now in 0..10 {
            renderer.set_occlusion_target(id, 0.5);
            renderer.tick(&mut binding, now);
        }
        assert!(renderer.get(id).is_some());

        renderer.set_occlusion_target(id, 0.5);
        renderer.tick(&mut binding, 10);
        assert!(renderer.get(id).is_none());
    }

    #[test]
    fn test_submersion_caps_target_and_offsets_pitch() {
        let mut renderer = renderer();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        renderer.set_occlusion_target(id, 0.8);

        renderer.set_submersion(Submersion::Water);
        assert!(renderer.take_submersion_changed());
        assert!(!renderer.take_submersion_changed());

        let config = SubmersionConfig::default();
        let sound = renderer.get(id).unwrap();
        assert_eq!(sound.target_filter, config.water_filter);
        assert_eq!(sound.target_pitch, config.water_pitch_offset);
        assert_eq!(sound.occlusion_target, 0.8);

        renderer.set_submersion(Submersion::None);
        assert_eq!(renderer.get(id).unwrap().target_filter, 0.8);
    }

    #[test]
    fn test_position_update_marks_moved() {
        let mut renderer = renderer();
        let mut binding = RecordingBinding::default();
        let id = renderer.register(SoundHandle(1), Vec3::ZERO, true, 0);
        renderer.set_occlusion_target(id, 1.0);
        assert!(!renderer.sounds()[0].moved);

        renderer.update_position(id, Vec3::new(2.0, 0.0, 0.0), 1);
        assert!(renderer.sounds()[0].moved);
        renderer.tick(&mut binding, 1);
        assert_eq!(binding.positions[&SoundHandle(1)], Vec3::new(2.0, 0.0, 0.0));
    }
}
