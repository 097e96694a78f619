//! Scenario tests for the acoustics pipeline

#[cfg(test)]
mod tests {
    use crate::acoustics::renderer::approach;
    use crate::acoustics::*;
    use crate::config::{AcousticsConfig, OcclusionConfig, ReverbConfig};
    use glam::{IVec3, Vec3};
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Records the last value pushed for each handle
    #[derive(Default)]
    struct TestBinding {
        filters: HashMap<SoundHandle, FilterParams>,
        reverb: Option<ReverbEstimate>,
    }

    impl AudioBinding for TestBinding {
        fn is_playable(&self, _handle: SoundHandle) -> bool {
            true
        }

        fn is_stopped(&self, _handle: SoundHandle) -> bool {
            false
        }

        fn set_filter(&mut self, handle: SoundHandle, params: FilterParams) {
            self.filters.insert(handle, params);
        }

        fn set_pitch(&mut self, _handle: SoundHandle, _offset: f32) {}

        fn set_position(&mut self, _handle: SoundHandle, _position: Vec3) {}

        fn apply_reverb(&mut self, estimate: &ReverbEstimate) {
            self.reverb = Some(*estimate);
        }
    }

    fn stone_wall(grid: &mut VoxelGrid, x: i32) {
        grid.fill(
            IVec3::new(x, -4, -4),
            IVec3::new(x, 4, 4),
            BlockState::solid(Material::Stone),
        );
    }

    fn stone_room() -> VoxelGrid {
        let mut grid = VoxelGrid::new();
        grid.hollow_box(IVec3::ZERO, IVec3::splat(4), Material::Stone);
        grid
    }

    #[test]
    fn test_wall_muffles_only_the_sound_behind_it() {
        let mut grid = VoxelGrid::new();
        stone_wall(&mut grid, 4);

        let mut engine = AcousticEngine::new(AcousticsConfig::default(), TestBinding::default()).unwrap();
        let behind = SoundHandle(1);
        let beside = SoundHandle(2);
        engine.register_sound(behind, Vec3::new(7.5, 0.5, 0.5), true);
        engine.register_sound(beside, Vec3::new(-6.5, 0.5, 0.5), true);

        let listener = ListenerState::new(Vec3::new(0.5, 0.5, 0.5));
        for now in 0..20 {
            engine.tick(&listener, &grid, now);
        }

        let filters = &engine.binding().filters;
        assert!(filters[&behind].cutoff < 0.9);
        assert!(filters[&behind].gain < 1.0);
        assert_eq!(filters[&beside].cutoff, 1.0);
        assert_eq!(filters[&beside].gain, 1.0);
    }

    #[test]
    fn test_enclosed_room_versus_open_sky() {
        let config = ReverbConfig::default();
        let raytracer = AcousticRaytracer::new(config.clone(), MaterialTable::default());
        let center = Vec3::splat(2.5);

        let room = raytracer.calculate(center, center, &stone_room());
        assert!((room.enclosure - 1.0).abs() < 1e-6);
        assert!(room.reflectivity > 0.9);
        assert!(room.decay(ReverbSlot::Long) >= 0.9 * config.max_decay_time);
        assert!(room.decay(ReverbSlot::Short) < room.decay(ReverbSlot::Long));
        assert!(room.room_extent < 6.0);

        let sky = raytracer.calculate(center, center, &VoxelGrid::new());
        assert_eq!(sky.enclosure, 0.0);
        for slot in [ReverbSlot::Short, ReverbSlot::Medium, ReverbSlot::Long] {
            assert_eq!(sky.decay(slot), config.min_decay_time);
            assert_eq!(sky.gain(slot), 0.0);
        }
    }

    #[test]
    fn test_floor_only_is_between_room_and_sky() {
        let raytracer = AcousticRaytracer::new(ReverbConfig::default(), MaterialTable::default());
        let mut grid = VoxelGrid::new();
        grid.fill(IVec3::new(-40, -1, -40), IVec3::new(40, -1, 40), BlockState::solid(Material::Stone));

        let listener = Vec3::new(0.5, 1.5, 0.5);
        let field = raytracer.calculate(listener, listener, &grid);
        let room = raytracer.calculate(Vec3::splat(2.5), Vec3::splat(2.5), &stone_room());
        assert!(field.enclosure > 0.0);
        assert!(field.enclosure < room.enclosure);
        assert!(field.decay(ReverbSlot::Long) < room.decay(ReverbSlot::Long));
    }

    #[test]
    fn test_engine_pushes_room_reverb() {
        let mut engine = AcousticEngine::new(AcousticsConfig::default(), TestBinding::default()).unwrap();
        let grid = stone_room();
        engine.tick(&ListenerState::new(Vec3::splat(2.5)), &grid, 0);

        let pushed = engine.binding().reverb.unwrap();
        assert_eq!(pushed, engine.current_reverb());
        assert!(pushed.enclosure > 0.99);
        assert_eq!(engine.reverb_estimate_for_debug(Vec3::splat(2.5), &grid), pushed);
    }

    #[test]
    fn test_door_toggle_takes_effect_after_invalidation() {
        let mut grid = VoxelGrid::new();
        stone_wall(&mut grid, 6);
        let door = IVec3::new(6, 0, 0);
        grid.set(door, BlockState::openable(Material::Wood, false));

        let mut engine = AcousticEngine::new(AcousticsConfig::default(), TestBinding::default()).unwrap();
        // Mid band, so the cached result outlives a few ticks
        let id = engine.register_sound(SoundHandle(9), Vec3::new(12.5, 0.5, 0.5), true);
        let listener = ListenerState::new(Vec3::new(0.5, 0.5, 0.5));

        engine.tick(&listener, &grid, 0);
        let closed = engine.renderer().get(id).unwrap().occlusion_target;
        assert!(closed < 1.0);

        assert_eq!(grid.toggle_open(door), Some(true));
        engine.tick(&listener, &grid, 1);
        assert_eq!(engine.renderer().get(id).unwrap().occlusion_target, closed);

        assert!(engine.invalidate_cell(door.x, door.y, door.z) >= 1);
        engine.tick(&listener, &grid, 2);
        let open = engine.renderer().get(id).unwrap().occlusion_target;
        assert!(open > closed);
    }

    #[test]
    fn test_calculations_are_idempotent() {
        let grid = stone_room();
        let from = Vec3::new(1.2, 2.7, 0.4);
        let to = Vec3::new(9.3, 1.1, 3.8);

        let first: Vec<RayHit> = cast_ray(&grid, from, to, 64).collect();
        let second: Vec<RayHit> = cast_ray(&grid, from, to, 64).collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());

        let occlusion = OcclusionCalculator::new(OcclusionConfig::default(), MaterialTable::default());
        assert_eq!(occlusion.calculate(from, to, &grid), occlusion.calculate(from, to, &grid));

        let raytracer = AcousticRaytracer::new(ReverbConfig::default(), MaterialTable::default());
        let center = Vec3::splat(2.5);
        assert_eq!(
            raytracer.calculate(center, center, &grid),
            raytracer.calculate(center, center, &grid)
        );
    }

    #[test]
    fn test_unloaded_world_degrades_to_occluded() {
        let grid = VoxelGrid::new().with_bounds(IVec3::splat(-2), IVec3::splat(2));
        let occlusion = OcclusionCalculator::new(OcclusionConfig::default(), MaterialTable::default());
        let sample = occlusion.calculate(Vec3::splat(0.5), Vec3::new(8.5, 0.5, 0.5), &grid);
        assert_eq!(sample.occlusion, occlusion.config().max_occlusion);
    }

    #[test]
    fn test_submersion_muffles_every_sound() {
        let mut engine = AcousticEngine::new(AcousticsConfig::default(), TestBinding::default()).unwrap();
        let handle = SoundHandle(4);
        engine.register_sound(handle, Vec3::new(3.5, 0.5, 0.5), true);
        let grid = VoxelGrid::new();

        let underwater = ListenerState::new(Vec3::splat(0.5)).with_submersion(Submersion::Water);
        for now in 0..20 {
            engine.tick(&underwater, &grid, now);
        }
        let water_filter = engine.config().submersion.water_filter;
        assert_eq!(engine.binding().filters[&handle].cutoff, water_filter);
    }

    proptest! {
        #[test]
        fn prop_filter_mapping_is_monotone_and_floored(
            a in 0.0f32..50.0,
            b in 0.0f32..50.0,
            variation in -1.0f32..=1.0,
        ) {
            let calc = OcclusionCalculator::new(OcclusionConfig::default(), MaterialTable::default());
            let floor = calc.config().min_filter;
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let f_low = calc.occlusion_to_filter(low, variation);
            let f_high = calc.occlusion_to_filter(high, variation);
            prop_assert!(f_high <= f_low);
            prop_assert!(f_high >= floor);
            prop_assert!(f_low <= 1.0);
        }

        #[test]
        fn prop_smoothing_step_is_bounded(
            start in 0.0f32..=1.0,
            target in 0.0f32..=1.0,
            step in 0.01f32..0.5,
        ) {
            let mut current = start;
            // One extra tick absorbs float drift in the step count
            let ticks = ((target - start).abs() / step).ceil() as usize + 1;
            for _ in 0..ticks {
                let next = approach(current, target, step);
                prop_assert!((next - current).abs() <= step + 2.0 * f32::EPSILON);
                current = next;
            }
            prop_assert_eq!(current, target);
        }
    }
}
