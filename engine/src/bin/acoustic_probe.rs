//! Acoustic probe: runs the engine over a small demo scene and logs results
//!
//! Usage: `acoustic_probe [config.json]`

use std::collections::HashMap;
use std::env;
use voxel_acoustics::prelude::*;
use tracing::{error, info};

/// Binding that remembers what the engine pushed
#[derive(Default)]
struct LoggingBinding {
    filters: HashMap<SoundHandle, FilterParams>,
}

impl AudioBinding for LoggingBinding {
    fn is_playable(&self, _handle: SoundHandle) -> bool {
        true
    }

    fn is_stopped(&self, _handle: SoundHandle) -> bool {
        false
    }

    fn set_filter(&mut self, handle: SoundHandle, params: FilterParams) {
        self.filters.insert(handle, params);
    }

    fn set_pitch(&mut self, handle: SoundHandle, offset: f32) {
        tracing::trace!(handle = handle.0, offset, "Pitch offset");
    }

    fn set_position(&mut self, handle: SoundHandle, position: Vec3) {
        tracing::trace!(handle = handle.0, ?position, "Position");
    }

    fn apply_reverb(&mut self, estimate: &ReverbEstimate) {
        info!(
            short = estimate.decay(ReverbSlot::Short),
            medium = estimate.decay(ReverbSlot::Medium),
            long = estimate.decay(ReverbSlot::Long),
            enclosure = estimate.enclosure,
            "Reverb applied"
        );
    }
}

/// Stone room (interior 0..=6) with a wooden door in the +X wall, on an open stone field
fn build_scene() -> (VoxelGrid, IVec3) {
    let mut grid = VoxelGrid::new();
    grid.fill(
        IVec3::new(-30, -2, -30),
        IVec3::new(30, -2, 30),
        BlockState::solid(Material::Stone),
    );
    grid.hollow_box(IVec3::new(0, -1, 0), IVec3::new(6, 3, 6), Material::Stone);
    let door = IVec3::new(7, 0, 3);
    grid.set(door, BlockState::openable(Material::Wood, false));
    (grid, door)
}

fn main() {
    voxel_acoustics::init_logging();

    let config = match env::args().nth(1) {
        Some(path) => match AcousticsConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => AcousticsConfig::default(),
    };

    let mut engine = match AcousticEngine::new(config, LoggingBinding::default()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to create acoustics engine: {}", e);
            std::process::exit(1);
        }
    };

    let (mut grid, door) = build_scene();
    let inside = SoundHandle(1);
    let outside = SoundHandle(2);
    let music = SoundHandle(3);
    engine.register_sound(inside, Vec3::new(1.5, 0.5, 1.5), true);
    engine.register_sound(outside, Vec3::new(14.5, 0.5, 3.5), true);
    engine.register_sound(music, Vec3::ZERO, false);

    let room = ListenerState::new(Vec3::new(3.5, 0.5, 3.5));
    let field = ListenerState::new(Vec3::new(20.5, 0.5, 20.5));

    let mut now = 0;
    let mut run = |engine: &mut AcousticEngine<LoggingBinding>, grid: &VoxelGrid, listener: &ListenerState, label: &str| {
        for _ in 0..30 {
            engine.tick(listener, grid, now);
            now += 1;
        }
        for (handle, name) in [(inside, "inside"), (outside, "outside"), (music, "music")] {
            if let Some(params) = engine.binding().filters.get(&handle) {
                info!(scene = label, sound = name, cutoff = params.cutoff, gain = params.gain, "Filter");
            }
        }
        let stats = engine.stats();
        info!(
            scene = label,
            raycasts = stats.raycasts_total,
            reverb_samples = stats.reverb_samples,
            cache_hits = stats.occlusion_cache.hits,
            cache_misses = stats.occlusion_cache.misses,
            "Stats"
        );
    };

    run(&mut engine, &grid, &room, "room, door closed");

    grid.toggle_open(door);
    engine.invalidate_cell(door.x, door.y, door.z);
    run(&mut engine, &grid, &room, "room, door open");

    run(&mut engine, &grid, &field, "open field");

    let underwater = room.with_submersion(Submersion::Water);
    run(&mut engine, &grid, &underwater, "room, underwater");

    let lines = engine.debug_lines(&room, &grid, &Default::default());
    info!(lines = lines.len(), "Debug overlay built");
}
