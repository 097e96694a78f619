//! Environmental reverb estimation by multi-bounce voxel raytracing
//!
//! A fixed bundle of rays leaves the sample point, reflects off solid faces
//! and records how far it travels and how much energy survives. The
//! aggregate is mapped to decay times for three parallel reverb slots.

use crate::acoustics::material::{Material, MaterialTable};
use crate::acoustics::raycast::{first_hit, has_line_of_sight};
use crate::acoustics::voxel::BlockLookup;
use crate::config::ReverbConfig;
use glam::{IVec3, Vec3};
use std::f32::consts::PI;
use tracing::{debug, trace};

/// Number of parallel reverb slots
pub const SLOT_COUNT: usize = 3;

/// Sabine/Eyring constant (seconds per metre)
const EYRING_CONSTANT: f32 = 0.161;

/// Reverb decay channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverbSlot {
    Short = 0,
    Medium = 1,
    Long = 2,
}

/// Estimated acoustic signature of the space around a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbEstimate {
    /// Decay time in seconds per slot (short, medium, long)
    pub decay_times: [f32; SLOT_COUNT],
    /// Reflected energy reaching each slot, in [0, 1]
    pub slot_gains: [f32; SLOT_COUNT],
    /// Energy-weighted reflectivity of the struck surfaces
    pub reflectivity: f32,
    /// Mean free path between surfaces, in world units
    pub room_extent: f32,
    /// Fraction of possible reflections that found a surface (0 = open sky)
    pub enclosure: f32,
}

impl ReverbEstimate {
    /// Open-air preset: every slot at the minimum decay, no reflections
    pub fn outdoor(config: &ReverbConfig) -> Self {
        Self {
            decay_times: [config.min_decay_time; SLOT_COUNT],
            slot_gains: [0.0; SLOT_COUNT],
            reflectivity: 0.0,
            room_extent: config.max_ray_distance,
            enclosure: 0.0,
        }
    }

    pub fn decay(&self, slot: ReverbSlot) -> f32 {
        self.decay_times[slot as usize]
    }

    pub fn gain(&self, slot: ReverbSlot) -> f32 {
        self.slot_gains[slot as usize]
    }
}

/// One traced segment, kept for debug rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    pub start: Vec3,
    pub end: Vec3,
    /// Material struck at `end`, or `None` if the segment escaped
    pub material: Option<Material>,
    /// Energy carried along this segment
    pub energy: f32,
}

/// Accumulators shared by all rays of one sample
#[derive(Default)]
struct TraceTotals {
    bounces: usize,
    segment_length_sum: f32,
    segment_count: usize,
    weighted_reflectivity: f32,
    incident_energy: f32,
    slot_energy: [f32; SLOT_COUNT],
}

/// Estimates reverb from voxel geometry
#[derive(Debug, Clone)]
pub struct AcousticRaytracer {
    config: ReverbConfig,
    materials: MaterialTable,
    directions: Vec<Vec3>,
}

impl AcousticRaytracer {
    pub fn new(config: ReverbConfig, materials: MaterialTable) -> Self {
        let directions = fibonacci_sphere(config.ray_count);
        Self {
            config,
            materials,
            directions,
        }
    }

    pub fn config(&self) -> &ReverbConfig {
        &self.config
    }

    /// Fixed ray pattern used for every sample
    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    /// Estimate the reverb heard at `listener_pos` for rays leaving `sound_pos`
    ///
    /// Pass the same point twice for a listener-centred environment sample.
    pub fn calculate<W: BlockLookup + ?Sized>(
        &self,
        sound_pos: Vec3,
        listener_pos: Vec3,
        world: &W,
    ) -> ReverbEstimate {
        self.trace(sound_pos, listener_pos, world, None, None)
    }

    /// Like [`Self::calculate`], also returning the cells of every struck surface
    pub fn calculate_with_dependencies<W: BlockLookup + ?Sized>(
        &self,
        sound_pos: Vec3,
        listener_pos: Vec3,
        world: &W,
    ) -> (ReverbEstimate, Vec<IVec3>) {
        let mut surfaces = Vec::new();
        let estimate = self.trace(sound_pos, listener_pos, world, None, Some(&mut surfaces));
        surfaces.sort_unstable_by_key(|c| c.to_array());
        surfaces.dedup();
        (estimate, surfaces)
    }

    /// Like [`Self::calculate`], also returning every traced segment
    pub fn calculate_with_paths<W: BlockLookup + ?Sized>(
        &self,
        sound_pos: Vec3,
        listener_pos: Vec3,
        world: &W,
    ) -> (ReverbEstimate, Vec<RaySegment>) {
        let mut segments = Vec::new();
        let estimate = self.trace(sound_pos, listener_pos, world, Some(&mut segments), None);
        (estimate, segments)
    }

    fn trace<W: BlockLookup + ?Sized>(
        &self,
        sound_pos: Vec3,
        listener_pos: Vec3,
        world: &W,
        mut segments: Option<&mut Vec<RaySegment>>,
        mut surfaces: Option<&mut Vec<IVec3>>,
    ) -> ReverbEstimate {
        let config = &self.config;
        let mut totals = TraceTotals::default();

        for &initial in &self.directions {
            let mut origin = sound_pos;
            let mut direction = initial;
            let mut energy = 1.0_f32;
            let mut path_length = 0.0_f32;

            for _ in 0..config.bounce_count {
                let Some(hit) = first_hit(
                    world,
                    origin,
                    direction,
                    config.max_ray_distance,
                    config.max_segment_cells,
                ) else {
                    // Escaped: contributes no reflection at all
                    if let Some(segments) = segments.as_deref_mut() {
                        segments.push(RaySegment {
                            start: origin,
                            end: origin + direction * config.max_ray_distance,
                            material: None,
                            energy,
                        });
                    }
                    break;
                };

                let point = origin + direction * hit.distance;
                let normal = hit.normal.as_vec3();
                let reflectivity = self.materials.get(hit.block.material).reflectivity;

                if let Some(segments) = segments.as_deref_mut() {
                    segments.push(RaySegment {
                        start: origin,
                        end: point,
                        material: Some(hit.block.material),
                        energy,
                    });
                }
                if let Some(surfaces) = surfaces.as_deref_mut() {
                    surfaces.push(hit.cell);
                }

                totals.bounces += 1;
                totals.segment_length_sum += hit.distance;
                totals.segment_count += 1;
                totals.weighted_reflectivity += energy * reflectivity;
                totals.incident_energy += energy;

                energy *= reflectivity;
                path_length += hit.distance;

                origin = point + normal * config.surface_offset;
                let shared_airspace = has_line_of_sight(
                    world,
                    origin,
                    listener_pos,
                    config.max_segment_cells,
                );
                let audible = if shared_airspace { 1.0 } else { 0.5 };
                totals.slot_energy[self.slot_for_path(path_length) as usize] += energy * audible;

                trace!(
                    cell = ?hit.cell,
                    distance = hit.distance,
                    energy,
                    shared_airspace,
                    "Reverb ray bounce"
                );

                direction = reflect(direction, normal);
                if energy <= f32::EPSILON {
                    break;
                }
            }
        }

        let estimate = self.aggregate(&totals);
        debug!(
            decay_long = estimate.decay_times[ReverbSlot::Long as usize],
            reflectivity = estimate.reflectivity,
            room_extent = estimate.room_extent,
            enclosure = estimate.enclosure,
            "Reverb estimate"
        );
        estimate
    }

    fn aggregate(&self, totals: &TraceTotals) -> ReverbEstimate {
        let config = &self.config;
        let ray_count = self.directions.len().max(1) as f32;
        let possible_bounces = ray_count * config.bounce_count.max(1) as f32;

        let enclosure = (totals.bounces as f32 / possible_bounces).clamp(0.0, 1.0);
        if totals.segment_count == 0 {
            return ReverbEstimate::outdoor(config);
        }

        let room_extent = totals.segment_length_sum / totals.segment_count as f32;
        let reflectivity = if totals.incident_energy > 0.0 {
            totals.weighted_reflectivity / totals.incident_energy
        } else {
            0.0
        };

        let enclosed_decay = eyring_decay(room_extent, reflectivity)
            .clamp(config.min_decay_time, config.max_decay_time);
        let long = lerp(config.min_decay_time, enclosed_decay, enclosure);
        let medium = (long * config.medium_decay_ratio).max(config.min_decay_time);
        let short = (long * config.short_decay_ratio).max(config.min_decay_time);

        let slot_gains = totals
            .slot_energy
            .map(|energy| (energy / ray_count).clamp(0.0, 1.0));

        ReverbEstimate {
            decay_times: [short, medium, long],
            slot_gains,
            reflectivity,
            room_extent,
            enclosure,
        }
    }

    fn slot_for_path(&self, path_length: f32) -> ReverbSlot {
        if path_length < self.config.short_path_length {
            ReverbSlot::Short
        } else if path_length < self.config.medium_path_length {
            ReverbSlot::Medium
        } else {
            ReverbSlot::Long
        }
    }
}

/// Evenly spread unit vectors on a sphere (golden-angle spiral)
pub fn fibonacci_sphere(count: usize) -> Vec<Vec3> {
    let golden_angle = PI * (3.0 - 5.0_f32.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
            let radius = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden_angle * i as f32;
            Vec3::new(theta.cos() * radius, y, theta.sin() * radius).normalize()
        })
        .collect()
}

/// RT60 for a room with the given mean free path and surface reflectivity
fn eyring_decay(mean_free_path: f32, reflectivity: f32) -> f32 {
    let reflectivity = reflectivity.clamp(0.001, 0.999);
    EYRING_CONSTANT * mean_free_path / (4.0 * -reflectivity.ln())
}

fn reflect(direction: Vec3, normal: Vec3) -> Vec3 {
    (direction - 2.0 * direction.dot(normal) * normal).normalize_or(direction)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
