//! Acoustics debug visualization
//!
//! Converts occlusion paths, reverb ray segments and sound markers into
//! colored world-space line segments a host renderer can draw.

use crate::acoustics::reverb::RaySegment;
use glam::{Vec3, Vec4};
use tracing::trace;

/// One colored line segment in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Vec4,
}

/// Settings for acoustics debug visualization
#[derive(Debug, Clone)]
pub struct AcousticDebugSettings {
    /// Line from every positional sound to the listener
    pub show_occlusion: bool,
    /// Reverb rays traced from the listener
    pub show_reverb_rays: bool,
    /// Small cross on each sound
    pub show_sources: bool,
    /// Color of an unobstructed path
    pub clear_color: Vec4,
    /// Color of a fully occluded path
    pub occluded_color: Vec4,
    /// Color of a reverb segment that hit a surface
    pub surface_color: Vec4,
    /// Color of a reverb segment that escaped
    pub escaped_color: Vec4,
}

impl Default for AcousticDebugSettings {
    fn default() -> Self {
        Self {
            show_occlusion: true,
            show_reverb_rays: false,
            show_sources: true,
            clear_color: Vec4::new(0.0, 1.0, 0.0, 1.0),    // Green
            occluded_color: Vec4::new(1.0, 0.0, 0.0, 1.0), // Red
            surface_color: Vec4::new(1.0, 1.0, 0.0, 1.0),  // Yellow
            escaped_color: Vec4::new(0.3, 0.3, 1.0, 0.4),  // Faint blue
        }
    }
}

/// Sound as drawn by the overlay
#[derive(Debug, Clone, Copy)]
pub struct SoundMarker {
    pub position: Vec3,
    /// Current filter value, 1.0 = unfiltered
    pub filter: f32,
    pub positional: bool,
}

/// Build the overlay for the given sounds and reverb segments
pub fn draw_acoustics_debug(
    listener: Vec3,
    sounds: &[SoundMarker],
    reverb_segments: &[RaySegment],
    settings: &AcousticDebugSettings,
) -> Vec<DebugLine> {
    let mut lines = Vec::new();

    for sound in sounds {
        let color = settings
            .occluded_color
            .lerp(settings.clear_color, sound.filter.clamp(0.0, 1.0));

        if settings.show_sources {
            draw_cross(&mut lines, sound.position, 0.25, color);
        }
        if settings.show_occlusion && sound.positional {
            lines.push(DebugLine {
                start: listener,
                end: sound.position,
                color,
            });
        }
    }

    if settings.show_reverb_rays {
        for segment in reverb_segments {
            let color = match segment.material {
                Some(_) => {
                    let mut color = settings.surface_color;
                    color.w *= segment.energy.clamp(0.1, 1.0);
                    color
                }
                None => settings.escaped_color,
            };
            lines.push(DebugLine {
                start: segment.start,
                end: segment.end,
                color,
            });
        }
    }

    trace!(lines = lines.len(), "Built acoustics debug overlay");
    lines
}

fn draw_cross(lines: &mut Vec<DebugLine>, center: Vec3, half: f32, color: Vec4) {
    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
        lines.push(DebugLine {
            start: center - axis * half,
            end: center + axis * half,
            color,
        });
    }
}
