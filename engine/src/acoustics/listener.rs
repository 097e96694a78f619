//! Listener state supplied to every tick

use crate::acoustics::components::Submersion;
use glam::Vec3;

/// Where the listener is and what medium surrounds it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerState {
    /// World position
    pub position: Vec3,
    /// Medium the listener is submerged in
    pub submersion: Submersion,
}

impl ListenerState {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            submersion: Submersion::None,
        }
    }

    pub fn with_submersion(mut self, submersion: Submersion) -> Self {
        self.submersion = submersion;
        self
    }
}

impl Default for ListenerState {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}
