//! Block material acoustics: occlusion and reflectivity per sound category

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MATERIAL_COUNT: usize = 15;

/// Sound category of a voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Air,
    Stone,
    Deepslate,
    Metal,
    Wood,
    Glass,
    Wool,
    Dirt,
    Gravel,
    Sand,
    Leaves,
    Snow,
    Water,
    Lava,
    /// Placeholder for blocks the world failed to report
    Unknown,
}

impl Material {
    /// Every material, in table order
    pub const ALL: [Material; MATERIAL_COUNT] = [
        Material::Air,
        Material::Stone,
        Material::Deepslate,
        Material::Metal,
        Material::Wood,
        Material::Glass,
        Material::Wool,
        Material::Dirt,
        Material::Gravel,
        Material::Sand,
        Material::Leaves,
        Material::Snow,
        Material::Water,
        Material::Lava,
        Material::Unknown,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Acoustic properties of a material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// Occlusion contributed by one block of this material (0.0 = transparent to sound)
    pub occlusion: f32,
    /// Fraction of incident energy reflected (0.0 = fully absorptive, 1.0 = perfect mirror)
    pub reflectivity: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self::stone()
    }
}

impl MaterialProperties {
    /// Hard, reflective rock
    pub fn stone() -> Self {
        Self {
            occlusion: 1.0,
            reflectivity: 0.97,
        }
    }

    /// Moderate absorption
    pub fn wood() -> Self {
        Self {
            occlusion: 0.8,
            reflectivity: 0.8,
        }
    }

    /// Reflective but lets part of the sound through
    pub fn glass() -> Self {
        Self {
            occlusion: 0.3,
            reflectivity: 0.6,
        }
    }

    /// Highly absorptive
    pub fn wool() -> Self {
        Self {
            occlusion: 1.5,
            reflectivity: 0.1,
        }
    }

    /// Highly reflective
    pub fn metal() -> Self {
        Self {
            occlusion: 1.0,
            reflectivity: 0.95,
        }
    }

    fn builtin(material: Material) -> Self {
        match material {
            Material::Air => Self {
                occlusion: 0.0,
                reflectivity: 0.0,
            },
            Material::Stone | Material::Deepslate => Self::stone(),
            Material::Metal => Self::metal(),
            Material::Wood => Self::wood(),
            Material::Glass => Self::glass(),
            Material::Wool => Self::wool(),
            Material::Dirt => Self {
                occlusion: 0.9,
                reflectivity: 0.4,
            },
            Material::Gravel => Self {
                occlusion: 0.9,
                reflectivity: 0.35,
            },
            Material::Sand => Self {
                occlusion: 0.9,
                reflectivity: 0.3,
            },
            Material::Leaves => Self {
                occlusion: 0.2,
                reflectivity: 0.2,
            },
            Material::Snow => Self {
                occlusion: 0.8,
                reflectivity: 0.15,
            },
            Material::Water => Self {
                occlusion: 0.4,
                reflectivity: 0.3,
            },
            Material::Lava => Self {
                occlusion: 1.0,
                reflectivity: 0.5,
            },
            // Saturates any occlusion sum it lands in
            Material::Unknown => Self {
                occlusion: 1000.0,
                reflectivity: 0.5,
            },
        }
    }
}

/// Lookup table from material to acoustic properties
#[derive(Debug, Clone)]
pub struct MaterialTable {
    properties: [MaterialProperties; MATERIAL_COUNT],
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self {
            properties: Material::ALL.map(MaterialProperties::builtin),
        }
    }
}

impl MaterialTable {
    /// Built-in table with configured overrides applied
    pub fn with_overrides(overrides: &HashMap<Material, MaterialProperties>) -> Self {
        let mut table = Self::default();
        for (material, properties) in overrides {
            table.properties[material.index()] = *properties;
        }
        table
    }

    /// Properties for a material
    pub fn get(&self, material: Material) -> MaterialProperties {
        self.properties[material.index()]
    }

    /// Occlusion of one block, scaled down while an openable block stands open
    pub fn block_occlusion(
        &self,
        block: &crate::acoustics::voxel::BlockState,
        open_factor: f32,
    ) -> f32 {
        let occlusion = self.get(block.material).occlusion;
        if block.openable && block.open {
            occlusion * open_factor
        } else {
            occlusion
        }
    }
}
