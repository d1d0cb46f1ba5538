//! Heightfield terrain with optional noise caves, exposed as a density field.

use std::sync::Arc;

use strata_mesh::DensitySource;

use crate::biome::BiomeTable;
use crate::fbm::{Fbm, FbmParams};

/// Width of the band over which caves fade in and out at their depth limits.
const CAVE_FADE: f64 = 4.0;

/// 3D noise caves carved below the surface.
#[derive(Clone, Debug, PartialEq)]
pub struct CaveParams {
    /// Normalized noise below this value is carved out.
    pub threshold: f64,
    pub noise: FbmParams,
    /// Scale applied to the carved density so cave walls have a usable gradient.
    pub strength: f64,
    /// No caves closer than this to the surface.
    pub min_depth: f64,
    pub max_depth: f64,
}

impl Default for CaveParams {
    fn default() -> Self {
        Self {
            threshold: -0.35,
            noise: FbmParams {
                octaves: 2,
                base_frequency: 0.05,
                amplitude: 1.0,
                lacunarity: 2.0,
                persistence: 0.5,
            },
            strength: 8.0,
            min_depth: 4.0,
            max_depth: 48.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerrainParams {
    pub base_height: f64,
    pub height: FbmParams,
    pub caves: Option<CaveParams>,
}

/// `density = y - surface_height(x, z)`, carved by caves where enabled.
///
/// Negative density is solid. The field is continuous, which keeps extracted
/// vertices and normals stable across LODs.
pub struct TerrainDensity {
    base_height: f64,
    height: Fbm,
    caves: Option<(Fbm, CaveParams)>,
    biomes: Option<Arc<BiomeTable>>,
}

impl TerrainDensity {
    pub fn new(seed: u64, params: TerrainParams) -> Self {
        let height = Fbm::new(seed as u32, params.height);
        let caves = params.caves.map(|caves| {
            let noise = Fbm::new((seed ^ 0x5EED_CA7E) as u32, caves.noise.clone());
            (noise, caves)
        });
        Self {
            base_height: params.base_height,
            height,
            caves,
            biomes: None,
        }
    }

    /// Terrain whose height is shaped per biome.
    pub fn with_biomes(seed: u64, params: TerrainParams, biomes: Arc<BiomeTable>) -> Self {
        Self {
            biomes: Some(biomes),
            ..Self::new(seed, params)
        }
    }

    /// Height of the terrain surface above `(x, z)`, ignoring caves.
    pub fn surface_height(&self, x: f64, z: f64) -> f64 {
        let (offset, scale) = match &self.biomes {
            Some(biomes) => biomes.height_shape(x, z),
            None => (0.0, 1.0),
        };
        self.base_height + offset + scale * self.height.sample_2d(x, z)
    }

    fn carve(&self, x: f64, y: f64, z: f64, solid: f64) -> f64 {
        let Some((noise, caves)) = &self.caves else {
            return solid;
        };
        let depth = -solid;
        let fade = smoothstep(caves.min_depth, caves.min_depth + CAVE_FADE, depth)
            * (1.0 - smoothstep(caves.max_depth - CAVE_FADE, caves.max_depth, depth));
        if fade <= 0.0 {
            return solid;
        }
        let scale = noise.max_amplitude().max(f64::EPSILON);
        let cave = caves.strength * (caves.threshold - noise.sample_3d(x, y, z) / scale);
        solid + (solid.max(cave) - solid) * fade
    }
}

impl DensitySource for TerrainDensity {
    fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let solid = y - self.surface_height(x, z);
        self.carve(x, y, z, solid)
    }
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
