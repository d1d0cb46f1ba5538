//! Biome table: a low-frequency noise field split into bands by threshold.
//!
//! Rows are checked in order and the first whose threshold lies above the noise
//! value wins. Each biome shapes the terrain height, restricts which content
//! varieties grow in it and carries a ground layer id for the renderer.

use glam::DVec3;
use hashbrown::HashMap;

use crate::fbm::{Fbm, FbmParams};

/// Index of a biome in its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BiomeId(pub u16);

/// One row of the biome table.
#[derive(Clone, Debug, PartialEq)]
pub struct Biome {
    pub name: String,
    /// Selected where the normalized biome noise lies below this value.
    pub threshold: f64,
    /// Ground material layer painted under this biome.
    pub layer: u32,
    /// Added to the terrain's base height.
    pub height_offset: f64,
    /// Multiplies the height noise.
    pub height_scale: f64,
    /// Fraction in `[0, 1]` of candidate content points kept.
    pub content_density: f64,
    /// Variety indices allowed to grow here. Empty allows all of them.
    pub varieties: Vec<usize>,
}

impl Biome {
    /// A biome that leaves terrain and content untouched.
    pub fn neutral(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threshold: f64::INFINITY,
            layer: 0,
            height_offset: 0.0,
            height_scale: 1.0,
            content_density: 1.0,
            varieties: Vec::new(),
        }
    }

    pub fn allows(&self, variety: usize) -> bool {
        self.varieties.is_empty() || self.varieties.contains(&variety)
    }
}

/// Parameters for a [`BiomeTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct BiomeParams {
    pub noise: FbmParams,
    /// Half-width, in noise units, of the height blend around each threshold.
    pub blend: f64,
    pub rows: Vec<Biome>,
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            noise: FbmParams {
                octaves: 2,
                base_frequency: 0.002,
                amplitude: 1.0,
                lacunarity: 2.0,
                persistence: 0.5,
            },
            blend: 0.1,
            rows: vec![Biome::neutral("default")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BiomeError {
    #[error("biome table has no rows")]
    Empty,
    #[error("duplicate biome name: {0}")]
    DuplicateName(String),
    #[error("biome '{name}': thresholds must be strictly increasing, got {threshold}")]
    UnorderedThreshold { name: String, threshold: f64 },
    #[error("biome '{name}': {field} must be finite, got {value}")]
    NonFinite {
        name: String,
        field: &'static str,
        value: f64,
    },
    #[error("biome '{name}': content density must lie in [0, 1], got {density}")]
    InvalidDensity { name: String, density: f64 },
    #[error("biome '{name}' names unknown variety '{variety}'")]
    UnknownVariety { name: String, variety: String },
    #[error("biome blend width must be finite and non-negative, got {0}")]
    InvalidBlend(f64),
}

/// Deterministic biome lookup over world XZ.
pub struct BiomeTable {
    noise: Fbm,
    blend: f64,
    rows: Vec<Biome>,
    by_name: HashMap<String, BiomeId>,
}

impl BiomeTable {
    pub fn new(seed: u64, params: BiomeParams) -> Result<Self, BiomeError> {
        if params.rows.is_empty() {
            return Err(BiomeError::Empty);
        }
        if !params.blend.is_finite() || params.blend < 0.0 {
            return Err(BiomeError::InvalidBlend(params.blend));
        }
        let mut by_name = HashMap::new();
        let mut previous = f64::NEG_INFINITY;
        for (i, row) in params.rows.iter().enumerate() {
            if by_name.insert(row.name.clone(), BiomeId(i as u16)).is_some() {
                return Err(BiomeError::DuplicateName(row.name.clone()));
            }
            // The last row may stay open-ended.
            if row.threshold.is_nan() || row.threshold <= previous {
                return Err(BiomeError::UnorderedThreshold {
                    name: row.name.clone(),
                    threshold: row.threshold,
                });
            }
            previous = row.threshold;
            for (field, value) in [("height_offset", row.height_offset), ("height_scale", row.height_scale)] {
                if !value.is_finite() {
                    return Err(BiomeError::NonFinite {
                        name: row.name.clone(),
                        field,
                        value,
                    });
                }
            }
            if !(0.0..=1.0).contains(&row.content_density) {
                return Err(BiomeError::InvalidDensity {
                    name: row.name.clone(),
                    density: row.content_density,
                });
            }
        }
        Ok(Self {
            noise: Fbm::new((seed ^ 0xB10E_5EED) as u32, params.noise),
            blend: params.blend,
            rows: params.rows,
            by_name,
        })
    }

    /// A single neutral biome covering the whole world.
    pub fn uniform(seed: u64) -> Self {
        let params = BiomeParams::default();
        let mut by_name = HashMap::new();
        for (i, row) in params.rows.iter().enumerate() {
            by_name.insert(row.name.clone(), BiomeId(i as u16));
        }
        Self {
            noise: Fbm::new((seed ^ 0xB10E_5EED) as u32, params.noise),
            blend: params.blend,
            rows: params.rows,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: BiomeId) -> Option<&Biome> {
        self.rows.get(id.0 as usize)
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<BiomeId> {
        self.by_name.get(name).copied()
    }

    pub fn biomes(&self) -> &[Biome] {
        &self.rows
    }

    /// Biome noise at `(x, z)`, normalized to roughly `[-1, 1]`.
    pub fn noise_at(&self, x: f64, z: f64) -> f64 {
        if self.rows.len() == 1 {
            return 0.0;
        }
        self.noise.sample_2d(x, z) / self.noise.max_amplitude().max(f64::EPSILON)
    }

    /// Values above the last threshold fall to the last row.
    pub fn biome_id_at(&self, x: f64, z: f64) -> BiomeId {
        let value = self.noise_at(x, z);
        let index = self
            .rows
            .iter()
            .position(|row| value < row.threshold)
            .unwrap_or(self.rows.len() - 1);
        BiomeId(index as u16)
    }

    pub fn biome_at(&self, x: f64, z: f64) -> &Biome {
        &self.rows[self.biome_id_at(x, z).0 as usize]
    }

    /// Height `(offset, scale)` at `(x, z)`, blended across thresholds so the
    /// surface stays continuous.
    pub fn height_shape(&self, x: f64, z: f64) -> (f64, f64) {
        let first = &self.rows[0];
        let (mut offset, mut scale) = (first.height_offset, first.height_scale);
        if self.rows.len() == 1 {
            return (offset, scale);
        }
        let value = self.noise_at(x, z);
        // Each boundary contributes the step to the next row, so deep inside row
        // `i` the sum telescopes to row `i` exactly.
        for pair in self.rows.windows(2) {
            let edge = pair[0].threshold;
            let weight = step(edge - self.blend, edge + self.blend, value);
            if weight <= 0.0 {
                break;
            }
            offset += (pair[1].height_offset - pair[0].height_offset) * weight;
            scale += (pair[1].height_scale - pair[0].height_scale) * weight;
        }
        (offset, scale)
    }

    /// Sorted ids of the biomes sampled on a `spacing`-spaced XZ grid over the
    /// square starting at `origin` with edge `extent`.
    pub fn palette(&self, origin: DVec3, extent: f64, spacing: f64) -> Vec<BiomeId> {
        if self.rows.len() == 1 {
            return vec![BiomeId(0)];
        }
        let count = (extent / spacing.max(f64::EPSILON)).ceil().max(1.0) as u32;
        let mut ids = Vec::new();
        for iz in 0..=count {
            for ix in 0..=count {
                let x = origin.x + (f64::from(ix) * spacing).min(extent);
                let z = origin.z + (f64::from(iz) * spacing).min(extent);
                let id = self.biome_id_at(x, z);
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        ids
    }
}

fn step(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
