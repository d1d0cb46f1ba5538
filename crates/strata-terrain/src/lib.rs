//! Reference terrain for the streaming pipeline: a noise-backed density field shaped
//! by a biome table, and deterministic content placement on extracted surfaces.

mod biome;
mod content;
mod density;
mod fbm;
mod seed;

pub use biome::{Biome, BiomeError, BiomeId, BiomeParams, BiomeTable};
pub use content::{ContentPlacer, ContentPoint, ContentVariety, Placement, Scaling, VarietyError};
pub use density::{CaveParams, TerrainDensity, TerrainParams};
pub use fbm::{Fbm, FbmParams};
pub use seed::{derive_cell_seed, derive_region_seed, region_rng};
