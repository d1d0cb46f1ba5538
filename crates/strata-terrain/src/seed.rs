//! Deterministic seed derivation.
//!
//! Seeds are hashed with std's SipHash (fixed keys), so the same inputs give the same
//! stream on every thread and every run.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_coords::RegionCoord;

/// Seed for one region at one LOD. `stream` separates independent consumers
/// (for example one per content variety).
pub fn derive_region_seed(world_seed: u64, coord: RegionCoord, lod: u8, stream: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    coord.hash(&mut hasher);
    lod.hash(&mut hasher);
    stream.hash(&mut hasher);
    hasher.finish()
}

/// Seed for one cell of a world-aligned 2D grid; independent of regions and LODs.
pub fn derive_cell_seed(world_seed: u64, stream: u64, cell: [i64; 2]) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    stream.hash(&mut hasher);
    cell.hash(&mut hasher);
    hasher.finish()
}

pub fn region_rng(world_seed: u64, coord: RegionCoord, lod: u8, stream: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_region_seed(world_seed, coord, lod, stream))
}
