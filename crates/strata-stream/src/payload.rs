use std::sync::Arc;

use strata_coords::BoundarySide;
use strata_mesh::{NeighborLods, SurfaceMesh};
use strata_terrain::{BiomeId, ContentPoint};

/// Everything committed for one region.
#[derive(Debug)]
pub struct RegionPayload {
    /// Unstitched extraction output, kept for re-stitching.
    pub base: Arc<SurfaceMesh>,
    /// Stitched mesh on display.
    pub mesh: SurfaceMesh,
    pub content: Arc<[ContentPoint]>,
    /// Biomes present in the region, sorted.
    pub biomes: Arc<[BiomeId]>,
    /// Neighbor LODs `mesh` was stitched against.
    pub neighbors: NeighborLods,
}

/// What a side's stitching depends on. Equal and finer neighbors need no work.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SeamClass {
    Missing,
    Matched,
    Coarser(u8),
}

fn classify(own: u8, neighbor: Option<u8>) -> SeamClass {
    match neighbor {
        None => SeamClass::Missing,
        Some(lod) if lod > own => SeamClass::Coarser(lod),
        Some(_) => SeamClass::Matched,
    }
}

impl RegionPayload {
    pub fn lod(&self) -> u8 {
        self.mesh.lod()
    }

    /// Whether stitching against `current` would give the same mesh.
    pub fn seams_match(&self, current: &NeighborLods) -> bool {
        let own = self.lod();
        BoundarySide::ALL
            .into_iter()
            .all(|side| classify(own, self.neighbors.get(side)) == classify(own, current.get(side)))
    }
}
