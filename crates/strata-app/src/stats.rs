//! Headless sink that tallies what is on display.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strata_coords::RegionCoord;
use strata_mesh::SurfaceMesh;
use strata_stream::{ContentSink, GeometrySink};
use strata_terrain::ContentPoint;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayTotals {
    pub regions: usize,
    pub triangles: usize,
    pub content: usize,
    /// Every delivery, re-stitches included.
    pub deliveries: u64,
    pub removals: u64,
    /// Displayed regions per LOD.
    pub per_lod: Vec<usize>,
}

#[derive(Default)]
struct Tally {
    meshes: HashMap<RegionCoord, (u8, usize)>,
    content: HashMap<RegionCoord, usize>,
    deliveries: u64,
    removals: u64,
}

/// Cloneable handle; every clone feeds the same tally.
#[derive(Clone, Default)]
pub struct StatsSink {
    tally: Arc<Mutex<Tally>>,
}

impl StatsSink {
    fn lock(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn totals(&self) -> DisplayTotals {
        let tally = self.lock();
        let mut per_lod = Vec::new();
        for &(lod, _) in tally.meshes.values() {
            let lod = usize::from(lod);
            if per_lod.len() <= lod {
                per_lod.resize(lod + 1, 0);
            }
            per_lod[lod] += 1;
        }
        DisplayTotals {
            regions: tally.meshes.len(),
            triangles: tally.meshes.values().map(|&(_, triangles)| triangles).sum(),
            content: tally.content.values().sum(),
            deliveries: tally.deliveries,
            removals: tally.removals,
            per_lod,
        }
    }
}

impl GeometrySink for StatsSink {
    fn region_ready(&mut self, coord: RegionCoord, lod: u8, mesh: &SurfaceMesh, _sequence: u64) {
        let mut tally = self.lock();
        tally.meshes.insert(coord, (lod, mesh.triangle_count()));
        tally.deliveries += 1;
    }

    fn region_removed(&mut self, coord: RegionCoord) {
        let mut tally = self.lock();
        tally.meshes.remove(&coord);
        tally.removals += 1;
    }
}

impl ContentSink for StatsSink {
    fn content_ready(&mut self, coord: RegionCoord, points: &[ContentPoint]) {
        self.lock().content.insert(coord, points.len());
    }

    fn content_removed(&mut self, coord: RegionCoord) {
        self.lock().content.remove(&coord);
    }
}
