//! Region surface extraction.

use std::sync::Arc;

use strata_coords::{BoundarySide, RegionCoord, RegionLayout};

use crate::density::DensitySource;
use crate::lattice::DensityLattice;
use crate::polygonize::{Polygonizer, cells, is_shell_cell};
use crate::surface::{RetainedSurface, SeamDescriptor, SurfaceMesh};

/// Reasons an extraction cannot produce a mesh.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("density source returned non-finite value {value} at ({x}, {y}, {z})")]
    NonFiniteSample { x: f64, y: f64, z: f64, value: f64 },
    #[error("LOD {lod} unavailable: max LOD is {max_lod} and spacing must divide region size {region_size}")]
    InvalidLod {
        lod: u8,
        max_lod: u8,
        region_size: u32,
    },
}

/// Capability interface for surface extraction schemes.
pub trait SurfaceExtractor: Send + Sync {
    /// Extract the unstitched surface of `coord` at `lod`.
    ///
    /// Must be a pure function of its arguments and the density source.
    fn extract(&self, coord: RegionCoord, lod: u8) -> Result<SurfaceMesh, ExtractError>;

    /// Coarsest LOD this extractor accepts.
    fn max_lod(&self) -> u8;
}

/// Marching-tetrahedra extraction over a regular density lattice.
pub struct MarchingTetrahedra<D: ?Sized> {
    density: Arc<D>,
    layout: RegionLayout,
    base_resolution: u32,
    max_lod: u8,
}

impl<D: DensitySource + ?Sized> MarchingTetrahedra<D> {
    /// `base_resolution` is the sample spacing at LOD 0; each LOD doubles it.
    pub fn new(density: Arc<D>, layout: RegionLayout, base_resolution: u32, max_lod: u8) -> Self {
        Self {
            density,
            layout,
            base_resolution,
            max_lod,
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn density(&self) -> &Arc<D> {
        &self.density
    }

    /// Sample spacing for `lod`, if it evenly divides the region.
    pub fn spacing(&self, lod: u8) -> Result<u32, ExtractError> {
        let invalid = ExtractError::InvalidLod {
            lod,
            max_lod: self.max_lod,
            region_size: self.layout.region_size(),
        };
        if lod > self.max_lod {
            return Err(invalid);
        }
        let spacing = u64::from(self.base_resolution)
            .checked_shl(u32::from(lod))
            .filter(|&s| s > 0 && s <= u64::from(self.layout.region_size()))
            .ok_or_else(|| invalid.clone())?;
        if u64::from(self.layout.region_size()) % spacing != 0 {
            return Err(invalid);
        }
        Ok(spacing as u32)
    }
}

impl<D: DensitySource + ?Sized> SurfaceExtractor for MarchingTetrahedra<D> {
    fn extract(&self, coord: RegionCoord, lod: u8) -> Result<SurfaceMesh, ExtractError> {
        let spacing = self.spacing(lod)?;
        let origin = self.layout.origin(coord);
        let lattice = DensityLattice::sample(
            &*self.density,
            origin,
            spacing,
            self.layout.region_size() / spacing,
        )?;
        Ok(triangulate(coord, lod, origin, lattice))
    }

    fn max_lod(&self) -> u8 {
        self.max_lod
    }
}

/// Polygonize the core cells, snapshot them for later re-stitching, then the shell.
fn triangulate(coord: RegionCoord, lod: u8, origin: [i64; 3], lattice: DensityLattice) -> SurfaceMesh {
    let n = lattice.cells();
    let mut poly = Polygonizer::new(&lattice, |p| lattice.get(p));

    for cell in cells(n).filter(|&c| !is_shell_cell(c, n)) {
        poly.cell(cell);
    }
    let core_vertices = poly.vertices.clone();
    let core_indices = poly.indices.clone();
    let core_edges = poly.edges.clone();

    for cell in cells(n).filter(|&c| is_shell_cell(c, n)) {
        poly.cell(cell);
    }
    let (vertices, indices, _) = poly.finish();

    let surface_index_count = indices.len();
    let retained = Arc::new(RetainedSurface {
        lattice,
        core_vertices,
        core_indices,
        core_edges,
    });
    SurfaceMesh::new(
        coord,
        lod,
        origin,
        vertices,
        indices,
        surface_index_count,
        BoundarySide::ALL.map(|side| SeamDescriptor::pending(side, lod)),
        retained,
    )
}
