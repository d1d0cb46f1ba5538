//! Extracted surface geometry and its per-side seam state.

use std::sync::Arc;

use glam::DVec3;
use rustc_hash::FxHashMap;
use strata_coords::{BoundarySide, RegionCoord};

use crate::lattice::DensityLattice;
use crate::polygonize::EdgeKey;

/// One surface vertex, laid out for direct upload.
///
/// Positions are in the region-local frame (min corner at the origin).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SurfaceVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

static_assertions::assert_eq_size!(SurfaceVertex, [u8; 24]);

/// What a boundary side was stitched against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborSeam {
    /// Fresh extraction output, not stitched yet.
    Pending,
    /// The neighbor was not ready; the side carries a skirt.
    Missing,
    /// Stitched against a neighbor displayed at this LOD.
    Lod(u8),
}

/// Seam state of one boundary side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeamDescriptor {
    pub side: BoundarySide,
    /// LOD of the region that owns the mesh.
    pub lod: u8,
    pub neighbor: NeighborSeam,
}

impl SeamDescriptor {
    pub fn pending(side: BoundarySide, lod: u8) -> Self {
        Self {
            side,
            lod,
            neighbor: NeighborSeam::Pending,
        }
    }

    /// The neighbor LOD this side was stitched against, if it was ready.
    pub fn neighbor_lod(&self) -> Option<u8> {
        match self.neighbor {
            NeighborSeam::Lod(lod) => Some(lod),
            NeighborSeam::Pending | NeighborSeam::Missing => None,
        }
    }
}

/// Extraction state kept so the boundary shell can be rebuilt without touching the
/// density source again.
#[derive(Debug, PartialEq)]
pub(crate) struct RetainedSurface {
    pub lattice: DensityLattice,
    pub core_vertices: Vec<SurfaceVertex>,
    pub core_indices: Vec<u32>,
    pub core_edges: FxHashMap<EdgeKey, u32>,
}

/// Triangulated surface of one region at one LOD.
///
/// `indices` holds the surface triangles first; triangles past
/// [`surface_indices`](Self::surface_indices) are skirt walls.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceMesh {
    coord: RegionCoord,
    lod: u8,
    origin: [i64; 3],
    vertices: Vec<SurfaceVertex>,
    indices: Vec<u32>,
    surface_index_count: usize,
    seams: [SeamDescriptor; 6],
    retained: Arc<RetainedSurface>,
}

impl SurfaceMesh {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        coord: RegionCoord,
        lod: u8,
        origin: [i64; 3],
        vertices: Vec<SurfaceVertex>,
        indices: Vec<u32>,
        surface_index_count: usize,
        seams: [SeamDescriptor; 6],
        retained: Arc<RetainedSurface>,
    ) -> Self {
        debug_assert!(indices.len() % 3 == 0);
        debug_assert!(surface_index_count <= indices.len());
        Self {
            coord,
            lod,
            origin,
            vertices,
            indices,
            surface_index_count,
            seams,
            retained,
        }
    }

    pub fn coord(&self) -> RegionCoord {
        self.coord
    }

    pub fn lod(&self) -> u8 {
        self.lod
    }

    /// World position of the local frame's origin (the region's min corner).
    pub fn origin(&self) -> [i64; 3] {
        self.origin
    }

    pub fn origin_world(&self) -> DVec3 {
        let [x, y, z] = self.origin;
        DVec3::new(x as f64, y as f64, z as f64)
    }

    pub fn vertices(&self) -> &[SurfaceVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Surface triangles, without skirts.
    pub fn surface_indices(&self) -> &[u32] {
        &self.indices[..self.surface_index_count]
    }

    pub fn skirt_indices(&self) -> &[u32] {
        &self.indices[self.surface_index_count..]
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn seams(&self) -> &[SeamDescriptor; 6] {
        &self.seams
    }

    pub fn seam(&self, side: BoundarySide) -> SeamDescriptor {
        self.seams[side.index()]
    }

    /// World position of a vertex, translated by the single origin offset.
    pub fn world_position(&self, index: usize) -> DVec3 {
        self.origin_world() + DVec3::from(self.vertices[index].position.map(f64::from))
    }

    /// Raw vertex bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// The density samples this mesh was extracted from.
    pub fn lattice(&self) -> &DensityLattice {
        &self.retained.lattice
    }

    pub(crate) fn retained(&self) -> &Arc<RetainedSurface> {
        &self.retained
    }
}
