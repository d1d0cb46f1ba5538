//! Surface extraction and seam stitching.
//!
//! A [`DensitySource`] is sampled on a regular lattice per region and LOD, the zero
//! set is triangulated with [`MarchingTetrahedra`], and [`SeamStitcher`] reconciles
//! each mesh's boundary with its neighbors' displayed LODs.

mod density;
mod extract;
mod lattice;
mod polygonize;
mod stitch;
mod surface;

pub use density::DensitySource;
pub use extract::{ExtractError, MarchingTetrahedra, SurfaceExtractor};
pub use lattice::DensityLattice;
pub use stitch::{NeighborLods, SeamStitcher};
pub use surface::{NeighborSeam, SeamDescriptor, SurfaceMesh, SurfaceVertex};
