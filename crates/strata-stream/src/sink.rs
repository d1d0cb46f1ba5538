use strata_coords::RegionCoord;
use strata_mesh::SurfaceMesh;
use strata_terrain::ContentPoint;

/// Rendering or physics consumer of region geometry. Called on the control thread.
pub trait GeometrySink: Send {
    /// `mesh` replaces anything previously delivered for `coord`. `sequence`
    /// increases with every delivery.
    fn region_ready(&mut self, coord: RegionCoord, lod: u8, mesh: &SurfaceMesh, sequence: u64);

    fn region_removed(&mut self, coord: RegionCoord);
}

/// Consumer of placed content, delivered alongside fresh extractions.
pub trait ContentSink: Send {
    fn content_ready(&mut self, coord: RegionCoord, points: &[ContentPoint]);

    fn content_removed(&mut self, coord: RegionCoord);
}
