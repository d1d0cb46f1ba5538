use glam::DVec3;

use crate::aabb::Aabb;
use crate::coord::RegionCoord;

/// Errors from constructing a [`RegionLayout`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Region edges must be a positive even number of world units so that the
    /// min corner of every region is an integer.
    #[error("region size must be a positive even integer, got {0}")]
    InvalidRegionSize(u32),
}

/// Mapping between region coordinates and world space for a fixed region size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionLayout {
    region_size: u32,
}

impl RegionLayout {
    pub fn new(region_size: u32) -> Result<Self, LayoutError> {
        if region_size == 0 || region_size % 2 != 0 {
            return Err(LayoutError::InvalidRegionSize(region_size));
        }
        Ok(Self { region_size })
    }

    /// Edge length of a region in world units.
    pub fn region_size(&self) -> u32 {
        self.region_size
    }

    /// World position of the region's min corner, which is the origin of its
    /// local frame. Exact integers.
    pub fn origin(&self, coord: RegionCoord) -> [i64; 3] {
        let size = self.region_size as i64;
        let half = size / 2;
        coord.to_array().map(|c| c * size - half)
    }

    /// [`origin`](Self::origin) as a world-space vector.
    pub fn origin_world(&self, coord: RegionCoord) -> DVec3 {
        let [x, y, z] = self.origin(coord);
        DVec3::new(x as f64, y as f64, z as f64)
    }

    /// Centre of the region in world space.
    pub fn center(&self, coord: RegionCoord) -> DVec3 {
        let size = self.region_size as f64;
        DVec3::new(coord.x as f64, coord.y as f64, coord.z as f64) * size
    }

    /// World-space bounds of the region.
    pub fn bounds(&self, coord: RegionCoord) -> Aabb {
        let min = self.origin_world(coord);
        Aabb::new(min, min + DVec3::splat(self.region_size as f64))
    }

    /// The region whose half-open bounds contain `point`.
    pub fn region_containing(&self, point: DVec3) -> RegionCoord {
        let size = self.region_size as f64;
        let index = |v: f64| ((v + size * 0.5) / size).floor() as i64;
        RegionCoord::new(index(point.x), index(point.y), index(point.z))
    }
}
