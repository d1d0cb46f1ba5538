use glam::DVec3;

/// Half-open axis-aligned box `[min, max)` in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// A box of half-size `half_extent` around `center`.
    pub fn around(center: DVec3, half_extent: DVec3) -> Self {
        Self::new(center - half_extent, center + half_extent)
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// True when the open interiors overlap on every axis.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmplt(self.max).all()
    }

    /// The point of the box closest to `point`.
    pub fn nearest_point(&self, point: DVec3) -> DVec3 {
        point.clamp(self.min, self.max)
    }
}
