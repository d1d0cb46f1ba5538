use std::fmt;

use crate::side::BoundarySide;

/// Integer address of a region. Stable across runs, hashable and totally ordered
/// so that region sets iterate deterministically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl RegionCoord {
    /// The region containing the world origin.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The region across the given face.
    pub fn neighbor(self, side: BoundarySide) -> Self {
        let [dx, dy, dz] = side.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// All six face neighbors, in [`BoundarySide::ALL`] order.
    pub fn neighbors(self) -> [(BoundarySide, RegionCoord); 6] {
        BoundarySide::ALL.map(|side| (side, self.neighbor(side)))
    }

    /// Chebyshev distance over X and Z, in region units.
    pub fn horizontal_distance(self, other: Self) -> u64 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }

    /// Distance along Y, in region units.
    pub fn vertical_distance(self, other: Self) -> u64 {
        self.y.abs_diff(other.y)
    }

    /// Squared Euclidean distance in region units.
    pub fn distance_sq(self, other: Self) -> u64 {
        let dx = (self.x - other.x) as i128;
        let dy = (self.y - other.y) as i128;
        let dz = (self.z - other.z) as i128;
        (dx * dx + dy * dy + dz * dz).min(u64::MAX as i128) as u64
    }

    pub fn to_array(self) -> [i64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[i64; 3]> for RegionCoord {
    fn from([x, y, z]: [i64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_roundtrip() {
        let c = RegionCoord::new(3, -2, 7);
        for side in BoundarySide::ALL {
            assert_eq!(c.neighbor(side).neighbor(side.opposite()), c);
        }
    }

    #[test]
    fn test_distances() {
        let a = RegionCoord::new(0, 0, 0);
        let b = RegionCoord::new(-3, 1, 2);
        assert_eq!(a.horizontal_distance(b), 3);
        assert_eq!(a.vertical_distance(b), 1);
        assert_eq!(a.distance_sq(b), 14);
    }

    /// Ordering is lexicographic on (x, y, z), which keeps sorted sets stable.
    #[test]
    fn test_ordering_is_lexicographic() {
        let mut coords = vec![
            RegionCoord::new(1, 0, 0),
            RegionCoord::new(0, 5, 0),
            RegionCoord::new(0, 0, 9),
        ];
        coords.sort();
        assert_eq!(coords[0], RegionCoord::new(0, 0, 9));
        assert_eq!(coords[2], RegionCoord::new(1, 0, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(RegionCoord::new(1, -2, 3).to_string(), "(1, -2, 3)");
    }
}
