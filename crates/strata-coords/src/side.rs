//! The six boundary faces of a cubic region.

/// One of the six faces a region shares with a neighbor.
///
/// The `repr(u8)` discriminant doubles as the index into per-side arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BoundarySide {
    /// +X face.
    PosX = 0,
    /// −X face.
    NegX = 1,
    /// +Y face.
    PosY = 2,
    /// −Y face.
    NegY = 3,
    /// +Z face.
    PosZ = 4,
    /// −Z face.
    NegZ = 5,
}

impl BoundarySide {
    /// All six sides in index order.
    pub const ALL: [BoundarySide; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Index into per-side arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The axis perpendicular to this face (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Self::PosX | Self::NegX => 0,
            Self::PosY | Self::NegY => 1,
            Self::PosZ | Self::NegZ => 2,
        }
    }

    /// Whether the face lies on the max end of its axis.
    #[inline]
    pub fn is_positive(self) -> bool {
        matches!(self, Self::PosX | Self::PosY | Self::PosZ)
    }

    /// The two axes spanning the face, in increasing order.
    ///
    /// Lattice diagonals on a face always run along `+u +v` in this ordering.
    pub fn tangent_axes(self) -> (usize, usize) {
        match self.axis() {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        }
    }

    /// Step from a region to its neighbor across this face, in region units.
    pub fn offset(self) -> [i64; 3] {
        match self {
            Self::PosX => [1, 0, 0],
            Self::NegX => [-1, 0, 0],
            Self::PosY => [0, 1, 0],
            Self::NegY => [0, -1, 0],
            Self::PosZ => [0, 0, 1],
            Self::NegZ => [0, 0, -1],
        }
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> [f32; 3] {
        let [x, y, z] = self.offset();
        [x as f32, y as f32, z as f32]
    }

    /// The face on the other side of the shared boundary.
    pub fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
            Self::PosZ => Self::NegZ,
            Self::NegZ => Self::PosZ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for side in BoundarySide::ALL {
            assert_eq!(BoundarySide::from_index(side.index()), Some(side));
        }
        assert_eq!(BoundarySide::from_index(6), None);
    }

    #[test]
    fn test_opposite_is_involution() {
        for side in BoundarySide::ALL {
            assert_ne!(side, side.opposite());
            assert_eq!(side.opposite().opposite(), side);
            assert_eq!(side.axis(), side.opposite().axis());
        }
    }

    /// Tangent axes never include the face axis and are sorted.
    #[test]
    fn test_tangent_axes_exclude_normal_axis() {
        for side in BoundarySide::ALL {
            let (u, v) = side.tangent_axes();
            assert!(u < v);
            assert_ne!(u, side.axis());
            assert_ne!(v, side.axis());
        }
    }

    #[test]
    fn test_normal_matches_offset_sign() {
        for side in BoundarySide::ALL {
            let n = side.normal();
            let sign = if side.is_positive() { 1.0 } else { -1.0 };
            assert_eq!(n[side.axis()], sign);
        }
    }
}
