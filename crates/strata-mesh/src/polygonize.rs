//! Marching tetrahedra over a sample lattice.
//!
//! Every cube cell is split into six tetrahedra that share its main diagonal
//! (Freudenthal/Kuhn split). The split is the same in every cell, so a cube face is
//! triangulated identically from both sides and along region boundaries at every LOD.
//! Vertices live on lattice edges, keyed by the edge's lower endpoint and direction, and
//! are shared through an edge cache.

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::lattice::DensityLattice;
use crate::surface::SurfaceVertex;

/// Axis order walked from the min corner to the max corner, one per tetrahedron.
const TETRAHEDRA: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// A lattice edge in canonical form: lower endpoint plus a bitmask of the axes it
/// advances along. Every edge of the split runs in the positive direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EdgeKey {
    pub start: [i32; 3],
    pub dir: u8,
}

impl EdgeKey {
    fn between(lo: [i32; 3], hi: [i32; 3]) -> Self {
        let mut dir = 0;
        for axis in 0..3 {
            debug_assert!(matches!(hi[axis] - lo[axis], 0 | 1));
            if hi[axis] > lo[axis] {
                dir |= 1 << axis;
            }
        }
        Self { start: lo, dir }
    }

    #[inline]
    pub fn advances(&self, axis: usize) -> bool {
        self.dir & (1 << axis) != 0
    }

    /// Whether the whole edge lies in the plane `p[axis] == index`.
    #[inline]
    pub fn on_plane(&self, axis: usize, index: i32) -> bool {
        self.start[axis] == index && !self.advances(axis)
    }
}

/// Cells of an `n`-cell lattice in z, y, x order.
pub(crate) fn cells(n: i32) -> impl Iterator<Item = [i32; 3]> {
    (0..n).flat_map(move |z| (0..n).flat_map(move |y| (0..n).map(move |x| [x, y, z])))
}

/// Cells touching a region boundary plane.
#[inline]
pub(crate) fn is_shell_cell(cell: [i32; 3], n: i32) -> bool {
    cell.iter().any(|&c| c == 0 || c == n - 1)
}

/// Accumulates triangles for cells evaluated against `field`.
///
/// `field` supplies the values that decide topology and vertex placement; normals
/// always come from the lattice's own gradient.
pub(crate) struct Polygonizer<'a, F> {
    lattice: &'a DensityLattice,
    field: F,
    pub vertices: Vec<SurfaceVertex>,
    pub indices: Vec<u32>,
    pub edges: FxHashMap<EdgeKey, u32>,
}

impl<'a, F> Polygonizer<'a, F>
where
    F: Fn([i32; 3]) -> f32,
{
    pub fn new(lattice: &'a DensityLattice, field: F) -> Self {
        Self::seeded(lattice, field, Vec::new(), Vec::new(), FxHashMap::default())
    }

    /// Continue from existing geometry whose edge vertices are listed in `edges`.
    pub fn seeded(
        lattice: &'a DensityLattice,
        field: F,
        vertices: Vec<SurfaceVertex>,
        indices: Vec<u32>,
        edges: FxHashMap<EdgeKey, u32>,
    ) -> Self {
        Self {
            lattice,
            field,
            vertices,
            indices,
            edges,
        }
    }

    pub fn cell(&mut self, cell: [i32; 3]) {
        for order in TETRAHEDRA {
            let mut corners = [cell; 4];
            for (step, &axis) in order.iter().enumerate() {
                corners[step + 1] = corners[step];
                corners[step + 1][axis] += 1;
            }
            let values = corners.map(|c| (self.field)(c));
            self.tetrahedron(&corners, &values);
        }
    }

    fn tetrahedron(&mut self, corners: &[[i32; 3]; 4], values: &[f32; 4]) {
        let mut inside = [0usize; 4];
        let mut outside = [0usize; 4];
        let (mut n_in, mut n_out) = (0, 0);
        for (i, &v) in values.iter().enumerate() {
            if v < 0.0 {
                inside[n_in] = i;
                n_in += 1;
            } else {
                outside[n_out] = i;
                n_out += 1;
            }
        }

        match n_in {
            1 => {
                let i = inside[0];
                let tri = [outside[0], outside[1], outside[2]]
                    .map(|o| self.edge_vertex(corners, values, i, o));
                self.emit(tri);
            }
            3 => {
                let o = outside[0];
                let tri = [inside[0], inside[1], inside[2]]
                    .map(|i| self.edge_vertex(corners, values, o, i));
                self.emit(tri);
            }
            2 => {
                let (i1, i2) = (inside[0], inside[1]);
                let (o1, o2) = (outside[0], outside[1]);
                let a = self.edge_vertex(corners, values, i1, o1);
                let b = self.edge_vertex(corners, values, i1, o2);
                let c = self.edge_vertex(corners, values, i2, o2);
                let d = self.edge_vertex(corners, values, i2, o1);
                self.emit([a, b, c]);
                self.emit([a, c, d]);
            }
            _ => {}
        }
    }

    fn edge_vertex(
        &mut self,
        corners: &[[i32; 3]; 4],
        values: &[f32; 4],
        i: usize,
        j: usize,
    ) -> u32 {
        // Corners are ordered componentwise, so the lower index is the lower endpoint.
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let key = EdgeKey::between(corners[lo], corners[hi]);
        if let Some(&index) = self.edges.get(&key) {
            return index;
        }

        let (va, vb) = (values[lo], values[hi]);
        let t = va / (va - vb);
        let pa = self.lattice.local_position(corners[lo]);
        let pb = self.lattice.local_position(corners[hi]);
        let position = pa + (pb - pa) * t;
        let normal = self
            .lattice
            .gradient(corners[lo])
            .lerp(self.lattice.gradient(corners[hi]), t)
            .try_normalize()
            .unwrap_or(Vec3::Y);

        let index = self.vertices.len() as u32;
        self.vertices.push(SurfaceVertex {
            position: position.to_array(),
            normal: normal.to_array(),
        });
        self.edges.insert(key, index);
        index
    }

    /// Push a triangle wound so its face normal agrees with the vertex normals.
    fn emit(&mut self, [a, b, c]: [u32; 3]) {
        if a == b || b == c || a == c {
            return;
        }
        let vertex = |i: u32| self.vertices[i as usize];
        let (va, vb, vc) = (vertex(a), vertex(b), vertex(c));
        let pa = Vec3::from(va.position);
        let face = (Vec3::from(vb.position) - pa).cross(Vec3::from(vc.position) - pa);
        let shading = Vec3::from(va.normal) + Vec3::from(vb.normal) + Vec3::from(vc.normal);
        if face.dot(shading) < 0.0 {
            self.indices.extend_from_slice(&[a, c, b]);
        } else {
            self.indices.extend_from_slice(&[a, b, c]);
        }
    }

    pub fn finish(self) -> (Vec<SurfaceVertex>, Vec<u32>, FxHashMap<EdgeKey, u32>) {
        (self.vertices, self.indices, self.edges)
    }
}
