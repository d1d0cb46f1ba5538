//! Seam stitching between regions of differing LOD.
//!
//! Stitching always starts again from the retained core and sample lattice, so a mesh
//! can be re-stitched whenever a neighbor's displayed LOD or readiness changes:
//!
//! 1. On every side whose neighbor is coarser by `d` levels, the boundary plane is
//!    re-evaluated with the neighbor's piecewise-linear interpolant (coarse step
//!    `k = 2^d`) and the shell is re-polygonized. The fine triangulation refines the
//!    coarse one, so the boundary curve now lies exactly on the neighbor's.
//! 2. Boundary vertices that do not sit on a coarse lattice edge are T-vertices. Each
//!    is collapsed along the boundary polyline onto the nearest vertex that does.
//! 3. Coincident boundary vertices are welded, degenerate triangles dropped and
//!    unreferenced vertices compacted away.
//! 4. Sides whose neighbor is not ready get a drop-down skirt.

use std::collections::{BTreeSet, VecDeque};

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_coords::BoundarySide;

use crate::lattice::DensityLattice;
use crate::polygonize::{EdgeKey, Polygonizer, cells, is_shell_cell};
use crate::surface::{NeighborSeam, SeamDescriptor, SurfaceMesh, SurfaceVertex};

/// Displayed LOD of each face neighbor, `None` when the neighbor is not ready.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NeighborLods([Option<u8>; 6]);

impl NeighborLods {
    /// No neighbor is ready.
    pub const NONE: Self = Self([None; 6]);

    pub fn uniform(lod: u8) -> Self {
        Self([Some(lod); 6])
    }

    pub fn from_fn(mut f: impl FnMut(BoundarySide) -> Option<u8>) -> Self {
        Self(BoundarySide::ALL.map(|side| f(side)))
    }

    pub fn get(&self, side: BoundarySide) -> Option<u8> {
        self.0[side.index()]
    }

    pub fn set(&mut self, side: BoundarySide, lod: Option<u8>) {
        self.0[side.index()] = lod;
    }

    pub fn with(mut self, side: BoundarySide, lod: Option<u8>) -> Self {
        self.set(side, lod);
        self
    }

    /// The neighbor state a mesh stitched against these LODs records.
    pub fn seam(&self, side: BoundarySide) -> NeighborSeam {
        match self.get(side) {
            Some(lod) => NeighborSeam::Lod(lod),
            None => NeighborSeam::Missing,
        }
    }
}

/// Reconciles a mesh's boundary with its neighbors' LODs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeamStitcher {
    /// Drop of skirt walls, in world units. 0 disables skirts.
    pub skirt_depth: f32,
    /// Also add skirts on sides facing a coarser neighbor.
    pub skirt_lod_seams: bool,
    /// Boundary vertices closer than this are merged, in world units.
    pub weld_epsilon: f32,
}

impl Default for SeamStitcher {
    fn default() -> Self {
        Self {
            skirt_depth: 4.0,
            skirt_lod_seams: false,
            weld_epsilon: 1.0e-3,
        }
    }
}

impl SeamStitcher {
    /// Stitch `mesh` against `neighbors`. The input mesh is not modified.
    pub fn stitch(&self, mesh: &SurfaceMesh, neighbors: &NeighborLods) -> SurfaceMesh {
        let retained = mesh.retained();
        let lattice = &retained.lattice;
        let n = lattice.cells();
        let lod = mesh.lod();
        let steps = coarse_steps(lod, n, neighbors);

        let mut poly = Polygonizer::seeded(
            lattice,
            |p| resampled_value(lattice, &steps, p),
            retained.core_vertices.clone(),
            retained.core_indices.clone(),
            retained.core_edges.clone(),
        );
        for cell in cells(n).filter(|&c| is_shell_cell(c, n)) {
            poly.cell(cell);
        }
        let (vertices, indices, edges) = poly.finish();

        let mut planes = vec![0u8; vertices.len()];
        let mut kept = vec![0u8; vertices.len()];
        for (key, &index) in &edges {
            for side in BoundarySide::ALL {
                if !key.on_plane(side.axis(), plane_index(side, n)) {
                    continue;
                }
                let bit = side_bit(side);
                planes[index as usize] |= bit;
                if let Some(k) = steps[side.index()]
                    && on_coarse_edge(key, side, k)
                {
                    kept[index as usize] |= bit;
                }
            }
        }

        let coarse_mask = BoundarySide::ALL
            .into_iter()
            .filter(|side| steps[side.index()].is_some())
            .fold(0u8, |mask, side| mask | side_bit(side));
        let mut remap: Vec<u32> = (0..vertices.len() as u32).collect();
        for side in BoundarySide::ALL {
            if steps[side.index()].is_some() {
                collapse_t_vertices(side, coarse_mask, &indices, &planes, &kept, &mut remap);
            }
        }
        resolve_chains(&mut remap);
        let mut welds = UnionFind::new(vertices.len());
        self.weld(&vertices, &planes, &remap, &mut welds);

        let resolve = |v: u32| welds.find(remap[v as usize]);
        let mut out_vertices = Vec::with_capacity(vertices.len());
        let mut out_planes = Vec::with_capacity(vertices.len());
        let mut out_indices = Vec::with_capacity(indices.len());
        let mut compact = vec![u32::MAX; vertices.len()];
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(&resolve);
            if a == b || b == c || a == c {
                continue;
            }
            for v in [a, b, c] {
                let slot = &mut compact[v as usize];
                if *slot == u32::MAX {
                    *slot = out_vertices.len() as u32;
                    out_vertices.push(vertices[v as usize]);
                    out_planes.push(planes[v as usize]);
                }
                out_indices.push(*slot);
            }
        }

        let surface_index_count = out_indices.len();
        if self.skirt_depth > 0.0 {
            for side in BoundarySide::ALL {
                let wants_skirt = match neighbors.get(side) {
                    None => true,
                    Some(neighbor) => self.skirt_lod_seams && neighbor > lod,
                };
                if wants_skirt {
                    self.add_skirt(
                        side,
                        &mut out_vertices,
                        &mut out_indices,
                        &out_planes,
                        surface_index_count,
                    );
                }
            }
        }

        let seams = BoundarySide::ALL.map(|side| SeamDescriptor {
            side,
            lod,
            neighbor: neighbors.seam(side),
        });
        SurfaceMesh::new(
            mesh.coord(),
            lod,
            mesh.origin(),
            out_vertices,
            out_indices,
            surface_index_count,
            seams,
            retained.clone(),
        )
    }

    /// Union boundary vertices of the same side that lie within the weld distance.
    ///
    /// Vertices are bucketed on a grid of weld-sized cells, so each one is only
    /// compared against the 27 cells around it.
    fn weld(&self, vertices: &[SurfaceVertex], planes: &[u8], remap: &[u32], welds: &mut UnionFind) {
        let cell_size = self.weld_epsilon.max(f32::EPSILON);
        let limit = self.weld_epsilon * self.weld_epsilon;
        let cell_of = |p: Vec3| (p / cell_size).floor().as_i64vec3().to_array();
        for side in BoundarySide::ALL {
            let bit = side_bit(side);
            let mut buckets: FxHashMap<[i64; 3], Vec<u32>> = FxHashMap::default();
            for v in 0..vertices.len() as u32 {
                if planes[v as usize] & bit != 0 && remap[v as usize] == v {
                    buckets
                        .entry(cell_of(Vec3::from(vertices[v as usize].position)))
                        .or_default()
                        .push(v);
                }
            }
            for (cell, members) in &buckets {
                for &a in members {
                    let pa = Vec3::from(vertices[a as usize].position);
                    for dx in -1..=1 {
                        for dy in -1..=1 {
                            for dz in -1..=1 {
                                let near = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                                let Some(others) = buckets.get(&near) else {
                                    continue;
                                };
                                for &b in others {
                                    if b > a
                                        && pa.distance_squared(Vec3::from(vertices[b as usize].position)) <= limit
                                    {
                                        welds.union(a, b);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Extrude the side's boundary polyline into a wall hanging below the surface.
    fn add_skirt(
        &self,
        side: BoundarySide,
        vertices: &mut Vec<SurfaceVertex>,
        indices: &mut Vec<u32>,
        planes: &[u8],
        surface_index_count: usize,
    ) {
        let bit = side_bit(side);
        let outward = Vec3::from(side.normal());
        let offset = if side.axis() == 1 {
            -outward * self.skirt_depth
        } else {
            Vec3::NEG_Y * self.skirt_depth
        };

        let mut segments = BTreeSet::new();
        for tri in indices[..surface_index_count].chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                if planes[a as usize] & bit != 0 && planes[b as usize] & bit != 0 {
                    segments.insert((a.min(b), a.max(b)));
                }
            }
        }

        let mut lowered: FxHashMap<u32, u32> = FxHashMap::default();
        let mut lower = |v: u32, vertices: &mut Vec<SurfaceVertex>| {
            *lowered.entry(v).or_insert_with(|| {
                let top = vertices[v as usize];
                let position = Vec3::from(top.position) + offset;
                vertices.push(SurfaceVertex {
                    position: position.to_array(),
                    normal: top.normal,
                });
                (vertices.len() - 1) as u32
            })
        };

        for (a, b) in segments {
            let a_low = lower(a, vertices);
            let b_low = lower(b, vertices);
            let pa = Vec3::from(vertices[a as usize].position);
            let pb = Vec3::from(vertices[b as usize].position);
            let face = (pb - pa).cross(Vec3::from(vertices[b_low as usize].position) - pa);
            let facing = outward
                + Vec3::from(vertices[a as usize].normal)
                + Vec3::from(vertices[b as usize].normal);
            if face.dot(facing) >= 0.0 {
                indices.extend_from_slice(&[a, b, b_low, a, b_low, a_low]);
            } else {
                indices.extend_from_slice(&[a, b_low, b, a, a_low, b_low]);
            }
        }
    }
}

#[inline]
fn side_bit(side: BoundarySide) -> u8 {
    1 << side.index()
}

/// Lattice index of the side's boundary plane along its axis.
#[inline]
fn plane_index(side: BoundarySide, n: i32) -> i32 {
    if side.is_positive() { n } else { 0 }
}

/// Coarse lattice step, in this mesh's samples, on each side with a coarser neighbor.
fn coarse_steps(lod: u8, n: i32, neighbors: &NeighborLods) -> [Option<i32>; 6] {
    BoundarySide::ALL.map(|side| {
        let diff = neighbors.get(side)?.checked_sub(lod).filter(|&d| d > 0 && d < 16)?;
        let k = 1_i32 << diff;
        if k <= n && n % k == 0 {
            Some(k)
        } else {
            tracing::debug!(?side, lod, diff, cells = n, "coarse neighbor step does not divide lattice");
            None
        }
    })
}

/// Field value at `p`, replaced by the coarsest neighbor's interpolant on resampled
/// boundary planes.
fn resampled_value(lattice: &DensityLattice, steps: &[Option<i32>; 6], p: [i32; 3]) -> f32 {
    let n = lattice.cells();
    let mut coarsest: Option<(BoundarySide, i32)> = None;
    for side in BoundarySide::ALL {
        if let Some(k) = steps[side.index()]
            && p[side.axis()] == plane_index(side, n)
            && coarsest.is_none_or(|(_, best)| k > best)
        {
            coarsest = Some((side, k));
        }
    }
    match coarsest {
        Some((side, k)) => coarse_interpolant(lattice, side, k, p),
        None => lattice.get(p),
    }
}

/// Piecewise-linear interpolant of the coarse lattice on a boundary plane.
///
/// Coarse cells split along the `+u +v` diagonal, matching the triangulation the
/// coarse neighbor uses on the shared face.
fn coarse_interpolant(lattice: &DensityLattice, side: BoundarySide, k: i32, p: [i32; 3]) -> f32 {
    let (ua, va) = side.tangent_axes();
    let last_cell = lattice.cells() / k - 1;
    let split = |c: i32| {
        let cell = (c.max(0) / k).min(last_cell) * k;
        (cell, (c - cell) as f32 / k as f32)
    };
    let (u0, fu) = split(p[ua]);
    let (v0, fv) = split(p[va]);
    let at = |du: i32, dv: i32| {
        let mut q = p;
        q[ua] = u0 + du * k;
        q[va] = v0 + dv * k;
        lattice.get(q)
    };

    let c00 = at(0, 0);
    let c11 = at(1, 1);
    // Barycentric weights, so coarse samples are reproduced exactly.
    if fu >= fv {
        (1.0 - fu) * c00 + (fu - fv) * at(1, 0) + fv * c11
    } else {
        (1.0 - fv) * c00 + (fv - fu) * at(0, 1) + fu * c11
    }
}

/// Whether a boundary-plane edge lies on an edge of the coarse triangulation.
fn on_coarse_edge(key: &EdgeKey, side: BoundarySide, k: i32) -> bool {
    let (ua, va) = side.tangent_axes();
    let (su, sv) = (key.start[ua], key.start[va]);
    match (key.advances(ua), key.advances(va)) {
        (true, false) => sv % k == 0,
        (false, true) => su % k == 0,
        (true, true) => (su - sv).rem_euclid(k) == 0,
        (false, false) => false,
    }
}

/// Point every T-vertex on `side` at its nearest kept vertex along the boundary.
///
/// A target must be kept on every coarse side it touches and must lie on every coarse
/// plane the T-vertex lies on, so a vertex shared by two coarse sides is never pulled
/// off either of them. A remap left by an earlier side stands when it already
/// satisfies this side.
fn collapse_t_vertices(
    side: BoundarySide,
    coarse_mask: u8,
    indices: &[u32],
    planes: &[u8],
    kept: &[u8],
    remap: &mut [u32],
) {
    let bit = side_bit(side);
    let on_side = |v: u32| planes[v as usize] & bit != 0;
    let is_kept = |v: u32| kept[v as usize] & bit != 0;
    let settled = |v: u32| planes[v as usize] & coarse_mask & !kept[v as usize] == 0;

    let mut adjacency: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    for tri in indices.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            if on_side(a) && on_side(b) {
                adjacency.entry(a).or_default().push(b);
                adjacency.entry(b).or_default().push(a);
            }
        }
    }
    for list in adjacency.values_mut() {
        list.sort_unstable();
        list.dedup();
    }

    let mut starts: Vec<u32> = adjacency.keys().copied().filter(|&v| !is_kept(v)).collect();
    starts.sort_unstable();
    for start in starts {
        let required = planes[start as usize] & coarse_mask;
        let accepts = |v: u32| is_kept(v) && settled(v) && planes[v as usize] & required == required;
        if accepts(resolve(remap, start)) {
            continue;
        }

        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);
        let mut fallback = None;
        let mut target = None;
        'search: while let Some(v) = queue.pop_front() {
            for &next in adjacency.get(&v).map(Vec::as_slice).unwrap_or(&[]) {
                if !visited.insert(next) {
                    continue;
                }
                if accepts(next) {
                    target = Some(next);
                    break 'search;
                }
                if is_kept(next) {
                    fallback.get_or_insert(next);
                }
                queue.push_back(next);
            }
        }
        match target.or(fallback) {
            Some(target) => remap[start as usize] = target,
            None => tracing::trace!(vertex = start, ?side, "T-vertex has no kept neighbor"),
        }
    }
}

/// Follow a remap chain to its end. Cycles stop after one pass over the vertices.
fn resolve(remap: &[u32], mut v: u32) -> u32 {
    for _ in 0..remap.len() {
        let next = remap[v as usize];
        if next == v {
            break;
        }
        v = next;
    }
    v
}

/// Point every vertex straight at the end of its remap chain.
fn resolve_chains(remap: &mut [u32]) {
    for v in 0..remap.len() as u32 {
        remap[v as usize] = resolve(remap, v);
    }
}

/// Disjoint sets whose representative is the smallest member.
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
        }
    }

    fn find(&self, mut v: u32) -> u32 {
        while self.parent[v as usize] != v {
            v = self.parent[v as usize];
        }
        v
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[child as usize] = root;
    }
}
