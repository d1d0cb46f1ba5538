//! Regular density samples covering one region plus a one-sample border.

use glam::Vec3;

use crate::density::DensitySource;
use crate::extract::ExtractError;

/// Density samples of one region at one LOD.
///
/// Lattice indices run from `-1` to `cells + 1` on every axis. Index `i` sits at the
/// region-local offset `i * spacing`, so indices `0..=cells` cover the region and the
/// outer layer lies in the neighbors' space, where it only feeds gradients.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityLattice {
    cells: i32,
    spacing: u32,
    stride: usize,
    values: Vec<f32>,
}

impl DensityLattice {
    /// Sample `density` around a region whose min corner is `origin`.
    ///
    /// World positions are formed in integer arithmetic before conversion, so they are
    /// exact for any region the layout can address.
    pub fn sample<D: DensitySource + ?Sized>(
        density: &D,
        origin: [i64; 3],
        spacing: u32,
        cells: u32,
    ) -> Result<Self, ExtractError> {
        let n = cells as i32;
        let stride = cells as usize + 3;
        let step = i64::from(spacing);
        let mut values = Vec::with_capacity(stride * stride * stride);

        for k in -1..=n + 1 {
            let z = (origin[2] + i64::from(k) * step) as f64;
            for j in -1..=n + 1 {
                let y = (origin[1] + i64::from(j) * step) as f64;
                for i in -1..=n + 1 {
                    let x = (origin[0] + i64::from(i) * step) as f64;
                    let value = density.sample(x, y, z);
                    let narrowed = value as f32;
                    if !narrowed.is_finite() {
                        return Err(ExtractError::NonFiniteSample { x, y, z, value });
                    }
                    values.push(narrowed);
                }
            }
        }

        Ok(Self {
            cells: n,
            spacing,
            stride,
            values,
        })
    }

    /// Cells per axis inside the region.
    pub fn cells(&self) -> i32 {
        self.cells
    }

    /// Distance between neighboring samples, in world units.
    pub fn spacing(&self) -> u32 {
        self.spacing
    }

    #[inline]
    pub fn get(&self, p: [i32; 3]) -> f32 {
        self.values[self.index(p)]
    }

    /// Region-local position of a lattice point.
    #[inline]
    pub fn local_position(&self, p: [i32; 3]) -> Vec3 {
        Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) * self.spacing as f32
    }

    /// Central-difference gradient at a point inside the region (`0..=cells`).
    pub fn gradient(&self, p: [i32; 3]) -> Vec3 {
        let mut g = [0.0_f32; 3];
        for (axis, component) in g.iter_mut().enumerate() {
            let mut hi = p;
            let mut lo = p;
            hi[axis] += 1;
            lo[axis] -= 1;
            *component = self.get(hi) - self.get(lo);
        }
        Vec3::from(g) / (2.0 * self.spacing as f32)
    }

    #[inline]
    fn index(&self, p: [i32; 3]) -> usize {
        debug_assert!(
            p.iter().all(|&c| (-1..=self.cells + 1).contains(&c)),
            "lattice point {p:?} outside border"
        );
        let [x, y, z] = p.map(|c| (c + 1) as usize);
        (z * self.stride + y) * self.stride + x
    }
}
