//! Deterministic content placement (foliage, rocks, props) on extracted surfaces.
//!
//! Placement reads the unstitched extraction output, so re-stitching a region never
//! moves its content, and skirts never receive any.

use std::f64::consts::TAU;
use std::sync::Arc;

use glam::{DVec2, DVec3, Quat, Vec3};
use hashbrown::HashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_mesh::SurfaceMesh;
use tracing::trace;

use crate::biome::{BiomeError, BiomeTable};
use crate::seed::{derive_cell_seed, region_rng};

/// Tolerance for points landing exactly on triangle edges.
const EDGE_EPSILON: f64 = 1e-9;

/// How candidate positions are generated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Placement {
    /// Uniform random points per triangle, proportional to its area.
    Scatter,
    /// One candidate per cell of a world-aligned XZ grid, offset by up to
    /// `jitter` (0..=1) of a cell, projected onto up-facing triangles.
    JitteredGrid { jitter: f64 },
}

/// How the per-axis scale ranges combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scaling {
    /// One sample from `scale_x` on every axis.
    Uniform,
    /// Independent samples per axis.
    Free,
    /// X and Y share the `scale_x` sample; Z samples `scale_z`.
    LockXY,
}

/// One kind of placed content.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentVariety {
    pub name: String,
    pub content_type: u32,
    /// Instances per 100 square world units of eligible surface.
    pub density: f64,
    pub placement: Placement,
    pub random_rotation: bool,
    pub align_to_surface: bool,
    pub scaling: Scaling,
    pub scale_x: (f64, f64),
    pub scale_y: (f64, f64),
    pub scale_z: (f64, f64),
    /// Steepest surface, measured from horizontal, that receives content.
    pub max_slope_degrees: f64,
    /// World heights that receive content.
    pub height_range: (f64, f64),
    /// Coarsest LOD that still carries this variety.
    pub max_lod: u8,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VarietyError {
    #[error("variety '{name}': density must be finite and non-negative, got {density}")]
    InvalidDensity { name: String, density: f64 },
    #[error("variety '{name}': {field} range ({min}, {max}) is inverted or NaN")]
    InvalidRange {
        name: String,
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("variety '{name}': jitter must lie in [0, 1], got {jitter}")]
    InvalidJitter { name: String, jitter: f64 },
}

impl ContentVariety {
    pub fn validate(&self) -> Result<(), VarietyError> {
        if !self.density.is_finite() || self.density < 0.0 {
            return Err(VarietyError::InvalidDensity {
                name: self.name.clone(),
                density: self.density,
            });
        }
        if let Placement::JitteredGrid { jitter } = self.placement
            && !(0.0..=1.0).contains(&jitter)
        {
            return Err(VarietyError::InvalidJitter {
                name: self.name.clone(),
                jitter,
            });
        }
        let ranges = [
            ("scale_x", self.scale_x),
            ("scale_y", self.scale_y),
            ("scale_z", self.scale_z),
            ("height", self.height_range),
            ("slope", (0.0, self.max_slope_degrees)),
        ];
        for (field, (min, max)) in ranges {
            if min.is_nan() || max.is_nan() || min > max {
                return Err(VarietyError::InvalidRange {
                    name: self.name.clone(),
                    field,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// A placed instance, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContentPoint {
    pub position: DVec3,
    pub orientation: Quat,
    pub scale: Vec3,
    pub content_type: u32,
}

struct Triangle {
    /// Region-local corners.
    corners: [DVec3; 3],
    normal: DVec3,
    area: f64,
}

impl Triangle {
    /// Height of the triangle above a region-local XZ point, if the point projects
    /// onto it.
    fn height_at(&self, point: DVec2) -> Option<f64> {
        let [a, b, c] = self.corners.map(|p| DVec2::new(p.x, p.z));
        let (v0, v1, v2) = (b - a, c - a, point - a);
        let den = v0.perp_dot(v1);
        if den.abs() < 1e-12 {
            return None;
        }
        let v = v2.perp_dot(v1) / den;
        let w = v0.perp_dot(v2) / den;
        let u = 1.0 - v - w;
        if u < -EDGE_EPSILON || v < -EDGE_EPSILON || w < -EDGE_EPSILON {
            return None;
        }
        let [pa, pb, pc] = self.corners;
        Some(u * pa.y + v * pb.y + w * pc.y)
    }
}

fn surface_triangles(mesh: &SurfaceMesh) -> Vec<Triangle> {
    let vertices = mesh.vertices();
    mesh.surface_indices()
        .chunks_exact(3)
        .filter_map(|tri| {
            let corners = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from(vertices[i as usize].position).as_dvec3());
            let cross = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
            let length = cross.length();
            (length > 0.0).then(|| Triangle {
                corners,
                normal: cross / length,
                area: length * 0.5,
            })
        })
        .collect()
}

/// Places every configured variety on a region's surface.
///
/// Output is a pure function of the world seed, the varieties, the biome table and
/// the mesh. Each candidate point asks the biome under it whether its variety may
/// grow there and thins by the biome's content density.
pub struct ContentPlacer {
    world_seed: u64,
    varieties: Vec<ContentVariety>,
    biomes: Arc<BiomeTable>,
}

impl ContentPlacer {
    pub fn new(world_seed: u64, varieties: Vec<ContentVariety>) -> Result<Self, VarietyError> {
        for variety in &varieties {
            variety.validate()?;
        }
        Ok(Self {
            world_seed,
            varieties,
            biomes: Arc::new(BiomeTable::uniform(world_seed)),
        })
    }

    /// Restrict placement by `biomes`. Every variety index a biome names must exist.
    pub fn with_biomes(mut self, biomes: Arc<BiomeTable>) -> Result<Self, BiomeError> {
        for biome in biomes.biomes() {
            if let Some(&missing) = biome.varieties.iter().find(|&&v| v >= self.varieties.len()) {
                return Err(BiomeError::UnknownVariety {
                    name: biome.name.clone(),
                    variety: format!("#{missing}"),
                });
            }
        }
        self.biomes = biomes;
        Ok(self)
    }

    pub fn varieties(&self) -> &[ContentVariety] {
        &self.varieties
    }

    pub fn biomes(&self) -> &Arc<BiomeTable> {
        &self.biomes
    }

    /// Whether a candidate of variety `index` at world `(x, z)` survives its biome.
    fn admits(&self, index: usize, x: f64, z: f64, rng: &mut ChaCha8Rng) -> bool {
        let biome = self.biomes.biome_at(x, z);
        if !biome.allows(index) {
            return false;
        }
        biome.content_density >= 1.0 || rng.random::<f64>() < biome.content_density
    }

    pub fn is_empty(&self) -> bool {
        self.varieties.is_empty()
    }

    pub fn place(&self, mesh: &SurfaceMesh) -> Vec<ContentPoint> {
        let mut points = Vec::new();
        if mesh.is_empty() {
            return points;
        }
        let triangles = surface_triangles(mesh);
        for (index, variety) in self.varieties.iter().enumerate() {
            if mesh.lod() > variety.max_lod || variety.density <= 0.0 {
                continue;
            }
            let min_up = libm::cos(variety.max_slope_degrees.to_radians()) - EDGE_EPSILON;
            let eligible: Vec<&Triangle> = triangles.iter().filter(|t| t.normal.y >= min_up).collect();
            match variety.placement {
                Placement::Scatter => self.scatter(mesh, index, variety, &eligible, &mut points),
                Placement::JitteredGrid { jitter } => {
                    self.jittered_grid(mesh, index, variety, jitter, &eligible, &mut points)
                }
            }
        }
        trace!(coord = %mesh.coord(), lod = mesh.lod(), count = points.len(), "Placed content");
        points
    }

    fn scatter(
        &self,
        mesh: &SurfaceMesh,
        index: usize,
        variety: &ContentVariety,
        triangles: &[&Triangle],
        out: &mut Vec<ContentPoint>,
    ) {
        let mut rng = region_rng(self.world_seed, mesh.coord(), mesh.lod(), index as u64);
        let origin = mesh.origin_world();
        for triangle in triangles {
            let expected = triangle.area * variety.density / 100.0;
            let mut count = expected.floor() as u64;
            if rng.random::<f64>() < expected.fract() {
                count += 1;
            }
            for _ in 0..count {
                let (r1, r2): (f64, f64) = (rng.random(), rng.random());
                let s = libm::sqrt(r1);
                let [a, b, c] = triangle.corners;
                let position = origin + a * (1.0 - s) + b * (s * (1.0 - r2)) + c * (s * r2);
                let instance = instance(variety, position, triangle.normal, &mut rng);
                if in_range(position.y, variety.height_range)
                    && self.admits(index, position.x, position.z, &mut rng)
                {
                    out.push(instance);
                }
            }
        }
    }

    fn jittered_grid(
        &self,
        mesh: &SurfaceMesh,
        index: usize,
        variety: &ContentVariety,
        jitter: f64,
        triangles: &[&Triangle],
        out: &mut Vec<ContentPoint>,
    ) {
        let spacing = (100.0 / variety.density).sqrt();
        let reach = jitter * spacing * 0.5;
        let origin = mesh.origin_world();
        let lattice = mesh.lattice();
        let extent = f64::from(lattice.cells()) * f64::from(lattice.spacing());
        // Heights already used per grid cell, so shared edges and vertices place once.
        let mut placed: HashMap<[i64; 2], Vec<f64>> = HashMap::new();

        for triangle in triangles.iter().filter(|t| t.normal.y > 0.0) {
            let (mut min, mut max) = (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY));
            for corner in triangle.corners {
                let p = DVec2::new(origin.x + corner.x, origin.z + corner.z);
                min = min.min(p);
                max = max.max(p);
            }
            let first = ((min - reach) / spacing - 0.5).floor();
            let last = ((max + reach) / spacing - 0.5).ceil();

            for iz in first.y as i64..=last.y as i64 {
                for ix in first.x as i64..=last.x as i64 {
                    let seed = derive_cell_seed(self.world_seed, index as u64, [ix, iz]);
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    let offset = DVec2::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5);
                    let world = (DVec2::new(ix as f64, iz as f64) + 0.5 + offset * jitter) * spacing;
                    let local = world - DVec2::new(origin.x, origin.z);
                    if local.x < 0.0 || local.y < 0.0 || local.x >= extent || local.y >= extent {
                        continue;
                    }
                    let Some(height) = triangle.height_at(local) else {
                        continue;
                    };
                    let y = origin.y + height;
                    let heights = placed.entry([ix, iz]).or_default();
                    if heights.iter().any(|&h| (h - y).abs() < 1e-6) {
                        continue;
                    }
                    heights.push(y);
                    if in_range(y, variety.height_range) && self.admits(index, world.x, world.y, &mut rng) {
                        let position = DVec3::new(world.x, y, world.y);
                        out.push(instance(variety, position, triangle.normal, &mut rng));
                    }
                }
            }
        }
    }
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    value >= min && value <= max
}

fn sample_range(rng: &mut ChaCha8Rng, (min, max): (f64, f64)) -> f32 {
    if max > min {
        rng.random_range(min..max) as f32
    } else {
        min as f32
    }
}

fn instance(variety: &ContentVariety, position: DVec3, normal: DVec3, rng: &mut ChaCha8Rng) -> ContentPoint {
    let yaw = if variety.random_rotation {
        rng.random_range(0.0..TAU)
    } else {
        0.0
    };
    let half = yaw * 0.5;
    let spin = Quat::from_xyzw(0.0, libm::sin(half) as f32, 0.0, libm::cos(half) as f32);
    let orientation = if variety.align_to_surface {
        Quat::from_rotation_arc(Vec3::Y, normal.as_vec3()) * spin
    } else {
        spin
    };
    let scale = match variety.scaling {
        Scaling::Uniform => Vec3::splat(sample_range(rng, variety.scale_x)),
        Scaling::Free => Vec3::new(
            sample_range(rng, variety.scale_x),
            sample_range(rng, variety.scale_y),
            sample_range(rng, variety.scale_z),
        ),
        Scaling::LockXY => {
            let xy = sample_range(rng, variety.scale_x);
            Vec3::new(xy, xy, sample_range(rng, variety.scale_z))
        }
    };
    ContentPoint {
        position,
        orientation,
        scale,
        content_type: variety.content_type,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use strata_coords::{RegionCoord, RegionLayout};
    use strata_mesh::{DensitySource, MarchingTetrahedra, SurfaceExtractor};

    use super::*;

    fn mesh<D: DensitySource + 'static>(density: D, coord: RegionCoord, lod: u8) -> SurfaceMesh {
        MarchingTetrahedra::new(Arc::new(density), RegionLayout::new(32).unwrap(), 1, 2)
            .extract(coord, lod)
            .unwrap()
    }

    fn flat(coord: RegionCoord) -> SurfaceMesh {
        mesh(|_x: f64, y: f64, _z: f64| y - 0.5, coord, 0)
    }

    fn variety(placement: Placement, density: f64) -> ContentVariety {
        ContentVariety {
            name: "test".into(),
            content_type: 7,
            density,
            placement,
            random_rotation: true,
            align_to_surface: false,
            scaling: Scaling::Uniform,
            scale_x: (0.5, 1.5),
            scale_y: (0.5, 1.5),
            scale_z: (0.5, 1.5),
            max_slope_degrees: 90.0,
            height_range: (f64::NEG_INFINITY, f64::INFINITY),
            max_lod: 2,
        }
    }

    fn placer(varieties: Vec<ContentVariety>) -> ContentPlacer {
        ContentPlacer::new(1337, varieties).unwrap()
    }

    /// With no jitter every grid cell centre in the region gets exactly one instance.
    #[test]
    fn test_grid_places_one_per_cell() {
        let points = placer(vec![variety(Placement::JitteredGrid { jitter: 0.0 }, 25.0)])
            .place(&flat(RegionCoord::ORIGIN));
        assert_eq!(points.len(), 16 * 16);
        let mut cells: Vec<(i64, i64)> = points
            .iter()
            .map(|p| (p.position.x as i64, p.position.z as i64))
            .collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), 256, "duplicate placements");
        for p in &points {
            assert!((p.position.y - 0.5).abs() < 1e-9);
            assert!((-16.0..16.0).contains(&p.position.x));
            assert!((-16.0..16.0).contains(&p.position.z));
            assert_eq!(p.content_type, 7);
        }
    }

    /// Neighboring regions continue the same world grid without overlap.
    #[test]
    fn test_grid_is_seamless_across_regions() {
        let placer = placer(vec![variety(Placement::JitteredGrid { jitter: 1.0 }, 4.0)]);
        let left = placer.place(&flat(RegionCoord::ORIGIN));
        let right = placer.place(&flat(RegionCoord::new(1, 0, 0)));
        assert!(left.iter().all(|p| p.position.x < 16.0));
        assert!(right.iter().all(|p| p.position.x >= 16.0));
        assert!(!left.is_empty() && !right.is_empty());
    }

    #[test]
    fn test_placement_is_deterministic() {
        let placer = placer(vec![
            variety(Placement::Scatter, 8.0),
            variety(Placement::JitteredGrid { jitter: 0.8 }, 3.0),
        ]);
        let hills = |x: f64, y: f64, z: f64| y - 4.0 * (x * 0.2).sin() * (z * 0.15).cos();
        let a = placer.place(&mesh(hills, RegionCoord::new(2, 0, -1), 1));
        let b = placer.place(&mesh(hills, RegionCoord::new(2, 0, -1), 1));
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_scatter_count_tracks_area() {
        let points = placer(vec![variety(Placement::Scatter, 10.0)]).place(&flat(RegionCoord::ORIGIN));
        // 1024 square units at 10 per 100.
        assert!((70..=140).contains(&points.len()), "placed {}", points.len());
        for p in &points {
            assert!((p.position.y - 0.5).abs() < 1e-6);
            assert!((0.5..1.5).contains(&p.scale.x));
            assert_eq!(p.scale.x, p.scale.z);
        }
    }

    #[test]
    fn test_slope_limit() {
        let ramp = |x: f64, y: f64, _z: f64| y - x;
        let mut steep = variety(Placement::Scatter, 20.0);
        steep.max_slope_degrees = 30.0;
        assert!(placer(vec![steep.clone()]).place(&mesh(ramp, RegionCoord::ORIGIN, 0)).is_empty());
        steep.max_slope_degrees = 60.0;
        assert!(!placer(vec![steep]).place(&mesh(ramp, RegionCoord::ORIGIN, 0)).is_empty());
    }

    #[test]
    fn test_lod_and_height_filters() {
        let mut coarse_only = variety(Placement::Scatter, 20.0);
        coarse_only.max_lod = 0;
        let coarse = mesh(|_x: f64, y: f64, _z: f64| y - 0.5, RegionCoord::ORIGIN, 1);
        assert!(placer(vec![coarse_only]).place(&coarse).is_empty());

        let mut high = variety(Placement::JitteredGrid { jitter: 0.5 }, 20.0);
        high.height_range = (10.0, 100.0);
        assert!(placer(vec![high]).place(&flat(RegionCoord::ORIGIN)).is_empty());
    }

    #[test]
    fn test_lock_xy_scaling_and_alignment() {
        let mut locked = variety(Placement::Scatter, 20.0);
        locked.scaling = Scaling::LockXY;
        locked.scale_z = (3.0, 4.0);
        locked.align_to_surface = true;
        locked.random_rotation = false;
        let points = placer(vec![locked]).place(&flat(RegionCoord::ORIGIN));
        assert!(!points.is_empty());
        for p in points {
            assert_eq!(p.scale.x, p.scale.y);
            assert!((3.0..4.0).contains(&p.scale.z));
            // Flat ground and no yaw: identity rotation.
            assert!(p.orientation.abs_diff_eq(Quat::IDENTITY, 1e-5));
        }
    }

    /// Varieties only grow in biomes that list them, and a sparse biome keeps a
    /// fraction of its candidates.
    #[test]
    fn test_biomes_restrict_varieties() {
        use crate::biome::{Biome, BiomeId, BiomeParams};
        use crate::fbm::FbmParams;

        let mut grass = variety(Placement::JitteredGrid { jitter: 0.0 }, 25.0);
        grass.content_type = 0;
        let mut rock = variety(Placement::JitteredGrid { jitter: 0.0 }, 25.0);
        rock.content_type = 1;
        let params = BiomeParams {
            noise: FbmParams {
                base_frequency: 0.05,
                ..BiomeParams::default().noise
            },
            blend: 0.0,
            rows: vec![
                Biome {
                    threshold: 0.0,
                    varieties: vec![0],
                    ..Biome::neutral("meadow")
                },
                Biome {
                    varieties: vec![1],
                    content_density: 0.5,
                    ..Biome::neutral("scree")
                },
            ],
        };
        let biomes = Arc::new(BiomeTable::new(1337, params).unwrap());
        let placer = placer(vec![grass, rock]).with_biomes(Arc::clone(&biomes)).unwrap();

        let mut per_biome = [0usize; 2];
        for coord in [RegionCoord::ORIGIN, RegionCoord::new(3, 0, -2), RegionCoord::new(-4, 0, 5)] {
            for p in placer.place(&flat(coord)) {
                let id = biomes.biome_id_at(p.position.x, p.position.z);
                assert_eq!(p.content_type, u32::from(id.0), "type {} grew in {id:?}", p.content_type);
                per_biome[id.0 as usize] += 1;
            }
        }
        assert!(per_biome[0] > 0 && per_biome[1] > 0, "{per_biome:?}");
        assert_eq!(biomes.lookup_by_name("scree"), Some(BiomeId(1)));

        let unknown = Arc::new(
            BiomeTable::new(
                0,
                BiomeParams {
                    rows: vec![Biome {
                        varieties: vec![4],
                        ..Biome::neutral("nowhere")
                    }],
                    ..BiomeParams::default()
                },
            )
            .unwrap(),
        );
        assert!(matches!(
            self::placer(vec![variety(Placement::Scatter, 1.0)]).with_biomes(unknown),
            Err(BiomeError::UnknownVariety { .. })
        ));
    }

    #[test]
    fn test_invalid_varieties_are_rejected() {
        let mut inverted = variety(Placement::Scatter, 1.0);
        inverted.scale_y = (2.0, 1.0);
        assert!(matches!(
            ContentPlacer::new(0, vec![inverted]),
            Err(VarietyError::InvalidRange { field: "scale_y", .. })
        ));
        assert!(matches!(
            ContentPlacer::new(0, vec![variety(Placement::Scatter, -1.0)]),
            Err(VarietyError::InvalidDensity { .. })
        ));
        assert!(matches!(
            ContentPlacer::new(0, vec![variety(Placement::JitteredGrid { jitter: 1.5 }, 1.0)]),
            Err(VarietyError::InvalidJitter { .. })
        ));
    }
}
