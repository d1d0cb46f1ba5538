use strata_config::{
    BiomeTableConfig, ConfigError, ContentVarietyConfig, DistanceAnchorKind, DistanceMetricKind,
    PlacementKind, ScalingKind, StrataConfig,
};
use strata_coords::{LayoutError, RegionLayout};
use strata_lod::{DistanceAnchor, DistanceMetric, LodBands, LodPolicy, LodPolicyError};
use strata_mesh::SeamStitcher;
use strata_region::RetryPolicy;
use strata_terrain::{
    Biome, BiomeError, BiomeParams, BiomeTable, CaveParams, ContentVariety, FbmParams, Placement,
    Scaling, TerrainParams, VarietyError,
};

/// Errors turning a configuration into runtime parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Lod(#[from] LodPolicyError),
    #[error(transparent)]
    Content(#[from] VarietyError),
    #[error(transparent)]
    Biome(#[from] BiomeError),
}

/// Worker pool sizing, with automatic values already resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerParams {
    pub worker_count: usize,
    pub queue_depth: usize,
    pub max_in_flight: usize,
}

/// Immutable parameter bundle the pipeline runs with, built once at startup.
#[derive(Clone, Debug)]
pub struct WorldParams {
    pub seed: u64,
    pub layout: RegionLayout,
    pub base_resolution: u32,
    pub lod: LodPolicy,
    pub scheduler: SchedulerParams,
    pub retry: RetryPolicy,
    pub stitcher: SeamStitcher,
    pub terrain: TerrainParams,
    pub varieties: Vec<ContentVariety>,
    /// Biome rows, with variety names resolved to indices into `varieties`.
    pub biomes: BiomeParams,
}

impl WorldParams {
    pub fn from_config(config: &StrataConfig) -> Result<Self, ParamsError> {
        config.validate()?;

        let layout = RegionLayout::new(config.world.region_size)?;
        let mut lod = LodPolicy::new(LodBands::new(config.lod.thresholds.clone())?);
        lod.metric = match config.lod.metric {
            DistanceMetricKind::Chebyshev => DistanceMetric::Chebyshev,
            DistanceMetricKind::Euclidean => DistanceMetric::Euclidean,
        };
        lod.anchor = match config.lod.anchor {
            DistanceAnchorKind::NearestPoint => DistanceAnchor::NearestPoint,
            DistanceAnchorKind::Center => DistanceAnchor::Center,
        };
        lod.hysteresis = config.lod.hysteresis;
        lod.retention_radius = config.lod.retention_radius;
        lod.vertical_radius = config.lod.vertical_radius;
        lod.unload_margin = config.lod.unload_margin;
        lod.validate()?;

        let scheduler = &config.scheduler;
        let worker_count = match scheduler.worker_count {
            // Leave a core for the control thread.
            0 => (num_cpus::get().max(2) - 1).max(1),
            n => n,
        };
        let max_in_flight = match scheduler.max_in_flight {
            0 => worker_count * 2,
            n => n,
        };

        let terrain = &config.terrain;
        let caves = &terrain.caves;
        let terrain = TerrainParams {
            base_height: terrain.base_height,
            height: FbmParams {
                octaves: terrain.octaves,
                base_frequency: terrain.base_frequency,
                amplitude: terrain.amplitude,
                lacunarity: terrain.lacunarity,
                persistence: terrain.persistence,
            },
            caves: caves.enabled.then(|| CaveParams {
                threshold: caves.threshold,
                noise: FbmParams {
                    octaves: caves.octaves,
                    base_frequency: caves.frequency,
                    amplitude: 1.0,
                    lacunarity: 2.0,
                    persistence: 0.5,
                },
                strength: caves.strength,
                min_depth: caves.min_depth,
                max_depth: caves.max_depth,
            }),
        };

        let varieties = config
            .content
            .varieties
            .iter()
            .map(variety)
            .collect::<Result<Vec<_>, _>>()?;
        let biomes = biomes(&config.biomes, &varieties)?;

        Ok(Self {
            seed: config.world.seed,
            layout,
            base_resolution: config.world.base_resolution,
            lod,
            scheduler: SchedulerParams {
                worker_count,
                queue_depth: scheduler.queue_depth,
                max_in_flight,
            },
            retry: RetryPolicy {
                max_attempts: scheduler.max_attempts,
                base_delay: scheduler.backoff_base_ticks,
                max_delay: scheduler.backoff_max_ticks,
            },
            stitcher: SeamStitcher {
                skirt_depth: config.seams.skirt_depth,
                skirt_lod_seams: config.seams.skirt_lod_seams,
                weld_epsilon: config.seams.weld_epsilon,
            },
            terrain,
            varieties,
            biomes,
        })
    }

    /// Coarsest LOD the band table can select.
    pub fn max_lod(&self) -> u8 {
        self.lod.bands.max_lod()
    }

    /// The biome table for this world's seed.
    pub fn biome_table(&self) -> Result<BiomeTable, BiomeError> {
        BiomeTable::new(self.seed, self.biomes.clone())
    }
}

fn biomes(config: &BiomeTableConfig, varieties: &[ContentVariety]) -> Result<BiomeParams, BiomeError> {
    let mut params = BiomeParams::default();
    params.noise.base_frequency = config.frequency;
    params.noise.octaves = config.octaves;
    params.blend = config.blend;
    if config.rows.is_empty() {
        return Ok(params);
    }
    params.rows = config
        .rows
        .iter()
        .map(|row| {
            let indices = row
                .varieties
                .iter()
                .map(|name| {
                    varieties.iter().position(|v| &v.name == name).ok_or_else(|| BiomeError::UnknownVariety {
                        name: row.name.clone(),
                        variety: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Biome {
                name: row.name.clone(),
                threshold: row.threshold,
                layer: row.layer,
                height_offset: row.height_offset,
                height_scale: row.height_scale,
                content_density: row.content_density,
                varieties: indices,
            })
        })
        .collect::<Result<Vec<_>, BiomeError>>()?;
    Ok(params)
}

fn variety(config: &ContentVarietyConfig) -> Result<ContentVariety, VarietyError> {
    let variety = ContentVariety {
        name: config.name.clone(),
        content_type: config.content_type,
        density: config.density,
        placement: match config.placement {
            PlacementKind::Scatter => Placement::Scatter,
            PlacementKind::JitteredGrid => Placement::JitteredGrid {
                jitter: config.jitter,
            },
        },
        random_rotation: config.random_rotation,
        align_to_surface: config.align_to_surface,
        scaling: match config.scaling {
            ScalingKind::Uniform => Scaling::Uniform,
            ScalingKind::Free => Scaling::Free,
            ScalingKind::LockXY => Scaling::LockXY,
        },
        scale_x: config.scale_x,
        scale_y: config.scale_y,
        scale_z: config.scale_z,
        max_slope_degrees: config.max_slope_degrees,
        height_range: (config.min_height, config.max_height),
        max_lod: config.max_lod,
    };
    variety.validate()?;
    Ok(variety)
}
