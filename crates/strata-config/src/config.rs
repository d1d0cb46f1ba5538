//! Configuration structs with defaults, validation and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "strata.ron";

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrataConfig {
    /// World identity and region partitioning.
    pub world: WorldConfig,
    /// Level-of-detail bands and streaming radii.
    pub lod: LodConfig,
    /// Worker pool and job queue limits.
    pub scheduler: SchedulerConfig,
    /// Seam stitching and skirt settings.
    pub seams: SeamConfig,
    /// Density field parameters.
    pub terrain: TerrainConfig,
    /// Content scattering rules.
    pub content: ContentConfig,
    /// Biome table shaping terrain and content.
    pub biomes: BiomeTableConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World identity and region partitioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed. Every generated value derives from it.
    pub seed: u64,
    /// Region edge length in world units. Must be even.
    pub region_size: u32,
    /// Sample spacing at LOD 0, in world units.
    pub base_resolution: u32,
}

/// Distance metric used to band regions into LODs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistanceMetricKind {
    Chebyshev,
    Euclidean,
}

/// Point of a region that distances are measured to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistanceAnchorKind {
    /// Closest point of the region bounds.
    NearestPoint,
    /// Region centre.
    Center,
}

/// Level-of-detail bands and streaming radii.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Upper distance bound of each LOD band, strictly increasing.
    /// `thresholds[i]` closes band `i`; anything farther gets the coarsest LOD.
    pub thresholds: Vec<f64>,
    pub metric: DistanceMetricKind,
    pub anchor: DistanceAnchorKind,
    /// Distance buffer that must be crossed before a region changes LOD.
    pub hysteresis: f64,
    /// Horizontal radius, in regions, around the viewer's region.
    pub retention_radius: u32,
    /// Vertical radius, in regions, around the viewer's region.
    pub vertical_radius: u32,
    /// Extra regions kept beyond the retention radius before eviction.
    pub unload_margin: u32,
}

/// Worker pool and job queue limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads. 0 picks a count from the available cores.
    pub worker_count: usize,
    /// Maximum pending jobs before the lowest priority ones are dropped.
    pub queue_depth: usize,
    /// Maximum jobs handed to workers at once. 0 means twice the worker count.
    pub max_in_flight: usize,
    /// Attempts before a failing region is marked permanently errored.
    pub max_attempts: u32,
    /// Delay before the first retry, in control ticks. Doubles per attempt.
    pub backoff_base_ticks: u64,
    /// Upper bound on the retry delay, in control ticks.
    pub backoff_max_ticks: u64,
}

/// Seam stitching and skirt settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeamConfig {
    /// Drop of the skirt wall below a boundary, in world units.
    pub skirt_depth: f32,
    /// Also add skirts on seams against coarser neighbors.
    pub skirt_lod_seams: bool,
    /// Boundary vertices closer than this are welded, in world units.
    pub weld_epsilon: f32,
}

/// Density field parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Height of the zero level before noise is applied.
    pub base_height: f64,
    /// Number of fBm octaves.
    pub octaves: u32,
    /// Frequency of the broadest octave.
    pub base_frequency: f64,
    /// Amplitude of the broadest octave, in world units.
    pub amplitude: f64,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
    /// Amplitude multiplier per octave.
    pub persistence: f64,
    /// Subsurface cave carving.
    pub caves: CaveConfig,
}

/// Cave carving parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaveConfig {
    pub enabled: bool,
    /// Noise values below this become air.
    pub threshold: f64,
    pub frequency: f64,
    pub octaves: u32,
    /// Scale applied to the carve field, in world units.
    pub strength: f64,
    /// No caves closer than this to the surface.
    pub min_depth: f64,
    /// No caves deeper than this below the surface.
    pub max_depth: f64,
}

/// How a variety picks candidate points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlacementKind {
    /// Area-weighted random points on every triangle.
    Scatter,
    /// Jittered grid over the XZ plane, projected onto up-facing surface.
    JitteredGrid,
}

/// How instance scale is randomized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScalingKind {
    /// One random value for all axes, drawn from `scale_x`.
    Uniform,
    /// Independent values per axis.
    Free,
    /// X and Y share a value from `scale_x`; Z draws from `scale_z`.
    LockXY,
}

/// One kind of scattered content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentVarietyConfig {
    pub name: String,
    /// Content-type id handed to the content sink.
    pub content_type: u32,
    /// Instances per 100 square world units.
    pub density: f64,
    pub placement: PlacementKind,
    /// Grid jitter in `[0, 1]`, used by `JitteredGrid`.
    pub jitter: f64,
    pub random_rotation: bool,
    /// Tilt instances to the surface normal instead of keeping them upright.
    pub align_to_surface: bool,
    pub scaling: ScalingKind,
    pub scale_x: (f64, f64),
    pub scale_y: (f64, f64),
    pub scale_z: (f64, f64),
    /// Steepest slope accepted, in degrees from horizontal.
    pub max_slope_degrees: f64,
    /// Accepted world height range.
    pub min_height: f64,
    pub max_height: f64,
    /// Coarsest region LOD that still receives this variety.
    pub max_lod: u8,
}

/// Content scattering rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentConfig {
    pub varieties: Vec<ContentVarietyConfig>,
}

/// One row of the biome table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BiomeConfig {
    pub name: String,
    /// Picked where the biome noise, in `[-1, 1]`, lies below this value.
    /// Noise above the last row's threshold still picks the last row.
    pub threshold: f64,
    /// Ground material layer id.
    pub layer: u32,
    /// Added to `terrain.base_height`, in world units.
    pub height_offset: f64,
    /// Multiplies the terrain height noise.
    pub height_scale: f64,
    /// Fraction of content candidates kept, in `[0, 1]`.
    pub content_density: f64,
    /// Names of the content varieties that grow here. Empty allows all.
    pub varieties: Vec<String>,
}

/// Biome table shaping terrain and content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BiomeTableConfig {
    /// Frequency of the biome noise. Lower values give broader biomes.
    pub frequency: f64,
    pub octaves: u32,
    /// Half-width of the height blend around each threshold, in noise units.
    pub blend: f64,
    /// Rows in increasing threshold order. Empty gives one neutral biome.
    pub rows: Vec<BiomeConfig>,
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter (e.g. "info", "debug,strata_stream=trace").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            region_size: 32,
            base_resolution: 1,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![64.0, 128.0, 256.0],
            metric: DistanceMetricKind::Chebyshev,
            anchor: DistanceAnchorKind::NearestPoint,
            hysteresis: 4.0,
            retention_radius: 4,
            vertical_radius: 1,
            unload_margin: 1,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            queue_depth: 256,
            max_in_flight: 0,
            max_attempts: 3,
            backoff_base_ticks: 1,
            backoff_max_ticks: 32,
        }
    }
}

impl Default for SeamConfig {
    fn default() -> Self {
        Self {
            skirt_depth: 4.0,
            skirt_lod_seams: false,
            weld_epsilon: 1.0e-3,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            base_height: 0.0,
            octaves: 5,
            base_frequency: 0.008,
            amplitude: 12.0,
            lacunarity: 2.0,
            persistence: 0.5,
            caves: CaveConfig::default(),
        }
    }
}

impl Default for CaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: -0.35,
            frequency: 0.05,
            octaves: 2,
            strength: 8.0,
            min_depth: 4.0,
            max_depth: 48.0,
        }
    }
}

impl Default for ContentVarietyConfig {
    fn default() -> Self {
        Self {
            name: "grass".to_string(),
            content_type: 0,
            density: 20.0,
            placement: PlacementKind::JitteredGrid,
            jitter: 0.8,
            random_rotation: true,
            align_to_surface: true,
            scaling: ScalingKind::Uniform,
            scale_x: (0.8, 1.2),
            scale_y: (0.8, 1.2),
            scale_z: (0.8, 1.2),
            max_slope_degrees: 40.0,
            min_height: f64::MIN,
            max_height: f64::MAX,
            max_lod: 1,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            varieties: vec![
                ContentVarietyConfig::default(),
                ContentVarietyConfig {
                    name: "boulder".to_string(),
                    content_type: 1,
                    density: 0.5,
                    placement: PlacementKind::Scatter,
                    align_to_surface: false,
                    scaling: ScalingKind::LockXY,
                    scale_x: (0.6, 1.6),
                    scale_z: (0.5, 1.0),
                    max_slope_degrees: 60.0,
                    max_lod: 2,
                    ..ContentVarietyConfig::default()
                },
            ],
        }
    }
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            name: "meadow".to_string(),
            threshold: 0.25,
            layer: 0,
            height_offset: 0.0,
            height_scale: 1.0,
            content_density: 1.0,
            varieties: Vec::new(),
        }
    }
}

impl Default for BiomeTableConfig {
    fn default() -> Self {
        Self {
            frequency: 0.002,
            octaves: 2,
            blend: 0.1,
            rows: vec![
                BiomeConfig {
                    varieties: vec!["grass".to_string(), "boulder".to_string()],
                    ..BiomeConfig::default()
                },
                BiomeConfig {
                    name: "highland".to_string(),
                    threshold: 1.0,
                    layer: 1,
                    height_offset: 16.0,
                    height_scale: 1.8,
                    content_density: 0.4,
                    varieties: vec!["boulder".to_string()],
                },
            ],
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Validation ---

impl StrataConfig {
    /// Coarsest LOD the band table can select.
    pub fn max_lod(&self) -> u8 {
        self.lod.thresholds.len().min(u8::MAX as usize) as u8
    }

    /// Check that the bundle describes a usable world.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let size = self.world.region_size;
        if size == 0 || size % 2 != 0 {
            return invalid(format!("world.region_size must be even and non-zero, got {size}"));
        }
        if self.world.base_resolution == 0 {
            return invalid("world.base_resolution must be non-zero".to_string());
        }

        let thresholds = &self.lod.thresholds;
        if thresholds.is_empty() {
            return invalid("lod.thresholds must not be empty".to_string());
        }
        if thresholds.len() > 16 {
            return invalid(format!("lod.thresholds has {} bands, at most 16 supported", thresholds.len()));
        }
        for (i, &t) in thresholds.iter().enumerate() {
            if !t.is_finite() || t <= 0.0 {
                return invalid(format!("lod.thresholds[{i}] must be positive and finite"));
            }
            if i > 0 && t <= thresholds[i - 1] {
                return invalid("lod.thresholds must be strictly increasing".to_string());
            }
        }
        let coarsest = u64::from(self.world.base_resolution) << self.max_lod();
        if u64::from(size) % coarsest != 0 {
            return invalid(format!(
                "world.region_size {size} is not a multiple of the coarsest sample spacing {coarsest}"
            ));
        }
        if !self.lod.hysteresis.is_finite() || self.lod.hysteresis < 0.0 {
            return invalid("lod.hysteresis must be a non-negative distance".to_string());
        }

        if self.scheduler.queue_depth == 0 {
            return invalid("scheduler.queue_depth must be non-zero".to_string());
        }
        if self.scheduler.max_attempts == 0 {
            return invalid("scheduler.max_attempts must be at least 1".to_string());
        }
        if self.scheduler.backoff_max_ticks < self.scheduler.backoff_base_ticks {
            return invalid("scheduler.backoff_max_ticks must be >= backoff_base_ticks".to_string());
        }

        if !(self.seams.weld_epsilon > 0.0) {
            return invalid("seams.weld_epsilon must be positive".to_string());
        }
        if !(self.seams.skirt_depth >= 0.0) {
            return invalid("seams.skirt_depth must be non-negative".to_string());
        }

        for variety in &self.content.varieties {
            let name = &variety.name;
            if !(variety.density >= 0.0) || !variety.density.is_finite() {
                return invalid(format!("content variety '{name}' has an invalid density"));
            }
            if !(0.0..=1.0).contains(&variety.jitter) {
                return invalid(format!("content variety '{name}' jitter must be within [0, 1]"));
            }
            for (axis, (lo, hi)) in [("x", variety.scale_x), ("y", variety.scale_y), ("z", variety.scale_z)] {
                if !(lo <= hi) {
                    return invalid(format!("content variety '{name}' scale_{axis} range is inverted"));
                }
            }
            if variety.min_height > variety.max_height {
                return invalid(format!("content variety '{name}' height range is inverted"));
            }
        }

        let biomes = &self.biomes;
        if !(biomes.frequency > 0.0) || !biomes.frequency.is_finite() {
            return invalid("biomes.frequency must be positive and finite".to_string());
        }
        if !(biomes.blend >= 0.0) || !biomes.blend.is_finite() {
            return invalid("biomes.blend must be non-negative and finite".to_string());
        }
        for (i, row) in biomes.rows.iter().enumerate() {
            let name = &row.name;
            if biomes.rows[..i].iter().any(|other| &other.name == name) {
                return invalid(format!("biome '{name}' is defined twice"));
            }
            if !row.threshold.is_finite() || (i > 0 && row.threshold <= biomes.rows[i - 1].threshold) {
                return invalid("biome thresholds must be finite and strictly increasing".to_string());
            }
            if !row.height_offset.is_finite() || !row.height_scale.is_finite() {
                return invalid(format!("biome '{name}' height shape must be finite"));
            }
            if !(0.0..=1.0).contains(&row.content_density) {
                return invalid(format!("biome '{name}' content_density must be within [0, 1]"));
            }
            for variety in &row.varieties {
                if !self.content.varieties.iter().any(|v| &v.name == variety) {
                    return invalid(format!("biome '{name}' names unknown content variety '{variety}'"));
                }
            }
        }

        Ok(())
    }
}

// --- Load / Save / Reload ---

impl StrataConfig {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::read(&config_path))?;
            let config: StrataConfig = ron::from_str(&contents).map_err(ConfigError::parse(&config_path))?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = StrataConfig::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `strata.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::write(config_dir))?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(false)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::write(&config_path))?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::read(&config_path))?;
        let new_config: StrataConfig = ron::from_str(&contents).map_err(ConfigError::parse(&config_path))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
