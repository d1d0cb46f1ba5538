//! Configuration bundle for the terrain streaming pipeline.
//!
//! Settings persist to disk as `strata.ron`, can be overridden from the command
//! line, and are validated once before being turned into the immutable runtime
//! parameters the pipeline runs with.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BiomeConfig, BiomeTableConfig, CONFIG_FILE_NAME, CaveConfig, ContentConfig, ContentVarietyConfig, DebugConfig,
    DistanceAnchorKind, DistanceMetricKind, LodConfig, PlacementKind, ScalingKind,
    SchedulerConfig, SeamConfig, StrataConfig, TerrainConfig, WorldConfig,
};
pub use error::ConfigError;
