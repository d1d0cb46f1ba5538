//! Command-line argument parsing for the `strata` runner.

use std::path::PathBuf;

use clap::Parser;

use crate::StrataConfig;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `strata.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Headless procedural terrain streaming")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker thread count (0 = one per core).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Horizontal retention radius in regions.
    #[arg(long)]
    pub retention_radius: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of control ticks to run.
    #[arg(long, default_value_t = 120)]
    pub ticks: u32,

    /// Viewer speed along +X, in world units per tick.
    #[arg(long, default_value_t = 4.0)]
    pub speed: f64,

    /// Number of streaming sources flying side by side.
    #[arg(long, default_value_t = 1)]
    pub viewers: u32,

    /// Distance between neighboring sources along Z, in world units.
    #[arg(long, default_value_t = 256.0)]
    pub viewer_spacing: f64,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl StrataConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(workers) = args.workers {
            self.scheduler.worker_count = workers;
        }
        if let Some(radius) = args.retention_radius {
            self.lod.retention_radius = radius;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
