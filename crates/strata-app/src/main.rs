//! `strata`: runs the streaming pipeline headless with one or more viewers flying
//! along +X and reports what ends up on display.

mod platform;
mod stats;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::DVec3;
use strata_config::{CliArgs, StrataConfig};
use strata_coords::Aabb;
use strata_stream::{StreamTickReport, WorldParams, WorldStreamer};
use tracing::{debug, error, info};

use crate::platform::StrataDirs;
use crate::stats::StatsSink;

const TICK_INTERVAL: Duration = Duration::from_millis(16);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match StrataDirs::resolve(args.config.as_deref()).and_then(|dirs| {
        dirs.create_dirs()?;
        Ok(dirs)
    }) {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to initialize directories: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = match StrataConfig::load_or_create(&dirs.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", dirs.config_dir.display());
            return ExitCode::FAILURE;
        }
    };
    config.apply_cli_overrides(&args);

    strata_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));
    info!(config_dir = %dirs.config_dir.display(), "Strata starting");

    match run(&config, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &StrataConfig, args: &CliArgs) -> Result<(), strata_stream::StreamError> {
    let params = WorldParams::from_config(config)?;
    let start = DVec3::new(0.0, params.terrain.base_height, 0.0);
    let region_size = f64::from(params.layout.region_size());

    let mut streamer = WorldStreamer::new(params)?;
    let stats = StatsSink::default();
    streamer.add_geometry_sink(Box::new(stats.clone()));
    streamer.add_content_sink(Box::new(stats.clone()));

    let started = Instant::now();
    let mut totals = StreamTickReport::default();
    // Sources fly in parallel, spread along Z.
    let mut viewers: Vec<DVec3> = (0..args.viewers.max(1))
        .map(|i| start + DVec3::Z * (f64::from(i) * args.viewer_spacing))
        .collect();
    for _ in 0..args.ticks {
        let report = streamer.tick(&viewers);
        accumulate(&mut totals, &report);
        if report.committed + report.evicted + report.failed > 0 {
            debug!(
                tick = report.tick,
                committed = report.committed,
                evicted = report.evicted,
                in_flight = report.in_flight,
                pending = report.pending,
                displayed = report.displayed,
                "Tick"
            );
        }
        for viewer in &mut viewers {
            viewer.x += args.speed;
        }
        std::thread::sleep(TICK_INTERVAL);
    }

    let settled = streamer.flush(&viewers, SETTLE_TIMEOUT);
    let nearby: usize = viewers
        .iter()
        .map(|&viewer| {
            let view = Aabb::around(viewer, DVec3::splat(region_size * 2.0));
            streamer.snapshot(&view).len()
        })
        .sum();
    let shown = stats.totals();
    info!(
        ticks = streamer.current_tick(),
        viewers = viewers.len(),
        elapsed = ?started.elapsed(),
        settled,
        regions = shown.regions,
        nearby,
        triangles = shown.triangles,
        content = shown.content,
        per_lod = ?shown.per_lod,
        deliveries = shown.deliveries,
        removals = shown.removals,
        committed = totals.committed,
        restitched = totals.restitched,
        retried = totals.retried,
        failed = totals.failed,
        "Streaming finished"
    );
    streamer.shutdown();
    Ok(())
}

fn accumulate(totals: &mut StreamTickReport, report: &StreamTickReport) {
    totals.tick = report.tick;
    totals.committed += report.committed;
    totals.restitched += report.restitched;
    totals.retried += report.retried;
    totals.failed += report.failed;
    totals.evicted += report.evicted;
}
