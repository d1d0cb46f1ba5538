use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec3;
use rustc_hash::FxHashMap;
use strata_coords::{Aabb, RegionCoord};
use strata_lod::LodSelector;
use strata_mesh::{DensitySource, MarchingTetrahedra, NeighborLods, SurfaceExtractor};
use strata_region::{
    CommitOutcome, EvictOutcome, FailureOutcome, JobKind, RegionGrid, RegionState, RegionView,
    RequestOutcome,
};
use strata_terrain::{ContentPlacer, TerrainDensity};
use tracing::{debug, error, info, trace, warn};

use crate::error::StreamError;
use crate::params::{ParamsError, WorldParams};
use crate::payload::RegionPayload;
use crate::scheduler::{
    Completion, EnqueueOutcome, GenerationScheduler, JobOutcome, JobRequest, WorkerContext,
};
use crate::sink::{ContentSink, GeometrySink};

/// Counters for one [`WorldStreamer::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamTickReport {
    pub tick: u64,
    /// Regions in the selection box.
    pub requested: usize,
    pub created: usize,
    /// Regions whose requested LOD changed.
    pub changed: usize,
    pub evicted: usize,
    pub enqueued: usize,
    /// Pending jobs dropped because the queue was full.
    pub saturated: usize,
    pub dispatched: usize,
    pub committed: usize,
    pub stale: usize,
    pub retried: usize,
    pub failed: usize,
    pub restitched: usize,
    pub in_flight: usize,
    pub pending: usize,
    pub live: usize,
    pub displayed: usize,
}

/// Drives the pipeline from the control thread: LOD selection, region lifecycle,
/// job dispatch and sink notification.
pub struct WorldStreamer {
    params: Arc<WorldParams>,
    selector: LodSelector,
    grid: Arc<RegionGrid<RegionPayload>>,
    scheduler: GenerationScheduler,
    geometry_sinks: Vec<Box<dyn GeometrySink>>,
    content_sinks: Vec<Box<dyn ContentSink>>,
    /// Sequence last delivered to the sinks, per region.
    displayed: FxHashMap<RegionCoord, u64>,
    tick: u64,
}

impl WorldStreamer {
    /// Stream the built-in noise terrain, shaped by the configured biomes.
    pub fn new(params: WorldParams) -> Result<Self, StreamError> {
        let biomes = Arc::new(params.biome_table().map_err(ParamsError::from)?);
        let density = Arc::new(TerrainDensity::with_biomes(params.seed, params.terrain.clone(), biomes));
        Self::with_density(params, density)
    }

    /// Stream an arbitrary density field.
    pub fn with_density(params: WorldParams, density: Arc<dyn DensitySource>) -> Result<Self, StreamError> {
        let extractor = MarchingTetrahedra::new(density, params.layout, params.base_resolution, params.max_lod());
        Self::with_extractor(params, Arc::new(extractor))
    }

    pub fn with_extractor(params: WorldParams, extractor: Arc<dyn SurfaceExtractor>) -> Result<Self, StreamError> {
        let selector = LodSelector::new(params.layout, params.lod.clone()).map_err(ParamsError::from)?;
        let biomes = Arc::new(params.biome_table().map_err(ParamsError::from)?);
        let placer = ContentPlacer::new(params.seed, params.varieties.clone())
            .map_err(ParamsError::from)?
            .with_biomes(biomes)
            .map_err(ParamsError::from)?;
        let grid = Arc::new(RegionGrid::new(params.layout));
        let context = WorkerContext {
            extractor,
            stitcher: params.stitcher,
            placer: Arc::new(placer),
            grid: Arc::clone(&grid),
        };
        let scheduler = GenerationScheduler::new(context, &params.scheduler)?;
        info!(
            seed = params.seed,
            region_size = params.layout.region_size(),
            max_lod = params.max_lod(),
            biomes = params.biomes.rows.len(),
            workers = scheduler.worker_count(),
            "World streamer started"
        );

        Ok(Self {
            params: Arc::new(params),
            selector,
            grid,
            scheduler,
            geometry_sinks: Vec::new(),
            content_sinks: Vec::new(),
            displayed: FxHashMap::default(),
            tick: 0,
        })
    }

    pub fn add_geometry_sink(&mut self, sink: Box<dyn GeometrySink>) {
        self.geometry_sinks.push(sink);
    }

    pub fn add_content_sink(&mut self, sink: Box<dyn ContentSink>) {
        self.content_sinks.push(sink);
    }

    /// Advance one step for the streaming sources at `viewers`. Never blocks on
    /// generation.
    ///
    /// A region wanted by several sources streams at the finest LOD any of them
    /// asks for, and stays loaded while any of them retains it.
    pub fn tick(&mut self, viewers: &[DVec3]) -> StreamTickReport {
        self.tick += 1;
        let mut report = StreamTickReport {
            tick: self.tick,
            ..StreamTickReport::default()
        };

        for completion in self.scheduler.drain_completions() {
            self.apply(completion, &mut report);
        }

        let grid = &self.grid;
        let wanted = self
            .selector
            .select_lods_for_sources(viewers, |coord| grid.current_lod(coord));
        report.requested = wanted.len();
        for (&coord, &lod) in &wanted {
            match grid.request_lod(coord, lod) {
                RequestOutcome::Created => report.created += 1,
                RequestOutcome::Changed { previous } => {
                    trace!(%coord, previous, lod, "Region LOD changed");
                    report.changed += 1;
                }
                RequestOutcome::Revived | RequestOutcome::Unchanged | RequestOutcome::Failed => {}
            }
        }

        for coord in self.grid.live_coords() {
            if !wanted.contains_key(&coord) && !self.selector.retains_any(viewers, coord) {
                self.scheduler.cancel(coord);
                match self.grid.evict(coord) {
                    EvictOutcome::Absent => continue,
                    EvictOutcome::Removed { .. } | EvictOutcome::Deferred { .. } => {}
                }
                if self.retract(coord) {
                    report.evicted += 1;
                }
            }
        }

        for job in self.grid.due_jobs(self.tick) {
            let outcome = self.scheduler.enqueue(JobRequest {
                coord: job.coord,
                epoch: job.epoch,
                lod: job.lod,
                kind: job.kind,
                priority: self.selector.priority_any(viewers, job.coord),
            });
            if job.kind == JobKind::Extract {
                self.grid.mark_queued(job.coord);
            }
            report.enqueued += 1;
            if matches!(outcome, EnqueueOutcome::Saturated { .. }) {
                report.saturated += 1;
            }
        }

        report.dispatched = self.scheduler.pump();
        report.in_flight = self.scheduler.in_flight();
        report.pending = self.scheduler.pending_len();
        report.live = self.grid.len();
        report.displayed = self.displayed.len();
        report
    }

    fn apply(&mut self, completion: Completion, report: &mut StreamTickReport) {
        let Completion {
            ticket,
            outcome,
            elapsed,
        } = completion;
        let coord = ticket.coord;
        match outcome {
            JobOutcome::Committed {
                outcome: CommitOutcome::Applied { sequence },
                payload,
            } => {
                report.committed += 1;
                if ticket.kind == JobKind::Stitch {
                    report.restitched += 1;
                }
                debug!(%coord, lod = ticket.lod, kind = ?ticket.kind, ?elapsed, "Region committed");
                // A later commit may already have replaced this one.
                let current = self.grid.record_view(coord).map(|view| view.sequence);
                if current == Some(sequence) {
                    self.publish(coord, sequence, &payload, ticket.kind == JobKind::Extract);
                }
                self.refresh_seams(coord);
            }
            JobOutcome::Committed { .. } => report.stale += 1,
            JobOutcome::Failed(failure) => {
                match self
                    .grid
                    .record_failure(coord, ticket.epoch, self.tick, &self.params.retry, failure.to_string())
                {
                    FailureOutcome::Retry { attempt, at } => {
                        warn!(%coord, attempt, retry_at = at, error = %failure, "Region generation failed, retrying");
                        report.retried += 1;
                    }
                    FailureOutcome::Exhausted { attempts } => {
                        error!(%coord, attempts, error = %failure, "Region generation failed permanently");
                        report.failed += 1;
                        self.retract(coord);
                    }
                    FailureOutcome::Stale | FailureOutcome::Evicted => report.stale += 1,
                }
            }
            JobOutcome::Cancelled => {
                self.grid.clear_job(&ticket);
            }
        }
    }

    fn publish(&mut self, coord: RegionCoord, sequence: u64, payload: &RegionPayload, content: bool) {
        for sink in &mut self.geometry_sinks {
            sink.region_ready(coord, payload.lod(), &payload.mesh, sequence);
        }
        if content {
            for sink in &mut self.content_sinks {
                sink.content_ready(coord, &payload.content);
            }
        }
        self.displayed.insert(coord, sequence);
    }

    /// Withdraw `coord` from the sinks if anything was delivered for it.
    fn retract(&mut self, coord: RegionCoord) -> bool {
        if self.displayed.remove(&coord).is_none() {
            return false;
        }
        for sink in &mut self.geometry_sinks {
            sink.region_removed(coord);
        }
        for sink in &mut self.content_sinks {
            sink.content_removed(coord);
        }
        for (_, neighbor) in coord.neighbors() {
            self.refresh_seams(neighbor);
        }
        true
    }

    /// Flag `coord` and its neighbors for re-stitching where their displayed mesh
    /// was stitched against LODs that no longer hold.
    fn refresh_seams(&self, coord: RegionCoord) {
        let neighbors = coord.neighbors().map(|(_, neighbor)| neighbor);
        for region in std::iter::once(coord).chain(neighbors) {
            if self.grid.state(region) != RegionState::Ready {
                continue;
            }
            let Some(payload) = self.grid.payload(region) else {
                continue;
            };
            let lods = self.grid.neighbor_lods(region);
            let current = NeighborLods::from_fn(|side| lods[side.index()]);
            if !payload.seams_match(&current) && self.grid.mark_restitch(region) {
                trace!(%region, "Seams out of date");
            }
        }
    }

    /// Whether no job is pending, running or waiting for a retry.
    pub fn is_settled(&self) -> bool {
        self.scheduler.is_idle() && self.grid.due_jobs(u64::MAX).is_empty()
    }

    /// Tick with fixed sources until the world settles or `timeout` passes.
    pub fn flush(&mut self, viewers: &[DVec3], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick(viewers);
            if self.is_settled() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Displayed regions intersecting `bounds`.
    pub fn snapshot(&self, bounds: &Aabb) -> Vec<RegionView<RegionPayload>> {
        self.grid.snapshot(bounds)
    }

    pub fn grid(&self) -> &Arc<RegionGrid<RegionPayload>> {
        &self.grid
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Stop the workers. Regions already committed stay readable.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        info!(ticks = self.tick, live = self.grid.len(), "World streamer stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use strata_config::StrataConfig;
    use strata_coords::BoundarySide;
    use strata_mesh::{ExtractError, NeighborSeam, SurfaceMesh};
    use strata_terrain::{BiomeId, ContentPoint};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Ready(RegionCoord, u8, u64),
        Removed(RegionCoord),
        Content(RegionCoord, usize),
        ContentRemoved(RegionCoord),
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }
    }

    impl GeometrySink for Recorder {
        fn region_ready(&mut self, coord: RegionCoord, lod: u8, mesh: &SurfaceMesh, sequence: u64) {
            assert_eq!(mesh.lod(), lod);
            self.0.lock().unwrap().push(Event::Ready(coord, lod, sequence));
        }

        fn region_removed(&mut self, coord: RegionCoord) {
            self.0.lock().unwrap().push(Event::Removed(coord));
        }
    }

    impl ContentSink for Recorder {
        fn content_ready(&mut self, coord: RegionCoord, points: &[ContentPoint]) {
            self.0.lock().unwrap().push(Event::Content(coord, points.len()));
        }

        fn content_removed(&mut self, coord: RegionCoord) {
            self.0.lock().unwrap().push(Event::ContentRemoved(coord));
        }
    }

    fn config(thresholds: Vec<f64>) -> StrataConfig {
        let mut config = StrataConfig::default();
        config.world.region_size = 8;
        config.world.base_resolution = 1;
        config.lod.thresholds = thresholds;
        config.lod.retention_radius = 2;
        config.lod.vertical_radius = 0;
        config.lod.unload_margin = 0;
        config.scheduler.worker_count = 2;
        config.scheduler.max_in_flight = 0;
        config
    }

    fn params(thresholds: Vec<f64>) -> WorldParams {
        let mut config = config(thresholds);
        config.content.varieties.clear();
        config.biomes.rows.clear();
        WorldParams::from_config(&config).unwrap()
    }

    fn flat(_x: f64, y: f64, _z: f64) -> f64 {
        y - 0.5
    }

    const VIEWER: &[DVec3] = &[DVec3::ZERO];
    const TIMEOUT: Duration = Duration::from_secs(30);

    fn square(radius: i64) -> Vec<RegionCoord> {
        let mut coords = Vec::new();
        for x in -radius..=radius {
            for z in -radius..=radius {
                coords.push(RegionCoord::new(x, 0, z));
            }
        }
        coords.sort();
        coords
    }

    fn everything() -> Aabb {
        Aabb::new(DVec3::splat(-1.0e6), DVec3::splat(1.0e6))
    }

    #[test]
    fn test_viewer_at_origin_loads_five_by_five() {
        let mut streamer = WorldStreamer::with_density(params(vec![64.0, 256.0]), Arc::new(flat)).unwrap();
        assert!(streamer.flush(VIEWER, TIMEOUT));

        let views = streamer.snapshot(&everything());
        let coords: Vec<_> = views.iter().map(|view| view.coord).collect();
        assert_eq!(coords, square(2));
        for view in &views {
            assert_eq!(view.lod, 0);
            assert_eq!(streamer.grid().state(view.coord), RegionState::Ready);
            assert!(!view.payload.mesh.is_empty());
        }
    }

    /// A region whose field is non-finite fails on its own, gives up after the
    /// retry budget and is not dispatched again.
    #[test]
    fn test_failing_region_is_isolated() {
        let density = |x: f64, y: f64, z: f64| {
            if x >= 14.0 && (-2.0..=2.0).contains(&z) {
                f64::NAN
            } else {
                y - 0.5
            }
        };
        let mut streamer = WorldStreamer::with_density(params(vec![64.0, 256.0]), Arc::new(density)).unwrap();
        assert!(streamer.flush(VIEWER, TIMEOUT));

        let broken = RegionCoord::new(2, 0, 0);
        let view = streamer.grid().record_view(broken).unwrap();
        assert_eq!(view.state, RegionState::Failed);
        assert_eq!(view.attempts, 3);
        assert!(view.last_error.unwrap().contains("non-finite"));

        let ready: Vec<_> = streamer.snapshot(&everything()).iter().map(|v| v.coord).collect();
        assert_eq!(ready.len(), 24);
        assert!(!ready.contains(&broken));

        for _ in 0..10 {
            let report = streamer.tick(VIEWER);
            assert_eq!(report.dispatched, 0);
        }
        assert_eq!(streamer.grid().record_view(broken).unwrap().attempts, 3);
    }

    #[test]
    fn test_panicking_region_fails_alone() {
        let density = |x: f64, y: f64, z: f64| {
            if x >= 14.0 && (-2.0..=2.0).contains(&z) {
                panic!("bad sample");
            }
            y - 0.5
        };
        let mut streamer = WorldStreamer::with_density(params(vec![64.0, 256.0]), Arc::new(density)).unwrap();
        assert!(streamer.flush(VIEWER, TIMEOUT));

        let broken = RegionCoord::new(2, 0, 0);
        assert_eq!(streamer.grid().state(broken), RegionState::Failed);
        assert!(streamer.grid().record_view(broken).unwrap().last_error.unwrap().contains("bad sample"));
        assert_eq!(streamer.snapshot(&everything()).len(), 24);
    }

    #[test]
    fn test_moving_away_evicts_and_notifies() {
        let world = WorldParams::from_config(&config(vec![64.0, 256.0])).unwrap();
        assert!(!world.varieties.is_empty());
        let mut streamer = WorldStreamer::with_density(world, Arc::new(flat)).unwrap();
        let recorder = Recorder::default();
        streamer.add_geometry_sink(Box::new(recorder.clone()));
        streamer.add_content_sink(Box::new(recorder.clone()));
        assert!(streamer.flush(VIEWER, TIMEOUT));

        let events = recorder.events();
        let ready = events.iter().filter(|e| matches!(e, Event::Ready(..))).count();
        let content = events.iter().filter(|e| matches!(e, Event::Content(..))).count();
        assert!(ready >= 25);
        assert_eq!(content, 25);

        let far = DVec3::new(1000.0, 0.0, 0.0);
        assert!(streamer.flush(&[far], TIMEOUT));
        let events = recorder.events();
        for coord in square(2) {
            assert!(events.contains(&Event::Removed(coord)));
            assert!(events.contains(&Event::ContentRemoved(coord)));
            assert_eq!(streamer.grid().state(coord), RegionState::Unloaded);
        }
        let views = streamer.snapshot(&everything());
        assert_eq!(views.len(), 25);
        assert!(views.iter().all(|view| view.coord.x >= 123 && view.coord.x <= 127));
    }

    /// Inner regions stitch against the coarser outer ring once everything is up.
    #[test]
    fn test_mixed_lods_converge_to_matching_seams() {
        let mut streamer = WorldStreamer::with_density(params(vec![10.0, 256.0]), Arc::new(flat)).unwrap();
        assert!(streamer.flush(VIEWER, TIMEOUT));

        let views = streamer.snapshot(&everything());
        assert_eq!(views.len(), 25);
        for view in &views {
            let ring = view.coord.horizontal_distance(RegionCoord::ORIGIN);
            assert_eq!(view.lod, if ring == 2 { 1 } else { 0 });

            let lods = streamer.grid().neighbor_lods(view.coord);
            let current = NeighborLods::from_fn(|side| lods[side.index()]);
            assert!(view.payload.seams_match(&current), "{} has stale seams", view.coord);
        }

        let inner = streamer.grid().payload(RegionCoord::new(1, 0, 0)).unwrap();
        assert_eq!(inner.mesh.seam(BoundarySide::PosX).neighbor, NeighborSeam::Lod(1));
        assert_eq!(inner.mesh.seam(BoundarySide::NegX).neighbor, NeighborSeam::Lod(0));
        assert_eq!(inner.mesh.seam(BoundarySide::PosY).neighbor, NeighborSeam::Missing);
    }

    /// Holds extraction of one region until released.
    struct GatedExtractor {
        inner: MarchingTetrahedra<dyn DensitySource>,
        gated: RegionCoord,
        open: AtomicBool,
    }

    impl SurfaceExtractor for GatedExtractor {
        fn extract(&self, coord: RegionCoord, lod: u8) -> Result<SurfaceMesh, ExtractError> {
            let deadline = Instant::now() + TIMEOUT;
            while coord == self.gated && !self.open.load(Ordering::Acquire) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            self.inner.extract(coord, lod)
        }

        fn max_lod(&self) -> u8 {
            self.inner.max_lod()
        }
    }

    /// Tick until settled, summing the per-tick counters that matter here.
    fn settle(streamer: &mut WorldStreamer, viewers: &[DVec3]) -> (usize, usize) {
        let deadline = Instant::now() + TIMEOUT;
        let (mut stale, mut saturated) = (0, 0);
        loop {
            let report = streamer.tick(viewers);
            stale += report.stale;
            saturated += report.saturated;
            if streamer.is_settled() {
                return (stale, saturated);
            }
            assert!(Instant::now() < deadline, "world did not settle");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// A one-slot queue drops most requests on the first tick; dropped regions are
    /// offered again on later ticks until every one of them is up.
    #[test]
    fn test_saturated_queue_converges() {
        let mut config = config(vec![64.0, 256.0]);
        config.content.varieties.clear();
        config.biomes.rows.clear();
        config.scheduler.queue_depth = 1;
        let world = WorldParams::from_config(&config).unwrap();
        let mut streamer = WorldStreamer::with_density(world, Arc::new(flat)).unwrap();

        let first = streamer.tick(VIEWER);
        assert_eq!(first.enqueued, 25);
        assert_eq!(first.saturated, 24);
        assert!(first.dispatched <= 1);

        let (_, saturated) = settle(&mut streamer, VIEWER);
        assert!(saturated > 0);
        let views = streamer.snapshot(&everything());
        assert_eq!(views.iter().map(|view| view.coord).collect::<Vec<_>>(), square(2));
        for view in &views {
            assert_eq!(view.lod, 0);
            assert_eq!(streamer.grid().state(view.coord), RegionState::Ready);
        }
    }

    /// A region whose LOD changes while it is being generated drops the outdated
    /// result and ends up at the new LOD. The outdated mesh never reaches a sink.
    #[test]
    fn test_lod_change_during_generation_commits_new_lod() {
        let world = params(vec![10.0, 256.0]);
        let target = RegionCoord::new(1, 0, 0);
        let density: Arc<dyn DensitySource> = Arc::new(flat);
        let extractor = Arc::new(GatedExtractor {
            inner: MarchingTetrahedra::new(density, world.layout, world.base_resolution, world.max_lod()),
            gated: target,
            open: AtomicBool::new(false),
        });
        let mut streamer =
            WorldStreamer::with_extractor(world, Arc::clone(&extractor) as Arc<dyn SurfaceExtractor>).unwrap();
        let recorder = Recorder::default();
        streamer.add_geometry_sink(Box::new(recorder.clone()));

        let deadline = Instant::now() + TIMEOUT;
        while streamer.grid().state(target) != RegionState::Generating {
            assert!(Instant::now() < deadline, "target never started");
            streamer.tick(VIEWER);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(streamer.grid().current_lod(target), Some(0));

        // Region 1 spans x in [4, 12); from x = -12 it lies 16 away, past the LOD 0
        // band and its hysteresis margin, but still inside the retention box.
        let moved: &[DVec3] = &[DVec3::new(-12.0, 0.0, 0.0)];
        let report = streamer.tick(moved);
        assert!(report.changed >= 1);
        assert_eq!(streamer.grid().current_lod(target), Some(1));
        extractor.open.store(true, Ordering::Release);

        let (stale, _) = settle(&mut streamer, moved);
        assert!(stale >= 1, "outdated result was not dropped");
        assert_eq!(streamer.grid().state(target), RegionState::Ready);
        assert_eq!(streamer.grid().payload(target).unwrap().lod(), 1);

        let events = recorder.events();
        assert!(events.contains(&Event::Ready(target, 1, streamer.grid().record_view(target).unwrap().sequence)));
        assert!(!events.iter().any(|e| matches!(e, Event::Ready(c, 0, _) if *c == target)));
    }

    /// Two distant sources each keep their own square loaded.
    #[test]
    fn test_two_sources_stream_both_neighborhoods() {
        let mut streamer = WorldStreamer::with_density(params(vec![64.0, 256.0]), Arc::new(flat)).unwrap();
        let sources = [DVec3::ZERO, DVec3::new(400.0, 0.0, 0.0)];
        assert!(streamer.flush(&sources, TIMEOUT));

        let coords: Vec<_> = streamer.snapshot(&everything()).iter().map(|view| view.coord).collect();
        let mut expected = square(2);
        expected.extend(square(2).into_iter().map(|c| RegionCoord::new(c.x + 50, c.y, c.z)));
        expected.sort();
        assert_eq!(coords, expected);

        // Dropping the second source unloads only its neighborhood.
        assert!(streamer.flush(&sources[..1], TIMEOUT));
        let coords: Vec<_> = streamer.snapshot(&everything()).iter().map(|view| view.coord).collect();
        assert_eq!(coords, square(2));
    }

    /// Regions generated from the built-in terrain record which biomes they cover.
    #[test]
    fn test_regions_carry_biome_palette() {
        let world = WorldParams::from_config(&config(vec![64.0, 256.0])).unwrap();
        let biome_count = world.biomes.rows.len();
        assert_eq!(biome_count, 2);
        let mut streamer = WorldStreamer::new(world).unwrap();
        assert!(streamer.flush(VIEWER, TIMEOUT));

        let views = streamer.snapshot(&everything());
        assert_eq!(views.len(), 25);
        for view in &views {
            let palette = &view.payload.biomes;
            assert!(!palette.is_empty());
            assert!(palette.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(palette.iter().all(|&BiomeId(id)| usize::from(id) < biome_count));
        }
    }
}
