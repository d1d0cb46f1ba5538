//! Generation scheduler: a priority queue of pending jobs in front of a fixed pool of
//! worker threads.
//!
//! Jobs wait in the pending queue, nearest (and newest) first, until [`pump`] hands them
//! to the pool. Workers extract, place content, stitch and commit straight into the
//! region grid, then report back through a completion channel that the control thread
//! drains once per tick.
//!
//! [`pump`]: GenerationScheduler::pump

use std::any::Any;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use rustc_hash::FxHashMap;
use strata_coords::RegionCoord;
use strata_mesh::{NeighborLods, SurfaceExtractor, SeamStitcher};
use strata_region::{BeginRefusal, CommitOutcome, JobKind, JobTicket, RegionGrid};
use strata_terrain::{ContentPlacer, ContentPoint};
use tracing::{debug, trace, warn};

use crate::error::GenerationError;
use crate::params::SchedulerParams;
use crate::payload::RegionPayload;

/// A job waiting for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobRequest {
    pub coord: RegionCoord,
    /// Record epoch the job is for; stale requests are dropped at dispatch.
    pub epoch: u64,
    pub lod: u8,
    pub kind: JobKind,
    /// Smaller runs first.
    pub priority: u64,
}

/// Result of [`GenerationScheduler::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Replaced an older pending request for the same region.
    Superseded,
    /// The queue overflowed and its lowest-priority entry was dropped. That may be
    /// the request just enqueued.
    Saturated { dropped: RegionCoord },
}

/// What happened to a dispatched job.
#[derive(Debug)]
pub enum JobOutcome {
    /// A payload was built and offered to the grid.
    Committed {
        outcome: CommitOutcome,
        payload: Arc<RegionPayload>,
    },
    Failed(GenerationError),
    /// The region was evicted before the job started.
    Cancelled,
}

#[derive(Debug)]
pub struct Completion {
    pub ticket: JobTicket,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

/// Shared, read-only state every worker runs jobs against.
pub struct WorkerContext {
    pub extractor: Arc<dyn SurfaceExtractor>,
    pub stitcher: SeamStitcher,
    pub placer: Arc<ContentPlacer>,
    pub grid: Arc<RegionGrid<RegionPayload>>,
}

struct WorkItem {
    ticket: JobTicket,
    /// Neighbor LODs captured at dispatch.
    neighbors: NeighborLods,
    /// Committed payload, for stitch jobs.
    current: Option<Arc<RegionPayload>>,
    cancelled: Arc<AtomicBool>,
}

type PendingKey = (u64, Reverse<u64>);

/// Pending jobs ordered by priority, newest first among equals, with at most one
/// entry per region.
struct PendingQueue {
    depth: usize,
    next_seq: u64,
    order: BTreeMap<PendingKey, JobRequest>,
    by_coord: FxHashMap<RegionCoord, PendingKey>,
}

impl PendingQueue {
    fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            next_seq: 0,
            order: BTreeMap::new(),
            by_coord: FxHashMap::default(),
        }
    }

    fn push(&mut self, request: JobRequest) -> EnqueueOutcome {
        let superseded = self.remove(request.coord).is_some();
        let key = (request.priority, Reverse(self.next_seq));
        self.next_seq += 1;
        self.order.insert(key, request);
        self.by_coord.insert(request.coord, key);

        if self.order.len() > self.depth
            && let Some((_, dropped)) = self.order.pop_last()
        {
            self.by_coord.remove(&dropped.coord);
            return EnqueueOutcome::Saturated {
                dropped: dropped.coord,
            };
        }
        if superseded {
            EnqueueOutcome::Superseded
        } else {
            EnqueueOutcome::Queued
        }
    }

    fn pop(&mut self) -> Option<JobRequest> {
        let (_, request) = self.order.pop_first()?;
        self.by_coord.remove(&request.coord);
        Some(request)
    }

    fn remove(&mut self, coord: RegionCoord) -> Option<JobRequest> {
        let key = self.by_coord.remove(&coord)?;
        self.order.remove(&key)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Dispatches region jobs to a pool of worker threads.
///
/// Owned by the control thread. Workers touch the grid only through its commit
/// operation.
pub struct GenerationScheduler {
    grid: Arc<RegionGrid<RegionPayload>>,
    task_sender: Option<Sender<WorkItem>>,
    completion_receiver: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    pending: PendingQueue,
    /// Cancellation flag of the job in flight per region, keyed with its ticket id.
    active: FxHashMap<RegionCoord, (u64, Arc<AtomicBool>)>,
    in_flight: usize,
    max_in_flight: usize,
}

impl GenerationScheduler {
    /// Spawn `params.worker_count` named worker threads.
    pub fn new(context: WorkerContext, params: &SchedulerParams) -> std::io::Result<Self> {
        let max_in_flight = params.max_in_flight.max(1);
        // Both channels hold at most `max_in_flight` items, so sends never block.
        let (task_sender, task_receiver) = bounded::<WorkItem>(max_in_flight);
        let (completion_sender, completion_receiver) = bounded::<Completion>(max_in_flight);
        let grid = Arc::clone(&context.grid);
        let context = Arc::new(context);

        let mut workers = Vec::with_capacity(params.worker_count);
        for index in 0..params.worker_count.max(1) {
            let tasks = task_receiver.clone();
            let completions = completion_sender.clone();
            let context = Arc::clone(&context);
            let handle = std::thread::Builder::new()
                .name(format!("strata-gen-{index}"))
                .spawn(move || worker_loop(&context, &tasks, &completions))?;
            workers.push(handle);
        }
        debug!(workers = workers.len(), max_in_flight, "Generation workers started");

        Ok(Self {
            grid,
            task_sender: Some(task_sender),
            completion_receiver,
            workers,
            pending: PendingQueue::new(params.queue_depth),
            active: FxHashMap::default(),
            in_flight: 0,
            max_in_flight,
        })
    }

    /// Queue a job. Never blocks; overflow drops the lowest-priority entry.
    pub fn enqueue(&mut self, request: JobRequest) -> EnqueueOutcome {
        let outcome = self.pending.push(request);
        if let EnqueueOutcome::Saturated { dropped } = outcome {
            trace!(%dropped, "Pending queue saturated, dropped job");
        }
        outcome
    }

    /// Drop the pending job for `coord` and flag its in-flight job, if any, so a
    /// worker that has not started it skips it.
    pub fn cancel(&mut self, coord: RegionCoord) -> bool {
        let pending = self.pending.remove(coord).is_some();
        let active = self.active.get(&coord).is_some_and(|(_, flag)| {
            flag.store(true, Ordering::Relaxed);
            true
        });
        pending || active
    }

    /// Move pending jobs to the workers while below the in-flight limit.
    ///
    /// Each job is claimed in the grid first, so a region never has two jobs in
    /// flight. Returns the number dispatched.
    pub fn pump(&mut self) -> usize {
        let Some(sender) = &self.task_sender else {
            return 0;
        };
        let mut dispatched = 0;
        let mut deferred = Vec::new();

        while self.in_flight < self.max_in_flight {
            let Some(request) = self.pending.pop() else {
                break;
            };
            let ticket = match self.grid.begin_job(request.coord, request.epoch, request.kind) {
                Ok(ticket) => ticket,
                Err(BeginRefusal::Busy(_)) => {
                    deferred.push(request);
                    continue;
                }
                Err(refusal) => {
                    trace!(coord = %request.coord, %refusal, "Dropped pending job");
                    continue;
                }
            };

            let lods = self.grid.neighbor_lods(ticket.coord);
            let current = match ticket.kind {
                JobKind::Stitch => self.grid.payload(ticket.coord),
                JobKind::Extract => None,
            };
            let cancelled = Arc::new(AtomicBool::new(false));
            let item = WorkItem {
                ticket,
                neighbors: NeighborLods::from_fn(|side| lods[side.index()]),
                current,
                cancelled: Arc::clone(&cancelled),
            };
            if let Err(err) = sender.try_send(item) {
                self.grid.clear_job(&err.into_inner().ticket);
                deferred.push(request);
                break;
            }

            self.active.insert(ticket.coord, (ticket.id, cancelled));
            self.in_flight += 1;
            dispatched += 1;
            debug!(coord = %ticket.coord, lod = ticket.lod, kind = ?ticket.kind, "Dispatched job");
        }

        for request in deferred {
            self.pending.push(request);
        }
        dispatched
    }

    /// Collect finished jobs. Call once per tick on the control thread.
    pub fn drain_completions(&mut self) -> Vec<Completion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.completion_receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            let coord = completion.ticket.coord;
            if self
                .active
                .get(&coord)
                .is_some_and(|(id, _)| *id == completion.ticket.id)
            {
                self.active.remove(&coord);
            }
            completions.push(completion);
        }
        completions
    }

    /// Dispatched jobs whose completion has not been drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.pending.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work and join the workers. Jobs already handed over still run,
    /// unless they have not started yet.
    pub fn shutdown(&mut self) {
        for (_, flag) in self.active.values() {
            flag.store(true, Ordering::Relaxed);
        }
        self.task_sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Generation worker exited by panic");
            }
        }
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(context: &WorkerContext, tasks: &Receiver<WorkItem>, completions: &Sender<Completion>) {
    while let Ok(item) = tasks.recv() {
        let start = Instant::now();
        let outcome = if item.cancelled.load(Ordering::Relaxed) {
            JobOutcome::Cancelled
        } else {
            run(context, &item)
        };
        let completion = Completion {
            ticket: item.ticket,
            outcome,
            elapsed: start.elapsed(),
        };
        if completions.send(completion).is_err() {
            break;
        }
    }
}

/// Build and commit one payload. A panic anywhere in the job becomes a failure of
/// this region only.
fn run(context: &WorkerContext, item: &WorkItem) -> JobOutcome {
    let built = panic::catch_unwind(AssertUnwindSafe(|| build_payload(context, item)))
        .unwrap_or_else(|panic| Err(GenerationError::Panicked(panic_message(panic.as_ref()))));
    match built {
        Ok(payload) => {
            let payload = Arc::new(payload);
            let ticket = item.ticket;
            let outcome = context.grid.commit(ticket.coord, ticket.epoch, Arc::clone(&payload));
            JobOutcome::Committed { outcome, payload }
        }
        Err(error) => JobOutcome::Failed(error),
    }
}

/// Biome samples per region edge.
const PALETTE_SAMPLES: f64 = 8.0;

fn build_payload(context: &WorkerContext, item: &WorkItem) -> Result<RegionPayload, GenerationError> {
    let ticket = item.ticket;
    match ticket.kind {
        JobKind::Extract => {
            let base = context.extractor.extract(ticket.coord, ticket.lod)?;
            let content: Arc<[ContentPoint]> = context.placer.place(&base).into();
            let lattice = base.lattice();
            let extent = f64::from(lattice.cells()) * f64::from(lattice.spacing());
            let biomes = context
                .placer
                .biomes()
                .palette(base.origin_world(), extent, extent / PALETTE_SAMPLES)
                .into();
            let mesh = context.stitcher.stitch(&base, &item.neighbors);
            Ok(RegionPayload {
                base: Arc::new(base),
                mesh,
                content,
                biomes,
                neighbors: item.neighbors,
            })
        }
        JobKind::Stitch => {
            let current = item.current.as_ref().ok_or(GenerationError::MissingGeometry)?;
            Ok(RegionPayload {
                base: Arc::clone(&current.base),
                mesh: context.stitcher.stitch(&current.base, &item.neighbors),
                content: Arc::clone(&current.content),
                biomes: Arc::clone(&current.biomes),
                neighbors: item.neighbors,
            })
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
