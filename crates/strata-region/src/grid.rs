use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use strata_coords::{Aabb, BoundarySide, RegionCoord, RegionLayout};
use tracing::{debug, trace};

use crate::record::{JobKind, JobTicket, RecordView, RegionRecord, RegionState};
use crate::retry::RetryPolicy;

/// Result of [`RegionGrid::request_lod`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new record was created in `Unloaded`.
    Created,
    /// The record already wanted this LOD.
    Unchanged,
    /// The requested LOD changed; the epoch was bumped and committed geometry is
    /// kept on display until the new mesh lands.
    Changed { previous: u8 },
    /// A region pending eviction was wanted again.
    Revived,
    /// The region failed permanently and ignores requests until evicted.
    Failed,
}

/// Why [`RegionGrid::begin_job`] refused to start a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BeginRefusal {
    #[error("region is not tracked")]
    Absent,
    #[error("job {0} is already in flight")]
    Busy(u64),
    #[error("epoch {requested} was superseded by {current}")]
    Stale { requested: u64, current: u64 },
    #[error("region is {0}")]
    Closed(RegionState),
    #[error("region has no committed mesh to re-stitch")]
    NothingToStitch,
}

/// Result of applying a finished job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The payload is now displayed.
    Applied { sequence: u64 },
    /// The job was dispatched for an older epoch; the result was dropped.
    Stale,
    /// The region was evicted while the job ran; the result was dropped.
    Evicted,
}

/// Result of reporting a failed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The region may be dispatched again from tick `at`.
    Retry { attempt: u32, at: u64 },
    /// Attempts are used up; the region is now [`RegionState::Failed`].
    Exhausted { attempts: u32 },
    Stale,
    Evicted,
}

/// Result of [`RegionGrid::evict`]. `displayed` tells whether geometry was on display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictOutcome {
    Absent,
    Removed { displayed: bool },
    /// A job is still running; the record goes once it reports back.
    Deferred { displayed: bool },
}

/// A job a region is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueJob {
    pub coord: RegionCoord,
    pub kind: JobKind,
    pub epoch: u64,
    pub lod: u8,
}

/// A displayed region as seen by a snapshot.
#[derive(Debug)]
pub struct RegionView<G> {
    pub coord: RegionCoord,
    /// LOD of the displayed payload.
    pub lod: u8,
    pub sequence: u64,
    pub payload: Arc<G>,
}

impl<G> Clone for RegionView<G> {
    fn clone(&self) -> Self {
        Self {
            coord: self.coord,
            lod: self.lod,
            sequence: self.sequence,
            payload: Arc::clone(&self.payload),
        }
    }
}

/// Concurrent map of live regions.
///
/// The control thread requests, evicts and dispatches; workers report results through
/// [`commit`](Self::commit) and [`record_failure`](Self::record_failure). Every call
/// holds one shard lock for its duration, so readers never observe a torn record.
pub struct RegionGrid<G> {
    layout: RegionLayout,
    records: DashMap<RegionCoord, RegionRecord<G>>,
    next_sequence: AtomicU64,
    next_ticket: AtomicU64,
}

impl<G> RegionGrid<G> {
    pub fn new(layout: RegionLayout) -> Self {
        Self {
            layout,
            records: DashMap::new(),
            next_sequence: AtomicU64::new(1),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Ask for `coord` at `lod`, creating its record if needed.
    pub fn request_lod(&self, coord: RegionCoord, lod: u8) -> RequestOutcome {
        match self.records.entry(coord) {
            Entry::Vacant(entry) => {
                entry.insert(RegionRecord::new(lod));
                RequestOutcome::Created
            }
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                let state = record.state;
                match state {
                    RegionState::Failed => RequestOutcome::Failed,
                    RegionState::Evicting => {
                        record.lod = lod;
                        record.epoch += 1;
                        record.state = RegionState::Unloaded;
                        record.attempts = 0;
                        record.retry_at = 0;
                        RequestOutcome::Revived
                    }
                    _ if record.lod == lod => RequestOutcome::Unchanged,
                    _ => {
                        let previous = record.lod;
                        record.lod = lod;
                        record.epoch += 1;
                        record.attempts = 0;
                        record.retry_at = 0;
                        record.restitch_pending = false;
                        if state == RegionState::Ready {
                            record.state = RegionState::Queued;
                        }
                        RequestOutcome::Changed { previous }
                    }
                }
            }
        }
    }

    /// Note that an extraction for `coord` has been enqueued.
    pub fn mark_queued(&self, coord: RegionCoord) -> bool {
        let Some(mut record) = self.records.get_mut(&coord) else {
            return false;
        };
        match record.state {
            RegionState::Unloaded | RegionState::Queued => {
                record.state = RegionState::Queued;
                true
            }
            _ => false,
        }
    }

    /// Flag a displayed region for re-stitching against its current neighbors.
    pub fn mark_restitch(&self, coord: RegionCoord) -> bool {
        let Some(mut record) = self.records.get_mut(&coord) else {
            return false;
        };
        if record.state == RegionState::Ready && record.payload.is_some() {
            record.restitch_pending = true;
            true
        } else {
            false
        }
    }

    /// The job `coord` is waiting for at `tick`, if any.
    pub fn dispatch_kind(&self, coord: RegionCoord, tick: u64) -> Option<JobKind> {
        let record = self.records.get(&coord)?;
        Self::due(&record, tick)
    }

    /// Every job that could be dispatched at `tick`, in coordinate order.
    pub fn due_jobs(&self, tick: u64) -> Vec<DueJob> {
        let mut due: Vec<DueJob> = self
            .records
            .iter()
            .filter_map(|entry| {
                let record = entry.value();
                Self::due(record, tick).map(|kind| DueJob {
                    coord: *entry.key(),
                    kind,
                    epoch: record.epoch,
                    lod: record.lod,
                })
            })
            .collect();
        due.sort_unstable_by_key(|job| job.coord);
        due
    }

    fn due(record: &RegionRecord<G>, tick: u64) -> Option<JobKind> {
        if record.job.is_some() || tick < record.retry_at {
            return None;
        }
        match record.state {
            RegionState::Unloaded | RegionState::Queued => Some(JobKind::Extract),
            RegionState::Ready if record.restitch_pending => Some(JobKind::Stitch),
            _ => None,
        }
    }

    /// Claim `coord` for a job dispatched at `epoch`.
    pub fn begin_job(&self, coord: RegionCoord, epoch: u64, kind: JobKind) -> Result<JobTicket, BeginRefusal> {
        let mut record = self.records.get_mut(&coord).ok_or(BeginRefusal::Absent)?;
        if matches!(record.state, RegionState::Failed | RegionState::Evicting) {
            return Err(BeginRefusal::Closed(record.state));
        }
        if let Some(job) = record.job {
            return Err(BeginRefusal::Busy(job.id));
        }
        if record.epoch != epoch {
            return Err(BeginRefusal::Stale {
                requested: epoch,
                current: record.epoch,
            });
        }
        match kind {
            JobKind::Extract => record.state = RegionState::Generating,
            JobKind::Stitch => {
                if record.state != RegionState::Ready || record.payload.is_none() {
                    return Err(BeginRefusal::NothingToStitch);
                }
                record.restitch_pending = false;
            }
        }
        let ticket = JobTicket {
            id: self.next_ticket.fetch_add(1, Ordering::Relaxed),
            coord,
            epoch,
            lod: record.lod,
            kind,
        };
        record.job = Some(ticket);
        Ok(ticket)
    }

    /// Give up a job that never reached a worker.
    pub fn clear_job(&self, ticket: &JobTicket) -> bool {
        {
            let Some(mut record) = self.records.get_mut(&ticket.coord) else {
                return false;
            };
            if record.job.map(|job| job.id) != Some(ticket.id) {
                return false;
            }
            record.job = None;
            match (ticket.kind, record.state) {
                (_, RegionState::Evicting) => {}
                (JobKind::Extract, _) => {
                    record.requeue_if_generating();
                    return true;
                }
                (JobKind::Stitch, _) => {
                    record.restitch_pending = true;
                    return true;
                }
            }
        }
        self.remove_evicted(ticket.coord);
        true
    }

    /// Apply a finished job's payload if it is still wanted.
    ///
    /// The payload is applied only when `epoch` is the record's current epoch; a
    /// region evicted while the job ran is removed instead of being resurrected.
    pub fn commit(&self, coord: RegionCoord, epoch: u64, payload: Arc<G>) -> CommitOutcome {
        {
            let Some(mut record) = self.records.get_mut(&coord) else {
                return CommitOutcome::Evicted;
            };
            record.release_job(epoch);
            if record.state != RegionState::Evicting {
                if record.epoch != epoch || record.state == RegionState::Failed {
                    record.requeue_if_generating();
                    trace!(%coord, epoch, current = record.epoch, "Dropped stale result");
                    return CommitOutcome::Stale;
                }
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                record.payload = Some(payload);
                record.payload_lod = Some(record.lod);
                record.state = RegionState::Ready;
                record.sequence = sequence;
                record.attempts = 0;
                record.retry_at = 0;
                record.last_error = None;
                debug!(%coord, lod = record.lod, sequence, "Region ready");
                return CommitOutcome::Applied { sequence };
            }
        }
        self.remove_evicted(coord);
        CommitOutcome::Evicted
    }

    /// Count a failed job and schedule a retry, or give up after the policy's limit.
    pub fn record_failure(
        &self,
        coord: RegionCoord,
        epoch: u64,
        tick: u64,
        policy: &RetryPolicy,
        error: impl Into<String>,
    ) -> FailureOutcome {
        {
            let Some(mut record) = self.records.get_mut(&coord) else {
                return FailureOutcome::Evicted;
            };
            record.release_job(epoch);
            if record.state != RegionState::Evicting {
                if record.epoch != epoch || record.state == RegionState::Failed {
                    record.requeue_if_generating();
                    return FailureOutcome::Stale;
                }
                record.attempts += 1;
                record.last_error = Some(error.into());
                let attempts = record.attempts;
                if policy.is_exhausted(attempts) {
                    record.state = RegionState::Failed;
                    record.payload = None;
                    record.payload_lod = None;
                    record.restitch_pending = false;
                    debug!(%coord, attempts, "Region retry budget exhausted");
                    return FailureOutcome::Exhausted { attempts };
                }
                let at = tick.saturating_add(policy.delay(attempts));
                record.retry_at = at;
                match record.state {
                    RegionState::Ready => record.restitch_pending = true,
                    _ => record.state = RegionState::Queued,
                }
                debug!(%coord, attempt = attempts, retry_at = at, "Region job failed, retrying");
                return FailureOutcome::Retry { attempt: attempts, at };
            }
        }
        self.remove_evicted(coord);
        FailureOutcome::Evicted
    }

    /// Remove `coord`, or mark it for removal if a job is in flight.
    pub fn evict(&self, coord: RegionCoord) -> EvictOutcome {
        if let Some((_, record)) = self.records.remove_if(&coord, |_, r| r.job.is_none()) {
            return EvictOutcome::Removed {
                displayed: record.displayed_lod().is_some(),
            };
        }
        let Some(mut record) = self.records.get_mut(&coord) else {
            return EvictOutcome::Absent;
        };
        let displayed = record.displayed_lod().is_some();
        record.payload = None;
        record.payload_lod = None;
        record.restitch_pending = false;
        record.state = RegionState::Evicting;
        EvictOutcome::Deferred { displayed }
    }

    fn remove_evicted(&self, coord: RegionCoord) {
        self.records
            .remove_if(&coord, |_, r| r.state == RegionState::Evicting && r.job.is_none());
    }

    /// State of `coord`; untracked regions are `Unloaded`.
    pub fn state(&self, coord: RegionCoord) -> RegionState {
        self.records
            .get(&coord)
            .map_or(RegionState::Unloaded, |record| record.state)
    }

    /// LOD currently requested for a live region.
    pub fn current_lod(&self, coord: RegionCoord) -> Option<u8> {
        let record = self.records.get(&coord)?;
        match record.state {
            RegionState::Failed | RegionState::Evicting => None,
            _ => Some(record.lod),
        }
    }

    /// LOD of the geometry displayed for `coord`.
    pub fn displayed_lod(&self, coord: RegionCoord) -> Option<u8> {
        self.records.get(&coord)?.displayed_lod()
    }

    /// Displayed LOD of each face neighbor, indexed by [`BoundarySide::index`].
    pub fn neighbor_lods(&self, coord: RegionCoord) -> [Option<u8>; 6] {
        BoundarySide::ALL.map(|side| self.displayed_lod(coord.neighbor(side)))
    }

    pub fn payload(&self, coord: RegionCoord) -> Option<Arc<G>> {
        self.records.get(&coord)?.payload.clone()
    }

    pub fn record_view(&self, coord: RegionCoord) -> Option<RecordView> {
        self.records.get(&coord).map(|record| record.view(coord))
    }

    /// Displayed regions whose bounds intersect `bounds`, in coordinate order.
    pub fn snapshot(&self, bounds: &Aabb) -> Vec<RegionView<G>> {
        let mut views: Vec<RegionView<G>> = self
            .records
            .iter()
            .filter(|entry| self.layout.bounds(*entry.key()).intersects(bounds))
            .filter_map(|entry| {
                let record = entry.value();
                Some(RegionView {
                    coord: *entry.key(),
                    lod: record.displayed_lod()?,
                    sequence: record.sequence,
                    payload: Arc::clone(record.payload.as_ref()?),
                })
            })
            .collect();
        views.sort_unstable_by_key(|view| view.coord);
        views
    }

    /// Every tracked coordinate, sorted.
    pub fn live_coords(&self) -> Vec<RegionCoord> {
        let mut coords: Vec<RegionCoord> = self.records.iter().map(|entry| *entry.key()).collect();
        coords.sort_unstable();
        coords
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use glam::DVec3;

    use super::*;

    fn grid() -> RegionGrid<String> {
        RegionGrid::new(RegionLayout::new(32).unwrap())
    }

    fn payload(text: &str) -> Arc<String> {
        Arc::new(text.to_owned())
    }

    fn epoch(grid: &RegionGrid<String>, coord: RegionCoord) -> u64 {
        grid.record_view(coord).unwrap().epoch
    }

    #[test]
    fn test_lifecycle_to_ready() {
        let grid = grid();
        let c = RegionCoord::new(1, 0, 2);
        assert_eq!(grid.state(c), RegionState::Unloaded);
        assert_eq!(grid.request_lod(c, 1), RequestOutcome::Created);
        assert_eq!(grid.request_lod(c, 1), RequestOutcome::Unchanged);
        assert_eq!(grid.dispatch_kind(c, 0), Some(JobKind::Extract));

        assert!(grid.mark_queued(c));
        assert_eq!(grid.state(c), RegionState::Queued);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        assert_eq!(ticket.lod, 1);
        assert_eq!(grid.state(c), RegionState::Generating);
        assert_eq!(grid.dispatch_kind(c, 0), None);

        let outcome = grid.commit(c, ticket.epoch, payload("mesh"));
        assert!(matches!(outcome, CommitOutcome::Applied { .. }));
        assert_eq!(grid.state(c), RegionState::Ready);
        assert_eq!(grid.displayed_lod(c), Some(1));
        assert_eq!(grid.payload(c).as_deref().map(String::as_str), Some("mesh"));
        assert_eq!(grid.dispatch_kind(c, 0), None);
    }

    /// A result for a superseded request never overwrites newer state.
    #[test]
    fn test_stale_commit_is_ignored() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        grid.request_lod(c, 0);
        let old = grid.begin_job(c, 1, JobKind::Extract).unwrap();

        assert_eq!(grid.request_lod(c, 2), RequestOutcome::Changed { previous: 0 });
        assert_eq!(epoch(&grid, c), 2);

        assert_eq!(grid.commit(c, old.epoch, payload("lod0")), CommitOutcome::Stale);
        let view = grid.record_view(c).unwrap();
        assert_eq!(view.lod, 2);
        assert_eq!(view.displayed_lod, None);
        assert_eq!(view.state, RegionState::Queued);
        assert_eq!(view.job, None);
        assert_eq!(grid.dispatch_kind(c, 0), Some(JobKind::Extract));

        let fresh = grid.begin_job(c, 2, JobKind::Extract).unwrap();
        assert!(matches!(grid.commit(c, fresh.epoch, payload("lod2")), CommitOutcome::Applied { .. }));
        assert_eq!(grid.displayed_lod(c), Some(2));
    }

    /// Changing LOD keeps the old geometry on display until the new mesh lands.
    #[test]
    fn test_lod_change_keeps_displayed_payload() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        grid.request_lod(c, 0);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        grid.commit(c, ticket.epoch, payload("fine"));

        grid.request_lod(c, 1);
        assert_eq!(grid.state(c), RegionState::Queued);
        assert_eq!(grid.displayed_lod(c), Some(0));
        assert_eq!(grid.snapshot(&Aabb::around(DVec3::ZERO, DVec3::splat(1.0))).len(), 1);
    }

    #[test]
    fn test_begin_job_refusals() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        assert_eq!(grid.begin_job(c, 1, JobKind::Extract), Err(BeginRefusal::Absent));
        grid.request_lod(c, 0);
        assert_eq!(grid.begin_job(c, 1, JobKind::Stitch), Err(BeginRefusal::NothingToStitch));
        assert_eq!(
            grid.begin_job(c, 7, JobKind::Extract),
            Err(BeginRefusal::Stale { requested: 7, current: 1 })
        );
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        assert_eq!(grid.begin_job(c, 1, JobKind::Extract), Err(BeginRefusal::Busy(ticket.id)));
    }

    /// A region evicted mid-job is removed when the job lands, not resurrected.
    #[test]
    fn test_eviction_during_generation() {
        let grid = grid();
        let c = RegionCoord::new(-3, 0, 4);
        grid.request_lod(c, 0);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();

        assert_eq!(grid.evict(c), EvictOutcome::Deferred { displayed: false });
        assert_eq!(grid.state(c), RegionState::Evicting);
        assert_eq!(grid.dispatch_kind(c, 0), None);

        assert_eq!(grid.commit(c, ticket.epoch, payload("late")), CommitOutcome::Evicted);
        assert_eq!(grid.state(c), RegionState::Unloaded);
        assert!(grid.payload(c).is_none());
        assert!(grid.is_empty());
        assert!(grid.snapshot(&Aabb::around(DVec3::new(-96.0, 0.0, 128.0), DVec3::splat(64.0))).is_empty());
    }

    #[test]
    fn test_evicting_region_can_be_revived() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        grid.request_lod(c, 0);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        grid.evict(c);

        assert_eq!(grid.request_lod(c, 1), RequestOutcome::Revived);
        assert_eq!(grid.commit(c, ticket.epoch, payload("old")), CommitOutcome::Stale);
        assert_eq!(grid.state(c), RegionState::Unloaded);
        assert_eq!(grid.dispatch_kind(c, 0), Some(JobKind::Extract));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_evict_idle_region() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        assert_eq!(grid.evict(c), EvictOutcome::Absent);
        grid.request_lod(c, 0);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        grid.commit(c, ticket.epoch, payload("mesh"));
        assert_eq!(grid.evict(c), EvictOutcome::Removed { displayed: true });
        assert!(grid.is_empty());
    }

    #[test]
    fn test_failures_back_off_then_exhaust() {
        let grid = grid();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: 2,
            max_delay: 8,
        };
        let c = RegionCoord::ORIGIN;
        grid.request_lod(c, 0);

        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        assert_eq!(
            grid.record_failure(c, ticket.epoch, 10, &policy, "nan"),
            FailureOutcome::Retry { attempt: 1, at: 12 }
        );
        assert_eq!(grid.state(c), RegionState::Queued);
        assert_eq!(grid.dispatch_kind(c, 11), None);
        assert_eq!(grid.dispatch_kind(c, 12), Some(JobKind::Extract));

        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        assert_eq!(
            grid.record_failure(c, ticket.epoch, 12, &policy, "nan"),
            FailureOutcome::Retry { attempt: 2, at: 16 }
        );
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        assert_eq!(
            grid.record_failure(c, ticket.epoch, 16, &policy, "nan"),
            FailureOutcome::Exhausted { attempts: 3 }
        );

        let view = grid.record_view(c).unwrap();
        assert_eq!(view.state, RegionState::Failed);
        assert_eq!(view.last_error.as_deref(), Some("nan"));
        assert_eq!(grid.dispatch_kind(c, u64::MAX), None);
        assert_eq!(grid.request_lod(c, 1), RequestOutcome::Failed);
        assert_eq!(grid.current_lod(c), None);

        assert_eq!(grid.evict(c), EvictOutcome::Removed { displayed: false });
        assert_eq!(grid.request_lod(c, 0), RequestOutcome::Created);
    }

    #[test]
    fn test_restitch_flow() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        assert!(!grid.mark_restitch(c));
        grid.request_lod(c, 0);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        grid.commit(c, ticket.epoch, payload("a"));
        let first = grid.record_view(c).unwrap().sequence;

        assert!(grid.mark_restitch(c));
        assert_eq!(grid.dispatch_kind(c, 0), Some(JobKind::Stitch));
        let stitch = grid.begin_job(c, 1, JobKind::Stitch).unwrap();
        assert_eq!(grid.state(c), RegionState::Ready);
        assert!(!grid.record_view(c).unwrap().restitch_pending);

        let CommitOutcome::Applied { sequence } = grid.commit(c, stitch.epoch, payload("b")) else {
            panic!("stitch commit rejected");
        };
        assert!(sequence > first);
        assert_eq!(grid.payload(c).as_deref().map(String::as_str), Some("b"));
    }

    #[test]
    fn test_clear_job_requeues() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        grid.request_lod(c, 0);
        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        assert!(grid.clear_job(&ticket));
        assert!(!grid.clear_job(&ticket));
        assert_eq!(grid.state(c), RegionState::Queued);
        assert_eq!(grid.dispatch_kind(c, 0), Some(JobKind::Extract));

        let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
        grid.evict(c);
        assert!(grid.clear_job(&ticket));
        assert!(grid.is_empty());
    }

    #[test]
    fn test_neighbor_lods_report_displayed_geometry() {
        let grid = grid();
        let c = RegionCoord::ORIGIN;
        for (lod, side) in [(0, BoundarySide::PosX), (2, BoundarySide::NegZ)] {
            let n = c.neighbor(side);
            grid.request_lod(n, lod);
            let ticket = grid.begin_job(n, 1, JobKind::Extract).unwrap();
            grid.commit(n, ticket.epoch, payload("n"));
        }
        grid.request_lod(c.neighbor(BoundarySide::NegX), 1);

        let lods = grid.neighbor_lods(c);
        assert_eq!(lods[BoundarySide::PosX.index()], Some(0));
        assert_eq!(lods[BoundarySide::NegZ.index()], Some(2));
        assert_eq!(lods[BoundarySide::NegX.index()], None);
        assert_eq!(lods[BoundarySide::PosY.index()], None);
    }

    #[test]
    fn test_snapshot_is_filtered_and_sorted() {
        let grid = grid();
        for x in (-3..=3).rev() {
            let c = RegionCoord::new(x, 0, 0);
            grid.request_lod(c, 0);
            if x != 1 {
                let ticket = grid.begin_job(c, 1, JobKind::Extract).unwrap();
                grid.commit(c, ticket.epoch, payload(&x.to_string()));
            }
        }
        // Covers regions -1..=1 on x.
        let bounds = Aabb::new(DVec3::new(-40.0, -1.0, -1.0), DVec3::new(40.0, 1.0, 1.0));
        let coords: Vec<i64> = grid.snapshot(&bounds).iter().map(|v| v.coord.x).collect();
        assert_eq!(coords, vec![-1, 0]);
        assert_eq!(grid.live_coords().len(), 7);
        assert!(grid.live_coords().windows(2).all(|w| w[0] < w[1]));
    }

    /// Workers committing different regions concurrently all land with distinct
    /// sequence numbers.
    #[test]
    fn test_concurrent_commits() {
        let grid = grid();
        let tickets: Vec<JobTicket> = (0..64)
            .map(|i| {
                let c = RegionCoord::new(i % 8, 0, i / 8);
                grid.request_lod(c, 0);
                grid.begin_job(c, 1, JobKind::Extract).unwrap()
            })
            .collect();

        thread::scope(|scope| {
            for chunk in tickets.chunks(16) {
                let grid = &grid;
                scope.spawn(move || {
                    for ticket in chunk {
                        let outcome = grid.commit(ticket.coord, ticket.epoch, payload("m"));
                        assert!(matches!(outcome, CommitOutcome::Applied { .. }));
                    }
                });
            }
        });

        let mut sequences: Vec<u64> = grid
            .live_coords()
            .into_iter()
            .map(|c| grid.record_view(c).unwrap().sequence)
            .collect();
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), 64);
        assert!(sequences.iter().all(|&s| s > 0));
    }
}
