use std::fmt;
use std::sync::Arc;

use strata_coords::RegionCoord;

/// Lifecycle state of one region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegionState {
    /// Requested but not yet handed to the scheduler.
    #[default]
    Unloaded,
    /// Waiting in the scheduler queue (or for a retry delay to expire).
    Queued,
    /// An extraction job is running.
    Generating,
    /// Geometry at the requested LOD is committed.
    Ready,
    /// Evicted while a job was in flight; removed when the job reports back.
    Evicting,
    /// Generation failed too often. Stays failed until the region is evicted.
    Failed,
}

impl fmt::Display for RegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Queued => "queued",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Evicting => "evicting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a dispatched job produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Full extraction (plus stitching) at the record's LOD.
    Extract,
    /// Re-stitch the committed mesh against changed neighbors.
    Stitch,
}

/// Identifies one dispatched job. At most one is outstanding per region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobTicket {
    pub id: u64,
    pub coord: RegionCoord,
    pub epoch: u64,
    pub lod: u8,
    pub kind: JobKind,
}

#[derive(Debug)]
pub(crate) struct RegionRecord<G> {
    pub lod: u8,
    pub state: RegionState,
    pub epoch: u64,
    pub job: Option<JobTicket>,
    pub payload: Option<Arc<G>>,
    pub payload_lod: Option<u8>,
    pub sequence: u64,
    pub attempts: u32,
    pub retry_at: u64,
    pub restitch_pending: bool,
    pub last_error: Option<String>,
}

impl<G> RegionRecord<G> {
    pub fn new(lod: u8) -> Self {
        Self {
            lod,
            state: RegionState::Unloaded,
            epoch: 1,
            job: None,
            payload: None,
            payload_lod: None,
            sequence: 0,
            attempts: 0,
            retry_at: 0,
            restitch_pending: false,
            last_error: None,
        }
    }

    /// LOD of the geometry currently on display, if any.
    pub fn displayed_lod(&self) -> Option<u8> {
        self.payload.as_ref().and(self.payload_lod)
    }

    /// Release `epoch`'s job if it is the outstanding one.
    pub fn release_job(&mut self, epoch: u64) -> Option<JobTicket> {
        match self.job {
            Some(job) if job.epoch == epoch => self.job.take(),
            _ => None,
        }
    }

    /// Return a superseded extraction to the queue so the new epoch gets dispatched.
    pub fn requeue_if_generating(&mut self) {
        if self.state == RegionState::Generating {
            self.state = RegionState::Queued;
        }
    }

    pub fn view(&self, coord: RegionCoord) -> RecordView {
        RecordView {
            coord,
            lod: self.lod,
            state: self.state,
            epoch: self.epoch,
            job: self.job,
            displayed_lod: self.displayed_lod(),
            sequence: self.sequence,
            attempts: self.attempts,
            retry_at: self.retry_at,
            restitch_pending: self.restitch_pending,
            last_error: self.last_error.clone(),
        }
    }
}

/// Point-in-time copy of a record's bookkeeping, without the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordView {
    pub coord: RegionCoord,
    /// Requested LOD.
    pub lod: u8,
    pub state: RegionState,
    pub epoch: u64,
    pub job: Option<JobTicket>,
    pub displayed_lod: Option<u8>,
    /// Readiness sequence of the last applied commit (0 if none).
    pub sequence: u64,
    pub attempts: u32,
    pub retry_at: u64,
    pub restitch_pending: bool,
    pub last_error: Option<String>,
}
