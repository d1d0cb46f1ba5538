//! Region bookkeeping: one record per live region, its LOD, lifecycle state and the
//! geometry committed for it.
//!
//! Asynchronous results are applied through an epoch-stamped commit protocol: each
//! re-request bumps the record's epoch, and a completion carrying an older epoch is
//! dropped instead of overwriting newer state.

mod grid;
mod record;
mod retry;

pub use grid::{
    BeginRefusal, CommitOutcome, DueJob, EvictOutcome, FailureOutcome, RegionGrid, RegionView,
    RequestOutcome,
};
pub use record::{JobKind, JobTicket, RecordView, RegionState};
pub use retry::RetryPolicy;
