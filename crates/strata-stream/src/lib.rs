//! Streaming control loop: turns viewer movement into generation jobs, runs them on a
//! worker pool and publishes finished regions to downstream sinks.

mod error;
mod params;
mod payload;
mod scheduler;
mod sink;
mod streamer;

pub use error::{GenerationError, StreamError};
pub use params::{ParamsError, SchedulerParams, WorldParams};
pub use payload::RegionPayload;
pub use scheduler::{
    Completion, EnqueueOutcome, GenerationScheduler, JobOutcome, JobRequest, WorkerContext,
};
pub use sink::{ContentSink, GeometrySink};
pub use streamer::{StreamTickReport, WorldStreamer};
