use strata_mesh::ExtractError;

use crate::params::ParamsError;

/// Why a worker could not produce a region payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("sampling failed: {0}")]
    Sampling(#[from] ExtractError),
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("no committed geometry to re-stitch")]
    MissingGeometry,
}

/// Errors from starting the streamer.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid world parameters: {0}")]
    Params(#[from] ParamsError),
    #[error("failed to spawn generation worker: {0}")]
    Spawn(#[from] std::io::Error),
}
