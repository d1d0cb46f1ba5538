//! Level-of-detail selection: distance bands, hysteresis and the retention box
//! around the viewer.

mod bands;
mod selector;

pub use bands::{LodBands, LodPolicyError, MAX_BANDS};
pub use selector::{DistanceAnchor, DistanceMetric, LodPolicy, LodSelector};
