//! The scalar field the surface is extracted from.

/// Stateless scalar field sampler.
///
/// The surface is the zero set of the field; negative values are solid. Implementations
/// are called concurrently from every worker thread and must return the same value for
/// the same position on every call.
pub trait DensitySource: Send + Sync {
    fn sample(&self, x: f64, y: f64, z: f64) -> f64;
}

impl<F> DensitySource for F
where
    F: Fn(f64, f64, f64) -> f64 + Send + Sync,
{
    #[inline]
    fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        self(x, y, z)
    }
}
