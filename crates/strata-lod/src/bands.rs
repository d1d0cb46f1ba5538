//! Distance bands mapping a viewer distance to a discrete LOD level.

/// Largest number of thresholds a band table may hold.
pub const MAX_BANDS: usize = 16;

/// Errors from building a band table or policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodPolicyError {
    #[error("LOD band table must have at least one threshold")]
    Empty,
    #[error("LOD band table has {0} thresholds, at most {MAX_BANDS} are supported")]
    TooManyBands(usize),
    #[error("LOD threshold {index} must be positive and finite, got {value}")]
    NonPositive { index: usize, value: f64 },
    #[error("LOD threshold {index} is not greater than the previous one")]
    NotIncreasing { index: usize },
    #[error("hysteresis margin must be a non-negative distance, got {0}")]
    InvalidHysteresis(f64),
}

/// Strictly increasing distance thresholds.
///
/// `thresholds[i]` is the exclusive upper bound of LOD `i`, so LOD `i` covers
/// `[thresholds[i - 1], thresholds[i])` with an implicit lower bound of 0 for LOD 0.
/// Anything at or beyond the last threshold gets the coarsest LOD, `thresholds.len()`.
#[derive(Clone, Debug, PartialEq)]
pub struct LodBands {
    thresholds: Vec<f64>,
}

impl LodBands {
    pub fn new(thresholds: Vec<f64>) -> Result<Self, LodPolicyError> {
        if thresholds.is_empty() {
            return Err(LodPolicyError::Empty);
        }
        if thresholds.len() > MAX_BANDS {
            return Err(LodPolicyError::TooManyBands(thresholds.len()));
        }
        for (index, &value) in thresholds.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(LodPolicyError::NonPositive { index, value });
            }
            if index > 0 && value <= thresholds[index - 1] {
                return Err(LodPolicyError::NotIncreasing { index });
            }
        }
        Ok(Self { thresholds })
    }

    /// The coarsest LOD this table can produce.
    pub fn max_lod(&self) -> u8 {
        self.thresholds.len() as u8
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// LOD for a non-negative distance, using closed-open band membership.
    pub fn lod_for_distance(&self, distance: f64) -> u8 {
        debug_assert!(distance >= 0.0, "distance must be non-negative");
        self.thresholds
            .iter()
            .position(|&threshold| distance < threshold)
            .unwrap_or(self.thresholds.len()) as u8
    }

    /// `[min, max)` distance range covered by `lod`. The coarsest band is unbounded.
    pub fn band_range(&self, lod: u8) -> (f64, f64) {
        let lod = usize::from(lod.min(self.max_lod()));
        let min = if lod == 0 { 0.0 } else { self.thresholds[lod - 1] };
        let max = self.thresholds.get(lod).copied().unwrap_or(f64::INFINITY);
        (min, max)
    }
}
