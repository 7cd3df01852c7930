use crate::error::VpError;
use crate::histogram::DEFAULT_HISTOGRAM_BINS;
use crate::recover::{DEFAULT_EIGEN_RATIO_THRESH, DEFAULT_MIN_VP_SCALE, DEFAULT_TRIAD_TOLERANCE};
use crate::sdp::SolverParams;
use serde::Serialize;

/// Number of mutually orthogonal VPs the search looks for.
pub const VANISHING_POINT_COUNT: usize = 3;

/// Tunables of the VP search.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Cosine threshold `c`: a line is an inlier when `|n·v| < c`. Also bounds
    /// the orthogonality slack `90° - acos(c)`.
    pub inlier_cos_thresh: f64,
    /// Lines per SDP sample.
    pub sample_size: usize,
    /// Histogram seeding for VP1 plus peak-interval pruning for VP2.
    pub fast_path: bool,
    /// Minimum `λ₁/λ₂` of both VP blocks.
    pub eigen_ratio_thresh: f64,
    /// Minimum leading singular value of the unit-trace VP block.
    pub min_vp_scale: f64,
    pub histogram_bins: usize,
    /// Outer-iteration budget.
    pub max_iterations: usize,
    /// Frobenius tolerance on `R·Rᵀ - I` for the final triad.
    pub triad_tolerance: f64,
    /// Fixed RNG seed; `None` seeds from the thread RNG.
    pub seed: Option<u64>,
    pub solver: SolverParams,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            inlier_cos_thresh: 0.03,
            sample_size: 4,
            fast_path: true,
            eigen_ratio_thresh: DEFAULT_EIGEN_RATIO_THRESH,
            min_vp_scale: DEFAULT_MIN_VP_SCALE,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            max_iterations: 50,
            triad_tolerance: DEFAULT_TRIAD_TOLERANCE,
            seed: None,
            solver: SolverParams::default(),
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<(), VpError> {
        let c = self.inlier_cos_thresh;
        if !(c > 0.0 && c < 1.0) {
            return Err(VpError::InvalidParameters(format!(
                "inlier_cos_thresh must lie in (0, 1), got {c}"
            )));
        }
        let scale = self.min_vp_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(VpError::InvalidParameters(format!(
                "min_vp_scale must lie in (0, 1], got {scale}"
            )));
        }
        if self.sample_size == 0 {
            return Err(VpError::InvalidParameters(
                "sample_size must be positive".to_string(),
            ));
        }
        if self.histogram_bins == 0 {
            return Err(VpError::InvalidParameters(
                "histogram_bins must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(VpError::InvalidParameters(
                "max_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
