//! Geometry normalizer: pixel segments → calibrated plane normals.
//!
//! Pipeline
//! - Normalization: both endpoints are homogenized, mapped through `K⁻¹` and
//!   dehomogenized ([`NormalizedLine`]).
//! - Back-projection: the plane through the camera center and the segment has
//!   normal `p0 × p1`, renormalized to unit length. Collapsed segments fail
//!   with [`VpError::DegenerateLine`].
//! - Uncertainty: first-order propagation of endpoint noise, rescaled into
//!   `[0.1, 0.3]` (see [`uncertainty`]).
//!
//! Every output array is index-aligned with the input segments. Nothing here
//! is random; the same input yields bit-identical output.

mod intrinsics;
mod normals;
pub mod uncertainty;

pub use intrinsics::Intrinsics;
pub use normals::{backprojection_normals, normalize_lines, NormalizedLine};
pub use uncertainty::{line_uncertainties, UNCERTAINTY_MAX, UNCERTAINTY_MIN};

use crate::error::VpError;
use crate::types::Line2D;
use log::debug;
use nalgebra::Vector3;

/// Calibrated per-line data consumed by the VP search.
#[derive(Clone, Debug)]
pub struct LineGeometry {
    pub normalized: Vec<NormalizedLine>,
    pub normals: Vec<Vector3<f64>>,
    pub uncertainty: Vec<f64>,
}

impl LineGeometry {
    /// Run normalization, back-projection and (optionally) uncertainty
    /// weighting. With `use_uncertainty == false` every weight is 1.0.
    pub fn compute(
        lines: &[Line2D],
        k: &Intrinsics,
        use_uncertainty: bool,
    ) -> Result<Self, VpError> {
        let normalized = normalize_lines(lines, k)?;
        let normals = backprojection_normals(&normalized)?;
        let uncertainty = if use_uncertainty {
            line_uncertainties(&normalized, k)?
        } else {
            vec![1.0; lines.len()]
        };
        debug!(
            "Geometry: normalized {} lines (uncertainty weighting {})",
            lines.len(),
            if use_uncertainty { "on" } else { "off" }
        );
        Ok(Self {
            normalized,
            normals,
            uncertainty,
        })
    }

    pub fn len(&self) -> usize {
        self.normals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }
}
