use super::intrinsics::Intrinsics;
use crate::error::VpError;
use crate::types::Line2D;
use nalgebra::Vector3;
use serde::Serialize;

/// Cross products shorter than this are treated as collapsed segments.
pub(crate) const MIN_NORMAL_NORM: f64 = 1e-12;

/// Segment endpoints after `K⁻¹` and dehomogenization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedLine {
    pub p0: [f64; 2],
    pub p1: [f64; 2],
}

impl NormalizedLine {
    pub fn homogeneous(&self) -> (Vector3<f64>, Vector3<f64>) {
        (
            Vector3::new(self.p0[0], self.p0[1], 1.0),
            Vector3::new(self.p1[0], self.p1[1], 1.0),
        )
    }

    /// Unnormalized normal of the plane through the camera center and the
    /// segment.
    pub fn raw_normal(&self) -> Vector3<f64> {
        let (a, b) = self.homogeneous();
        a.cross(&b)
    }
}

/// Map every segment through `K⁻¹`.
pub fn normalize_lines(lines: &[Line2D], k: &Intrinsics) -> Result<Vec<NormalizedLine>, VpError> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let p0 = k.normalize_point(line.p0);
            let p1 = k.normalize_point(line.p1);
            match (p0, p1) {
                (Some(p0), Some(p1)) => Ok(NormalizedLine { p0, p1 }),
                _ => Err(VpError::DegenerateLine { index, norm: 0.0 }),
            }
        })
        .collect()
}

/// Unit back-projection plane normals, one per line, in input order.
pub fn backprojection_normals(lines: &[NormalizedLine]) -> Result<Vec<Vector3<f64>>, VpError> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let n = line.raw_normal();
            let norm = n.norm();
            if norm < MIN_NORMAL_NORM || !norm.is_finite() {
                return Err(VpError::DegenerateLine { index, norm });
            }
            Ok(n / norm)
        })
        .collect()
}
