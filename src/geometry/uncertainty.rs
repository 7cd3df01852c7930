//! First-order uncertainty of back-projected plane normals.
//!
//! Each endpoint carries isotropic pixel noise `Σ₂ = 2·I`. The noise is pushed
//! through `K⁻¹`, then through the cross product that forms the plane normal,
//! and finally through the Jacobian of the normalization `l / |l|`, which
//! projects it onto the tangent space orthogonal to the normal. The weight of
//! a line is the inverse trace of the resulting 3×3 covariance. Weights are
//! then affinely rescaled over the whole set into
//! [`UNCERTAINTY_MIN`, `UNCERTAINTY_MAX`] so that long, well-conditioned
//! segments count more without discarding short ones.

use super::intrinsics::Intrinsics;
use super::normals::{NormalizedLine, MIN_NORMAL_NORM};
use crate::error::VpError;
use nalgebra::{Matrix3, Vector3};

pub const UNCERTAINTY_MIN: f64 = 0.1;
pub const UNCERTAINTY_MAX: f64 = 0.3;
const PIXEL_VARIANCE: f64 = 2.0;
const RANGE_FLOOR: f64 = 1e-8;

/// Per-line reliability weights in [`UNCERTAINTY_MIN`, `UNCERTAINTY_MAX`].
pub fn line_uncertainties(lines: &[NormalizedLine], k: &Intrinsics) -> Result<Vec<f64>, VpError> {
    let sigma_h = Matrix3::new(
        PIXEL_VARIANCE, 0.0, 0.0, //
        0.0, PIXEL_VARIANCE, 0.0, //
        0.0, 0.0, 0.0,
    );
    let k_inv = k.inverse();
    let sigma_point = k_inv * sigma_h * k_inv.transpose();

    let mut weights = lines
        .iter()
        .enumerate()
        .map(|(index, line)| raw_weight(line, &sigma_point).ok_or(VpError::DegenerateLine {
            index,
            norm: line.raw_normal().norm(),
        }))
        .collect::<Result<Vec<f64>, VpError>>()?;
    rescale(&mut weights);
    Ok(weights)
}

fn raw_weight(line: &NormalizedLine, sigma_point: &Matrix3<f64>) -> Option<f64> {
    let (p0, p1) = line.homogeneous();
    let l = p0.cross(&p1);
    let norm = l.norm();
    if norm < MIN_NORMAL_NORM || !norm.is_finite() {
        return None;
    }
    let l_unit = l / norm;

    // d(p0 × p1) = -[p1]ₓ dp0 + [p0]ₓ dp1; the sign drops out of the covariance.
    let s0 = p1.cross_matrix();
    let s1 = p0.cross_matrix();
    let sigma_l = s0 * sigma_point * s0.transpose() + s1 * sigma_point * s1.transpose();

    let jac = tangent_projector(&l_unit) / norm;
    let sigma_n = jac * sigma_l * jac.transpose();
    Some(1.0 / sigma_n.trace().max(f64::MIN_POSITIVE))
}

fn rescale(weights: &mut [f64]) {
    let (min, max) = weights
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &w| {
            (lo.min(w), hi.max(w))
        });
    let range = (max - min).max(RANGE_FLOOR);
    for w in weights.iter_mut() {
        *w = (UNCERTAINTY_MIN + (*w - min) * (UNCERTAINTY_MAX - UNCERTAINTY_MIN) / range)
            .clamp(UNCERTAINTY_MIN, UNCERTAINTY_MAX);
    }
}

/// Projector onto the plane orthogonal to a unit normal.
fn tangent_projector(normal: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::identity() - normal * normal.transpose()
}
