//! Validation of solved relaxations and recovery of VP directions.
//!
//! - Rank check: the VP block of both variables must be dominated by one
//!   eigenvalue (`λ₁ / λ₂ > threshold`).
//! - Recovery: the VP is the leading singular vector of the inlier VP block.
//!   It is returned unit length with the leading singular value as `scale`.
//!   The block has unit trace, so a scale well below one means the solution
//!   spreads over several directions and is rejected by the search.
//! - Polishing: the direction is refit to the sampled lines the relaxation
//!   marked as inliers (smallest eigenvector of their weighted scatter).
//! - Orthogonality: the second VP must be within `90° - acos(c)` of
//!   perpendicular to the first; the third is snapped to `v1 × v2`.
//! - Triad: the stacked VPs are projected onto the nearest rotation.

use crate::angle::{angle_between_deg, deviation_from_right_angle_deg, orthogonality_tolerance_deg};
use crate::sdp::problem::BLOCK;
use crate::sdp::{Block, SdpSolution, Variable};
use log::debug;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::Serialize;

pub const DEFAULT_EIGEN_RATIO_THRESH: f64 = 1.0;
pub const DEFAULT_TRIAD_TOLERANCE: f64 = 1e-3;
/// Minimum leading singular value of the unit-trace VP block.
pub const DEFAULT_MIN_VP_SCALE: f64 = 0.9;
/// Relaxed indicator `z_i` above which a sampled line counts as an inlier.
pub const INLIER_INDICATOR_THRESH: f64 = 0.5;
/// Largest angle a refit may move the recovered direction.
pub const POLISH_MAX_SHIFT_DEG: f64 = 10.0;
/// Middle eigenvalue of the inlier scatter must exceed this share of the
/// largest one, otherwise the inlier normals are parallel.
const NULL_SPACE_GAP: f64 = 1e-6;
/// Third-VP dot products above this are replaced by the cross product.
pub const TRIAD_SNAP_THRESH: f64 = 1e-3;
const SECOND_EIGEN_FLOOR: f64 = 1e-12;
const MIN_SINGULAR_VALUE: f64 = 1e-12;

/// Ratio of the two largest eigenvalues of a symmetric 3×3 block.
///
/// Returns `+∞` when the second eigenvalue is numerically zero (an exactly
/// rank-one block).
pub fn eigen_ratio(block: &Matrix3<f64>) -> f64 {
    let sym = (block + block.transpose()) * 0.5;
    let eig = SymmetricEigen::new(sym);
    let mut vals = [eig.eigenvalues[0], eig.eigenvalues[1], eig.eigenvalues[2]];
    vals.sort_by(|a, b| b.total_cmp(a));
    if !vals[0].is_finite() {
        return 0.0;
    }
    if vals[1] <= SECOND_EIGEN_FLOOR {
        return f64::INFINITY;
    }
    vals[0] / vals[1]
}

/// Outcome of the rank-one test on both VP blocks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankCheck {
    pub inlier_ratio: f64,
    pub outlier_ratio: f64,
    pub passed: bool,
}

pub fn check_rank(solution: &SdpSolution, threshold: f64) -> RankCheck {
    let inlier_ratio = eigen_ratio(&solution.vp_block(Variable::Inlier));
    let outlier_ratio = eigen_ratio(&solution.vp_block(Variable::Outlier));
    RankCheck {
        inlier_ratio,
        outlier_ratio,
        passed: inlier_ratio > threshold && outlier_ratio > threshold,
    }
}

/// Unit VP direction with the leading singular value of its block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecoveredVp {
    pub direction: Vector3<f64>,
    pub scale: f64,
}

/// Leading singular vector of a VP block. `None` for a numerically zero or
/// non-finite block.
pub fn recover_vp(block: &Matrix3<f64>) -> Option<RecoveredVp> {
    let svd = block.svd(true, false);
    let u = svd.u?;
    let idx = svd.singular_values.imax();
    let scale = svd.singular_values[idx];
    if !scale.is_finite() || scale <= MIN_SINGULAR_VALUE {
        return None;
    }
    let column = u.column(idx).into_owned();
    let norm = column.norm();
    if !norm.is_finite() || norm <= MIN_SINGULAR_VALUE {
        return None;
    }
    Some(RecoveredVp {
        direction: column / norm,
        scale,
    })
}

/// Relaxed inlier indicators `z_i = trace(X1[line i, line i])` of a solution.
pub fn inlier_indicators(solution: &SdpSolution, num_lines: usize) -> Vec<f64> {
    let x1 = solution.variable(Variable::Inlier);
    (0..num_lines)
        .map(|i| {
            let off = Block::Line(i).offset();
            if off + BLOCK > x1.nrows() {
                return 0.0;
            }
            x1.fixed_view::<BLOCK, BLOCK>(off, off).trace()
        })
        .collect()
}

/// Refit `initial` to the sampled lines the relaxation marked as inliers.
///
/// `normals` and `weights` are the sampled lines in problem order. The refit
/// direction minimizes `Σ w (n·v)²` over the inliers and is signed like
/// `initial`. `None` with fewer than two inliers, parallel inlier normals,
/// or a refit more than [`POLISH_MAX_SHIFT_DEG`] away from `initial`.
pub fn polish_vp(
    solution: &SdpSolution,
    normals: &[Vector3<f64>],
    weights: &[f64],
    initial: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let indicators = inlier_indicators(solution, normals.len());
    let mut scatter = Matrix3::<f64>::zeros();
    let mut count = 0;
    for ((n, &w), &z) in normals.iter().zip(weights).zip(&indicators) {
        if z > INLIER_INDICATOR_THRESH {
            scatter += n * n.transpose() * w;
            count += 1;
        }
    }
    if count < 2 {
        return None;
    }

    let eig = SymmetricEigen::new(scatter);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let (mid, high) = (eig.eigenvalues[order[1]], eig.eigenvalues[order[2]]);
    if !high.is_finite() || high <= 0.0 || mid <= NULL_SPACE_GAP * high {
        return None;
    }
    let column = eig.eigenvectors.column(order[0]).into_owned();
    let norm = column.norm();
    if !norm.is_finite() || norm <= MIN_SINGULAR_VALUE {
        return None;
    }
    let mut v = column / norm;
    if v.dot(initial) < 0.0 {
        v = -v;
    }
    let shift = angle_between_deg(&v, initial);
    if shift > POLISH_MAX_SHIFT_DEG {
        debug!("Recover: refit moved VP by {shift:.2} deg over {count} inliers, rejected");
        return None;
    }
    Some(v)
}

/// True when `candidate` is close enough to perpendicular to `first`.
pub fn is_orthogonal_to(candidate: &Vector3<f64>, first: &Vector3<f64>, cos_thresh: f64) -> bool {
    deviation_from_right_angle_deg(candidate, first) <= orthogonality_tolerance_deg(cos_thresh)
}

/// Replace the third VP by `normalize(v1 × v2)` when it is not already
/// orthogonal to both. Returns the (possibly replaced) VP and whether it was
/// replaced.
pub fn complete_triad(
    v1: &Vector3<f64>,
    v2: &Vector3<f64>,
    v3: &Vector3<f64>,
) -> (Vector3<f64>, bool) {
    if v3.dot(v1).abs() > TRIAD_SNAP_THRESH || v3.dot(v2).abs() > TRIAD_SNAP_THRESH {
        let cross = v1.cross(v2);
        let norm = cross.norm();
        if norm > MIN_SINGULAR_VALUE {
            debug!(
                "Recover: third VP snapped to v1 x v2 (dots {:.2e}, {:.2e})",
                v3.dot(v1),
                v3.dot(v2)
            );
            return (cross / norm, true);
        }
    }
    (*v3, false)
}

/// Nearest right-handed rotation to the stacked VPs (one VP per row).
///
/// A negative determinant is fixed by negating the first row, then the matrix
/// is projected with `U·Vᵀ`. Returns `None` when the result is not orthonormal
/// within `tolerance` (Frobenius norm of `R·Rᵀ - I`).
pub fn enforce_rotation(vps: &[Vector3<f64>; 3], tolerance: f64) -> Option<Matrix3<f64>> {
    let mut stacked = Matrix3::from_rows(&[
        vps[0].transpose(),
        vps[1].transpose(),
        vps[2].transpose(),
    ]);
    if stacked.determinant() < 0.0 {
        let mut r0 = stacked.row_mut(0);
        r0.neg_mut();
    }
    let svd = stacked.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let rot = u * v_t;
    let deviation = (rot * rot.transpose() - Matrix3::identity()).norm();
    if !deviation.is_finite() || deviation >= tolerance || rot.determinant() <= 0.0 {
        debug!(
            "Recover: triad rejected (orthonormality deviation {:.3e}, det {:.3})",
            deviation,
            rot.determinant()
        );
        return None;
    }
    Some(rot)
}
