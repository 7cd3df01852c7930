//! Peak-interval pruning after the first VP is accepted.
//!
//! Fixing VP1 = `d` leaves a one-parameter family for the other two
//! orthogonal directions: a pair `{n1', n2' = d × n1'}` rotated about `d`.
//! The rotation phase is scanned in one-degree steps over [0°, 90°) (the
//! pair repeats every 90°). At each phase the lines whose plane normal is
//! within half a degree of perpendicular to `n1'` or `n2'` are counted; the
//! best phase's supporters become the candidate pool for VP2.

use crate::angle::deviation_from_right_angle_deg;
use log::debug;
use nalgebra::{Rotation3, Unit, Vector3};

pub const PEAK_PHASE_STEPS: usize = 90;
pub const PEAK_SUPPORT_TOL_DEG: f64 = 0.5;
const MIN_NORMAL_NORM: f64 = 1e-8;

/// Winning rotation phase and its supporting line indices (ascending).
#[derive(Clone, Debug, PartialEq)]
pub struct PeakInterval {
    pub angle_deg: f64,
    pub support: Vec<usize>,
}

/// Orthonormal pair `(n1, n2 = d × n1)` spanning the plane perpendicular to
/// unit `d`. `n1` comes from the coordinate axis along which `d` has the
/// smallest component.
pub fn orthogonal_basis(d: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let abs = d.abs();
    let axis = if abs[0] <= abs[1] && abs[0] <= abs[2] {
        0
    } else if abs[1] <= abs[2] {
        1
    } else {
        2
    };
    let mut helper = Vector3::<f64>::zeros();
    helper[axis] = 1.0;
    let n1 = (helper - d * helper.dot(d)).normalize();
    let n2 = d.cross(&n1);
    (n1, n2)
}

/// Scan rotation phases about `d` and return the best-supported one.
///
/// Ties go to the smallest angle. Normals shorter than 1e-8 never count.
pub fn find_peak_interval(d: &Vector3<f64>, normals: &[Vector3<f64>]) -> PeakInterval {
    let axis = Unit::new_normalize(*d);
    let (n1, _) = orthogonal_basis(&axis);

    let mut best = PeakInterval {
        angle_deg: 0.0,
        support: Vec::new(),
    };
    let mut best_count: Option<usize> = None;
    for step in 0..PEAK_PHASE_STEPS {
        let angle_deg = step as f64;
        let rot = Rotation3::from_axis_angle(&axis, angle_deg.to_radians());
        let n1_rot = (rot * n1).normalize();
        let n2_rot = axis.cross(&n1_rot).normalize();
        let support: Vec<usize> = normals
            .iter()
            .enumerate()
            .filter(|(_, n)| n.norm() > MIN_NORMAL_NORM)
            .filter(|(_, n)| {
                deviation_from_right_angle_deg(n, &n1_rot) <= PEAK_SUPPORT_TOL_DEG
                    || deviation_from_right_angle_deg(n, &n2_rot) <= PEAK_SUPPORT_TOL_DEG
            })
            .map(|(i, _)| i)
            .collect();
        if best_count.map_or(true, |c| support.len() > c) {
            best_count = Some(support.len());
            best = PeakInterval { angle_deg, support };
        }
    }
    debug!(
        "Peaks: phase {:.0} deg supported by {} / {} lines",
        best.angle_deg,
        best.support.len(),
        normals.len()
    );
    best
}
