//! Angle utilities shared by the histogram seeding and the VP validation.

use nalgebra::Vector3;
use std::f64::consts::FRAC_PI_2;

/// Orientation of a segment with displacement `(dx, dy)`, shifted into (0, π].
///
/// Uses `atan(dy/dx)` so the result does not depend on endpoint order.
/// Vertical segments (`dx ≈ 0`) map to π/2 before the shift, so they end at
/// exactly π.
#[inline]
pub fn segment_orientation(dx: f64, dy: f64) -> f64 {
    let direction = if dx.abs() <= f64::EPSILON {
        FRAC_PI_2
    } else {
        (dy / dx).atan()
    };
    direction + FRAC_PI_2
}

/// Unsigned angle between two 3D directions, in degrees within [0, 180].
#[inline]
pub fn angle_between_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = (a.norm() * b.norm()).max(1e-300);
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// How far (degrees) two directions are from being exactly perpendicular.
#[inline]
pub fn deviation_from_right_angle_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (90.0 - angle_between_deg(a, b)).abs()
}

/// Orthogonality slack implied by the inlier cosine threshold `c`:
/// `90° - acos(c)`.
#[inline]
pub fn orthogonality_tolerance_deg(cos_thresh: f64) -> f64 {
    90.0 - cos_thresh.clamp(-1.0, 1.0).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn orientation_ignores_endpoint_order() {
        let a = segment_orientation(3.0, 1.0);
        let b = segment_orientation(-3.0, -1.0);
        assert!(approx_eq(a, b));
        assert!((0.0..=PI).contains(&a));
    }

    #[test]
    fn vertical_and_horizontal_orientation() {
        assert!(approx_eq(segment_orientation(0.0, 5.0), PI));
        assert!(approx_eq(segment_orientation(0.0, -5.0), PI));
        assert!(approx_eq(segment_orientation(4.0, 0.0), FRAC_PI_2));
    }

    #[test]
    fn right_angle_deviation() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 2.0, 0.0);
        assert!(approx_eq(deviation_from_right_angle_deg(&x, &y), 0.0));
        assert!(approx_eq(deviation_from_right_angle_deg(&x, &x), 90.0));
        let tilted = Vector3::new(1.0f64.to_radians().sin(), 1.0f64.to_radians().cos(), 0.0);
        assert!((deviation_from_right_angle_deg(&x, &tilted) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tolerance_from_cosine() {
        let tol = orthogonality_tolerance_deg(0.03);
        assert!((tol - 1.719).abs() < 1e-3, "tol={tol}");
        assert!(approx_eq(orthogonality_tolerance_deg(0.0), 0.0));
    }
}
