use crate::error::VpError;
use crate::types::{ImagePoint, ImageSize};
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

/// Focal length guess as a fraction of the larger image side.
const GUESSED_FOCAL_RATIO: f64 = 0.8;
/// Below this `|z|` a projected direction is reported as a point at infinity.
const PROJECTION_EPS: f64 = 1e-5;

/// Pinhole camera matrix together with its inverse.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Intrinsics {
    kmtx: Matrix3<f64>,
    #[serde(skip)]
    kmtx_inv: Matrix3<f64>,
}

impl Intrinsics {
    /// Wrap a camera matrix. Fails if it is singular or not finite.
    pub fn new(kmtx: Matrix3<f64>) -> Result<Self, VpError> {
        if kmtx.iter().any(|v| !v.is_finite()) {
            return Err(VpError::SingularIntrinsics);
        }
        let kmtx_inv = kmtx.try_inverse().ok_or(VpError::SingularIntrinsics)?;
        if kmtx_inv.iter().any(|v| !v.is_finite()) {
            return Err(VpError::SingularIntrinsics);
        }
        Ok(Self { kmtx, kmtx_inv })
    }

    /// Square-pixel, zero-skew camera.
    pub fn from_focal(focal_px: f64, cx: f64, cy: f64) -> Result<Self, VpError> {
        Self::new(Matrix3::new(
            focal_px, 0.0, cx, //
            0.0, focal_px, cy, //
            0.0, 0.0, 1.0,
        ))
    }

    /// Crude guess for uncalibrated images: `f = 0.8·max(w, h)`, principal
    /// point at the image center.
    pub fn guess(size: ImageSize) -> Result<Self, VpError> {
        let w = size.width as f64;
        let h = size.height as f64;
        Self::from_focal(GUESSED_FOCAL_RATIO * w.max(h), w * 0.5, h * 0.5)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.kmtx
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.kmtx_inv
    }

    /// Map a pixel through `K⁻¹` and dehomogenize. `None` when the mapped
    /// point lands on the plane at infinity.
    pub fn normalize_point(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        dehomogenize(&(self.kmtx_inv * Vector3::new(p[0], p[1], 1.0)))
    }

    /// Inverse of [`Intrinsics::normalize_point`].
    pub fn denormalize_point(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        dehomogenize(&(self.kmtx * Vector3::new(p[0], p[1], 1.0)))
    }

    /// Project a camera-frame direction to the image (`K·d`).
    pub fn project_direction(&self, dir: &Vector3<f64>) -> ImagePoint {
        let h = self.kmtx * dir;
        if h[2].abs() > PROJECTION_EPS {
            ImagePoint::Finite([h[0] / h[2], h[1] / h[2]])
        } else {
            ImagePoint::Infinity
        }
    }
}

fn dehomogenize(h: &Vector3<f64>) -> Option<[f64; 2]> {
    if h[2].abs() <= f64::EPSILON || !h[2].is_finite() {
        return None;
    }
    Some([h[0] / h[2], h[1] / h[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_matrix_is_rejected() {
        let err = Intrinsics::new(Matrix3::zeros()).unwrap_err();
        assert_eq!(err, VpError::SingularIntrinsics);
        let mut k = Matrix3::identity();
        k[(0, 0)] = f64::NAN;
        assert!(Intrinsics::new(k).is_err());
    }

    #[test]
    fn guess_uses_larger_side() {
        let k = Intrinsics::guess(ImageSize {
            width: 640,
            height: 480,
        })
        .unwrap();
        let m = k.matrix();
        assert_eq!(m[(0, 0)], 512.0);
        assert_eq!(m[(1, 1)], 512.0);
        assert_eq!(m[(0, 2)], 320.0);
        assert_eq!(m[(1, 2)], 240.0);
    }

    #[test]
    fn normalize_then_denormalize_round_trips() {
        let k = Intrinsics::new(Matrix3::new(
            710.0, 0.4, 331.0, //
            0.0, 705.0, 247.5, //
            0.0, 0.0, 1.0,
        ))
        .unwrap();
        for p in [[0.0, 0.0], [639.0, 479.0], [12.25, 401.5]] {
            let n = k.normalize_point(p).unwrap();
            let back = k.denormalize_point(n).unwrap();
            assert!((back[0] - p[0]).abs() < 1e-9 && (back[1] - p[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn directions_parallel_to_image_plane_project_to_infinity() {
        let k = Intrinsics::from_focal(500.0, 320.0, 240.0).unwrap();
        assert_eq!(
            k.project_direction(&Vector3::new(1.0, 0.0, 0.0)),
            ImagePoint::Infinity
        );
        assert_eq!(
            k.project_direction(&Vector3::new(0.0, 0.0, 1.0)),
            ImagePoint::Finite([320.0, 240.0])
        );
    }
}
