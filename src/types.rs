use serde::{Deserialize, Serialize};

/// Pixel-space line segment as produced by the upstream detector.
///
/// Serialized as the flat array `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Line2D {
    pub p0: [f64; 2],
    pub p1: [f64; 2],
}

impl Line2D {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            p0: [x1, y1],
            p1: [x2, y2],
        }
    }

    pub fn dx(&self) -> f64 {
        self.p1[0] - self.p0[0]
    }

    pub fn dy(&self) -> f64 {
        self.p1[1] - self.p0[1]
    }

    pub fn length(&self) -> f64 {
        self.dx().hypot(self.dy())
    }
}

impl From<[f64; 4]> for Line2D {
    fn from(v: [f64; 4]) -> Self {
        Line2D::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Line2D> for [f64; 4] {
    fn from(l: Line2D) -> Self {
        [l.p0[0], l.p0[1], l.p1[0], l.p1[1]]
    }
}

/// Image size in pixels, used to guess intrinsics when none are supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Pixel-space projection of a vanishing direction.
///
/// Directions parallel to the image plane have no finite projection and are
/// reported as `Infinity` (serialized as the string `"infinity"`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePoint {
    Finite([f64; 2]),
    Infinity,
}

impl ImagePoint {
    pub fn is_finite(&self) -> bool {
        matches!(self, ImagePoint::Finite(_))
    }
}
