use nalgebra::{Matrix3, Vector3};
use ortho_vp::{Intrinsics, Line2D};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;
pub const FOCAL_PX: f64 = 800.0;

/// Noise-free Manhattan scene: three orthogonal 3D directions and the
/// projected segments of each, with a ground-truth family label per line.
pub struct ManhattanScene {
    pub intrinsics: Intrinsics,
    pub directions: [Vector3<f64>; 3],
    pub lines: Vec<Line2D>,
    pub labels: Vec<usize>,
}

impl ManhattanScene {
    /// Indices of the lines generated from family `k`, ascending.
    pub fn family(&self, k: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == k)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Camera looking along +z, yawed by `yaw_deg` about the vertical axis.
///
/// Family 0 is exactly vertical in the image, so it fills a single
/// orientation bin. Lines that would also pass within `|n·d| <= 0.1` of
/// another family's direction are skipped so the ground-truth assignment is
/// unambiguous.
pub fn manhattan_scene(seed: u64, counts: [usize; 3], yaw_deg: f64) -> ManhattanScene {
    let intrinsics = Intrinsics::from_focal(FOCAL_PX, WIDTH as f64 * 0.5, HEIGHT as f64 * 0.5)
        .expect("valid intrinsics");
    let yaw = yaw_deg.to_radians();
    let directions = [
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(yaw.cos(), 0.0, -yaw.sin()),
        Vector3::new(yaw.sin(), 0.0, yaw.cos()),
    ];

    let mut rng = StdRng::seed_from_u64(seed);
    let mut tagged: Vec<(Line2D, usize)> = Vec::new();
    for (k, &count) in counts.iter().enumerate() {
        let mut made = 0;
        let mut attempts = 0;
        while made < count {
            attempts += 1;
            assert!(attempts < 100_000, "could not place family {k} lines");
            let Some(line) = random_segment(&mut rng, intrinsics.matrix(), &directions[k]) else {
                continue;
            };
            let n = plane_normal(&intrinsics, &line);
            let ambiguous = (0..3)
                .filter(|&j| j != k)
                .any(|j| n.dot(&directions[j]).abs() <= 0.1);
            if ambiguous {
                continue;
            }
            tagged.push((line, k));
            made += 1;
        }
    }
    tagged.shuffle(&mut rng);

    ManhattanScene {
        intrinsics,
        directions,
        lines: tagged.iter().map(|(l, _)| *l).collect(),
        labels: tagged.iter().map(|(_, k)| *k).collect(),
    }
}

/// Segments with random directions and positions inside the image.
pub fn random_lines(seed: u64, count: usize) -> Vec<Line2D> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let x = rng.random_range(40.0..600.0);
            let y = rng.random_range(40.0..440.0);
            let theta: f64 = rng.random_range(0.0..std::f64::consts::PI);
            let half = rng.random_range(25.0..60.0);
            Line2D::new(
                x - half * theta.cos(),
                y - half * theta.sin(),
                x + half * theta.cos(),
                y + half * theta.sin(),
            )
        })
        .collect()
}

fn random_segment(rng: &mut StdRng, k: &Matrix3<f64>, dir: &Vector3<f64>) -> Option<Line2D> {
    let mid = Vector3::<f64>::new(
        rng.random_range(-4.0..4.0),
        rng.random_range(-3.0..3.0),
        rng.random_range(6.0..14.0),
    );
    let half = 0.5 * rng.random_range(1.5..3.0);
    let p0 = project(k, &(mid - dir * half))?;
    let p1 = project(k, &(mid + dir * half))?;
    let line = Line2D::new(p0[0], p0[1], p1[0], p1[1]);
    (line.length() >= 40.0).then_some(line)
}

fn project(k: &Matrix3<f64>, p: &Vector3<f64>) -> Option<[f64; 2]> {
    if p.z < 0.5 {
        return None;
    }
    let h = k * p;
    let (u, v) = (h.x / h.z, h.y / h.z);
    let inside = u >= 0.0 && v >= 0.0 && u < WIDTH as f64 && v < HEIGHT as f64;
    inside.then_some([u, v])
}

fn plane_normal(k: &Intrinsics, line: &Line2D) -> Vector3<f64> {
    let a = k.inverse() * Vector3::new(line.p0[0], line.p0[1], 1.0);
    let b = k.inverse() * Vector3::new(line.p1[0], line.p1[1], 1.0);
    a.cross(&b).normalize()
}
