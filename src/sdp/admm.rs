//! Dense ADMM for the two-variable VP relaxation.
//!
//! Both variables are stacked in scaled half-vectorized form (`svec`: upper
//! triangle, off-diagonals multiplied by √2) so the Euclidean inner product of
//! the stacked vector equals the trace inner product of the matrices. The
//! splitting alternates
//! - projection onto the affine set `{x | A x = b}` with a projector
//!   `P = I - Aᵀ(AAᵀ)⁺A` cached per constraint structure, and
//! - projection onto the product of two PSD cones (symmetric eigen
//!   decomposition, negative eigenvalues clamped to zero),
//!
//! with over-relaxation and residual balancing on the penalty `rho`.
//!
//! Termination: `Optimal` when both residuals meet the tolerance,
//! `OptimalInaccurate` when progress stalls inside a looser band, and
//! `MaxIterations` otherwise. The VP direction of a solution is refit
//! downstream by [`crate::recover::polish_vp`].

use super::problem::{Constraint, SdpProblem, Variable};
use super::solver::{ConvexSolver, SdpSolution, SolveStatus, SolverError};
use log::debug;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

const PINV_EPS: f64 = 1e-10;
const RHO_MIN: f64 = 1e-6;
const RHO_MAX: f64 = 1e6;
const RHO_UPDATE_EVERY: usize = 25;
/// `rho` is rescaled when the relative residuals differ by more than this.
const RESIDUAL_BALANCE: f64 = 5.0;
const RESIDUAL_FLOOR: f64 = 1e-12;
/// Iterations between stall checks.
const STALL_WINDOW: usize = 250;
/// A window that shrinks the worst residual ratio by less than 1% has stalled.
const STALL_RATIO: f64 = 0.99;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmmSettings {
    /// Initial penalty parameter.
    pub rho: f64,
    pub max_iterations: usize,
    pub eps_abs: f64,
    pub eps_rel: f64,
    /// A solve that stalls with both residuals within this multiple of the
    /// tolerance stops early as `OptimalInaccurate`. Hitting the iteration
    /// cap is always `MaxIterations`.
    pub inaccurate_factor: f64,
    pub adaptive_rho: bool,
    /// Over-relaxation factor in (0, 2).
    pub relaxation: f64,
}

impl Default for AdmmSettings {
    fn default() -> Self {
        Self {
            rho: 1.0,
            max_iterations: 5000,
            eps_abs: 1e-5,
            eps_rel: 1e-5,
            inaccurate_factor: 10.0,
            adaptive_rho: true,
            relaxation: 1.6,
        }
    }
}

impl AdmmSettings {
    /// Smaller step, larger budget, looser tolerance.
    pub fn conservative() -> Self {
        Self {
            rho: 0.1,
            max_iterations: 20_000,
            eps_abs: 1e-4,
            eps_rel: 1e-4,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
struct AffineProjector {
    dim: usize,
    constraints: Vec<Constraint>,
    proj: DMatrix<f64>,
    offset: DVector<f64>,
}

impl AffineProjector {
    fn matches(&self, problem: &SdpProblem) -> bool {
        self.dim == problem.dim() && self.constraints == problem.constraints()
    }

    fn apply(&self, v: &DVector<f64>) -> DVector<f64> {
        &self.proj * v + &self.offset
    }
}

/// Built-in dense SDP backend.
#[derive(Clone, Debug)]
pub struct AdmmSolver {
    name: String,
    settings: AdmmSettings,
    cache: Option<AffineProjector>,
}

impl Default for AdmmSolver {
    fn default() -> Self {
        Self::new(AdmmSettings::default())
    }
}

impl AdmmSolver {
    pub fn new(settings: AdmmSettings) -> Self {
        Self::named("admm", settings)
    }

    pub fn named(name: &str, settings: AdmmSettings) -> Self {
        Self {
            name: name.to_string(),
            settings,
            cache: None,
        }
    }

    pub fn settings(&self) -> &AdmmSettings {
        &self.settings
    }

    fn projector(&mut self, problem: &SdpProblem) -> Result<&AffineProjector, SolverError> {
        let stale = !self.cache.as_ref().is_some_and(|c| c.matches(problem));
        if stale {
            debug!(
                "ADMM: building affine projector for dim={} ({} constraints)",
                problem.dim(),
                problem.constraints().len()
            );
            let built = build_projector(problem).map_err(|message| SolverError::Numerical {
                solver: self.name.clone(),
                message,
            })?;
            self.cache = Some(built);
        }
        self.cache.as_ref().ok_or_else(|| SolverError::Numerical {
            solver: self.name.clone(),
            message: "affine projector unavailable".to_string(),
        })
    }
}

impl ConvexSolver for AdmmSolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn solve(&mut self, problem: &SdpProblem) -> Result<SdpSolution, SolverError> {
        let settings = self.settings.clone();
        let name = self.name.clone();
        let projector = self.projector(problem)?;

        let n = problem.dim();
        let tri = svec_len(n);
        let len = 2 * tri;

        let mut cost = DVector::<f64>::zeros(len);
        for var in Variable::ALL {
            cost.rows_mut(var.index() * tri, tri)
                .copy_from(&svec(problem.cost(var)));
        }
        let scale = cost.amax();
        if scale > 0.0 {
            cost /= scale;
        }

        let alpha = settings.relaxation;
        let mut rho = settings.rho;
        let mut z = DVector::<f64>::zeros(len);
        let mut u = DVector::<f64>::zeros(len);
        let sqrt_len = (len as f64).sqrt();
        let mut status = SolveStatus::MaxIterations;
        let mut iterations = 0;
        let (mut r, mut s) = (f64::INFINITY, f64::INFINITY);
        let mut checkpoint = f64::INFINITY;

        for it in 1..=settings.max_iterations {
            iterations = it;
            let x = projector.apply(&(&z - &u - &cost / rho));
            let x_hat = &x * alpha + &z * (1.0 - alpha);
            let z_prev = z;
            z = project_psd_pair(&(&x_hat + &u), n);
            u += &x_hat - &z;

            r = (&x - &z).norm();
            s = rho * (&z - &z_prev).norm();
            if !r.is_finite() || !s.is_finite() {
                status = SolveStatus::NumericalError;
                break;
            }
            let primal_scale = x.norm().max(z.norm());
            let dual_scale = rho * u.norm();
            let eps_pri = settings.eps_abs * sqrt_len + settings.eps_rel * primal_scale;
            let eps_dual = settings.eps_abs * sqrt_len + settings.eps_rel * dual_scale;
            if r <= eps_pri && s <= eps_dual {
                status = SolveStatus::Optimal;
                break;
            }

            if it % STALL_WINDOW == 0 {
                let progress = (r / eps_pri).max(s / eps_dual);
                if progress <= settings.inaccurate_factor && progress > STALL_RATIO * checkpoint {
                    status = SolveStatus::OptimalInaccurate;
                    break;
                }
                checkpoint = progress;
            }

            if settings.adaptive_rho && it % RHO_UPDATE_EVERY == 0 {
                let r_rel = r / primal_scale.max(RESIDUAL_FLOOR);
                let s_rel = s / dual_scale.max(RESIDUAL_FLOOR);
                let ratio = (r_rel / s_rel.max(RESIDUAL_FLOOR)).sqrt();
                if ratio > RESIDUAL_BALANCE || ratio < RESIDUAL_BALANCE.recip() {
                    let next = (rho * ratio).clamp(RHO_MIN, RHO_MAX);
                    u *= rho / next;
                    rho = next;
                }
            }
        }

        debug!(
            "ADMM[{}]: status={:?} iterations={} r={:.2e} s={:.2e} rho={:.3}",
            name, status, iterations, r, s, rho
        );

        let x = [
            smat(&z.rows(0, tri).into_owned(), n),
            smat(&z.rows(tri, tri).into_owned(), n),
        ];
        let objective = problem.objective(&x);
        Ok(SdpSolution {
            x,
            status,
            iterations,
            objective,
        })
    }
}

fn svec_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Row-major upper-triangle position of `(i, j)`; symmetric in its arguments.
fn svec_index(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    i * (2 * n - i + 1) / 2 + (j - i)
}

fn svec(m: &DMatrix<f64>) -> DVector<f64> {
    let n = m.nrows();
    let mut out = DVector::<f64>::zeros(svec_len(n));
    for i in 0..n {
        for j in i..n {
            let v = if i == j {
                m[(i, i)]
            } else {
                0.5 * (m[(i, j)] + m[(j, i)]) * SQRT_2
            };
            out[svec_index(n, i, j)] = v;
        }
    }
    out
}

fn smat(v: &DVector<f64>, n: usize) -> DMatrix<f64> {
    let mut m = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        m[(i, i)] = v[svec_index(n, i, i)];
        for j in (i + 1)..n {
            let e = v[svec_index(n, i, j)] / SQRT_2;
            m[(i, j)] = e;
            m[(j, i)] = e;
        }
    }
    m
}

fn project_psd(m: DMatrix<f64>) -> DMatrix<f64> {
    let mut eig = SymmetricEigen::new(m);
    eig.eigenvalues.apply(|l| *l = l.max(0.0));
    eig.recompose()
}

fn project_psd_pair(v: &DVector<f64>, n: usize) -> DVector<f64> {
    let tri = svec_len(n);
    let mut out = DVector::<f64>::zeros(2 * tri);
    for k in 0..2 {
        let block = smat(&v.rows(k * tri, tri).into_owned(), n);
        out.rows_mut(k * tri, tri)
            .copy_from(&svec(&project_psd(block)));
    }
    out
}

fn build_projector(problem: &SdpProblem) -> Result<AffineProjector, String> {
    let n = problem.dim();
    let tri = svec_len(n);
    let len = 2 * tri;
    let rows = problem.scalar_rows();

    let mut a = DMatrix::<f64>::zeros(rows.len(), len);
    let mut b = DVector::<f64>::zeros(rows.len());
    for (k, row) in rows.iter().enumerate() {
        for (entry, coeff) in &row.terms {
            let col = entry.var.index() * tri + svec_index(n, entry.row, entry.col);
            let scale = if entry.row == entry.col { 1.0 } else { SQRT_2.recip() };
            a[(k, col)] += coeff * scale;
        }
        b[k] = row.rhs;
    }

    let gram_pinv = (&a * a.transpose()).pseudo_inverse(PINV_EPS)?;
    let at_g = a.transpose() * gram_pinv;
    let proj = DMatrix::identity(len, len) - &at_g * &a;
    let offset = at_g * b;
    Ok(AffineProjector {
        dim: n,
        constraints: problem.constraints().to_vec(),
        proj,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::problem::build_vp_problem;
    use nalgebra::Vector3;

    #[test]
    fn svec_round_trip_preserves_inner_product() {
        let a = DMatrix::from_row_slice(3, 3, &[2.0, 1.0, 0.5, 1.0, 3.0, -1.0, 0.5, -1.0, 4.0]);
        let b = DMatrix::from_row_slice(3, 3, &[1.0, 0.2, 0.0, 0.2, 1.0, 0.3, 0.0, 0.3, 2.0]);
        assert_eq!(smat(&svec(&a), 3), a);
        let trace = (&a * &b).trace();
        assert!((svec(&a).dot(&svec(&b)) - trace).abs() < 1e-12);
    }

    #[test]
    fn svec_indices_cover_upper_triangle() {
        let n = 5;
        let mut seen = vec![false; svec_len(n)];
        for i in 0..n {
            for j in i..n {
                let k = svec_index(n, i, j);
                assert!(!seen[k]);
                seen[k] = true;
                assert_eq!(svec_index(n, j, i), k);
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn psd_projection_clamps_negative_eigenvalues() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, -1.0, 0.5]));
        let p = project_psd(m);
        assert!((p[(0, 0)] - 2.0).abs() < 1e-12);
        assert!(p[(1, 1)].abs() < 1e-12);
        assert!((p[(2, 2)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tiny_relaxation_recovers_shared_direction() {
        // three planes whose normals are all orthogonal to the z axis
        let normals = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0).normalize(),
        ];
        let problem = build_vp_problem(&normals, &[1.0; 3], 0.1);
        let mut solver = AdmmSolver::default();
        let solution = solver.solve(&problem).unwrap();
        assert!(solution.status.is_acceptable(), "{:?}", solution.status);

        let vp = solution.vp_block(Variable::Inlier);
        assert!((vp.trace() - 1.0).abs() < 1e-3);
        assert!((vp[(2, 2)] - 1.0).abs() < 1e-2, "vp block {vp}");
        assert!(solution.objective.abs() < 1e-3);
        let shared = solution.vp_block(Variable::Outlier);
        assert!((vp - shared).norm() < 1e-3);
    }

    #[test]
    fn iteration_cap_is_never_reported_as_inaccurate() {
        let normals = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0).normalize(),
        ];
        let problem = build_vp_problem(&normals, &[1.0; 3], 0.1);
        let mut solver = AdmmSolver::new(AdmmSettings {
            max_iterations: 20,
            inaccurate_factor: 1e12,
            ..AdmmSettings::default()
        });
        let solution = solver.solve(&problem).unwrap();
        assert_eq!(solution.status, SolveStatus::MaxIterations);
        assert_eq!(solution.iterations, 20);
        assert!(!solution.status.is_acceptable());
    }

    #[test]
    fn projector_is_cached_per_structure() {
        let normals = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)];
        let mut solver = AdmmSolver::new(AdmmSettings {
            max_iterations: 10,
            ..AdmmSettings::default()
        });
        solver.solve(&build_vp_problem(&normals, &[1.0; 2], 0.1)).unwrap();
        let first = solver.cache.as_ref().map(|c| c.proj.clone());
        solver.solve(&build_vp_problem(&normals, &[0.5; 2], 0.2)).unwrap();
        assert_eq!(first, solver.cache.as_ref().map(|c| c.proj.clone()));
        assert!(solver.cache.as_ref().is_some_and(|c| c.dim == 9));
    }
}
