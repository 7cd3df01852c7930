use super::admm::{AdmmSettings, AdmmSolver};
use super::problem::{SdpProblem, Variable, BLOCK};
use log::{debug, warn};
use nalgebra::{DMatrix, Matrix3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Termination status reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    /// Converged to a looser tolerance; still usable.
    OptimalInaccurate,
    MaxIterations,
    NumericalError,
}

impl SolveStatus {
    pub fn is_acceptable(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::OptimalInaccurate)
    }
}

/// Concrete values for both lifted variables.
#[derive(Clone, Debug)]
pub struct SdpSolution {
    pub x: [DMatrix<f64>; 2],
    pub status: SolveStatus,
    pub iterations: usize,
    pub objective: f64,
}

impl SdpSolution {
    pub fn variable(&self, var: Variable) -> &DMatrix<f64> {
        &self.x[var.index()]
    }

    /// Leading 3×3 block of a variable (the lifted `v vᵀ`).
    pub fn vp_block(&self, var: Variable) -> Matrix3<f64> {
        self.variable(var)
            .fixed_view::<BLOCK, BLOCK>(0, 0)
            .into_owned()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("{solver} stopped with status {status:?}")]
    Unsolved { solver: String, status: SolveStatus },
    #[error("{solver}: {message}")]
    Numerical { solver: String, message: String },
    #[error("all {attempts} solver backends failed")]
    Exhausted { attempts: usize },
}

/// Black-box SDP backend.
///
/// `solve` takes `&mut self` so that implementations can cache work that
/// depends only on the constraint structure.
pub trait ConvexSolver {
    fn name(&self) -> &str;
    fn solve(&mut self, problem: &SdpProblem) -> Result<SdpSolution, SolverError>;
}

impl<T: ConvexSolver + ?Sized> ConvexSolver for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&mut self, problem: &SdpProblem) -> Result<SdpSolution, SolverError> {
        (**self).solve(problem)
    }
}

/// Backend settings for the default chain.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverParams {
    pub primary: AdmmSettings,
    /// Slower, more conservative retry; `None` disables it.
    pub fallback: Option<AdmmSettings>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            primary: AdmmSettings::default(),
            fallback: Some(AdmmSettings::conservative()),
        }
    }
}

/// Ordered list of backends. The first acceptable solution wins.
pub struct SolverChain {
    backends: Vec<Box<dyn ConvexSolver + Send>>,
}

impl SolverChain {
    pub fn new(backends: Vec<Box<dyn ConvexSolver + Send>>) -> Self {
        Self { backends }
    }

    pub fn from_params(params: &SolverParams) -> Self {
        let mut backends: Vec<Box<dyn ConvexSolver + Send>> =
            vec![Box::new(AdmmSolver::new(params.primary.clone()))];
        if let Some(fallback) = &params.fallback {
            backends.push(Box::new(AdmmSolver::named(
                "admm-fallback",
                fallback.clone(),
            )));
        }
        Self::new(backends)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for SolverChain {
    fn default() -> Self {
        Self::from_params(&SolverParams::default())
    }
}

impl std::fmt::Debug for SolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("SolverChain").field("backends", &names).finish()
    }
}

impl ConvexSolver for SolverChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn solve(&mut self, problem: &SdpProblem) -> Result<SdpSolution, SolverError> {
        for backend in self.backends.iter_mut() {
            match backend.solve(problem) {
                Ok(solution) if solution.status.is_acceptable() => {
                    debug!(
                        "Solver: {} -> {:?} after {} iterations (objective {:.3e})",
                        backend.name(),
                        solution.status,
                        solution.iterations,
                        solution.objective
                    );
                    return Ok(solution);
                }
                Ok(solution) => warn!(
                    "Solver: {} stopped with {:?} after {} iterations",
                    backend.name(),
                    solution.status,
                    solution.iterations
                ),
                Err(err) => warn!("Solver: {} failed: {err}", backend.name()),
            }
        }
        Err(SolverError::Exhausted {
            attempts: self.backends.len(),
        })
    }
}
