//! Convex relaxation of the robust single-VP fit.
//!
//! - [`problem`]: typed builder for the two-variable SDP (costs plus
//!   block-level equality constraints).
//! - [`ConvexSolver`]: the solver seam. The search only sees this trait.
//! - [`AdmmSolver`]: dense built-in backend (affine projection alternated with
//!   PSD cone projection).
//! - [`SolverChain`]: ordered backends, first acceptable solution wins.

mod admm;
pub mod problem;
mod solver;

pub use admm::{AdmmSettings, AdmmSolver};
pub use problem::{build_vp_problem, Block, Constraint, SdpProblem, SdpProblemBuilder, Variable};
pub use solver::{ConvexSolver, SdpSolution, SolveStatus, SolverChain, SolverError, SolverParams};
